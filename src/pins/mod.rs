//! Pin domain logic. The platform is reached only through the two traits
//! below so the upload, bootstrap and feed sequences can be exercised with
//! in-memory stores.

pub mod bootstrap;
pub mod feed;
pub mod layout;
pub mod models;
pub mod profile;
pub mod search;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use uuid::Uuid;

use crate::platform::PlatformError;

pub use models::{
    BucketInfo, ImageRecord, NewImage, ProfileRecord, ProfileUpsert, RpcOutcome, UploadedFile,
    UserRecord,
};

/// Object content plus the storage options it is written with.
#[derive(Clone, Debug)]
pub struct ObjectUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub upsert: bool,
}

/// Bucket and object operations of the storage service.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_bucket(&self, name: &str) -> Result<BucketInfo, PlatformError>;

    async fn create_bucket(&self, name: &str, public: bool) -> Result<(), PlatformError>;

    async fn update_bucket(&self, name: &str, public: bool) -> Result<(), PlatformError>;

    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        object: ObjectUpload,
    ) -> Result<(), PlatformError>;

    async fn remove_objects(&self, bucket: &str, keys: &[String]) -> Result<(), PlatformError>;

    /// Unauthenticated URL of an object in a public bucket.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Row access for the `images`, `users` and `profiles` tables.
#[async_trait]
pub trait PinStore: Send + Sync {
    async fn call_rpc(&self, function: &str) -> Result<RpcOutcome, PlatformError>;

    /// Cheap head request proving the `images` table is reachable.
    async fn probe_images(&self) -> Result<(), PlatformError>;

    async fn list_images(&self, owner: Option<Uuid>) -> Result<Vec<ImageRecord>, PlatformError>;

    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>, PlatformError>;

    async fn insert_image(&self, image: &NewImage) -> Result<ImageRecord, PlatformError>;

    async fn delete_image(&self, id: Uuid) -> Result<(), PlatformError>;

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserRecord>, PlatformError>;

    async fn insert_user(&self, user: &UserRecord) -> Result<(), PlatformError>;

    async fn profiles_by_user_ids(&self, ids: &[Uuid])
    -> Result<Vec<ProfileRecord>, PlatformError>;

    async fn upsert_profile(&self, profile: &ProfileUpsert) -> Result<(), PlatformError>;
}
