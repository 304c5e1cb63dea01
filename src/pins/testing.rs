//! In-memory stand-ins for the platform used by the pin tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{
    BucketInfo, ImageRecord, NewImage, ObjectStore, ObjectUpload, PinStore, ProfileRecord,
    ProfileUpsert, RpcOutcome, UploadedFile, UserRecord,
};
use crate::platform::{CODE_INSUFFICIENT_PRIVILEGE, PlatformError};

pub const BASE_URL: &str = "https://abcd.supabase.co";

#[derive(Default)]
pub struct FakeState {
    /// bucket name -> public flag
    pub buckets: HashMap<String, bool>,
    /// `bucket/key` -> object
    pub objects: HashMap<String, ObjectUpload>,
    pub removed: Vec<String>,
    pub bucket_creations: usize,
    pub bucket_updates: usize,
    pub images: Vec<ImageRecord>,
    pub users: Vec<UserRecord>,
    pub profiles: Vec<ProfileRecord>,
    pub rpc_outcome: Option<RpcOutcome>,
    pub fail_get_bucket: bool,
    pub fail_upload: bool,
    pub fail_insert: bool,
    pub fail_remove: bool,
    pub fail_users: bool,
    pub fail_probe: bool,
}

#[derive(Default)]
pub struct FakeBackend {
    pub state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn with_state(state: FakeState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state poisoned")
    }
}

pub fn image_file(name: &str) -> UploadedFile {
    UploadedFile {
        original_name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

pub fn image_row(owner: Uuid, title: &str, path: &str) -> ImageRecord {
    ImageRecord {
        id: Uuid::new_v4(),
        user_id: owner,
        storage_path: Some(path.to_string()),
        original_filename: Some(path.to_string()),
        title: Some(title.to_string()),
        description: None,
        is_public: true,
        created_at: Utc::now(),
    }
}

fn api_error(message: &str) -> PlatformError {
    PlatformError::Api {
        code: None,
        message: message.to_string(),
    }
}

#[async_trait]
impl ObjectStore for FakeBackend {
    async fn get_bucket(&self, name: &str) -> Result<BucketInfo, PlatformError> {
        let state = self.lock();
        if state.fail_get_bucket {
            return Err(api_error("storage unavailable"));
        }
        match state.buckets.get(name) {
            Some(public) => Ok(BucketInfo { public: *public }),
            None => Err(PlatformError::NotFound {
                message: "Bucket not found".to_string(),
            }),
        }
    }

    async fn create_bucket(&self, name: &str, public: bool) -> Result<(), PlatformError> {
        let mut state = self.lock();
        if state.buckets.contains_key(name) {
            return Err(api_error("The resource already exists"));
        }
        state.buckets.insert(name.to_string(), public);
        state.bucket_creations += 1;
        Ok(())
    }

    async fn update_bucket(&self, name: &str, public: bool) -> Result<(), PlatformError> {
        let mut state = self.lock();
        if !state.buckets.contains_key(name) {
            return Err(PlatformError::NotFound {
                message: "Bucket not found".to_string(),
            });
        }
        state.buckets.insert(name.to_string(), public);
        state.bucket_updates += 1;
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        object: ObjectUpload,
    ) -> Result<(), PlatformError> {
        let mut state = self.lock();
        if state.fail_upload {
            return Err(api_error("upload rejected"));
        }
        if !state.buckets.contains_key(bucket) {
            return Err(PlatformError::NotFound {
                message: "Bucket not found".to_string(),
            });
        }
        let full_key = format!("{bucket}/{key}");
        if !object.upsert && state.objects.contains_key(&full_key) {
            return Err(api_error("The resource already exists"));
        }
        state.objects.insert(full_key, object);
        Ok(())
    }

    async fn remove_objects(&self, bucket: &str, keys: &[String]) -> Result<(), PlatformError> {
        let mut state = self.lock();
        for key in keys {
            state.removed.push(key.clone());
        }
        if state.fail_remove {
            return Err(api_error("remove rejected"));
        }
        for key in keys {
            state.objects.remove(&format!("{bucket}/{key}"));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        crate::platform::storage::public_object_url(BASE_URL, bucket, key)
    }
}

#[async_trait]
impl PinStore for FakeBackend {
    async fn call_rpc(&self, function: &str) -> Result<RpcOutcome, PlatformError> {
        self.lock()
            .rpc_outcome
            .clone()
            .ok_or_else(|| PlatformError::NotFound {
                message: format!("function {function} not found"),
            })
    }

    async fn probe_images(&self) -> Result<(), PlatformError> {
        if self.lock().fail_probe {
            return Err(api_error("relation \"images\" does not exist"));
        }
        Ok(())
    }

    async fn list_images(&self, owner: Option<Uuid>) -> Result<Vec<ImageRecord>, PlatformError> {
        let state = self.lock();
        let mut rows: Vec<ImageRecord> = state
            .images
            .iter()
            .filter(|row| owner.is_none_or(|owner| row.user_id == owner))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>, PlatformError> {
        Ok(self.lock().images.iter().find(|row| row.id == id).cloned())
    }

    async fn insert_image(&self, image: &NewImage) -> Result<ImageRecord, PlatformError> {
        let mut state = self.lock();
        if state.fail_insert {
            return Err(PlatformError::PermissionDenied {
                code: Some(CODE_INSUFFICIENT_PRIVILEGE.to_string()),
                message: "new row violates row-level security policy for table \"images\""
                    .to_string(),
            });
        }
        let row = ImageRecord {
            id: Uuid::new_v4(),
            user_id: image.user_id,
            storage_path: Some(image.storage_path.clone()),
            original_filename: Some(image.original_filename.clone()),
            title: Some(image.title.clone()),
            description: Some(image.description.clone()),
            is_public: image.is_public,
            created_at: Utc::now(),
        };
        state.images.push(row.clone());
        Ok(row)
    }

    async fn delete_image(&self, id: Uuid) -> Result<(), PlatformError> {
        self.lock().images.retain(|row| row.id != id);
        Ok(())
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserRecord>, PlatformError> {
        let state = self.lock();
        if state.fail_users {
            return Err(api_error("users unavailable"));
        }
        Ok(state
            .users
            .iter()
            .filter(|user| ids.contains(&user.id))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), PlatformError> {
        self.lock().users.push(user.clone());
        Ok(())
    }

    async fn profiles_by_user_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<ProfileRecord>, PlatformError> {
        Ok(self
            .lock()
            .profiles
            .iter()
            .filter(|profile| ids.contains(&profile.user_id))
            .cloned()
            .collect())
    }

    async fn upsert_profile(&self, profile: &ProfileUpsert) -> Result<(), PlatformError> {
        let mut state = self.lock();
        let record = ProfileRecord {
            user_id: profile.user_id,
            description: Some(profile.description.clone()),
            avatar_url: profile.avatar_url.clone(),
            cover_image_url: profile.cover_image_url.clone(),
        };
        let position = state
            .profiles
            .iter()
            .position(|existing| existing.user_id == profile.user_id);
        match position {
            Some(idx) => state.profiles[idx] = record,
            None => state.profiles.push(record),
        }
        Ok(())
    }
}
