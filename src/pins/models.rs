use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of the `images` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a freshly uploaded pin.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewImage {
    pub user_id: Uuid,
    pub storage_path: String,
    pub original_filename: String,
    pub is_public: bool,
    pub title: String,
    pub description: String,
}

/// Row of the `users` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Row of the `profiles` table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: Uuid,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
}

/// Upsert payload keyed on `user_id`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfileUpsert {
    pub user_id: Uuid,
    pub description: String,
    pub avatar_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BucketInfo {
    #[serde(default)]
    pub public: bool,
}

/// Payload returned by the bucket publicity database function.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RpcOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// A file received from a multipart form, held in memory until it is
/// forwarded to object storage.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
