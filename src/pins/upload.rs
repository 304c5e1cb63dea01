use std::path::Path;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ImageRecord, NewImage, ObjectStore, ObjectUpload, PinStore, UploadedFile};
use crate::platform::{CODE_INSUFFICIENT_PRIVILEGE, PlatformError};

/// Largest accepted image, pins and profile assets alike.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("{0}")]
    Invalid(String),

    #[error("storage upload failed: {0}")]
    Upload(PlatformError),

    #[error("record insert failed: {0}")]
    Insert(PlatformError),

    #[error("record delete failed: {0}")]
    Delete(PlatformError),
}

impl PinError {
    /// Inline message for the page that triggered the operation.
    pub fn user_message(&self) -> String {
        match self {
            PinError::Invalid(message) => message.clone(),
            PinError::Upload(err) if err.is_not_found() => {
                "Storage bucket not configured. Please contact administrator.".to_string()
            }
            PinError::Upload(err) => format!("Storage error: {err}"),
            PinError::Insert(err) if err.code() == Some(CODE_INSUFFICIENT_PRIVILEGE) => {
                "Permission denied. RLS policy prevents this operation.".to_string()
            }
            PinError::Insert(err) if err.to_string().contains("violates row-level security") => {
                "RLS policy violation. User ID may not match the authenticated user.".to_string()
            }
            PinError::Insert(err) => format!("Database error: {err}"),
            PinError::Delete(err) => format!("Failed to delete pin: {err}"),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        match self {
            PinError::Upload(err) | PinError::Insert(err) | PinError::Delete(err) => {
                err.is_session_expired()
            }
            PinError::Invalid(_) => false,
        }
    }
}

/// Form input for a new pin.
#[derive(Clone, Debug)]
pub struct PinDraft {
    pub file: Option<UploadedFile>,
    pub title: String,
    pub description: String,
    pub is_public: bool,
}

/// Logical sub-prefixes for profile imagery inside the image bucket.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProfileAsset {
    Avatar,
    Cover,
}

impl ProfileAsset {
    pub fn prefix(&self) -> &'static str {
        match self {
            ProfileAsset::Avatar => "avatars/",
            ProfileAsset::Cover => "covers/",
        }
    }
}

/// Key for a pin blob: `<unix-millis>.<ext>`.
pub fn pin_object_key(millis: i64, extension: &str) -> String {
    format!("{millis}.{extension}")
}

/// Key for a profile asset: `avatars/<user>-<unix-millis>.<ext>`.
pub fn profile_asset_key(asset: ProfileAsset, user_id: Uuid, millis: i64, extension: &str) -> String {
    format!("{}{user_id}-{millis}.{extension}", asset.prefix())
}

/// Extension taken from the client filename, falling back to the MIME subtype.
pub fn file_extension(file: &UploadedFile) -> String {
    let from_name = Path::new(&file.original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    from_name.unwrap_or_else(|| {
        file.content_type
            .parse::<mime::Mime>()
            .ok()
            .map(|mime| match mime.subtype().as_str() {
                "jpeg" => "jpg".to_string(),
                "svg" => "svg".to_string(),
                other => other.to_ascii_lowercase(),
            })
            .unwrap_or_else(|| "bin".to_string())
    })
}

pub fn is_image(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|mime| mime.type_() == mime::IMAGE)
        .unwrap_or(false)
}

/// Profile imagery is restricted to JPEG and PNG.
pub fn is_jpeg_or_png(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|mime| mime.essence_str() == "image/jpeg" || mime.essence_str() == "image/png")
        .unwrap_or(false)
}

fn validate_draft(draft: PinDraft) -> Result<(UploadedFile, NewDraft), PinError> {
    let Some(file) = draft.file.filter(|file| !file.is_empty()) else {
        return Err(PinError::Invalid(
            "Please select an image to upload".to_string(),
        ));
    };
    if !is_image(&file.content_type) {
        return Err(PinError::Invalid("Please select an image file".to_string()));
    }
    if file.len() > MAX_IMAGE_BYTES {
        return Err(PinError::Invalid(
            "Images must be 10MB or smaller".to_string(),
        ));
    }
    let title = draft.title.trim().to_string();
    if title.is_empty() {
        return Err(PinError::Invalid(
            "Please enter a title for your pin".to_string(),
        ));
    }

    Ok((
        file,
        NewDraft {
            title,
            description: draft.description,
            is_public: draft.is_public,
        },
    ))
}

struct NewDraft {
    title: String,
    description: String,
    is_public: bool,
}

/// Upload the blob, then insert its `images` row. When the insert fails the
/// blob is removed again; a failing removal is only logged and the blob
/// stays orphaned.
pub async fn create_pin<O, R>(
    objects: &O,
    rows: &R,
    bucket: &str,
    owner: Uuid,
    draft: PinDraft,
) -> Result<ImageRecord, PinError>
where
    O: ObjectStore + ?Sized,
    R: PinStore + ?Sized,
{
    let (file, meta) = validate_draft(draft)?;
    let key = pin_object_key(Utc::now().timestamp_millis(), &file_extension(&file));
    let original_filename = file.original_name;

    objects
        .upload_object(
            bucket,
            &key,
            ObjectUpload {
                bytes: file.bytes,
                content_type: file.content_type,
                upsert: false,
            },
        )
        .await
        .map_err(|err| {
            error!(?err, %key, "pin upload failed");
            PinError::Upload(err)
        })?;

    let record = NewImage {
        user_id: owner,
        storage_path: key.clone(),
        original_filename,
        is_public: meta.is_public,
        title: meta.title,
        description: meta.description,
    };

    match rows.insert_image(&record).await {
        Ok(row) => {
            info!(image_id = %row.id, %key, "pin created");
            Ok(row)
        }
        Err(err) => {
            error!(?err, %key, "pin insert failed, removing uploaded blob");
            if let Err(cleanup) = objects.remove_objects(bucket, &[key.clone()]).await {
                warn!(?cleanup, %key, "failed to remove orphaned blob");
            }
            Err(PinError::Insert(err))
        }
    }
}

/// Remove a pin's blob and row concurrently. Only the row deletion decides
/// the outcome.
pub async fn delete_pin<O, R>(
    objects: &O,
    rows: &R,
    bucket: &str,
    image_id: Uuid,
    storage_path: &str,
) -> Result<(), PinError>
where
    O: ObjectStore + ?Sized,
    R: PinStore + ?Sized,
{
    let keys = [storage_path.to_string()];
    let (storage_result, row_result) = tokio::join!(
        objects.remove_objects(bucket, &keys),
        rows.delete_image(image_id)
    );

    if let Err(err) = storage_result {
        warn!(?err, %image_id, storage_path, "failed to remove pin blob");
    }

    row_result.map_err(|err| {
        error!(?err, %image_id, "failed to delete pin row");
        PinError::Delete(err)
    })
}

/// Upload a profile asset with upsert and return its public URL. The object
/// behind `previous_url` is removed afterwards when it lives under the same
/// prefix of this bucket.
pub async fn replace_profile_asset<O>(
    objects: &O,
    bucket: &str,
    user_id: Uuid,
    asset: ProfileAsset,
    file: UploadedFile,
    previous_url: Option<&str>,
) -> Result<String, PlatformError>
where
    O: ObjectStore + ?Sized,
{
    let key = profile_asset_key(
        asset,
        user_id,
        Utc::now().timestamp_millis(),
        &file_extension(&file),
    );
    objects
        .upload_object(
            bucket,
            &key,
            ObjectUpload {
                bytes: file.bytes,
                content_type: file.content_type,
                upsert: true,
            },
        )
        .await?;

    let public_url = objects.public_url(bucket, &key);

    if let Some(old_key) = previous_url.and_then(|url| owned_object_key(objects, bucket, asset, url)) {
        if old_key != key {
            match objects.remove_objects(bucket, &[old_key.clone()]).await {
                Ok(()) => info!(%old_key, "removed replaced profile asset"),
                Err(err) => warn!(?err, %old_key, "failed to remove replaced profile asset"),
            }
        }
    }

    Ok(public_url)
}

/// Object key behind `url` when it points into `bucket` under the asset's
/// prefix.
fn owned_object_key<O>(objects: &O, bucket: &str, asset: ProfileAsset, url: &str) -> Option<String>
where
    O: ObjectStore + ?Sized,
{
    let bucket_prefix = objects.public_url(bucket, "");
    let key = url.strip_prefix(&bucket_prefix)?;
    key.starts_with(asset.prefix()).then(|| key.to_string())
}
