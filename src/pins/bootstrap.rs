use thiserror::Error;
use tracing::{error, info};

use super::{ObjectStore, PinStore};
use crate::platform::PlatformError;

/// Why the storage bucket could not be made ready. The `Display` text is
/// shown to users verbatim.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Storage setup error (RPC publicity): {0}")]
    Publicity(String),

    #[error("Storage setup error: Could not create bucket. {0}")]
    Create(PlatformError),

    #[error("Storage setup error: Could not verify bucket. {0}")]
    Verify(PlatformError),

    #[error("Storage setup error: Could not update bucket to public. {0}")]
    MakePublic(PlatformError),

    #[error("Database table \"images\" may not be correctly configured.")]
    Table(PlatformError),
}

/// Ensure `bucket` exists and is public, and that the `images` table answers.
///
/// Safe to call on every page render: an existing public bucket is left
/// untouched and creation is only attempted after a "not found" answer.
pub async fn ensure_storage_ready<O, R>(
    objects: &O,
    rows: &R,
    bucket: &str,
    publicity_rpc: Option<&str>,
) -> Result<(), BootstrapError>
where
    O: ObjectStore + ?Sized,
    R: PinStore + ?Sized,
{
    if let Some(function) = publicity_rpc {
        let outcome = rows.call_rpc(function).await.map_err(|err| {
            error!(?err, function, "bucket publicity RPC failed");
            BootstrapError::Publicity(err.to_string())
        })?;
        if !outcome.success {
            let message = outcome
                .message
                .unwrap_or_else(|| "Unknown RPC error".to_string());
            error!(function, %message, "bucket publicity RPC did not succeed");
            return Err(BootstrapError::Publicity(message));
        }
    }

    match objects.get_bucket(bucket).await {
        Ok(info) if info.public => {}
        Ok(_) => {
            info!(bucket, "bucket is private, switching it to public");
            objects.update_bucket(bucket, true).await.map_err(|err| {
                error!(?err, bucket, "failed to make bucket public");
                BootstrapError::MakePublic(err)
            })?;
        }
        Err(err) if err.is_not_found() => {
            info!(bucket, "bucket not found, creating it");
            objects.create_bucket(bucket, true).await.map_err(|err| {
                error!(?err, bucket, "failed to create bucket");
                BootstrapError::Create(err)
            })?;
        }
        Err(err) => {
            error!(?err, bucket, "failed to look up bucket");
            return Err(BootstrapError::Verify(err));
        }
    }

    rows.probe_images().await.map_err(|err| {
        error!(?err, "images table check failed");
        BootstrapError::Table(err)
    })?;

    Ok(())
}
