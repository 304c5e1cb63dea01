use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use super::upload::{MAX_IMAGE_BYTES, ProfileAsset, is_jpeg_or_png, replace_profile_asset};
use super::{ObjectStore, PinStore, ProfileRecord, ProfileUpsert, UploadedFile, UserRecord};
use crate::platform::PlatformError;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Critical user information is missing. Please contact support or try signing in again.")]
    MissingUser,

    #[error("profile has not been completed")]
    MissingProfile,

    #[error("{0}")]
    Invalid(String),

    #[error("Failed to upload {asset}: {source}")]
    Asset {
        asset: &'static str,
        source: PlatformError,
    },

    #[error("Failed to save profile: {0}")]
    Save(PlatformError),

    #[error("Failed to load profile: {0}")]
    Load(PlatformError),
}

impl ProfileError {
    pub fn is_session_expired(&self) -> bool {
        match self {
            ProfileError::Asset { source, .. } => source.is_session_expired(),
            ProfileError::Save(err) | ProfileError::Load(err) => err.is_session_expired(),
            _ => false,
        }
    }
}

/// The signed-in user's account row together with their profile.
#[derive(Clone, Debug)]
pub struct Account {
    pub user: UserRecord,
    pub profile: ProfileRecord,
}

/// Submitted profile form. Absent files keep the current asset.
#[derive(Clone, Debug, Default)]
pub struct ProfileEdit {
    pub description: String,
    pub avatar: Option<UploadedFile>,
    pub cover: Option<UploadedFile>,
}

/// Load the `users` and `profiles` rows for `user_id`.
pub async fn load_account<R>(rows: &R, user_id: Uuid) -> Result<Account, ProfileError>
where
    R: PinStore + ?Sized,
{
    let ids = [user_id];
    let (users, profiles) = tokio::join!(rows.users_by_ids(&ids), rows.profiles_by_user_ids(&ids));

    let user = users
        .map_err(ProfileError::Load)?
        .into_iter()
        .next()
        .ok_or(ProfileError::MissingUser)?;
    let profile = profiles
        .map_err(ProfileError::Load)?
        .into_iter()
        .next()
        .ok_or(ProfileError::MissingProfile)?;

    Ok(Account { user, profile })
}

/// Profile row for `user_id`, if one exists yet.
pub async fn find_profile<R>(rows: &R, user_id: Uuid) -> Result<Option<ProfileRecord>, PlatformError>
where
    R: PinStore + ?Sized,
{
    Ok(rows.profiles_by_user_ids(&[user_id]).await?.into_iter().next())
}

fn checked_asset(file: Option<UploadedFile>, label: &str) -> Result<Option<UploadedFile>, ProfileError> {
    let Some(file) = file.filter(|file| !file.is_empty()) else {
        return Ok(None);
    };
    if !is_jpeg_or_png(&file.content_type) {
        return Err(ProfileError::Invalid(format!(
            "{label} must be a JPEG or PNG image"
        )));
    }
    if file.len() > MAX_IMAGE_BYTES {
        return Err(ProfileError::Invalid(format!(
            "{label} must be 10MB or smaller"
        )));
    }
    Ok(Some(file))
}

/// Upload any new assets, then upsert the profile row keyed on `user_id`.
pub async fn save_profile<O, R>(
    objects: &O,
    rows: &R,
    bucket: &str,
    user_id: Uuid,
    current: Option<&ProfileRecord>,
    edit: ProfileEdit,
) -> Result<ProfileRecord, ProfileError>
where
    O: ObjectStore + ?Sized,
    R: PinStore + ?Sized,
{
    let avatar = checked_asset(edit.avatar, "Avatar")?;
    let cover = checked_asset(edit.cover, "Cover image")?;

    let mut avatar_url = current.and_then(|profile| profile.avatar_url.clone());
    let mut cover_image_url = current.and_then(|profile| profile.cover_image_url.clone());

    if let Some(file) = avatar {
        let url = replace_profile_asset(
            objects,
            bucket,
            user_id,
            ProfileAsset::Avatar,
            file,
            avatar_url.as_deref(),
        )
        .await
        .map_err(|source| {
            error!(err = ?source, %user_id, "avatar upload failed");
            ProfileError::Asset {
                asset: "avatar",
                source,
            }
        })?;
        avatar_url = Some(url);
    }

    if let Some(file) = cover {
        let url = replace_profile_asset(
            objects,
            bucket,
            user_id,
            ProfileAsset::Cover,
            file,
            cover_image_url.as_deref(),
        )
        .await
        .map_err(|source| {
            error!(err = ?source, %user_id, "cover upload failed");
            ProfileError::Asset {
                asset: "cover image",
                source,
            }
        })?;
        cover_image_url = Some(url);
    }

    let description = edit.description.trim().to_string();
    let upsert = ProfileUpsert {
        user_id,
        description: description.clone(),
        avatar_url: avatar_url.clone(),
        cover_image_url: cover_image_url.clone(),
        updated_at: Utc::now(),
    };
    rows.upsert_profile(&upsert).await.map_err(|err| {
        error!(?err, %user_id, "profile upsert failed");
        ProfileError::Save(err)
    })?;
    info!(%user_id, "profile saved");

    Ok(ProfileRecord {
        user_id,
        description: Some(description),
        avatar_url,
        cover_image_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::testing::{FakeBackend, FakeState, image_file};

    fn backend_with_user(user_id: Uuid) -> FakeBackend {
        let mut state = FakeState::default();
        state.buckets.insert("images".to_string(), true);
        state.users.push(UserRecord {
            id: user_id,
            username: "mira".to_string(),
            first_name: Some("Mira".to_string()),
            last_name: Some("Stone".to_string()),
        });
        FakeBackend::with_state(state)
    }

    #[tokio::test]
    async fn missing_profile_is_distinguished_from_missing_user() {
        let user_id = Uuid::new_v4();
        let backend = backend_with_user(user_id);

        let err = load_account(&backend, user_id).await.expect_err("no profile");
        assert!(matches!(err, ProfileError::MissingProfile));

        let err = load_account(&backend, Uuid::new_v4())
            .await
            .expect_err("no user");
        assert!(err.to_string().starts_with("Critical user information is missing"));
    }

    #[tokio::test]
    async fn first_save_creates_profile_with_avatar() {
        let user_id = Uuid::new_v4();
        let backend = backend_with_user(user_id);

        let saved = save_profile(
            &backend,
            &backend,
            "images",
            user_id,
            None,
            ProfileEdit {
                description: "  film photographer ".to_string(),
                avatar: Some(image_file("me.png")),
                cover: None,
            },
        )
        .await
        .expect("save");

        assert_eq!(saved.description.as_deref(), Some("film photographer"));
        assert!(saved.avatar_url.as_deref().is_some_and(|url| url.contains("/images/avatars/")));
        assert!(saved.cover_image_url.is_none());

        let account = load_account(&backend, user_id).await.expect("account");
        assert_eq!(account.profile, saved);
    }

    #[tokio::test]
    async fn edit_without_files_keeps_existing_assets() {
        let user_id = Uuid::new_v4();
        let backend = backend_with_user(user_id);
        let current = ProfileRecord {
            user_id,
            description: Some("old".to_string()),
            avatar_url: Some("https://example.com/a.png".to_string()),
            cover_image_url: Some("https://example.com/c.png".to_string()),
        };

        let saved = save_profile(
            &backend,
            &backend,
            "images",
            user_id,
            Some(&current),
            ProfileEdit {
                description: "new".to_string(),
                ..ProfileEdit::default()
            },
        )
        .await
        .expect("save");

        assert_eq!(saved.avatar_url, current.avatar_url);
        assert_eq!(saved.cover_image_url, current.cover_image_url);
        assert!(backend.lock().objects.is_empty());
    }

    #[tokio::test]
    async fn gif_cover_is_rejected() {
        let user_id = Uuid::new_v4();
        let backend = backend_with_user(user_id);
        let mut gif = image_file("cover.gif");
        gif.content_type = "image/gif".to_string();

        let err = save_profile(
            &backend,
            &backend,
            "images",
            user_id,
            None,
            ProfileEdit {
                description: String::new(),
                avatar: None,
                cover: Some(gif),
            },
        )
        .await
        .expect_err("gif");

        assert_eq!(err.to_string(), "Cover image must be a JPEG or PNG image");
        assert!(backend.lock().profiles.is_empty());
    }
}
