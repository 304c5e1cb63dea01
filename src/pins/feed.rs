use std::collections::HashMap;

use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use super::layout::pin_height;
use super::search::Searchable;
use super::{ImageRecord, ObjectStore, PinStore, ProfileRecord, UserRecord};
use crate::platform::PlatformError;

pub const DEFAULT_AVATAR_URL: &str = "https://st3.depositphotos.com/6672868/13701/v/450/depositphotos_137014128-stock-illustration-user-profile-icon.jpg";

const UNKNOWN_USER: &str = "Unknown User";
const USER_NOT_FOUND: &str = "User not found";

/// One pin as rendered in the grid and on its detail page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedItem {
    pub id: Uuid,
    pub image_url: String,
    pub alt: String,
    pub title: String,
    pub description: String,
    pub display_name: String,
    pub avatar_url: String,
    pub height: u32,
    pub storage_path: String,
    pub owner_id: Uuid,
}

impl Searchable for FeedItem {
    fn title(&self) -> &str {
        &self.title
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Username, else "first last", else nothing.
pub fn display_name(user: &UserRecord) -> Option<String> {
    let username = user.username.trim();
    if !username.is_empty() {
        return Some(username.to_string());
    }
    let full = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!full.is_empty()).then_some(full)
}

/// Absolute avatar URL for a stored profile value. Bare keys resolve under
/// `avatars/` in the image bucket.
pub fn resolve_avatar<O>(objects: &O, bucket: &str, value: Option<&str>) -> String
where
    O: ObjectStore + ?Sized,
{
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => DEFAULT_AVATAR_URL.to_string(),
        Some(url) if url.starts_with("http") => url.to_string(),
        Some(key) => objects.public_url(bucket, &format!("avatars/{}", key.trim_start_matches('/'))),
    }
}

struct Owners {
    users: HashMap<Uuid, UserRecord>,
    profiles: HashMap<Uuid, ProfileRecord>,
}

/// Fetch owner names and avatars concurrently. Either lookup failing only
/// costs the corresponding decoration.
async fn load_owners<R>(rows: &R, images: &[ImageRecord]) -> Owners
where
    R: PinStore + ?Sized,
{
    let mut ids: Vec<Uuid> = images.iter().map(|image| image.user_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let (users, profiles) = tokio::join!(rows.users_by_ids(&ids), rows.profiles_by_user_ids(&ids));

    let users = users.unwrap_or_else(|err| {
        error!(?err, owners = ids.len(), "failed to load pin owners");
        Vec::new()
    });
    let profiles = profiles.unwrap_or_else(|err| {
        error!(?err, owners = ids.len(), "failed to load owner profiles");
        Vec::new()
    });

    Owners {
        users: users.into_iter().map(|user| (user.id, user)).collect(),
        profiles: profiles
            .into_iter()
            .map(|profile| (profile.user_id, profile))
            .collect(),
    }
}

fn to_item<O>(
    objects: &O,
    bucket: &str,
    image: ImageRecord,
    owners: &Owners,
    missing_owner: &str,
) -> Option<FeedItem>
where
    O: ObjectStore + ?Sized,
{
    let Some(storage_path) = image.storage_path.filter(|path| !path.trim().is_empty()) else {
        warn!(image_id = %image.id, "skipping pin without storage path");
        return None;
    };

    let title = image.title.filter(|title| !title.trim().is_empty());
    let owner_name = owners
        .users
        .get(&image.user_id)
        .and_then(display_name)
        .unwrap_or_else(|| missing_owner.to_string());
    let avatar = owners
        .profiles
        .get(&image.user_id)
        .and_then(|profile| profile.avatar_url.as_deref());

    Some(FeedItem {
        id: image.id,
        image_url: objects.public_url(bucket, &storage_path),
        alt: title.clone().unwrap_or_else(|| "Image pin".to_string()),
        title: title.unwrap_or_else(|| "Untitled Pin".to_string()),
        description: image.description.unwrap_or_default(),
        display_name: owner_name,
        avatar_url: resolve_avatar(objects, bucket, avatar),
        height: pin_height(&image.id.to_string()),
        storage_path,
        owner_id: image.user_id,
    })
}

async fn assemble<O, R>(
    objects: &O,
    rows: &R,
    bucket: &str,
    images: Vec<ImageRecord>,
    missing_owner: &str,
) -> Vec<FeedItem>
where
    O: ObjectStore + ?Sized,
    R: PinStore + ?Sized,
{
    let owners = load_owners(rows, &images).await;
    images
        .into_iter()
        .filter_map(|image| to_item(objects, bucket, image, &owners, missing_owner))
        .collect()
}

/// Every visible pin, newest first.
pub async fn load_feed<O, R>(objects: &O, rows: &R, bucket: &str) -> Result<Vec<FeedItem>, PlatformError>
where
    O: ObjectStore + ?Sized,
    R: PinStore + ?Sized,
{
    let images = rows.list_images(None).await?;
    Ok(assemble(objects, rows, bucket, images, UNKNOWN_USER).await)
}

/// Pins owned by `owner`, newest first.
pub async fn load_user_pins<O, R>(
    objects: &O,
    rows: &R,
    bucket: &str,
    owner: Uuid,
) -> Result<Vec<FeedItem>, PlatformError>
where
    O: ObjectStore + ?Sized,
    R: PinStore + ?Sized,
{
    let images = rows.list_images(Some(owner)).await?;
    Ok(assemble(objects, rows, bucket, images, UNKNOWN_USER).await)
}

/// A single pin with its owner, or `None` when no row matches.
pub async fn load_pin<O, R>(
    objects: &O,
    rows: &R,
    bucket: &str,
    id: Uuid,
) -> Result<Option<FeedItem>, PlatformError>
where
    O: ObjectStore + ?Sized,
    R: PinStore + ?Sized,
{
    let Some(image) = rows.get_image(id).await? else {
        return Ok(None);
    };
    Ok(assemble(objects, rows, bucket, vec![image], USER_NOT_FOUND)
        .await
        .into_iter()
        .next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::testing::{BASE_URL, FakeBackend, FakeState, image_row};

    fn user(id: Uuid, username: &str, first: Option<&str>, last: Option<&str>) -> UserRecord {
        UserRecord {
            id,
            username: username.to_string(),
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
        }
    }

    #[test]
    fn display_name_fallbacks() {
        let id = Uuid::nil();
        assert_eq!(
            display_name(&user(id, "mira", Some("Mira"), None)).as_deref(),
            Some("mira")
        );
        assert_eq!(
            display_name(&user(id, " ", Some("Mira"), Some("Stone"))).as_deref(),
            Some("Mira Stone")
        );
        assert_eq!(display_name(&user(id, "", None, None)), None);
    }

    #[test]
    fn avatar_values_resolve_to_urls() {
        let backend = FakeBackend::default();
        assert_eq!(resolve_avatar(&backend, "images", None), DEFAULT_AVATAR_URL);
        assert_eq!(
            resolve_avatar(&backend, "images", Some("https://cdn.example/me.png")),
            "https://cdn.example/me.png"
        );
        assert_eq!(
            resolve_avatar(&backend, "images", Some("me.png")),
            format!("{BASE_URL}/storage/v1/object/public/images/avatars/me.png")
        );
    }

    #[tokio::test]
    async fn feed_decorates_pins_and_skips_pathless_rows() {
        let owner = Uuid::new_v4();
        let mut untitled = image_row(owner, "", "2.png");
        untitled.title = None;
        let mut pathless = image_row(owner, "Ghost", "");
        pathless.storage_path = None;

        let mut state = FakeState::default();
        state.users.push(user(owner, "mira", None, None));
        state.profiles.push(ProfileRecord {
            user_id: owner,
            avatar_url: Some("mira.png".to_string()),
            ..ProfileRecord::default()
        });
        state.images = vec![image_row(owner, "Sunset", "1.png"), untitled, pathless];
        let backend = FakeBackend::with_state(state);

        let feed = load_feed(&backend, &backend, "images").await.expect("feed");

        assert_eq!(feed.len(), 2);
        let sunset = feed.iter().find(|item| item.title == "Sunset").expect("sunset");
        assert_eq!(sunset.display_name, "mira");
        assert_eq!(
            sunset.image_url,
            format!("{BASE_URL}/storage/v1/object/public/images/1.png")
        );
        assert!(sunset.avatar_url.ends_with("/images/avatars/mira.png"));

        let untitled = feed.iter().find(|item| item.storage_path == "2.png").expect("untitled");
        assert_eq!(untitled.title, "Untitled Pin");
        assert_eq!(untitled.alt, "Image pin");
    }

    #[tokio::test]
    async fn owner_lookup_failure_degrades_to_unknown_user() {
        let owner = Uuid::new_v4();
        let mut state = FakeState {
            fail_users: true,
            ..FakeState::default()
        };
        state.images.push(image_row(owner, "Sunset", "1.png"));
        let backend = FakeBackend::with_state(state);

        let feed = load_feed(&backend, &backend, "images").await.expect("feed");
        assert_eq!(feed[0].display_name, "Unknown User");
        assert_eq!(feed[0].avatar_url, DEFAULT_AVATAR_URL);
    }

    #[tokio::test]
    async fn single_pin_lookup() {
        let owner = Uuid::new_v4();
        let row = image_row(owner, "Sunset", "1.png");
        let id = row.id;
        let backend = FakeBackend::with_state(FakeState {
            images: vec![row],
            ..FakeState::default()
        });

        let pin = load_pin(&backend, &backend, "images", id)
            .await
            .expect("lookup")
            .expect("pin exists");
        assert_eq!(pin.display_name, "User not found");
        assert_eq!(pin.owner_id, owner);

        let missing = load_pin(&backend, &backend, "images", Uuid::new_v4())
            .await
            .expect("lookup");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn user_pins_are_filtered_by_owner() {
        let mine = Uuid::new_v4();
        let backend = FakeBackend::with_state(FakeState {
            images: vec![
                image_row(mine, "Mine", "1.png"),
                image_row(Uuid::new_v4(), "Theirs", "2.png"),
            ],
            ..FakeState::default()
        });

        let pins = load_user_pins(&backend, &backend, "images", mine)
            .await
            .expect("pins");
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].title, "Mine");
    }
}
