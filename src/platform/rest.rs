use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use uuid::Uuid;

use super::{PlatformError, ScopedClient, expect_success, read_json};
use crate::pins::{
    ImageRecord, NewImage, PinStore, ProfileRecord, ProfileUpsert, RpcOutcome, UserRecord,
};

const IMAGES_PATH: &str = "/rest/v1/images";
const USERS_PATH: &str = "/rest/v1/users";
const PROFILES_PATH: &str = "/rest/v1/profiles";

/// `in.(a,b,c)` filter value for the REST gateway.
fn in_filter(ids: &[Uuid]) -> String {
    let joined = ids
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({joined})")
}

#[async_trait]
impl PinStore for ScopedClient {
    async fn call_rpc(&self, function: &str) -> Result<RpcOutcome, PlatformError> {
        let response = self
            .request(Method::POST, &format!("/rest/v1/rpc/{function}"))
            .json(&json!({}))
            .send()
            .await?;
        read_json(response).await
    }

    async fn probe_images(&self) -> Result<(), PlatformError> {
        let response = self
            .request(Method::HEAD, IMAGES_PATH)
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        expect_success(response).await
    }

    async fn list_images(&self, owner: Option<Uuid>) -> Result<Vec<ImageRecord>, PlatformError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(owner) = owner {
            query.push(("user_id", format!("eq.{owner}")));
        }

        let response = self
            .request(Method::GET, IMAGES_PATH)
            .query(&query)
            .send()
            .await?;
        read_json(response).await
    }

    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>, PlatformError> {
        let response = self
            .request(Method::GET, IMAGES_PATH)
            .query(&[
                ("select", "*".to_string()),
                ("id", format!("eq.{id}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;
        let rows: Vec<ImageRecord> = read_json(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_image(&self, image: &NewImage) -> Result<ImageRecord, PlatformError> {
        let response = self
            .request(Method::POST, IMAGES_PATH)
            .header("Prefer", "return=representation")
            .json(image)
            .send()
            .await?;
        let rows: Vec<ImageRecord> = read_json(response).await?;
        rows.into_iter().next().ok_or_else(|| PlatformError::Api {
            code: None,
            message: "insert returned no row".to_string(),
        })
    }

    async fn delete_image(&self, id: Uuid) -> Result<(), PlatformError> {
        let response = self
            .request(Method::DELETE, IMAGES_PATH)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        expect_success(response).await
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserRecord>, PlatformError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .request(Method::GET, USERS_PATH)
            .query(&[
                ("select", "id,username,first_name,last_name".to_string()),
                ("id", in_filter(ids)),
            ])
            .send()
            .await?;
        read_json(response).await
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), PlatformError> {
        let response = self
            .request(Method::POST, USERS_PATH)
            .header("Prefer", "return=minimal")
            .json(user)
            .send()
            .await?;
        expect_success(response).await
    }

    async fn profiles_by_user_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<ProfileRecord>, PlatformError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .request(Method::GET, PROFILES_PATH)
            .query(&[
                (
                    "select",
                    "user_id,description,avatar_url,cover_image_url".to_string(),
                ),
                ("user_id", in_filter(ids)),
            ])
            .send()
            .await?;
        read_json(response).await
    }

    async fn upsert_profile(&self, profile: &ProfileUpsert) -> Result<(), PlatformError> {
        let response = self
            .request(Method::POST, PROFILES_PATH)
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(profile)
            .send()
            .await?;
        expect_success(response).await
    }
}
