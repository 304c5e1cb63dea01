use async_trait::async_trait;
use reqwest::{Method, header};
use serde_json::json;

use super::{PlatformError, ScopedClient, expect_success, read_json};
use crate::pins::{BucketInfo, ObjectStore, ObjectUpload};

const CACHE_CONTROL: &str = "max-age=3600";

/// `<base>/storage/v1/object/public/<bucket>/<key>`
pub fn public_object_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        key.trim_start_matches('/')
    )
}

#[async_trait]
impl ObjectStore for ScopedClient {
    async fn get_bucket(&self, name: &str) -> Result<BucketInfo, PlatformError> {
        let response = self
            .request(Method::GET, &format!("/storage/v1/bucket/{name}"))
            .send()
            .await?;
        read_json(response).await
    }

    async fn create_bucket(&self, name: &str, public: bool) -> Result<(), PlatformError> {
        let response = self
            .request(Method::POST, "/storage/v1/bucket")
            .json(&json!({ "id": name, "name": name, "public": public }))
            .send()
            .await?;
        expect_success(response).await
    }

    async fn update_bucket(&self, name: &str, public: bool) -> Result<(), PlatformError> {
        let response = self
            .request(Method::PUT, &format!("/storage/v1/bucket/{name}"))
            .json(&json!({ "id": name, "name": name, "public": public }))
            .send()
            .await?;
        expect_success(response).await
    }

    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        object: ObjectUpload,
    ) -> Result<(), PlatformError> {
        let response = self
            .request(Method::POST, &format!("/storage/v1/object/{bucket}/{key}"))
            .header(header::CONTENT_TYPE, object.content_type)
            .header(header::CACHE_CONTROL, CACHE_CONTROL)
            .header("x-upsert", if object.upsert { "true" } else { "false" })
            .body(object.bytes)
            .send()
            .await?;
        expect_success(response).await
    }

    async fn remove_objects(&self, bucket: &str, keys: &[String]) -> Result<(), PlatformError> {
        if keys.is_empty() {
            return Ok(());
        }
        let response = self
            .request(Method::DELETE, &format!("/storage/v1/object/{bucket}"))
            .json(&json!({ "prefixes": keys }))
            .send()
            .await?;
        expect_success(response).await
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_object_url(self.base_url(), bucket, key)
    }
}
