use std::env;

use anyhow::{Context, Result, bail};
use tracing::warn;

const DEFAULT_BUCKET: &str = "images";
const DEFAULT_PORT: u16 = 8080;
const UNKNOWN_PROJECT_REF: &str = "unknown-project";

/// Connection settings for the hosted backend plus the local listener.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub supabase_url: String,
    pub anon_key: String,
    pub project_ref: String,
    pub bucket: String,
    pub publicity_rpc: Option<String>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let supabase_url = read_var("SUPABASE_URL")
            .context("SUPABASE_URL env var is missing")?
            .trim_end_matches('/')
            .to_string();
        if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
            bail!("SUPABASE_URL must be an http(s) URL, got `{supabase_url}`");
        }

        let anon_key = read_var("SUPABASE_ANON_KEY").context("SUPABASE_ANON_KEY env var is missing")?;

        let project_ref = match read_var("SUPABASE_PROJECT_REF") {
            Some(value) => value,
            None => derive_project_ref(&supabase_url).unwrap_or_else(|| {
                warn!(
                    "SUPABASE_PROJECT_REF is not set and could not be derived from SUPABASE_URL; session cookie name falls back to a default"
                );
                UNKNOWN_PROJECT_REF.to_string()
            }),
        };

        let bucket = read_var("IMAGE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let publicity_rpc = read_var("BUCKET_PUBLICITY_RPC");
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            supabase_url,
            anon_key,
            project_ref,
            bucket,
            publicity_rpc,
            port,
        })
    }

    /// Name of the cookie carrying the serialized session.
    pub fn session_cookie_name(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref)
    }
}

/// Reads `NAME`, falling back to `NEXT_PUBLIC_NAME`. Blank values count as unset.
fn read_var(name: &str) -> Option<String> {
    env::var(name)
        .or_else(|_| env::var(format!("NEXT_PUBLIC_{name}")))
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `https://abcd.supabase.co` -> `abcd`.
fn derive_project_ref(url: &str) -> Option<String> {
    let host = url.split("://").nth(1)?.split(['/', ':']).next()?;
    let project = host.strip_suffix(".supabase.co")?;
    if project.is_empty() || project.contains('.') {
        return None;
    }
    Some(project.to_string())
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        supabase_url: "https://abcd.supabase.co".to_string(),
        anon_key: "anon-key".to_string(),
        project_ref: "abcd".to_string(),
        bucket: DEFAULT_BUCKET.to_string(),
        publicity_rpc: None,
        port: DEFAULT_PORT,
    }
}
