use std::collections::HashMap;

use axum::extract::Multipart;
use thiserror::Error;

use crate::pins::UploadedFile;

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when a multipart form does not meet its field rules. The
/// message is shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Expectations for a single multipart file field.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub label: &'a str,
    /// MIME essences such as `image/png`, or `type/*` wildcards.
    pub allowed_types: &'a [&'a str],
    pub max_bytes: usize,
}

impl<'a> FileFieldConfig<'a> {
    pub fn new(
        field_name: &'a str,
        label: &'a str,
        allowed_types: &'a [&'a str],
        max_bytes: usize,
    ) -> Self {
        Self {
            field_name,
            label,
            allowed_types,
            max_bytes,
        }
    }

    fn accepts(&self, content_type: &str) -> bool {
        let Ok(mime) = content_type.parse::<mime::Mime>() else {
            return false;
        };
        self.allowed_types.iter().any(|allowed| match allowed.strip_suffix("/*") {
            Some(top) => mime.type_().as_str().eq_ignore_ascii_case(top),
            None => mime.essence_str().eq_ignore_ascii_case(allowed),
        })
    }
}

/// Text values and in-memory files read from one form submission.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: HashMap<String, UploadedFile>,
    pub text_fields: HashMap<String, String>,
}

impl UploadOutcome {
    pub fn take_file(&mut self, field_name: &str) -> Option<UploadedFile> {
        self.files.remove(field_name)
    }

    pub fn text(&self, field_name: &str) -> &str {
        self.text_fields
            .get(field_name)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Checkbox semantics: present and not `false`/`off`.
    pub fn flag(&self, field_name: &str) -> bool {
        self.text_fields
            .get(field_name)
            .is_some_and(|value| !matches!(value.as_str(), "false" | "off" | "0"))
    }
}

/// Read a multipart form into memory. File parts are only accepted for the
/// configured fields and are checked against their type and size limits;
/// an empty file input counts as no file.
pub async fn read_upload_form(
    mut multipart: Multipart,
    field_configs: &[FileFieldConfig<'_>],
) -> UploadResult<UploadOutcome> {
    let mut outcome = UploadOutcome::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("Could not read the submitted form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(|err| {
                UploadError::new(format!("Could not read field `{field_name}`: {err}"))
            })?;
            outcome.text_fields.insert(field_name, value);
            continue;
        };

        let Some(config) = field_configs
            .iter()
            .find(|config| config.field_name == field_name)
        else {
            return Err(UploadError::new(format!(
                "Unexpected file field `{field_name}`"
            )));
        };

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::new(format!("Upload interrupted: {err}")))?
        {
            if bytes.len() + chunk.len() > config.max_bytes {
                return Err(UploadError::new(format!(
                    "{} must be {} or smaller",
                    config.label,
                    format_limit(config.max_bytes)
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if file_name.is_empty() && bytes.is_empty() {
            continue;
        }
        if !config.accepts(&content_type) {
            return Err(UploadError::new(format!(
                "{} has an unsupported file type ({content_type})",
                config.label
            )));
        }

        outcome.files.insert(
            field_name,
            UploadedFile {
                original_name: file_name,
                content_type,
                bytes,
            },
        );
    }

    Ok(outcome)
}

fn format_limit(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_and_exact_types() {
        let images = FileFieldConfig::new("file", "Image", &["image/*"], 10);
        assert!(images.accepts("image/webp"));
        assert!(images.accepts("IMAGE/PNG"));
        assert!(!images.accepts("text/plain"));
        assert!(!images.accepts(""));

        let avatar = FileFieldConfig::new("avatar", "Avatar", &["image/jpeg", "image/png"], 10);
        assert!(avatar.accepts("image/jpeg"));
        assert!(!avatar.accepts("image/gif"));
    }

    #[test]
    fn checkbox_values() {
        let mut outcome = UploadOutcome::default();
        outcome
            .text_fields
            .insert("is_public".to_string(), "on".to_string());
        outcome
            .text_fields
            .insert("hidden".to_string(), "false".to_string());
        assert!(outcome.flag("is_public"));
        assert!(!outcome.flag("hidden"));
        assert!(!outcome.flag("missing"));
        assert_eq!(outcome.text("missing"), "");
    }

    #[test]
    fn limits_read_in_megabytes() {
        assert_eq!(format_limit(10 * 1024 * 1024), "10MB");
        assert_eq!(format_limit(1500), "1500 bytes");
    }
}
