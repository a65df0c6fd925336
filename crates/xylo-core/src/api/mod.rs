//! Backend REST contract: wire types, identity and the HTTP client.

mod client;
mod error;
mod identity;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use client::ApiClient;
pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use identity::{Credentials, Identity, SESSION_HEADER};

/// Where a dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSource {
    #[serde(alias = "file")]
    Upload,
    Url,
    #[serde(other)]
    Other,
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Upload => write!(f, "upload"),
            FileSource::Url => write!(f, "url"),
            FileSource::Other => write!(f, "other"),
        }
    }
}

/// One entry of `GET /files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub filename: String,
    pub source: FileSource,
}

/// Response of `POST /upload` and `POST /connect_url`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddedFile {
    #[serde(deserialize_with = "string_or_number")]
    pub file_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// What to add to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddSource {
    /// A local file sent as multipart form field `file`.
    Upload { path: PathBuf },
    /// A remote sheet or CSV link.
    Url { url: String },
}

impl fmt::Display for AddSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddSource::Upload { path } => write!(f, "{}", path.display()),
            AddSource::Url { url } => write!(f, "{url}"),
        }
    }
}

/// Raw reply of `POST /chat`; interpretation happens in [`crate::chat`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// A widget stored with `POST /widget/save`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedWidget {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub title: String,
    pub vis_type: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SaveWidgetResponse {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

/// Ids are strings on the wire but some backends send integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
