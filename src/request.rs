use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

const DEFAULT_PATH: &str = "/_search";
const DEFAULT_METHOD: &str = "GET";
const DEFAULT_BODY: &str = "{}";
const SCHEME_SEPARATOR: &str = "://";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedRecordError {
    #[error("history record is not an object")]
    NotAnObject,
    #[error("history record has neither `path` nor `url`")]
    MissingPath,
    #[error("history record field `{0}` is not a string")]
    InvalidField(&'static str),
}

/// One dispatchable call against the cluster.
///
/// Equality is structural over all three fields with no normalization, so
/// `/_search` and `/_search/` are different requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    path: String,
    method: String,
    body: String,
}

/// Current on-disk shape of a history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub path: String,
    pub method: String,
    pub body: String,
}

/// Legacy on-disk shape, storing the full URL instead of the path.
#[derive(Debug, Deserialize)]
struct LegacyRecord {
    url: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct CurrentRecord {
    path: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    body: String,
}

impl Request {
    pub fn new(
        path: impl Into<String>,
        method: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            body: body.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self::new(path, self.method.clone(), self.body.clone())
    }

    pub fn with_method(&self, method: impl Into<String>) -> Self {
        Self::new(self.path.clone(), method, self.body.clone())
    }

    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Self::new(self.path.clone(), self.method.clone(), body)
    }

    pub fn to_record(&self) -> Record {
        Record {
            path: self.path.clone(),
            method: self.method.clone(),
            body: self.body.clone(),
        }
    }

    /// Decodes a persisted entry in either the current `{path, method, body}`
    /// shape or the legacy `{url, method, body}` shape.
    ///
    /// A `path` key selects the current shape even when `url` is also present.
    pub fn from_record(value: &Value) -> Result<Self, MalformedRecordError> {
        let object = value.as_object().ok_or(MalformedRecordError::NotAnObject)?;
        let invalid_field = |_: serde_json::Error| {
            let field = ["path", "url", "method", "body"]
                .into_iter()
                .filter(|key| *key != "url" || !object.contains_key("path"))
                .find(|key| object.get(*key).is_some_and(|v| !v.is_string()))
                .unwrap_or("path");
            MalformedRecordError::InvalidField(field)
        };

        if object.contains_key("path") {
            let record = CurrentRecord::deserialize(value).map_err(invalid_field)?;
            Ok(Self {
                path: record.path,
                method: record.method,
                body: record.body,
            })
        } else if object.contains_key("url") {
            let record = LegacyRecord::deserialize(value).map_err(invalid_field)?;
            Ok(Self {
                path: path_from_url(&record.url),
                method: record.method,
                body: record.body,
            })
        } else {
            Err(MalformedRecordError::MissingPath)
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(DEFAULT_PATH, DEFAULT_METHOD, DEFAULT_BODY)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Strips scheme and authority from a legacy full URL.
///
/// Values without `://` are already paths and are returned untouched.
fn path_from_url(url: &str) -> String {
    let Some(scheme_end) = url.find(SCHEME_SEPARATOR) else {
        return url.to_string();
    };
    let authority_start = scheme_end + SCHEME_SEPARATOR.len();
    match url[authority_start..].find('/') {
        Some(offset) => url[authority_start + offset..].to_string(),
        None => "/".to_string(),
    }
}
