//! Session data model and its persisted shape.
//!
//! `PersistedSession` is the `downloadState` record; its field names are the
//! ones older installs already have on disk, so they are camelCase.
//! `MediaMetadata` is what a completed session exposes as JSON. Stream URLs
//! never appear in either: they expire and cannot be trusted after a restart.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SessionError;

pub const DOWNLOAD_STATE_KEY: &str = "downloadState";
pub const LAST_MEDIA_KEY: &str = "lastMedia";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    InFlight,
    Completed,
    Cancelled,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::InFlight => "in_flight",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Failed
        )
    }
}

/// What the user asked for. Kept verbatim so a restored form matches what
/// was typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub url: String,
    pub resolution: String,
    pub format: String,
    #[serde(default)]
    pub custom_title: String,
}

impl SessionRequest {
    pub fn new(
        url: impl Into<String>,
        resolution: impl Into<String>,
        format: impl Into<String>,
        custom_title: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            resolution: resolution.into(),
            format: format.into(),
            custom_title: custom_title.into(),
        }
    }

    /// Rejects empty fields and URLs that are not absolute http(s) links.
    pub fn validate(&self) -> Result<(), SessionError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(SessionError::Validation("URL cannot be empty".into()));
        }
        let parsed = Url::parse(url)
            .map_err(|err| SessionError::Validation(format!("{url} is not a valid URL: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(SessionError::Validation(format!(
                "{url} is not an http(s) video link"
            )));
        }
        if self.resolution.trim().is_empty() {
            return Err(SessionError::Validation("resolution cannot be empty".into()));
        }
        if self.format.trim().is_empty() {
            return Err(SessionError::Validation("format cannot be empty".into()));
        }
        Ok(())
    }

    pub fn custom_title(&self) -> Option<&str> {
        let title = self.custom_title.trim();
        (!title.is_empty()).then_some(title)
    }
}

/// One download attempt owned by the controller.
#[derive(Debug, Clone)]
pub struct Session {
    pub attempt: u64,
    pub request: SessionRequest,
    pub status: SessionStatus,
    pub result: Option<ResolvedMedia>,
}

impl Session {
    pub fn persisted(&self) -> PersistedSession {
        PersistedSession::from_request(&self.request, self.status == SessionStatus::InFlight)
    }
}

/// `downloadState` as stored in the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub url: String,
    pub resolution: String,
    pub format: String,
    #[serde(default)]
    pub custom_title: String,
    #[serde(default)]
    pub is_processing: bool,
}

impl PersistedSession {
    pub fn from_request(request: &SessionRequest, is_processing: bool) -> Self {
        Self {
            url: request.url.clone(),
            resolution: request.resolution.clone(),
            format: request.format.clone(),
            custom_title: request.custom_title.clone(),
            is_processing,
        }
    }

    pub fn request(&self) -> SessionRequest {
        SessionRequest {
            url: self.url.clone(),
            resolution: self.resolution.clone(),
            format: self.format.clone(),
            custom_title: self.custom_title.clone(),
        }
    }
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub title: String,
    pub url: String,
    pub resolution: String,
    pub format: String,
    pub timestamp: DateTime<Utc>,
    /// Time-limited; never persisted.
    pub stream_url: String,
}

impl ResolvedMedia {
    pub fn metadata(&self) -> MediaMetadata {
        MediaMetadata {
            title: self.title.clone(),
            url: self.url.clone(),
            resolution: self.resolution.clone(),
            format: self.format.clone(),
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Durable half of [`ResolvedMedia`], also offered to the user as a JSON
/// download next to the video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub url: String,
    pub resolution: String,
    pub format: String,
    pub timestamp: String,
}
