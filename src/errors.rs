use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

use crate::workflow::sequence::RequestId;

/// What a route request was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Prerequisite {
    /// No location fix yet, or location permission was refused
    Location,
    /// No destination has been chosen
    Destination,
}

#[derive(Debug, Clone, thiserror::Error, Serialize)]
pub enum WorkflowError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(Prerequisite),

    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Stale result for request {0}")]
    Stale(RequestId),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid coordinate: ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Malformed coordinate: {0}")]
    MalformedCoordinate(String),
}

impl WorkflowError {
    /// Convenience constructor for provider-side failures
    pub fn service(message: impl Into<String>) -> Self {
        WorkflowError::ServiceError(message.into())
    }

    /// The notice category for this error, or `None` when it is only logged.
    /// This is the single source of truth for error-to-notice mapping.
    pub fn notice_kind(&self) -> Option<NoticeKind> {
        match self {
            Self::NotFound(_) => Some(NoticeKind::NotFound),
            Self::ServiceError(_) => Some(NoticeKind::ServiceError),
            Self::InvalidCoordinate { .. } | Self::MalformedCoordinate(_) => {
                Some(NoticeKind::InvalidInput)
            }
            Self::MissingPrerequisite(_) => Some(NoticeKind::MissingPrerequisite),
            Self::PermissionDenied => Some(NoticeKind::PermissionDenied),
            Self::Timeout(_) => Some(NoticeKind::Timeout),
            Self::Stale(_) => None,
        }
    }

    /// Whether the error should reach the user as a transient notice
    pub fn is_user_visible(&self) -> bool {
        self.notice_kind().is_some()
    }

    /// Builds the user-facing notice, if any
    pub fn to_notice(&self) -> Option<Notice> {
        self.notice_kind().map(|kind| Notice::new(kind, self.to_string()))
    }
}

/// Category of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NoticeKind {
    NotFound,
    ServiceError,
    MissingPrerequisite,
    PermissionDenied,
    Timeout,
    /// Coordinates that are out of range or not `lat,lon` text
    InvalidInput,
}

/// A transient, non-fatal message for the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}
