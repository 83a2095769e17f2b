//! Projection of server status enums onto a stable lowercase alphabet.
//!
//! Server values are matched case-insensitively, so feeding a normalized
//! value back through the same function yields the same result. Values the
//! client does not know are passed through (lowercased).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeRequestState {
    Open,
    Merged,
    Closed,
    Raw(String),
}

impl MergeRequestState {
    pub fn from_server(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OPEN" | "OPENED" => Self::Open,
            "MERGED" => Self::Merged,
            "CANCELED" | "CLOSED" => Self::Closed,
            _ => Self::Raw(raw.trim().to_ascii_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Merged => "merged",
            Self::Closed => "closed",
            Self::Raw(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueState {
    Open,
    Closed,
    Raw(String),
}

impl IssueState {
    pub fn from_server(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OPEN" | "OPENED" | "IN_PROGRESS" => Self::Open,
            "CLOSED" | "RESOLVED" | "DONE" => Self::Closed,
            _ => Self::Raw(raw.trim().to_ascii_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Raw(value) => value,
        }
    }
}

/// Pipeline and job statuses are simply lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunStatus(String);

const TERMINAL: [&str; 4] = ["success", "passed", "failed", "canceled"];

impl RunStatus {
    pub fn from_server(raw: &str) -> Self {
        RunStatus(raw.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_terminal(&self) -> bool {
        TERMINAL.contains(&self.0.as_str())
    }

    pub fn is_success(&self) -> bool {
        matches!(self.0.as_str(), "success" | "passed")
    }

    pub fn is_running(&self) -> bool {
        self.0 == "running"
    }

    /// Process exit code for a finished run.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_str(self.as_str())
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let raw = Option::<String>::deserialize(deserializer)?;
                    Ok(<$ty>::from_server(raw.as_deref().unwrap_or_default()))
                }
            }
        )*
    };
}

display_as_str!(MergeRequestState, IssueState, RunStatus);
