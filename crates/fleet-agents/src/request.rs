//! Inbound action requests and their validation.

use serde::Deserialize;
use serde_json::Value;

use crate::actions::{ActionKind, UnknownAction};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid JSON body")]
    InvalidBody(#[source] serde_json::Error),

    #[error("Invalid JSON body")]
    NotAnObject,

    #[error("Missing {0}")]
    Missing(&'static str),

    #[error(transparent)]
    InvalidAction(#[from] UnknownAction),
}

/// Body as sent by the board. Fields stay loosely typed so that wrong types
/// are reported as validation failures rather than parse failures.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActionRequest {
    #[serde(default)]
    pub epic_id: Option<Value>,
    #[serde(default)]
    pub epic_title: Option<Value>,
    #[serde(default)]
    pub action: Option<Value>,
    #[serde(default)]
    pub feedback: Option<Value>,
    #[serde(default)]
    pub current_labels: Option<Value>,
}

/// A validated request, ready for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub epic_id: String,
    pub epic_title: String,
    pub action: ActionKind,
    /// Trimmed; `None` when absent or blank.
    pub feedback: Option<String>,
    /// `None` when the caller did not send a label list.
    pub current_labels: Option<Vec<String>>,
}

impl ActionRequest {
    /// Parse and validate a JSON body.
    ///
    /// Only a JSON object is accepted. Serde would otherwise read an array
    /// positionally into the request fields.
    pub fn from_json(body: &[u8]) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_slice(body).map_err(RequestError::InvalidBody)?;
        if !value.is_object() {
            return Err(RequestError::NotAnObject);
        }
        let raw: RawActionRequest =
            serde_json::from_value(value).map_err(RequestError::InvalidBody)?;
        raw.validate()
    }

    /// Follow-up request issued by an agent exit, with labels re-read from the
    /// tracker.
    pub fn chained(epic_id: &str, epic_title: &str, action: ActionKind) -> Self {
        Self {
            epic_id: epic_id.to_string(),
            epic_title: epic_title.to_string(),
            action,
            feedback: None,
            current_labels: None,
        }
    }

    /// Feedback if present, else `fallback`.
    pub fn feedback_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.feedback.as_deref().unwrap_or(fallback)
    }
}

impl RawActionRequest {
    pub fn validate(self) -> Result<ActionRequest, RequestError> {
        let epic_id = non_empty(self.epic_id).ok_or(RequestError::Missing("epicId"))?;
        let epic_title = non_empty(self.epic_title).ok_or(RequestError::Missing("epicTitle"))?;
        let action = match self.action {
            Some(Value::String(s)) => s.parse::<ActionKind>()?,
            Some(Value::Null) | None => return Err(RequestError::Missing("action")),
            Some(other) => return Err(UnknownAction(other.to_string()).into()),
        };
        let feedback = match self.feedback {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        };
        let current_labels = match self.current_labels {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        };
        Ok(ActionRequest {
            epic_id,
            epic_title,
            action,
            feedback,
            current_labels,
        })
    }
}

fn non_empty(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}
