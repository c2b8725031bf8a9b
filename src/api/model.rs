//! Wire-only request/response shapes for the remote content API.
use crate::model::ArticleStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form generation options forwarded verbatim to the server.
pub type GenerateOptions = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CategoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ArticlePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ArticleStatus>,
}

/// Acknowledgement that a generation job was accepted. Generation itself is
/// asynchronous server-side work; none of these fields are guaranteed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerateAck {
    pub job_id: Option<String>,
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchAck {
    pub job_id: Option<String>,
    pub accepted: Option<u32>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BatchJobStatus {
    #[serde(default)]
    pub job_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub completed: Option<u32>,
    #[serde(default)]
    pub failed: Option<u32>,
}
