use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

// Response envelope shared by every endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// `message`, then `error` (string or object), whichever says something.
    pub fn failure_text(&self) -> Option<String> {
        if let Some(message) = self.message.as_ref().filter(|m| !m.is_empty()) {
            return Some(message.clone());
        }
        match &self.error {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Pagination {
    #[serde(default)]
    pub next_page_url: Option<String>,
    #[serde(default)]
    pub prev_page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_page: Option<i64>,
}

/// A list payload. Some endpoints nest the links under `pagination`, others
/// put them next to `data`.
#[derive(Debug, Deserialize, Clone)]
pub struct Page<T> {
    pub data: T,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    next_page_url: Option<String>,
    #[serde(default)]
    prev_page_url: Option<String>,
}

impl<T> Page<T> {
    pub fn links(&self) -> Pagination {
        match &self.pagination {
            Some(p) => p.clone(),
            None => Pagination {
                next_page_url: self.next_page_url.clone(),
                prev_page_url: self.prev_page_url.clone(),
                ..Pagination::default()
            },
        }
    }

    pub fn next_page_url(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|p| p.next_page_url.as_deref())
            .or(self.next_page_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum TicketStatus {
    Pending,
    UnderReview,
    Closed,
    Other(String),
}

impl TicketStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::UnderReview => "underReview",
            TicketStatus::Closed => "closed",
            TicketStatus::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Option<TicketStatus> {
        match TicketStatus::from(s.to_string()) {
            TicketStatus::Other(_) => None,
            known => Some(known),
        }
    }
}

impl From<String> for TicketStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => TicketStatus::Pending,
            "underReview" => TicketStatus::UnderReview,
            "closed" => TicketStatus::Closed,
            _ => TicketStatus::Other(s),
        }
    }
}

impl From<TicketStatus> for String {
    fn from(s: TicketStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Ticket {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub contact_channel: String,
    #[serde(default)]
    pub issuetype: String,
    #[serde(default)]
    pub description: String,
    pub session_status: TicketStatus,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StatusTotals {
    #[serde(default)]
    pub pending: Option<i64>,
    #[serde(default, rename = "underReview")]
    pub under_review: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TicketCount {
    pub total: i64,
    #[serde(default)]
    pub total_per_status: StatusTotals,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub ticket_id: Option<i64>,
    pub sender_id: i64,
    #[serde(default)]
    pub recipient_id: Option<i64>,
    #[serde(default)]
    pub message_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, deserialize_with = "de_flag")]
    pub read_status: u8,
    #[serde(default)]
    pub created_at: String,
}

impl Message {
    pub fn is_unread(&self) -> bool {
        self.read_status == 0
    }
}

/// One row of the flattened config map.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigEntry {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_avatar_id: Option<String>,
}

impl ConfigEntry {
    pub fn plain(name: impl Into<String>, value: impl Into<String>) -> Self {
        ConfigEntry { name: name.into(), value: value.into(), avatar_id: None, unique_avatar_id: None }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Faq {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FaqCategory {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SupportImage {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub action: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_until: Option<String>,
    #[serde(default)]
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

// Request Bodies
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateStatusRequest {
    pub session_status: TicketStatus,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReadStatusRequest {
    pub message_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateMessageRequest {
    pub ticket_id: i64,
    pub sender_id: i64,
    pub recipient_id: Option<i64>,
    pub message_content: String,
    pub filepath: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateConfigRequest {
    pub config_value: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AddConfigValueRequest {
    pub config_name: String,
    pub config_value: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FaqRequest {
    pub category: String,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ImageRequest {
    pub category: String,
    pub action: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_until: Option<String>,
}

/// Ids arrive as numbers from some endpoints and strings from others.
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected id, got {}", other))),
    }
}

fn de_flag<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(u8::from(b)),
        Value::Number(n) => Ok(u8::from(n.as_i64().unwrap_or(0) != 0)),
        Value::String(s) => Ok(u8::from(s == "1" || s == "true")),
        _ => Ok(0),
    }
}
