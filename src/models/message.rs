use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MessageStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender_id: String,
    /// Nulled when the referral is deleted.
    pub referral_id: Option<Uuid>,
    pub content: String,
    /// Orders the message within its conversation.
    pub timestamp: NaiveDateTime,
    pub status: MessageStatus,
}

impl Message {
    pub fn new(conversation_id: &str, sender_id: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            referral_id: None,
            content: content.to_string(),
            timestamp: chrono::Utc::now().naive_utc(),
            status: MessageStatus::Sent,
        }
    }
}
