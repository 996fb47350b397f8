use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One stored turn half. Never modified after it has been appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            model: None,
            timestamp,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        model: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            model: Some(model.into()),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub name: String,
    pub messages: Vec<Message>,
}

impl Session {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Vec::new(),
        }
    }
}

/// On-disk shape of a session record.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct SessionRecord {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_has_no_model() {
        let json = serde_json::to_value(Message::user("Hi", Utc::now())).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("model").is_none());
    }

    #[test]
    fn test_assistant_message_keeps_model() {
        let msg = Message::assistant("Hello", "m1", Utc::now());
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.model.as_deref(), Some("m1"));
    }
}
