//! The values that travel between browsers, Postgres, and the pub/sub topic.
use serde::{Deserialize, Serialize};

/// Color used for nicknames that never picked one
pub const DEFAULT_COLOR: &str = "#ffffff";

/// A posted chat message.
///
/// `id` is assigned by the database when the message is stored, so a `ChatMessage` is
/// only published once it has been recorded.  The relay never inspects a message after
/// publishing it; replicas forward the encoded JSON as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub content: String,
    pub sender_pod: String,
    #[serde(rename = "sender_nick")]
    pub sender_nickname: String,
    pub sender_color: String,
    #[serde(rename = "time")]
    pub timestamp: String,
}

impl ChatMessage {
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("Guaranteed: ChatMessage is Serialize")
    }
}

/// The display profile stored for a nickname
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub nickname: String,
    pub color_code: String,
}

/// Wall-clock time in the `HH:MM:SS` form shown next to each message
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Substitute the default color for an empty one
pub fn color_or_default(color: &str) -> &str {
    match color {
        "" => DEFAULT_COLOR,
        color => color,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chat_message_uses_wire_field_names() -> Result<(), serde_json::Error> {
        let msg = ChatMessage {
            id: 7,
            content: "hi".to_string(),
            sender_pod: "relay-0".to_string(),
            sender_nickname: "ana".to_string(),
            sender_color: "#ff0000".to_string(),
            timestamp: "12:34:56".to_string(),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json_string())?;
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "content": "hi",
                "sender_pod": "relay-0",
                "sender_nick": "ana",
                "sender_color": "#ff0000",
                "time": "12:34:56",
            })
        );
        Ok(())
    }

    #[test]
    fn empty_color_becomes_white() {
        assert_eq!(color_or_default(""), "#ffffff");
        assert_eq!(color_or_default("#00ff00"), "#00ff00");
    }

    #[test]
    fn timestamp_is_hours_minutes_seconds() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.matches(':').count(), 2);
    }
}
