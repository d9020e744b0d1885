//! Server-to-client message types
//!
//! Relayed events reach clients as the bus payload forwarded byte-for-byte;
//! the only message the server composes itself is the welcome sent on
//! connect. It is synthetic — it tells the client the channel is live, it is
//! not a replay of missed events.

use serde::{Deserialize, Serialize};

/// Welcome message sent once per connection, before anything else
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WelcomeMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub msg: String,
}

impl Default for WelcomeMessage {
    fn default() -> Self {
        Self {
            msg_type: "welcome".to_string(),
            msg: "Connected to orders updates".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_serialization() {
        let json = serde_json::to_string(&WelcomeMessage::default()).unwrap();
        assert_eq!(
            json,
            r#"{"type":"welcome","msg":"Connected to orders updates"}"#
        );
    }
}
