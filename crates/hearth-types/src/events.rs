use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, display_name: String },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        online: bool,
        last_seen: chrono::DateTime<chrono::Utc>,
    },

    /// A new message was posted in a conversation the user participates in
    MessageCreate {
        id: Uuid,
        conversation_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        receiver_id: Uuid,
        body: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The counterpart read messages in a conversation
    MessageRead {
        conversation_id: Uuid,
        reader_id: Uuid,
        message_ids: Vec<Uuid>,
    },

    /// The counterpart started typing
    TypingStart {
        conversation_id: Uuid,
        user_id: Uuid,
        display_name: String,
    },
}

impl GatewayEvent {
    /// Returns the conversation_id if this event is scoped to one
    /// conversation. Events that return `None` are global.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate {
                conversation_id, ..
            } => Some(*conversation_id),
            Self::MessageRead {
                conversation_id, ..
            } => Some(*conversation_id),
            Self::TypingStart {
                conversation_id, ..
            } => Some(*conversation_id),
            // Ready and PresenceUpdate are global
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Indicate typing in a conversation; relayed to the counterpart only
    StartTyping {
        conversation_id: Uuid,
        receiver_id: Uuid,
    },
}
