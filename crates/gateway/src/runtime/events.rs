//! Wire types of `POST /v1/events`.

use serde::{Deserialize, Serialize};

/// An event forwarded by the chat platform connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    TicketOpened {
        ticket_id: String,
        channel_id: String,
        counterpart_id: String,
        guild_id: String,
        #[serde(default)]
        subject: Option<String>,
    },
    /// A message in a ticket channel. `counterpart_id` is the author, which
    /// is a staff member when `is_staff` is set.
    Message {
        channel_id: String,
        counterpart_id: String,
        guild_id: String,
        content: String,
        #[serde(default)]
        is_staff: bool,
        #[serde(default)]
        is_bot: bool,
    },
    TicketClosed {
        channel_id: String,
        guild_id: String,
    },
}

impl InboundEvent {
    pub fn channel_id(&self) -> &str {
        match self {
            InboundEvent::TicketOpened { channel_id, .. }
            | InboundEvent::Message { channel_id, .. }
            | InboundEvent::TicketClosed { channel_id, .. } => channel_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::TicketOpened { .. } => "ticket_opened",
            InboundEvent::Message { .. } => "message",
            InboundEvent::TicketClosed { .. } => "ticket_closed",
        }
    }
}

/// What the connector should do in the channel, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundAction {
    SendText { text: String },
    /// Ask the counterpart to confirm closing the ticket.
    RequestClose,
    Rename { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_flags_default_to_false() {
        let ev: InboundEvent = serde_json::from_str(
            r#"{"type":"message","channel_id":"c","counterpart_id":"u","guild_id":"g","content":"hi"}"#,
        )
        .unwrap();
        match ev {
            InboundEvent::Message { is_staff, is_bot, .. } => assert!(!is_staff && !is_bot),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ticket_opened_subject_is_optional() {
        let ev: InboundEvent = serde_json::from_str(
            r#"{"type":"ticket_opened","ticket_id":"7","channel_id":"c","counterpart_id":"u","guild_id":"g"}"#,
        )
        .unwrap();
        assert_eq!(ev.channel_id(), "c");
        assert_eq!(ev.kind(), "ticket_opened");
    }

    #[test]
    fn outbound_actions_are_tagged() {
        let json = serde_json::to_value([
            OutboundAction::SendText { text: "hey".into() },
            OutboundAction::RequestClose,
        ])
        .unwrap();
        assert_eq!(json[0]["type"], "send_text");
        assert_eq!(json[0]["text"], "hey");
        assert_eq!(json[1]["type"], "request_close");
    }
}
