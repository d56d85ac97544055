//! Messages exchanged with the messaging front end.
//!
//! The front end delivers `Event`s and renders the `Outgoing` messages it gets
//! back; it knows nothing about balances or orders.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Something a user did in the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The acting user.
    pub user_id: UserId,

    /// Public handle without the `@`, if the user has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// What the front end believes about admin rights. Advisory only; the
    /// service decides from its own admin list.
    #[serde(default)]
    pub admin_hint: bool,

    /// Text message or button press.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// A text message event.
    #[must_use]
    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            username: None,
            admin_hint: false,
            kind: EventKind::Text { text: text.into() },
        }
    }

    /// A button press event.
    #[must_use]
    pub fn button(user_id: UserId, data: impl Into<String>) -> Self {
        Self {
            user_id,
            username: None,
            admin_hint: false,
            kind: EventKind::Button { data: data.into() },
        }
    }

    /// Attach the user's public handle.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Where purchased stars go: `@handle` if known, else the numeric id.
    #[must_use]
    pub fn recipient(&self) -> String {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .map_or_else(|| self.user_id.to_string(), |name| format!("@{name}"))
    }
}

/// Payload of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A text message.
    Text {
        /// Message text.
        text: String,
    },

    /// An inline button press.
    Button {
        /// Callback data of the button.
        data: String,
    },
}

/// A message for the front end to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outgoing {
    /// Recipient.
    pub user_id: UserId,

    /// Message text.
    pub text: String,

    /// Buttons under the message, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

impl Outgoing {
    /// A plain message.
    #[must_use]
    pub fn new(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: text.into(),
            actions: Vec::new(),
        }
    }

    /// Append a callback button.
    #[must_use]
    pub fn button(mut self, label: impl Into<String>, data: impl Into<String>) -> Self {
        self.actions.push(Action::Callback {
            label: label.into(),
            data: data.into(),
        });
        self
    }

    /// Append a URL button.
    #[must_use]
    pub fn link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.actions.push(Action::Link {
            label: label.into(),
            url: url.into(),
        });
        self
    }
}

/// A button attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Sends `data` back as a button event when pressed.
    Callback {
        /// Button label.
        label: String,
        /// Callback data.
        data: String,
    },

    /// Opens a URL.
    Link {
        /// Button label.
        label: String,
        /// Target URL.
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_format() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "user_id": 42,
            "username": "alice",
            "type": "button",
            "data": "buy:100"
        }))
        .unwrap();

        assert_eq!(event.user_id, UserId::new(42));
        assert!(!event.admin_hint);
        assert_eq!(
            event.kind,
            EventKind::Button {
                data: "buy:100".into()
            }
        );
    }

    #[test]
    fn recipient_prefers_the_handle() {
        let event = Event::text(UserId::new(42), "hi");
        assert_eq!(event.recipient(), "42");
        assert_eq!(event.with_username("alice").recipient(), "@alice");
    }

    #[test]
    fn outgoing_omits_empty_actions() {
        let json = serde_json::to_value(Outgoing::new(UserId::new(1), "hello")).unwrap();
        assert!(json.get("actions").is_none());

        let json = serde_json::to_value(
            Outgoing::new(UserId::new(1), "pay").link("Pay", "https://pay.example/1"),
        )
        .unwrap();
        assert_eq!(json["actions"][0]["type"], "link");
    }
}
