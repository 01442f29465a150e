//! Wire types for the dialog fulfillment boundary.
//!
//! The bot invokes a fulfillment handler with a [`DialogEvent`] and expects a
//! [`DialogResponse`] back. Field names follow the bot runtime's camelCase JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Session attributes carried across dialog turns.
pub type SessionAttributes = BTreeMap<String, String>;

/// Incoming dialog event. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogEvent {
    pub session_state: EventSessionState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSessionState {
    pub intent: EventIntent,
    /// Absent and `null` both mean no attributes.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub session_attributes: SessionAttributes,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<SessionAttributes, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<SessionAttributes>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventIntent {
    pub name: String,
}

/// Terminal dialog response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogResponse {
    pub session_state: ResponseSessionState,
    pub messages: Vec<ResponseMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSessionState {
    pub dialog_action: DialogAction,
    pub intent: ResponseIntent,
    pub session_attributes: SessionAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogAction {
    #[serde(rename = "type")]
    pub action_type: DialogActionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogActionType {
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseIntent {
    pub name: String,
    pub state: IntentState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentState {
    Fulfilled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    pub content_type: ContentType,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    PlainText,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_without_session_attributes_parses() {
        let json = r#"{"sessionState":{"intent":{"name":"BookRoom","slots":{}}},"inputTranscript":"book"}"#;
        let event: DialogEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.session_state.intent.name, "BookRoom");
        assert!(event.session_state.session_attributes.is_empty());
    }

    #[test]
    fn test_event_with_null_session_attributes_parses() {
        let json = r#"{"sessionState":{"intent":{"name":"BookRoom"},"sessionAttributes":null}}"#;
        let event: DialogEvent = serde_json::from_str(json).unwrap();
        assert!(event.session_state.session_attributes.is_empty());
    }

    #[test]
    fn test_response_wire_shape() {
        let response = DialogResponse {
            session_state: ResponseSessionState {
                dialog_action: DialogAction {
                    action_type: DialogActionType::Close,
                },
                intent: ResponseIntent {
                    name: "BookRoom".to_string(),
                    state: IntentState::Fulfilled,
                },
                session_attributes: SessionAttributes::new(),
            },
            messages: vec![ResponseMessage {
                content_type: ContentType::PlainText,
                content: "ok".to_string(),
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["sessionState"]["dialogAction"]["type"], "Close");
        assert_eq!(json["sessionState"]["intent"]["state"], "Fulfilled");
        assert_eq!(json["messages"][0]["contentType"], "PlainText");
    }
}
