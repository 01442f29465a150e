//! Fulfillment responses for the bot's fallback path.
//!
//! Every handler closes the dialog: the intent is echoed back as `Fulfilled`
//! with one plain-text message. Supplied session attributes override
//! same-named originals; all other originals are preserved.

use concierge_types::fulfillment::{
    ContentType, DialogAction, DialogActionType, DialogEvent, DialogResponse, IntentState,
    ResponseIntent, ResponseMessage, ResponseSessionState, SessionAttributes,
};

/// Message returned when a booking is handed to staff.
pub const BOOKING_FORWARDED: &str = "This request has been forwarded to a hotel agent.";

/// Close `event`'s intent with `message`, merging `attributes` over the
/// event's session attributes.
pub fn close_intent(event: &DialogEvent, message: &str, attributes: SessionAttributes) -> DialogResponse {
    let mut session_attributes = event.session_state.session_attributes.clone();
    session_attributes.extend(attributes);

    DialogResponse {
        session_state: ResponseSessionState {
            dialog_action: DialogAction {
                action_type: DialogActionType::Close,
            },
            intent: ResponseIntent {
                name: event.session_state.intent.name.clone(),
                state: IntentState::Fulfilled,
            },
            session_attributes,
        },
        messages: vec![ResponseMessage {
            content_type: ContentType::PlainText,
            content: message.to_string(),
        }],
    }
}

/// Session attributes flagging the conversation for a human agent.
pub fn escalate_to_human() -> SessionAttributes {
    SessionAttributes::from([("escalated".to_string(), "true".to_string())])
}

pub fn booking_handler(event: &DialogEvent) -> DialogResponse {
    tracing::info!(intent = %event.session_state.intent.name, "booking request received");
    close_intent(event, BOOKING_FORWARDED, escalate_to_human())
}
