//! Fulfillment endpoint invoked by the bot runtime.
//!
//! POST /fulfillment/booking - close the booking intent and hand the guest
//! to staff.

use axum::body::Bytes;
use axum::Json;

use concierge_core::fulfillment::booking_handler;
use concierge_types::fulfillment::{DialogEvent, DialogResponse};

use crate::http::error::AppError;

/// POST /fulfillment/booking
///
/// The body is parsed by hand so malformed events get the same error body
/// as every other failure.
pub async fn booking(body: Bytes) -> Result<Json<DialogResponse>, AppError> {
    let event: DialogEvent = serde_json::from_slice(&body)?;
    Ok(Json(booking_handler(&event)))
}
