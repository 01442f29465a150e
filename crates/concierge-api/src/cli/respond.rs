//! `concierge respond`: run the booking handler on one dialog event.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use concierge_core::fulfillment::booking_handler;
use concierge_types::fulfillment::{DialogEvent, DialogResponse};

pub async fn respond(file: Option<&Path>) -> Result<()> {
    let raw = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let response = respond_to(&raw)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn respond_to(raw: &str) -> Result<DialogResponse> {
    let event: DialogEvent = serde_json::from_str(raw).context("invalid dialog event")?;
    Ok(booking_handler(&event))
}
