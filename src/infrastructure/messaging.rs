//! Pre-Trade Briefing Delivery
//!
//! Hands the rendered briefing text to the external `openclaw` messenger;
//! the only observable outcome here is success or failure. Delivery happens
//! before the trade is recorded, so a failed send prevents the ledger write
//! instead of orphaning it.

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

const MESSENGER_BIN: &str = "openclaw";
const CHANNEL: &str = "telegram";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to run messenger: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("messenger exited with status {code}: {stderr}")]
    Failed { code: i32, stderr: String },
}

/// Send the briefing `message` to the Telegram `target`.
pub async fn send_briefing(message: &str, target: &str) -> Result<(), DeliveryError> {
    deliver(MESSENGER_BIN, message, target).await
}

async fn deliver(program: &str, message: &str, target: &str) -> Result<(), DeliveryError> {
    let output = Command::new(program)
        .args([
            "message", "send", "--channel", CHANNEL, "--target", target, "--message", message,
        ])
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(DeliveryError::Failed {
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    debug!("Briefing delivered to {}", target);
    Ok(())
}
