//! Approval step executor.
//!
//! Mints an opaque token and always pauses, using the same random-token +
//! `base64` `URL_SAFE_NO_PAD` construction as an OAuth-style bearer token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use glyph_domain::{ApprovalConfig, WaitingFor};
use rand::RngCore;
use serde_json::json;

use super::ExecutionOutcome;
use crate::error::ExecutorError;

/// Minimum entropy, in raw bytes, behind the minted approval token. Base64
/// encoding expands this to 43 URL-safe characters.
const TOKEN_BYTES: usize = 32;

/// Run an approval step: mint a token, record pending approvers, pause.
pub fn execute_approval(config: &ApprovalConfig) -> Result<ExecutionOutcome, ExecutorError> {
    if config.approvers.is_empty() {
        return Err(ExecutorError::InvalidConfig(
            "approval step requires at least one approver".into(),
        ));
    }

    let token = generate_token();

    let mut outcome = ExecutionOutcome::waiting(WaitingFor::Approval);
    outcome.output = Some(json!({
        "token": token,
        "approvers": config.approvers,
        "status": "pending",
    }));
    Ok(outcome)
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
