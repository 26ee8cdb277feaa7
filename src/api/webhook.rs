//! Telegram channel linking
//!
//! Two halves of the account-linking flow:
//! - `issue_connect_code` hands the signed-in user a one-time `CONNECT_…`
//!   code to message at the bot
//! - `telegram_webhook` receives bot updates; a message matching a pending
//!   code links that chat to the user and burns the code
//!
//! The webhook endpoint is public; Telegram is the caller.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState};
use crate::models::User;

/// Issue a fresh connection code for the caller.
///
/// Issuing a new code replaces any previous unredeemed one.
pub async fn issue_connect_code(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let code = generate_connect_code();

    state
        .user_repo
        .set_connection_code(user.id, &code)
        .await
        .map_err(|error| {
            tracing::error!(%error, "failed to store connection code");
            ApiError::internal_error("Failed to issue connection code")
        })?;

    Ok(Json(serde_json::json!({ "connection_code": code })))
}

/// Handle a Telegram bot update.
///
/// Always acknowledges with `{"ok": true}`; Telegram retries anything else
/// and none of these updates are worth retrying.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Json(update): Json<serde_json::Value>,
) -> impl IntoResponse {
    let text = update.pointer("/message/text").and_then(|v| v.as_str());
    let chat_id = update.pointer("/message/chat/id").and_then(|v| v.as_i64());

    let (Some(text), Some(chat_id)) = (text, chat_id) else {
        return Json(serde_json::json!({ "ok": true }));
    };

    let text = text.trim().to_uppercase();
    if text.starts_with("CONNECT_") {
        link_account(&state, &text, chat_id).await;
    }

    Json(serde_json::json!({ "ok": true }))
}

async fn link_account(state: &AppState, code: &str, chat_id: i64) {
    let chat = chat_id.to_string();

    match state.user_repo.find_by_connection_code(code).await {
        Ok(Some(user)) => {
            if let Err(error) = state.user_repo.link_telegram(user.id, &chat).await {
                tracing::error!(user_id = user.id, %error, "failed to link telegram chat");
                return;
            }
            tracing::info!(user_id = user.id, "telegram chat linked");

            if let Err(error) = state
                .notifier
                .send(
                    &chat,
                    "<b>Success!</b> 🚗 Your account is now linked. \
                     I will send your parking reminders here.",
                )
                .await
            {
                tracing::warn!(%error, "link confirmation failed");
            }
        }
        Ok(None) => {
            if let Err(error) = state
                .notifier
                .send(
                    &chat,
                    "❌ <b>Invalid Code.</b> Please check the app for a new code.",
                )
                .await
            {
                tracing::warn!(%error, "link rejection notice failed");
            }
        }
        Err(error) => {
            tracing::error!(%error, "connection code lookup failed");
        }
    }
}

/// Generate a `CONNECT_<8 hex>` one-time code
fn generate_connect_code() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("CONNECT_{}", token[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_connect_code_shape() {
        let code = generate_connect_code();
        assert!(code.starts_with("CONNECT_"));
        assert_eq!(code.len(), "CONNECT_".len() + 8);
        // Codes are compared upper-cased on redemption
        assert_eq!(code, code.to_uppercase());
    }

    #[test]
    fn test_generate_connect_code_is_unique() {
        let a = generate_connect_code();
        let b = generate_connect_code();
        assert_ne!(a, b);
    }
}
