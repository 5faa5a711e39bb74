//! services/bot/src/web/webhook.rs
//!
//! Telegram update intake. Every update is answered with `200 OK` once handled,
//! failures included, so Telegram never redelivers an update that already had
//! side effects.

use axum::{extract::State, http::StatusCode, Json};
use lifeline_core::{
    advance::AckOutcome,
    domain::{Intent, MessageHandle, ReminderState, UserId},
    format::REMIND_ACK_PREFIX,
    ports::{OutboundMessage, PortError, PortResult},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::web::{
    commands::{self, Command},
    protocol::{CallbackQuery, Message, Update},
    state::AppState,
};

pub const CONFIRM_PREFIX: &str = "confirm:";
pub const CANCEL_PREFIX: &str = "cancel:";

/// What an inline button press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    AcknowledgeReminder(i64),
    ConfirmIntent(Uuid),
    CancelIntent(Uuid),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(id) = data.strip_prefix(REMIND_ACK_PREFIX) {
            return id.parse().ok().map(Self::AcknowledgeReminder);
        }
        if let Some(token) = data.strip_prefix(CONFIRM_PREFIX) {
            return Uuid::parse_str(token).ok().map(Self::ConfirmIntent);
        }
        if let Some(token) = data.strip_prefix(CANCEL_PREFIX) {
            return Uuid::parse_str(token).ok().map(Self::CancelIntent);
        }
        None
    }
}

//=========================================================================================
// The Webhook Handler
//=========================================================================================

/// Receive a Telegram update.
#[utoipa::path(
    post,
    path = "/telegram/webhook",
    request_body(content_type = "application/json", description = "A Telegram Bot API update."),
    responses(
        (status = 200, description = "Update handled"),
        (status = 401, description = "Missing or wrong secret token")
    ),
    params(
        ("x-telegram-bot-api-secret-token" = Option<String>, Header, description = "Required when WEBHOOK_SECRET is set.")
    )
)]
pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    Json(update): Json<Update>,
) -> StatusCode {
    let result = if let Some(callback) = update.callback_query {
        handle_callback(&state, callback).await
    } else if let Some(message) = update.message {
        handle_message(&state, message).await
    } else {
        Ok(())
    };

    if let Err(e) = result {
        error!(update_id = update.update_id, error = %e, "Failed to handle Telegram update");
    }
    StatusCode::OK
}

//=========================================================================================
// Messages
//=========================================================================================

async fn handle_message(state: &AppState, message: Message) -> PortResult<()> {
    let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(());
    };
    let chat_id = message.chat.id;
    let user = UserId(chat_id);

    let reply = match Command::parse(text) {
        Some(Ok(command)) => {
            let name = command.name();
            match commands::execute(state, user, command).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!(user_id = chat_id, command = name, error = %e, "Command failed");
                    "⚠️ Something went wrong, please try again.".to_string()
                }
            }
        }
        Some(Err(e)) => e.to_string(),
        None => return handle_free_text(state, user, text).await,
    };

    state.chat.send_text(user, &reply).await?;
    Ok(())
}

/// Free text goes through the intent parser and waits for confirmation.
async fn handle_free_text(state: &AppState, user: UserId, text: &str) -> PortResult<()> {
    let Some(parser) = state.intents.as_ref() else {
        state
            .chat
            .send_text(user, "I only understand commands right now. Try /help.")
            .await?;
        return Ok(());
    };

    // Make sure a user who never sent /start still gets settings.
    state.repos.settings.get_or_create_settings(user).await?;

    let intent = match parser.parse_intent(text, state.clock.now()).await {
        Ok(intent) => intent,
        Err(e) => {
            warn!(user_id = user.0, error = %e, "Intent parsing failed");
            state
                .chat
                .send_text(user, "🤔 Sorry, I couldn't understand that. Try rephrasing or /help.")
                .await?;
            return Ok(());
        }
    };

    if let Intent::Reply { text } = &intent {
        // Chatting about a pending intent keeps its buttons alive.
        state.sessions.refresh(user);
        state.chat.send_text(user, text).await?;
        return Ok(());
    }

    let preview = commands::preview_intent(&intent);
    let token = state.sessions.create(user, intent);
    let prompt = OutboundMessage::text(format!("{}\n\nSave it?", preview))
        .with_action("✅ Confirm", format!("{}{}", CONFIRM_PREFIX, token))
        .with_action("❌ Cancel", format!("{}{}", CANCEL_PREFIX, token));
    state.chat.send_message(user, &prompt).await?;
    Ok(())
}

//=========================================================================================
// Callbacks
//=========================================================================================

async fn handle_callback(state: &AppState, callback: CallbackQuery) -> PortResult<()> {
    let Some(message) = callback.message else {
        state
            .chat
            .answer_action(&callback.id, Some("This message is too old."))
            .await?;
        return Ok(());
    };
    let chat_id = message.chat.id;
    let user = UserId(chat_id);

    let Some(action) = callback.data.as_deref().and_then(CallbackAction::parse) else {
        warn!(user_id = chat_id, data = ?callback.data, "Unknown callback data");
        state.chat.answer_action(&callback.id, None).await?;
        return Ok(());
    };

    let (edit, toast) = match action {
        CallbackAction::AcknowledgeReminder(id) => acknowledge(state, user, id).await?,
        CallbackAction::ConfirmIntent(token) => match state.sessions.take(user, token) {
            Some(intent) => {
                let reply = commands::commit_intent(state, user, intent, state.clock.now()).await?;
                (Some(reply), None)
            }
            None => (
                Some("⌛ This request expired. Please send it again.".to_string()),
                None,
            ),
        },
        CallbackAction::CancelIntent(token) => {
            state.sessions.take(user, token);
            (Some("❌ Cancelled".to_string()), None)
        }
    };

    if let Some(text) = edit {
        state
            .chat
            .edit_text(user, MessageHandle(message.message_id), &text)
            .await?;
    }
    state.chat.answer_action(&callback.id, toast).await?;
    Ok(())
}

/// Runs the acknowledgement transition. Returns the new message text and an
/// optional toast.
async fn acknowledge(
    state: &AppState,
    user: UserId,
    reminder_id: i64,
) -> PortResult<(Option<String>, Option<&'static str>)> {
    let reminder = match state.repos.reminders.get_reminder(reminder_id).await {
        Ok(reminder) => reminder,
        Err(PortError::NotFound(_)) => return Ok((None, Some("This reminder no longer exists."))),
        Err(e) => return Err(e),
    };
    if reminder.user_id != user {
        warn!(user_id = user.0, reminder_id, "Acknowledgement for another user's reminder");
        return Ok((None, Some("This reminder isn't yours.")));
    }
    match reminder.state() {
        // Stale buttons: the reminder was finished, or rescheduled and not yet re-sent.
        ReminderState::Disabled | ReminderState::Scheduled => {
            return Ok((None, Some("Already confirmed.")));
        }
        // An acknowledgement left half-written by an older build is finished here.
        ReminderState::Notified | ReminderState::Acknowledged => {}
    }

    let outcome = state
        .advancer
        .acknowledge_reminder(&reminder, state.clock.now())
        .await?;
    info!(user_id = user.0, reminder_id, ?outcome, "Reminder acknowledged");

    let text = match outcome {
        AckOutcome::Rescheduled(next) => format!(
            "✅ **Confirmed:** {}\n\n⏭ Next: {}",
            reminder.message,
            next.format("%Y-%m-%d %H:%M")
        ),
        AckOutcome::Disabled => format!("✅ **Confirmed:** {}", reminder.message),
    };
    Ok((Some(text), Some("Got it!")))
}
