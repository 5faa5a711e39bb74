//! services/bot/src/adapters/intent_llm.rs
//!
//! This module contains the adapter for the intent-extracting LLM.
//! It implements the `IntentParser` port from the `core` crate against any
//! OpenAI-compatible chat completion endpoint (OpenRouter by default).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use lifeline_core::{
    domain::Intent,
    ports::{IntentParser, PortError, PortResult},
};
use serde_json::Value;
use tracing::debug;

const SYSTEM_PROMPT: &str = r#"You turn a user's chat message into exactly one JSON object describing what they want LifeLine to schedule. Reply with the JSON object only.

Shapes:
{"type":"create_reminder","message":"...","remind_at":"YYYY-MM-DDTHH:MM:SS","recurrence_rule":null}
{"type":"create_event","title":"...","description":null,"dtstart":"YYYY-MM-DDTHH:MM:SS","duration_minutes":60,"notify_before_minutes":15,"recurrence_rule":null}
{"type":"create_todo","title":"...","description":null,"due_time":"YYYY-MM-DDTHH:MM:SS","priority":3}
{"type":"reply","text":"..."}

Rules:
- Resolve relative dates ("tomorrow", "next Monday", "in 3 hours") against the current local time given in the message. Times are local wall-clock times without a zone.
- priority is 1 (lowest) to 5 (highest); omit it when the user gives no hint.
- recurrence_rule uses RFC 5545 RRULE syntax without the "RRULE:" prefix: FREQ (HOURLY, DAILY, WEEKLY, MONTHLY, YEARLY), INTERVAL, BYHOUR, BYMINUTE, BYDAY (MO,TU,WE,TH,FR,SA,SU without ordinals), BYMONTHDAY (1-31 or negative from month end), BYMONTH, COUNT, UNTIL (YYYYMMDDTHHMMSSZ).
  Examples: every day at 9 -> remind_at at 09:00 and "FREQ=DAILY"; weekdays -> "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR"; every hour from 9 to 22 -> "FREQ=DAILY;BYHOUR=9,10,11,12,13,14,15,16,17,18,19,20,21,22"; the 15th of each month -> "FREQ=MONTHLY;BYMONTHDAY=15".
  The first occurrence time (remind_at or dtstart) also fixes the minute of every occurrence. Use null for one-off items.
- If the message is missing what you need (no time for a reminder, no title), or is not a scheduling request at all, use "reply" with a short question or answer."#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `IntentParser` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiIntentAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiIntentAdapter {
    /// Creates a new `OpenAiIntentAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `IntentParser` Trait Implementation
//=========================================================================================

#[async_trait]
impl IntentParser for OpenAiIntentAdapter {
    async fn parse_intent(&self, text: &str, now: NaiveDateTime) -> PortResult<Intent> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!(
                    "CURRENT TIME: {} ({})\n\nMESSAGE: {}",
                    now.format("%Y-%m-%dT%H:%M:%S"),
                    now.format("%A"),
                    text
                ))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Intent LLM response contained no text content.".to_string())
            })?;

        debug!(raw = %content, "Intent LLM response");
        decode_intent(&content)
    }
}

//=========================================================================================
// Response Decoding
//=========================================================================================

/// Removes a surrounding Markdown code fence, with or without a language tag.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Accepts `YYYY-MM-DD HH:MM` and `YYYY-MM-DDTHH:MM` as well as the full form.
fn normalize_datetime(raw: &str) -> Option<String> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw.trim(), f).ok())
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn decode_intent(raw: &str) -> PortResult<Intent> {
    let mut value: Value = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| PortError::Unexpected(format!("Intent LLM returned invalid JSON: {e}")))?;

    if let Some(object) = value.as_object_mut() {
        for key in ["remind_at", "dtstart", "due_time"] {
            let normalized = object.get(key).and_then(Value::as_str).and_then(normalize_datetime);
            if let Some(normalized) = normalized {
                object.insert(key.to_string(), Value::String(normalized));
            }
        }
        let blank_rule = object
            .get("recurrence_rule")
            .and_then(Value::as_str)
            .is_some_and(|rule| rule.trim().is_empty());
        if blank_rule {
            object.insert("recurrence_rule".to_string(), Value::Null);
        }
    }

    serde_json::from_value(value)
        .map_err(|e| PortError::Unexpected(format!("Intent LLM returned an unknown shape: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn short_datetimes_are_accepted() {
        let intent = decode_intent(
            "```json\n{\"type\":\"create_reminder\",\"message\":\"call mom\",\"remind_at\":\"2024-05-02 18:30\",\"recurrence_rule\":\"\"}\n```",
        )
        .unwrap();
        assert_eq!(
            intent,
            Intent::CreateReminder {
                message: "call mom".into(),
                remind_at: NaiveDate::from_ymd_opt(2024, 5, 2)
                    .unwrap()
                    .and_hms_opt(18, 30, 0)
                    .unwrap(),
                recurrence_rule: None,
            }
        );
    }

    #[test]
    fn reply_passes_through() {
        let intent = decode_intent(r#"{"type":"reply","text":"When should I remind you?"}"#).unwrap();
        assert_eq!(intent, Intent::Reply { text: "When should I remind you?".into() });
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(decode_intent("sure thing!"), Err(PortError::Unexpected(_))));
        assert!(matches!(
            decode_intent(r#"{"type":"delete_everything"}"#),
            Err(PortError::Unexpected(_))
        ));
    }
}
