//! Telegram Bot API client.
//!
//! Every method is a JSON `POST` to `{api_base_url}/bot{token}/{method}` and
//! answers with an envelope: `{"ok": true, "result": ...}` on success or
//! `{"ok": false, "error_code": 400, "description": "..."}` on failure.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{OutgoingMessage, ParseMode, SentMessage, Update};

/// Extra time granted to a long-poll request on top of its server-side timeout.
const LONG_POLL_MARGIN: Duration = Duration::from_secs(10);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("telegram `{method}` request failed: {reason}")]
    Transport { method: &'static str, reason: String },
    #[error("telegram `{method}` response could not be decoded: {reason}")]
    Decode { method: &'static str, reason: String },
    #[error("telegram rejected `{method}` (code {code}): {description}")]
    Rejected { method: &'static str, code: i64, description: String },
}

#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        message: &OutgoingMessage,
    ) -> Result<SentMessage, ApiError>;
    async fn set_webhook(&self, url: &str) -> Result<(), ApiError>;
    async fn delete_webhook(&self) -> Result<(), ApiError>;
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ApiError>;
    async fn close(&self) -> Result<(), ApiError>;
}

#[derive(Debug)]
pub struct HttpBotApi {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl HttpBotApi {
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(|error| ApiError::Transport {
                method: "client",
                reason: error.to_string(),
            })?;

        Ok(Self { http, base_url: base_url.into(), token })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token.expose_secret(),
            method
        )
    }

    async fn call<B, T>(
        &self,
        method: &'static str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method, "calling telegram bot api");

        let mut request = self.http.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // `without_url` keeps the token out of error messages and logs.
        let response = request.send().await.map_err(|error| ApiError::Transport {
            method,
            reason: error.without_url().to_string(),
        })?;
        let envelope = response.json::<ApiEnvelope<T>>().await.map_err(|error| {
            ApiError::Decode { method, reason: error.without_url().to_string() }
        })?;

        envelope.into_result(method)
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn send_message(
        &self,
        chat_id: i64,
        message: &OutgoingMessage,
    ) -> Result<SentMessage, ApiError> {
        let body = SendMessageBody {
            chat_id,
            text: &message.text,
            parse_mode: message.parse_mode,
        };
        self.call("sendMessage", &body, None).await
    }

    async fn set_webhook(&self, url: &str) -> Result<(), ApiError> {
        let _: bool = self.call("setWebhook", &SetWebhookBody { url }, None).await?;
        Ok(())
    }

    async fn delete_webhook(&self) -> Result<(), ApiError> {
        let _: bool = self.call("deleteWebhook", &EmptyBody {}, None).await?;
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ApiError> {
        let body = GetUpdatesBody { offset, timeout: timeout_secs, allowed_updates: &["message"] };
        let timeout = Duration::from_secs(timeout_secs) + LONG_POLL_MARGIN;
        self.call("getUpdates", &body, Some(timeout)).await
    }

    async fn close(&self) -> Result<(), ApiError> {
        let _: bool = self.call("close", &EmptyBody {}, None).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
}

#[derive(Serialize)]
struct SetWebhookBody<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct GetUpdatesBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct EmptyBody {}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

impl<T> ApiEnvelope<T> {
    fn into_result(self, method: &'static str) -> Result<T, ApiError> {
        if !self.ok {
            return Err(ApiError::Rejected {
                method,
                code: self.error_code.unwrap_or(-1),
                description: self.description.unwrap_or_else(|| "unknown error".to_owned()),
            });
        }

        self.result.ok_or_else(|| ApiError::Decode {
            method,
            reason: "response is missing `result`".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ApiEnvelope, ApiError, HttpBotApi, SendMessageBody};
    use crate::types::{ParseMode, SentMessage, Update};

    #[test]
    fn method_url_embeds_token_under_bot_prefix() {
        let api = HttpBotApi::new(
            "https://api.telegram.org/",
            "123456:ABC-DEF".to_owned().into(),
            Duration::from_secs(5),
        )
        .expect("client should build");

        assert_eq!(
            api.method_url("sendMessage"),
            "https://api.telegram.org/bot123456:ABC-DEF/sendMessage"
        );
    }

    #[test]
    fn debug_output_does_not_leak_token() {
        let api = HttpBotApi::new(
            "https://api.telegram.org",
            "123456:very-secret".to_owned().into(),
            Duration::from_secs(5),
        )
        .expect("client should build");

        assert!(!format!("{api:?}").contains("very-secret"));
    }

    #[test]
    fn ok_envelope_yields_result() {
        let envelope: ApiEnvelope<SentMessage> =
            serde_json::from_str(r#"{"ok": true, "result": {"message_id": 44, "chat": {"id": 1}}}"#)
                .expect("decode");
        assert_eq!(envelope.into_result("sendMessage"), Ok(SentMessage { message_id: 44 }));
    }

    #[test]
    fn rejected_envelope_carries_code_and_description() {
        let envelope: ApiEnvelope<bool> = serde_json::from_str(
            r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#,
        )
        .expect("decode");

        assert_eq!(
            envelope.into_result("setWebhook"),
            Err(ApiError::Rejected {
                method: "setWebhook",
                code: 401,
                description: "Unauthorized".to_owned()
            })
        );
    }

    #[test]
    fn rejected_envelope_without_details_uses_placeholders() {
        let envelope: ApiEnvelope<bool> = serde_json::from_str(r#"{"ok": false}"#).expect("decode");
        let error = envelope.into_result("close").expect_err("should be rejected");
        assert_eq!(error.to_string(), "telegram rejected `close` (code -1): unknown error");
    }

    #[test]
    fn ok_envelope_without_result_is_a_decode_error() {
        let envelope: ApiEnvelope<Vec<Update>> =
            serde_json::from_str(r#"{"ok": true}"#).expect("decode");
        assert!(matches!(
            envelope.into_result("getUpdates"),
            Err(ApiError::Decode { method: "getUpdates", .. })
        ));
    }

    #[test]
    fn send_message_body_omits_absent_parse_mode() {
        let plain = SendMessageBody { chat_id: 7, text: "hi", parse_mode: None };
        assert_eq!(
            serde_json::to_value(&plain).expect("serialize"),
            serde_json::json!({"chat_id": 7, "text": "hi"})
        );

        let markdown =
            SendMessageBody { chat_id: 7, text: "*hi*", parse_mode: Some(ParseMode::Markdown) };
        assert_eq!(
            serde_json::to_value(&markdown).expect("serialize"),
            serde_json::json!({"chat_id": 7, "text": "*hi*", "parse_mode": "Markdown"})
        );
    }
}
