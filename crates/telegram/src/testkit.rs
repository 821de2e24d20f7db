//! In-memory [`BotApi`] fake for tests in this crate and downstream crates
//! (enable the `testkit` feature).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    api::{ApiError, BotApi},
    types::{Chat, Message, OutgoingMessage, SentMessage, Update, User},
};

/// Pause taken by `get_updates` when no batch is scripted, standing in for a
/// long poll that returned nothing.
const EMPTY_POLL_PAUSE: Duration = Duration::from_millis(5);

/// Results are scripted per method and consumed front to back; an exhausted
/// script answers with success.
#[derive(Default)]
pub struct ScriptedBotApi {
    state: Mutex<ScriptedState>,
}

#[derive(Default)]
struct ScriptedState {
    send_results: VecDeque<Result<(), ApiError>>,
    set_webhook_results: VecDeque<Result<(), ApiError>>,
    delete_webhook_results: VecDeque<Result<(), ApiError>>,
    update_batches: VecDeque<Result<Vec<Update>, ApiError>>,
    close_results: VecDeque<Result<(), ApiError>>,
    sent: Vec<(i64, OutgoingMessage)>,
    webhook_urls: Vec<String>,
    update_offsets: Vec<Option<i64>>,
    delete_webhook_calls: usize,
    close_calls: usize,
}

impl ScriptedBotApi {
    pub async fn script_sends(&self, results: Vec<Result<(), ApiError>>) {
        self.state.lock().await.send_results.extend(results);
    }

    pub async fn fail_next_send(&self, error: ApiError) {
        self.script_sends(vec![Err(error)]).await;
    }

    pub async fn script_set_webhook(&self, results: Vec<Result<(), ApiError>>) {
        self.state.lock().await.set_webhook_results.extend(results);
    }

    pub async fn script_delete_webhook(&self, results: Vec<Result<(), ApiError>>) {
        self.state.lock().await.delete_webhook_results.extend(results);
    }

    pub async fn script_updates(&self, batches: Vec<Result<Vec<Update>, ApiError>>) {
        self.state.lock().await.update_batches.extend(batches);
    }

    pub async fn script_close(&self, results: Vec<Result<(), ApiError>>) {
        self.state.lock().await.close_results.extend(results);
    }

    /// Messages whose send succeeded, with their target chat.
    pub async fn sent_messages(&self) -> Vec<(i64, OutgoingMessage)> {
        self.state.lock().await.sent.clone()
    }

    pub async fn webhook_urls(&self) -> Vec<String> {
        self.state.lock().await.webhook_urls.clone()
    }

    pub async fn update_offsets(&self) -> Vec<Option<i64>> {
        self.state.lock().await.update_offsets.clone()
    }

    pub async fn delete_webhook_calls(&self) -> usize {
        self.state.lock().await.delete_webhook_calls
    }

    pub async fn close_calls(&self) -> usize {
        self.state.lock().await.close_calls
    }
}

#[async_trait]
impl BotApi for ScriptedBotApi {
    async fn send_message(
        &self,
        chat_id: i64,
        message: &OutgoingMessage,
    ) -> Result<SentMessage, ApiError> {
        let mut state = self.state.lock().await;
        state.send_results.pop_front().unwrap_or(Ok(()))?;
        state.sent.push((chat_id, message.clone()));
        Ok(SentMessage { message_id: state.sent.len() as i64 })
    }

    async fn set_webhook(&self, url: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.webhook_urls.push(url.to_owned());
        state.set_webhook_results.pop_front().unwrap_or(Ok(()))
    }

    async fn delete_webhook(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.delete_webhook_calls += 1;
        state.delete_webhook_results.pop_front().unwrap_or(Ok(()))
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        _timeout_secs: u64,
    ) -> Result<Vec<Update>, ApiError> {
        let next = {
            let mut state = self.state.lock().await;
            state.update_offsets.push(offset);
            state.update_batches.pop_front()
        };

        match next {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(EMPTY_POLL_PAUSE).await;
                Ok(Vec::new())
            }
        }
    }

    async fn close(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.close_calls += 1;
        state.close_results.pop_front().unwrap_or(Ok(()))
    }
}

/// A private-chat text message; the message id is `1000 + update_id`.
pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: 1_000 + update_id,
            date: 1_767_225_600,
            chat: Chat { id: chat_id, kind: "private".to_owned() },
            from: Some(User { id: chat_id, is_bot: false, username: Some("tester".to_owned()) }),
            text: Some(text.to_owned()),
        }),
    }
}
