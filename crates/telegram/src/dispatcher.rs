use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vigil_core::stats::BotStats;

use crate::{
    api::{ApiError, BotApi},
    commands::{classify_text, BotCommand, InboundText},
    replies::{self, BotProfile},
    types::{Message, OutgoingMessage, Update},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyContext {
    pub chat_id: i64,
    pub message_id: i64,
    pub correlation_id: String,
}

impl ReplyContext {
    fn for_message(update_id: i64, message: &Message) -> Self {
        Self {
            chat_id: message.chat.id,
            message_id: message.message_id,
            correlation_id: format!("update-{update_id}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Command(BotCommand),
    Echoed,
    Ignored,
    SendFailed,
}

/// Routes inbound updates to the command and echo handlers.
///
/// Send failures are counted and logged here and never returned to the
/// caller: the chat user only notices the reply did not arrive.
pub struct UpdateDispatcher {
    api: Arc<dyn BotApi>,
    stats: Arc<BotStats>,
    profile: BotProfile,
}

impl UpdateDispatcher {
    pub fn new(api: Arc<dyn BotApi>, stats: Arc<BotStats>, profile: BotProfile) -> Self {
        Self { api, stats, profile }
    }

    pub fn stats(&self) -> &Arc<BotStats> {
        &self.stats
    }

    pub async fn dispatch(&self, update: &Update) -> DispatchOutcome {
        let Some(message) = &update.message else {
            debug!(
                event_name = "ingress.telegram.update_ignored",
                correlation_id = %format!("update-{}", update.update_id),
                "update carries no message"
            );
            return DispatchOutcome::Ignored;
        };

        let ctx = ReplyContext::for_message(update.update_id, message);
        self.stats.record_message();
        info!(
            event_name = "ingress.telegram.update_received",
            correlation_id = %ctx.correlation_id,
            chat_id = ctx.chat_id,
            message_id = ctx.message_id,
            "received telegram message"
        );

        match classify_text(message.text.as_deref()) {
            InboundText::Command(command) => self.handle_command(command, &ctx).await,
            InboundText::Plain(text) => self.handle_echo(text, &ctx).await,
            InboundText::UnknownCommand(name) => {
                debug!(
                    event_name = "ingress.telegram.unknown_command",
                    correlation_id = %ctx.correlation_id,
                    command = name,
                    "ignoring unrecognized command"
                );
                DispatchOutcome::Ignored
            }
            InboundText::Empty => DispatchOutcome::Ignored,
        }
    }

    async fn handle_command(&self, command: BotCommand, ctx: &ReplyContext) -> DispatchOutcome {
        let result = match command {
            BotCommand::Start => {
                self.send(ctx, &replies::welcome_message(&self.stats.snapshot())).await
            }
            BotCommand::Help => self.send(ctx, &replies::help_message()).await,
            BotCommand::Status => {
                self.send(ctx, &replies::status_message(&self.stats.snapshot())).await
            }
            BotCommand::Info => {
                let reply = replies::info_message(&self.stats.snapshot(), &self.profile);
                self.send(ctx, &reply).await
            }
            BotCommand::Ping => self.handle_ping(ctx).await,
        };

        match result {
            Ok(()) => {
                self.stats.record_command();
                info!(
                    event_name = "egress.telegram.command_replied",
                    correlation_id = %ctx.correlation_id,
                    command = command.name(),
                    "command processed"
                );
                DispatchOutcome::Command(command)
            }
            Err(error) => self.send_failed(Some(command), ctx, &error),
        }
    }

    async fn handle_ping(&self, ctx: &ReplyContext) -> Result<(), ApiError> {
        let started = Instant::now();
        self.send(ctx, &replies::ping_probe()).await?;
        let latency = started.elapsed();

        self.send(ctx, &replies::pong_message(latency, &self.profile)).await
    }

    async fn handle_echo(&self, text: &str, ctx: &ReplyContext) -> DispatchOutcome {
        let reply = replies::echo_message(text, ctx.message_id, Utc::now());
        match self.send(ctx, &reply).await {
            Ok(()) => DispatchOutcome::Echoed,
            Err(error) => self.send_failed(None, ctx, &error),
        }
    }

    async fn send(&self, ctx: &ReplyContext, message: &OutgoingMessage) -> Result<(), ApiError> {
        self.api.send_message(ctx.chat_id, message).await.map(|_| ())
    }

    fn send_failed(
        &self,
        command: Option<BotCommand>,
        ctx: &ReplyContext,
        error: &ApiError,
    ) -> DispatchOutcome {
        self.stats.record_error();
        warn!(
            event_name = "egress.telegram.send_failed",
            correlation_id = %ctx.correlation_id,
            chat_id = ctx.chat_id,
            command = command.map_or("echo", |command| command.name()),
            error = %error,
            "failed to send reply; dropping it"
        );
        DispatchOutcome::SendFailed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vigil_core::stats::BotStats;

    use super::{DispatchOutcome, UpdateDispatcher};
    use crate::{
        api::ApiError,
        commands::BotCommand,
        replies::BotProfile,
        testkit::{text_update, ScriptedBotApi},
        types::{ParseMode, Update},
    };

    fn dispatcher(api: Arc<ScriptedBotApi>) -> (UpdateDispatcher, Arc<BotStats>) {
        let stats = Arc::new(BotStats::new());
        (UpdateDispatcher::new(api, stats.clone(), BotProfile::new("Railway")), stats)
    }

    fn rejected() -> ApiError {
        ApiError::Rejected {
            method: "sendMessage",
            code: 400,
            description: "Bad Request: chat not found".to_owned(),
        }
    }

    /// Every recognized command adds exactly one to commands processed.
    #[tokio::test]
    async fn each_command_counts_once_regardless_of_type() {
        let api = Arc::new(ScriptedBotApi::default());
        let (dispatcher, stats) = dispatcher(api.clone());

        let inputs = ["/start", "/help", "/status", "/info", "/ping", "/status", "/ping@vigil_bot"];
        for (index, text) in inputs.iter().enumerate() {
            let before = stats.snapshot().commands_processed;
            let outcome = dispatcher.dispatch(&text_update(index as i64, 10, text)).await;
            assert!(matches!(outcome, DispatchOutcome::Command(_)), "{text} should be a command");
            assert_eq!(stats.snapshot().commands_processed, before + 1, "{text} counted once");
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_received, inputs.len() as u64);
        assert_eq!(snapshot.errors, 0);
    }

    #[tokio::test]
    async fn plain_text_is_echoed_verbatim_to_the_same_chat() {
        let api = Arc::new(ScriptedBotApi::default());
        let (dispatcher, stats) = dispatcher(api.clone());

        let outcome = dispatcher.dispatch(&text_update(1, 77, "see you at noon")).await;

        assert_eq!(outcome, DispatchOutcome::Echoed);
        let sent = api.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 77);
        assert!(sent[0].1.text.contains("see you at noon"));
        assert!(sent[0].1.text.contains("*Message ID:* 1001"));
        assert_eq!(sent[0].1.parse_mode, Some(ParseMode::Markdown));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_received, 1);
        assert_eq!(snapshot.commands_processed, 0);
    }

    #[tokio::test]
    async fn ping_sends_probe_then_pong_and_counts_once() {
        let api = Arc::new(ScriptedBotApi::default());
        let (dispatcher, stats) = dispatcher(api.clone());

        let outcome = dispatcher.dispatch(&text_update(5, 3, "/ping")).await;

        assert_eq!(outcome, DispatchOutcome::Command(BotCommand::Ping));
        let sent = api.sent_messages().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1.text, "🏓 Pinging...");
        assert!(sent[1].1.text.contains("*Pong!*"));
        assert!(sent[1].1.text.contains("✅ Excellent"), "scripted sends are instant");
        assert_eq!(stats.snapshot().commands_processed, 1);
    }

    #[tokio::test]
    async fn failed_command_send_counts_error_not_command() {
        let api = Arc::new(ScriptedBotApi::default());
        api.fail_next_send(rejected()).await;
        let (dispatcher, stats) = dispatcher(api.clone());

        let outcome = dispatcher.dispatch(&text_update(2, 9, "/status")).await;

        assert_eq!(outcome, DispatchOutcome::SendFailed);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_received, 1);
        assert_eq!(snapshot.commands_processed, 0);
        assert_eq!(snapshot.errors, 1);
    }

    #[tokio::test]
    async fn ping_with_failed_pong_counts_one_error() {
        let api = Arc::new(ScriptedBotApi::default());
        api.script_sends(vec![Ok(()), Err(rejected())]).await;
        let (dispatcher, stats) = dispatcher(api.clone());

        let outcome = dispatcher.dispatch(&text_update(2, 9, "/ping")).await;

        assert_eq!(outcome, DispatchOutcome::SendFailed);
        assert_eq!(stats.snapshot().errors, 1);
        assert_eq!(stats.snapshot().commands_processed, 0);
    }

    #[tokio::test]
    async fn failed_echo_counts_error() {
        let api = Arc::new(ScriptedBotApi::default());
        api.fail_next_send(ApiError::Transport {
            method: "sendMessage",
            reason: "connection reset".to_owned(),
        })
        .await;
        let (dispatcher, stats) = dispatcher(api.clone());

        let outcome = dispatcher.dispatch(&text_update(4, 9, "hello")).await;

        assert_eq!(outcome, DispatchOutcome::SendFailed);
        assert_eq!(stats.snapshot().errors, 1);
        assert_eq!(stats.snapshot().messages_received, 1);
    }

    #[tokio::test]
    async fn unknown_commands_and_empty_text_are_counted_but_not_answered() {
        let api = Arc::new(ScriptedBotApi::default());
        let (dispatcher, stats) = dispatcher(api.clone());

        let unknown = dispatcher.dispatch(&text_update(1, 1, "/weather")).await;
        let blank = dispatcher.dispatch(&text_update(2, 1, "   ")).await;

        assert_eq!(unknown, DispatchOutcome::Ignored);
        assert_eq!(blank, DispatchOutcome::Ignored);

        assert!(api.sent_messages().await.is_empty());
        assert_eq!(stats.snapshot().messages_received, 2);
        assert_eq!(stats.snapshot().commands_processed, 0);
    }

    #[tokio::test]
    async fn updates_without_message_are_not_counted() {
        let api = Arc::new(ScriptedBotApi::default());
        let (dispatcher, stats) = dispatcher(api.clone());

        let outcome = dispatcher.dispatch(&Update { update_id: 8, message: None }).await;

        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(stats.snapshot().messages_received, 0);
    }

    /// Uptime rendered by `/status` matches the snapshot taken alongside it.
    #[tokio::test]
    async fn status_uptime_agrees_with_stats_snapshot() {
        let api = Arc::new(ScriptedBotApi::default());
        let (dispatcher, stats) = dispatcher(api.clone());

        dispatcher.dispatch(&text_update(1, 1, "/status")).await;
        let expected = stats.snapshot();

        let sent = api.sent_messages().await;
        let uptime_line = sent[0]
            .1
            .text
            .lines()
            .find(|line| line.starts_with("*Uptime:*"))
            .expect("status reply has an uptime line")
            .to_owned();
        let seconds = parse_formatted_uptime(uptime_line.trim_start_matches("*Uptime:* "));
        assert!(expected.uptime_secs.abs_diff(seconds) <= 1);
    }

    fn parse_formatted_uptime(formatted: &str) -> u64 {
        let parts: Vec<u64> = formatted
            .split_whitespace()
            .map(|part| part.trim_end_matches(['h', 'm', 's']).parse().expect("numeric part"))
            .collect();
        parts[0] * 3600 + parts[1] * 60 + parts[2]
    }
}
