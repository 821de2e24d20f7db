use std::time::Duration;

use chrono::{DateTime, Utc};
use vigil_core::stats::StatsSnapshot;

use crate::{commands::LatencyBand, types::OutgoingMessage};

/// Static facts about the running bot that show up in replies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotProfile {
    pub version: String,
    pub platform: String,
    pub hosting_label: String,
}

impl BotProfile {
    pub fn new(hosting_label: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            platform: "Rust".to_owned(),
            hosting_label: hosting_label.into(),
        }
    }
}

pub fn welcome_message(snapshot: &StatsSnapshot) -> OutgoingMessage {
    OutgoingMessage::markdown(format!(
        "🤖 *Welcome to Your 24/7 Bot!*\n\n\
         I'm running continuously and ready to help you anytime!\n\n\
         *Available Commands:*\n\
         /start - Show this message\n\
         /help - Get help\n\
         /status - Check bot status\n\
         /info - Bot information\n\
         /ping - Test response time\n\n\
         *Bot Status:* ✅ Online 24/7\n\
         *Uptime:* {minutes} minutes",
        minutes = snapshot.uptime_minutes()
    ))
}

pub fn help_message() -> OutgoingMessage {
    OutgoingMessage::markdown(
        "🆘 *Help Menu*\n\n\
         This bot is designed to run 24/7 with maximum reliability!\n\n\
         *Commands:*\n\
         • /start - Welcome message\n\
         • /help - This help menu\n\
         • /status - Bot status check\n\
         • /info - Detailed bot info\n\
         • /ping - Response time test\n\n\
         *Features:*\n\
         ✅ Always online\n\
         ✅ Instant responses\n\
         ✅ Error recovery\n\
         ✅ Health monitoring\n\
         ✅ Automatic restarts\n\n\
         *Need help?* The bot is monitored and will automatically recover from any issues.",
    )
}

pub fn status_message(snapshot: &StatsSnapshot) -> OutgoingMessage {
    OutgoingMessage::markdown(format!(
        "✅ *Bot Status: ONLINE*\n\n\
         *Uptime:* {uptime}\n\
         *Messages:* {messages}\n\
         *Commands:* {commands}\n\
         *Errors:* {errors}\n\
         *Last Ping:* {last_ping}\n\n\
         *System:* Running perfectly! 🚀",
        uptime = snapshot.uptime_formatted(),
        messages = snapshot.messages_received,
        commands = snapshot.commands_processed,
        errors = snapshot.errors,
        last_ping = time_of_day(snapshot.last_ping),
    ))
}

pub fn info_message(snapshot: &StatsSnapshot, profile: &BotProfile) -> OutgoingMessage {
    OutgoingMessage::markdown(format!(
        "📊 *Bot Information*\n\n\
         *Version:* {version}\n\
         *Platform:* {platform}\n\
         *Hosting:* {hosting}\n\
         *Reliability:* 99.9%\n\n\
         *Statistics:*\n\
         • Total Messages: {messages}\n\
         • Commands Processed: {commands}\n\
         • Error Rate: {error_rate}%\n\
         • Uptime: {minutes} minutes\n\n\
         *Features:*\n\
         • Webhook-based responses\n\
         • Automatic error recovery\n\
         • Health monitoring\n\
         • Keep-alive system\n\
         • Real-time statistics\n\n\
         This bot is built for maximum reliability and 24/7 operation! 🎯",
        version = escape_markdown(&profile.version),
        platform = escape_markdown(&profile.platform),
        hosting = escape_markdown(&profile.hosting_label),
        messages = snapshot.messages_received,
        commands = snapshot.commands_processed,
        error_rate = snapshot.error_rate().display_value(),
        minutes = snapshot.uptime_minutes(),
    ))
}

pub fn ping_probe() -> OutgoingMessage {
    OutgoingMessage::plain("🏓 Pinging...")
}

pub fn pong_message(latency: Duration, profile: &BotProfile) -> OutgoingMessage {
    let millis = latency.as_millis();
    OutgoingMessage::markdown(format!(
        "🏓 *Pong!*\n\n\
         *Response Time:* {millis}ms\n\
         *Status:* {band}\n\n\
         *Server:* {hosting}\n\
         *Latency:* {millis}ms",
        band = LatencyBand::classify(latency).label(),
        hosting = escape_markdown(&profile.hosting_label),
    ))
}

pub fn echo_message(text: &str, message_id: i64, now: DateTime<Utc>) -> OutgoingMessage {
    OutgoingMessage::markdown(format!(
        "💬 *You said:* {text}\n\n\
         *Message ID:* {message_id}\n\
         *Time:* {time}\n\
         *Bot Status:* ✅ Online",
        text = escape_markdown(text),
        time = time_of_day(now),
    ))
}

fn time_of_day(at: DateTime<Utc>) -> String {
    at.format("%H:%M:%S UTC").to_string()
}

/// Escapes the characters legacy Markdown treats as entity delimiters.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
