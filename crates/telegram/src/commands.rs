use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BotCommand {
    Start,
    Help,
    Status,
    Info,
    Ping,
}

impl BotCommand {
    pub const ALL: [BotCommand; 5] =
        [Self::Start, Self::Help, Self::Status, Self::Info, Self::Ping];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Status => "status",
            Self::Info => "info",
            Self::Ping => "ping",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundText<'a> {
    Command(BotCommand),
    UnknownCommand(&'a str),
    Plain(&'a str),
    Empty,
}

/// Classifies message text.
///
/// The first token names the command and may carry a `@botname` suffix, the
/// way group chats address a specific bot. Anything not starting with `/` is
/// plain text and is returned untouched.
pub fn classify_text(text: Option<&str>) -> InboundText<'_> {
    let Some(text) = text else {
        return InboundText::Empty;
    };
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return InboundText::Empty;
    }

    let Some(command_token) = trimmed.strip_prefix('/') else {
        return InboundText::Plain(text);
    };

    let token = command_token.split_whitespace().next().unwrap_or_default();
    let name = token.split_once('@').map_or(token, |(name, _bot)| name);
    match BotCommand::from_name(name) {
        Some(command) => InboundText::Command(command),
        None => InboundText::UnknownCommand(name),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatencyBand {
    Excellent,
    Good,
    Slow,
}

impl LatencyBand {
    pub fn classify(latency: Duration) -> Self {
        match latency.as_millis() {
            0..=999 => Self::Excellent,
            1_000..=2_999 => Self::Good,
            _ => Self::Slow,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "✅ Excellent",
            Self::Good => "⚠️ Good",
            Self::Slow => "❌ Slow",
        }
    }
}
