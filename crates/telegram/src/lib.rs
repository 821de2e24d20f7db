//! Telegram Integration - Bot API client and chat handling
//!
//! This crate provides the Telegram side of vigil:
//! - **Bot API** (`api`) - `sendMessage`, `setWebhook`, `getUpdates`, `close`
//! - **Commands** (`commands`) - `/start`, `/help`, `/status`, `/info`, `/ping`
//! - **Replies** (`replies`) - Markdown reply templates
//! - **Dispatcher** (`dispatcher`) - Routes updates to command and echo handlers
//! - **Delivery** (`registrar`, `poller`) - Webhook registration with polling fallback
//!
//! # Getting Started
//!
//! 1. Create a bot with @BotFather and copy its token
//! 2. Deploy behind a public HTTPS URL
//! 3. Set env vars: `BOT_TOKEN`, `WEBHOOK_URL` (or `VIGIL_TELEGRAM_*`)
//!
//! # Architecture
//!
//! ```text
//! Webhook POST / getUpdates → UpdateDispatcher → Replies → BotApi::send_message
//!                                   ↓
//!                               BotStats
//! ```
//!
//! # Key Types
//!
//! - `HttpBotApi` - reqwest client for the Bot API
//! - `UpdateDispatcher` - Command recognition, replies and counters
//! - `WebhookRegistrar` - Retrying registration, one-way switch to polling
//! - `UpdatePoller` - Long-poll loop used after the switch

pub mod api;
pub mod commands;
pub mod dispatcher;
pub mod poller;
pub mod registrar;
pub mod replies;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod types;

pub use api::{ApiError, BotApi, HttpBotApi};
pub use commands::{BotCommand, LatencyBand};
pub use dispatcher::{DispatchOutcome, UpdateDispatcher};
pub use poller::{PollSettings, PollerHandle, UpdatePoller};
pub use registrar::{DeliveryMode, RetryPolicy, WebhookRegistrar};
pub use replies::BotProfile;
pub use types::{OutgoingMessage, Update};
