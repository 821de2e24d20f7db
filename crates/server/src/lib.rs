//! HTTP surface and process wiring for the vigil bot.
//!
//! - `routes` - axum router: `GET /` health, `POST /bot{token}` webhook
//! - `keepalive` - periodic self-ping against the public URL
//! - `bootstrap` - config, clients and delivery mode at startup

pub mod bootstrap;
pub mod health;
pub mod keepalive;
pub mod routes;
pub mod webhook;
