//! Telegram gatekeeper — admission control and admin approval for a bot.

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod identity;
pub mod store;
pub mod users;
