//! Channel abstraction for message I/O.

pub mod channel;
pub mod telegram;
pub mod webhook;

pub use channel::*;
pub use telegram::{TelegramChannel, parse_update};
pub use webhook::webhook_routes;
