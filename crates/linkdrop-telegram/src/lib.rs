//! Telegram Bot API adapter.
//!
//! Implements [`linkdrop_core::ChatTransport`] on top of a small `reqwest`
//! client and exposes the update types the bot's poller consumes.

#![deny(unused_crate_dependencies)]

mod client;
mod error;
mod transport;
pub mod types;

pub use client::{BotClient, DEFAULT_API_URL};
pub use error::{Result, TelegramError};
pub use transport::TelegramTransport;
pub use types::{CallbackQuery, Message, Update, User, cancel_keyboard, parse_cancel_data};
