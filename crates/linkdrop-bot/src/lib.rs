//! Telegram front end for linkdrop.
//!
//! Parses configuration, routes chat updates to handlers and wires the
//! download supervisor to the Bot API. The `linkdrop` binary is a thin
//! wrapper around [`bootstrap::bootstrap`] and [`poller::run_poller`].

#![deny(unused_crate_dependencies)]

pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod poller;

pub use bootstrap::{BotRuntime, bootstrap};
pub use config::BotConfig;
pub use logging::init_tracing;
