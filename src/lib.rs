pub mod bot;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod session;
pub mod slack;

#[cfg(test)]
mod testing;

pub use bot::SlackBot;
pub use error::{Result, SlackBotError};
