//! Telegram front end: Bot API client, the `Transport` implementation the
//! dialog engine renders through, and the long-polling runner that feeds
//! chat updates into the dispatcher.

pub mod api;
pub mod runner;
pub mod transport;

pub use api::BotApi;
pub use runner::{LongPollSource, PollingRunner, ReconnectPolicy, UpdateSource};
pub use transport::TelegramTransport;
