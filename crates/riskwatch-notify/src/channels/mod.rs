pub mod log;
pub mod webhook;

pub use self::log::LogChannel;
pub use self::webhook::WebhookChannel;
