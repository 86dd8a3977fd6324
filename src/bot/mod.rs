/// Command, text and callback endpoints
pub mod handlers;
/// Telegram API wrappers with retry
pub mod resilient;
/// Chat transport trait and its Telegram implementation
pub mod transport;
/// Texts, menus and captions
pub mod views;
