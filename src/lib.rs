#![deny(missing_docs)]
//! Media Fetch Bot
//!
//! A Telegram bot that takes a media link (YouTube, TikTok, Instagram, X),
//! lets the user pick a video quality or MP3 audio, and sends the file back.
//! Metadata extraction and downloads are delegated to yt-dlp.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Flow error types
pub mod error;
/// Media extraction backends (yt-dlp)
pub mod extractor;
/// Link-to-download session flow
pub mod flow;
/// Supported link detection
pub mod links;
/// Telegram runtime entrypoint
pub mod runner;
/// Per-user pending request storage
pub mod session;
/// Fakes for exercising the flow without Telegram or yt-dlp
#[cfg(test)]
pub mod testing;
/// Utility functions
pub mod utils;
