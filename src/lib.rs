//! # Phanbeats
//!
//! Discord music bot that plays a local music library.
//!
//! - [`audio`]: per-guild queue, playback loop, registry and voice layer
//! - [`bot`]: slash commands, interaction handling and the command controller
//! - [`library`] / [`storage`]: song and playlist model, JSON-backed store
//! - [`config`]: environment configuration
//! - [`ui`]: embeds and the channel notifier

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod library;
pub mod storage;
pub mod ui;

#[cfg(test)]
mod testing;
