//! # Audio Module
//!
//! Per-guild playback core of the bot.
//!
//! ## Architecture
//!
//! ### [`queue`] - Song Queue
//! - Thread-safe FIFO shared by the command tasks and one playback loop
//! - Blocking dequeue with cancellation and idle timeout
//! - Paged snapshots, shuffle and clear
//!
//! ### [`player`] - Guild Voice State
//! - Owns the queue, the current track, loop/volume settings and the voice
//!   connection of one guild
//! - Runs the background loop that plays the queue until the guild leaves
//!
//! ### [`registry`] - Voice State Registry
//! - Guild id → state map with atomic get-or-create
//!
//! ### [`voice`] / [`songbird_voice`] - Voice Layer
//! - Traits the core drives, and their songbird implementation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use phanbeats::audio::{player::PlayerDeps, registry::VoiceStateRegistry};
//! use serenity::all::{ChannelId, GuildId};
//!
//! # async fn example(deps: PlayerDeps) -> anyhow::Result<()> {
//! let registry = VoiceStateRegistry::new(deps);
//! let state = registry.get_or_create(GuildId::new(123456789), ChannelId::new(42));
//!
//! state.ensure_connected(ChannelId::new(987654321)).await?;
//! state.set_volume(80).await?;
//! state.pause().await?;
//! state.resume().await?;
//!
//! registry.leave(GuildId::new(123456789)).await;
//! # Ok(())
//! # }
//! ```

pub mod player;
pub mod queue;
pub mod registry;
pub mod songbird_voice;
pub mod voice;
