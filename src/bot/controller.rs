//! Guild-level command operations.
//!
//! [`MusicController`] turns a slash command, already resolved into a
//! [`CommandContext`], into calls on the guild's
//! [`GuildVoiceState`](crate::audio::player::GuildVoiceState) and returns a
//! [`Reply`] descriptor. It never talks to Discord; `bot::handlers` renders
//! the reply with `ui::embeds`.

use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};

use crate::{
    audio::{
        player::{GuildVoiceState, JoinOutcome},
        registry::VoiceStateRegistry,
    },
    error::{MusicError, MusicResult},
    library::{
        format_duration, parse_song_selection, LibraryProvider, PlaylistProvider, Song, SongId,
    },
};

/// Canciones por página en `/queue`
pub const QUEUE_PAGE_SIZE: usize = 10;

/// Quién llama y desde dónde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub is_guild_owner: bool,
    /// Canal de voz del usuario, si está en uno
    pub voice_channel: Option<ChannelId>,
    /// Canal de texto donde se invocó el comando
    pub text_channel: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub current_page: usize,
    pub total_pages: usize,
}

/// Respuesta a un comando, independiente de Discord
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub success: bool,
    pub title: Option<String>,
    pub description: String,
    pub fields: Vec<ReplyField>,
    pub footer: Option<String>,
    pub paging: Option<Paging>,
}

impl Reply {
    pub fn text(description: impl Into<String>) -> Self {
        Self {
            success: true,
            title: None,
            description: description.into(),
            fields: Vec::new(),
            footer: None,
            paging: None,
        }
    }

    pub fn titled(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::text(description)
        }
    }

    pub fn from_error(error: &MusicError) -> Self {
        Self {
            success: false,
            ..Self::titled("Oops!", error.to_string())
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(ReplyField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

pub struct MusicController {
    registry: Arc<VoiceStateRegistry>,
    library: Arc<dyn LibraryProvider>,
    playlists: Arc<dyn PlaylistProvider>,
    announce_channels: HashMap<GuildId, ChannelId>,
}

impl MusicController {
    pub fn new(
        registry: Arc<VoiceStateRegistry>,
        library: Arc<dyn LibraryProvider>,
        playlists: Arc<dyn PlaylistProvider>,
    ) -> Self {
        Self {
            registry,
            library,
            playlists,
            announce_channels: HashMap::new(),
        }
    }

    /// Canales fijos para los anuncios de reproducción. Sin entrada, se usa
    /// el canal del comando que creó el estado de la guild.
    pub fn with_announce_channels(mut self, channels: HashMap<GuildId, ChannelId>) -> Self {
        self.announce_channels = channels;
        self
    }

    pub fn registry(&self) -> &Arc<VoiceStateRegistry> {
        &self.registry
    }

    fn caller_channel(ctx: &CommandContext) -> MusicResult<ChannelId> {
        ctx.voice_channel.ok_or(MusicError::NotInVoiceChannel)
    }

    fn state(&self, ctx: &CommandContext) -> Arc<GuildVoiceState> {
        let announce = self
            .announce_channels
            .get(&ctx.guild_id)
            .copied()
            .unwrap_or(ctx.text_channel);
        self.registry.get_or_create(ctx.guild_id, announce)
    }

    pub async fn join(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        let destination = Self::caller_channel(ctx)?;
        let state = self.state(ctx);

        let text = match state.join(destination, ctx.is_guild_owner).await? {
            JoinOutcome::Joined(channel) => format!("The music bot has joined <#{}>!", channel),
            JoinOutcome::Moved(channel) => format!("The music bot was moved to <#{}>!", channel),
        };
        Ok(Reply::titled("Music Bot Initialized", text))
    }

    pub async fn leave(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;

        let connected = self
            .registry
            .get(ctx.guild_id)
            .is_some_and(|state| state.is_connected());

        // El estado se cierra aunque no haya conexión (p. ej. tras inactividad)
        self.registry.leave(ctx.guild_id).await;
        if !connected {
            return Err(MusicError::NotConnected);
        }

        Ok(Reply::titled(
            "Music Bot Disconnected",
            "The music bot has been disconnected.",
        ))
    }

    pub async fn play_song(&self, ctx: &CommandContext, selection: &str) -> MusicResult<Reply> {
        let destination = Self::caller_channel(ctx)?;
        let song = parse_song_selection(selection)
            .and_then(|id| self.library.song(id))
            .map_err(|_| {
                MusicError::InvalidArgument(format!(
                    "`{}` is not a song from the library.",
                    selection
                ))
            })?;

        let state = self.state(ctx);
        state.ensure_connected(destination).await?;

        let title = song.title().to_string();
        let duration = song.duration_str();
        state.songs().enqueue(song);
        info!("➕ Agregada a la cola de guild {}: {}", ctx.guild_id, title);

        Ok(Reply::text(format!("Added `{}` to the queue.", title))
            .field("Duration", duration, true)
            .field("Position", state.songs().len().to_string(), true))
    }

    pub async fn play_all(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        let destination = Self::caller_channel(ctx)?;
        let songs = self.resolve_songs(self.library.all_song_ids());
        if songs.is_empty() {
            return Err(MusicError::InvalidArgument(
                "The music library is empty.".to_string(),
            ));
        }

        let state = self.state(ctx);
        state.ensure_connected(destination).await?;

        let added = state.songs().extend(songs);
        info!("📚 {} canciones agregadas en guild {}", added, ctx.guild_id);

        Ok(Reply::text("Added all songs to the queue!").field("Songs", added.to_string(), true))
    }

    pub async fn play_playlist(&self, ctx: &CommandContext, playlist_id: u64) -> MusicResult<Reply> {
        let destination = Self::caller_channel(ctx)?;
        let playlist = self.playlists.playlist(playlist_id).map_err(|_| {
            MusicError::InvalidArgument(format!("`{}` is not a saved playlist.", playlist_id))
        })?;

        let songs = self.resolve_songs(playlist.song_ids.iter().copied());
        if songs.is_empty() {
            return Err(MusicError::InvalidArgument(format!(
                "The playlist `{}` has no playable songs.",
                playlist.name
            )));
        }

        let state = self.state(ctx);
        state.ensure_connected(destination).await?;

        let added = state.songs().extend(songs);
        info!(
            "📋 Playlist '{}' agregada en guild {} ({} canciones)",
            playlist.name, ctx.guild_id, added
        );

        Ok(Reply::text(format!("Added `{}` to the queue!", playlist.name))
            .field("Songs", added.to_string(), true))
    }

    fn resolve_songs(&self, ids: impl IntoIterator<Item = SongId>) -> Vec<Song> {
        ids.into_iter()
            .filter_map(|id| match self.library.song(id) {
                Ok(song) => Some(song),
                Err(e) => {
                    warn!("Canción {} no disponible: {}", id, e);
                    None
                }
            })
            .collect()
    }

    pub async fn volume(&self, ctx: &CommandContext, percent: i64) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;
        self.state(ctx).set_volume(percent).await?;
        Ok(Reply::text(format!("Volume set to {}%", percent)))
    }

    pub async fn pause(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;
        let state = self.registry.get(ctx.guild_id).ok_or(MusicError::NotConnected)?;
        state.pause().await?;
        Ok(Reply::text("The music bot has been paused."))
    }

    pub async fn resume(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;
        let state = self.registry.get(ctx.guild_id).ok_or(MusicError::NotConnected)?;
        state.resume().await?;
        Ok(Reply::text("The music bot has now resumed."))
    }

    pub async fn stop(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;
        let state = self.registry.get(ctx.guild_id).ok_or(MusicError::NothingPlaying)?;

        if state.stop().await {
            Ok(Reply::text(
                "The music bot has been stopped and looping has been turned off.",
            ))
        } else {
            Err(MusicError::NothingPlaying)
        }
    }

    pub async fn skip(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;
        let state = self.registry.get(ctx.guild_id).ok_or(MusicError::NothingPlaying)?;
        let skipped = state.skip().await?;
        Ok(Reply::text(format!("Skipped `{}`.", skipped.title())))
    }

    pub async fn queue(&self, ctx: &CommandContext, page: usize) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;
        let state = self.registry.get(ctx.guild_id).ok_or(MusicError::EmptyQueue)?;
        if state.songs().is_empty() {
            return Err(MusicError::EmptyQueue);
        }

        let listing = state.songs().page(page, QUEUE_PAGE_SIZE);
        if page == 0 || page > listing.total_pages {
            return Err(MusicError::InvalidArgument(format!(
                "Page {} does not exist. The queue has {} page(s).",
                page, listing.total_pages
            )));
        }

        let (titles, artists): (Vec<String>, Vec<String>) = listing
            .songs
            .iter()
            .enumerate()
            .map(|(i, song)| {
                (
                    format!("`{}.`  {}", listing.first_position + i, song.title()),
                    format!("`{}`", song.artist()),
                )
            })
            .unzip();

        let summary = format!(
            "{} songs, {} in total",
            listing.total_items,
            format_duration(state.songs().total_duration())
        );
        let mut reply = Reply::titled("Songs in Queue", summary)
            .field("Song", titles.join("\n"), true)
            .field("Artist", artists.join("\n"), true);
        reply.footer = Some(format!(
            "Viewing page {}/{}",
            listing.current_page, listing.total_pages
        ));
        reply.paging = Some(Paging {
            current_page: listing.current_page,
            total_pages: listing.total_pages,
        });
        Ok(reply)
    }

    pub async fn toggle_loop(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;
        let state = self.registry.get(ctx.guild_id).ok_or(MusicError::NothingPlaying)?;

        let text = if state.toggle_loop()? {
            "The current song will now loop."
        } else {
            "Looping has been turned off for the current song."
        };
        Ok(Reply::text(text))
    }

    pub async fn shuffle(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;
        let state = self.registry.get(ctx.guild_id).ok_or(MusicError::EmptyQueue)?;
        if state.songs().is_empty() {
            return Err(MusicError::EmptyQueue);
        }

        state.songs().shuffle();
        Ok(Reply::text("The queue has been shuffled."))
    }

    pub async fn now_playing(&self, ctx: &CommandContext) -> MusicResult<Reply> {
        Self::caller_channel(ctx)?;
        let state = self.registry.get(ctx.guild_id).ok_or(MusicError::NothingPlaying)?;
        let song = state.now_playing().ok_or(MusicError::NothingPlaying)?;

        let looping = if state.is_looping() { "On" } else { "Off" };
        Ok(Reply::titled("Now Playing", format!("**{}**", song.title()))
            .field("Artist", song.artist(), true)
            .field("Duration", song.duration_str(), true)
            .field("Loop", looping, true)
            .field("Up next", state.songs().len().to_string(), true))
    }
}
