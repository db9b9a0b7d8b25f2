use async_trait::async_trait;
use serenity::{
    all::{Http, Timestamp},
    builder::{CreateEmbed, CreateEmbedFooter, CreateMessage},
    model::id::ChannelId,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    audio::voice::{PlaybackEvent, PlaybackNotifier},
    bot::controller::Reply,
    error::MusicError,
    library::Song,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Phanbeats";

/// Convierte la respuesta de un comando en un embed
pub fn create_reply_embed(reply: &Reply) -> CreateEmbed {
    let color = if reply.success {
        colors::MUSIC_PURPLE
    } else {
        colors::ERROR_RED
    };

    let mut embed = CreateEmbed::default().color(color);

    if let Some(title) = &reply.title {
        embed = embed.title(title);
    }
    if !reply.description.is_empty() {
        embed = embed.description(&reply.description);
    }

    embed = embed.fields(
        reply
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.value.clone(), field.inline)),
    );

    embed.footer(CreateEmbedFooter::new(
        reply.footer.as_deref().unwrap_or(STANDARD_FOOTER),
    ))
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(song: &Song) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", song.title()))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artist", song.artist(), true)
        .field("⏱️ Duration", format!("```{}```", song.duration_str()), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_playback_failed_embed(song: &Song, error: &MusicError) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Playback Failed")
        .description(format!("Skipping **{}**.\n{}", song.title(), error))
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_idle_disconnect_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("💤 Music Bot Disconnected")
        .description("Nothing was queued for a while, so the music bot left the voice channel.")
        .color(colors::WARNING_ORANGE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_playback_event_embed(event: &PlaybackEvent) -> CreateEmbed {
    match event {
        PlaybackEvent::NowPlaying(song) => create_now_playing_embed(song),
        PlaybackEvent::PlaybackFailed { song, error } => create_playback_failed_embed(song, error),
        PlaybackEvent::IdleDisconnect => create_idle_disconnect_embed(),
    }
}

/// Publica los avisos de reproducción en el canal de anuncios de la guild
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PlaybackNotifier for ChannelNotifier {
    async fn notify(&self, channel_id: ChannelId, event: PlaybackEvent) {
        let message = CreateMessage::new().embed(create_playback_event_embed(&event));

        match channel_id.send_message(&*self.http, message).await {
            Ok(_) => debug!("📨 Aviso enviado a {}", channel_id),
            Err(e) => error!("Error enviando aviso a {}: {:?}", channel_id, e),
        }
    }
}
