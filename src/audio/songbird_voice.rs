use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{File, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{
    audio::voice::{TrackCompletion, VoiceConnection, VoiceConnector},
    error::{MusicError, MusicResult},
    library::StreamHandle,
};

/// Abre conexiones de voz a través de Songbird
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| {
                error!("Error al conectar al canal de voz: {:?}", e);
                MusicError::Connection(e.to_string())
            })?;

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);

        Ok(Arc::new(SongbirdConnection {
            manager: self.manager.clone(),
            guild_id,
            call,
            channel: RwLock::new(channel_id),
            track: Mutex::new(None),
        }))
    }
}

/// Conexión de voz de una guild sobre un `Call` de Songbird
pub struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    channel: RwLock<ChannelId>,
    track: Mutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    fn current_track(&self) -> Option<TrackHandle> {
        self.track.lock().clone()
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.current_track()?;
        track.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel(&self) -> ChannelId {
        *self.channel.read()
    }

    async fn move_to(&self, channel_id: ChannelId) -> MusicResult<()> {
        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| MusicError::Connection(e.to_string()))?;
        *self.channel.write() = channel_id;
        Ok(())
    }

    async fn disconnect(&self) -> MusicResult<()> {
        self.track.lock().take();
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| MusicError::Connection(e.to_string()))
    }

    async fn play(
        &self,
        stream: StreamHandle,
        volume: f32,
        completion: TrackCompletion,
    ) -> MusicResult<()> {
        let input: Input = File::new(stream.path().to_path_buf()).into();

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        handle
            .set_volume(volume)
            .map_err(|e| MusicError::PlaybackFailure(e.to_string()))?;

        // Fin y error comparten el mismo callback; el primero que llegue lo usa
        let completion = Arc::new(Mutex::new(Some(completion)));
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        guild_id: self.guild_id,
                        completion: completion.clone(),
                    },
                )
                .map_err(|e| MusicError::PlaybackFailure(e.to_string()))?;
        }

        *self.track.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(track) = self.track.lock().take() {
            let _ = track.stop();
        }
    }

    async fn pause(&self) -> MusicResult<()> {
        let track = self.current_track().ok_or(MusicError::NothingPlaying)?;
        track
            .pause()
            .map_err(|e| MusicError::PlaybackFailure(e.to_string()))
    }

    async fn resume(&self) -> MusicResult<()> {
        let track = self.current_track().ok_or(MusicError::NothingPlaying)?;
        track
            .play()
            .map_err(|e| MusicError::PlaybackFailure(e.to_string()))
    }

    async fn set_volume(&self, volume: f32) {
        if let Some(track) = self.current_track() {
            let _ = track.set_volume(volume);
        }
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }
}

/// Completa el `TrackCompletion` cuando Songbird termina la pista
struct TrackEndNotifier {
    guild_id: GuildId,
    completion: Arc<Mutex<Option<TrackCompletion>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let failure = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{:?}", e)),
                _ => None,
            }),
            _ => None,
        };

        if let Some(completion) = self.completion.lock().take() {
            debug!(
                "Pista terminada en guild {} (error: {:?})",
                self.guild_id, failure
            );
            completion.complete(failure);
        }

        // Eliminar el handler tras el primer disparo
        Some(Event::Cancel)
    }
}
