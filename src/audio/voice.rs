//! Traits at the boundary between the playback core and the voice layer.
//!
//! [`crate::audio::songbird_voice`] implements them over a real Discord voice
//! connection; the tests use in-memory fakes.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::oneshot;

use crate::{
    error::{MusicError, MusicResult},
    library::{Song, StreamHandle},
};

/// Abre conexiones de voz.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>>;
}

/// Una conexión de voz activa en una guild.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Canal al que está conectada
    fn channel(&self) -> ChannelId;

    async fn move_to(&self, channel_id: ChannelId) -> MusicResult<()>;

    async fn disconnect(&self) -> MusicResult<()>;

    /// Empieza a reproducir `stream`. `completion` se completa al terminar la
    /// pista, ya sea de forma natural, por `stop` o por error.
    async fn play(
        &self,
        stream: StreamHandle,
        volume: f32,
        completion: TrackCompletion,
    ) -> MusicResult<()>;

    async fn stop(&self);

    async fn pause(&self) -> MusicResult<()>;

    async fn resume(&self) -> MusicResult<()>;

    async fn set_volume(&self, volume: f32);

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;
}

/// Callback de fin de pista.
///
/// Si se descarta sin completar, el lado que espera lo trata como una pista
/// terminada sin error.
#[derive(Debug)]
pub struct TrackCompletion {
    tx: oneshot::Sender<Option<String>>,
}

impl TrackCompletion {
    /// Crea el par callback / señal de "pista terminada"
    pub fn pair() -> (Self, TrackFinished) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, TrackFinished { rx })
    }

    pub fn complete(self, error: Option<String>) {
        // El receptor puede no existir si la guild ya se cerró
        let _ = self.tx.send(error);
    }
}

/// Señal que espera el bucle de reproducción. Resuelve al error reportado, si
/// lo hubo.
#[derive(Debug)]
pub struct TrackFinished {
    rx: oneshot::Receiver<Option<String>>,
}

impl Future for TrackFinished {
    type Output = Option<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(None))
    }
}

/// Eventos que el bucle de reproducción publica hacia los usuarios.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    NowPlaying(Song),
    PlaybackFailed { song: Song, error: MusicError },
    IdleDisconnect,
}

/// Publica avisos de reproducción (por ejemplo, "Now Playing").
#[async_trait]
pub trait PlaybackNotifier: Send + Sync {
    async fn notify(&self, channel_id: ChannelId, event: PlaybackEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_reports_error() {
        let (completion, finished) = TrackCompletion::pair();
        completion.complete(Some("decoder error".to_string()));
        assert_eq!(finished.await, Some("decoder error".to_string()));
    }

    #[tokio::test]
    async fn test_dropped_completion_still_finishes() {
        let (completion, finished) = TrackCompletion::pair();
        drop(completion);
        assert_eq!(finished.await, None);
    }
}
