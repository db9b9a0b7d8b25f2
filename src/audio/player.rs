use parking_lot::{Mutex, RwLock};
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::{QueueError, SongQueue},
        voice::{
            PlaybackEvent, PlaybackNotifier, TrackCompletion, TrackFinished, VoiceConnection,
            VoiceConnector,
        },
    },
    error::{MusicError, MusicResult},
    library::{LibraryProvider, Song},
};

/// Tiempo sin canciones nuevas antes de soltar la conexión de voz
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// Margen para que el bucle termine solo antes de abortarlo
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Sin conexión de voz
    Idle,
    /// Conectado, esperando la siguiente canción
    Waiting,
    /// Conectado con una canción actual (posiblemente en pausa)
    Playing,
    /// El bucle fue cancelado; estado terminal
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined(ChannelId),
    Moved(ChannelId),
}

/// Dependencias compartidas por los estados de todas las guilds.
#[derive(Clone)]
pub struct PlayerDeps {
    pub library: Arc<dyn LibraryProvider>,
    pub connector: Arc<dyn VoiceConnector>,
    pub notifier: Arc<dyn PlaybackNotifier>,
    pub idle_timeout: Duration,
    /// Volumen inicial (0.0 - 1.0)
    pub default_volume: f32,
}

/// Estado de voz de una guild.
///
/// Owns the guild's [`SongQueue`], its voice connection and the background
/// task that plays the queue. The task starts in [`GuildVoiceState::spawn`]
/// and only ends through [`GuildVoiceState::shutdown`] (or when the state is
/// dropped, which cancels it).
///
/// Each cycle of the task:
///
/// 1. keeps the current song if looping is on, otherwise waits on the queue
///    for at most the idle timeout (a timeout stops playback and releases
///    the connection, then the cycle starts again);
/// 2. resolves the song's stream and plays it through the connection;
/// 3. waits for the track's completion signal.
///
/// Songs that cannot be played are reported and skipped so the guild never
/// stalls.
pub struct GuildVoiceState {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    guild_id: GuildId,
    announce_channel: ChannelId,
    songs: SongQueue,
    current: RwLock<Option<Song>>,
    connection: RwLock<Option<Arc<dyn VoiceConnection>>>,
    /// Serializa conectar / mover / soltar la conexión
    connect_lock: tokio::sync::Mutex<()>,
    settings: Mutex<Settings>,
    shutdown: CancellationToken,
    deps: PlayerDeps,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    looping: bool,
    volume: f32,
}

struct Halted {
    was_playing: bool,
    disconnected: bool,
}

/// Cuenta las tareas de reproducción vivas mientras exista
struct TaskGuard(Arc<AtomicUsize>);

impl TaskGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GuildVoiceState {
    /// Crea el estado y arranca su bucle de reproducción.
    pub fn spawn(
        guild_id: GuildId,
        announce_channel: ChannelId,
        deps: PlayerDeps,
        live_tasks: Arc<AtomicUsize>,
    ) -> Arc<Self> {
        let shared = Arc::new(Shared {
            guild_id,
            announce_channel,
            songs: SongQueue::new(),
            current: RwLock::new(None),
            connection: RwLock::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            settings: Mutex::new(Settings {
                looping: false,
                volume: deps.default_volume,
            }),
            shutdown: CancellationToken::new(),
            deps,
        });

        let guard = TaskGuard::enter(live_tasks);
        let task = tokio::spawn({
            let shared = shared.clone();
            async move {
                let _guard = guard;
                shared.run().await;
            }
        });

        info!("🎛️ Estado de voz creado para guild {}", guild_id);

        Arc::new(Self {
            shared,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.shared.guild_id
    }

    /// Cola de canciones pendientes
    pub fn songs(&self) -> &SongQueue {
        &self.shared.songs
    }

    pub fn current(&self) -> Option<Song> {
        self.shared.current.read().clone()
    }

    /// La canción actual, solo si hay conexión para reproducirla
    pub fn now_playing(&self) -> Option<Song> {
        self.current().filter(|_| self.is_playing())
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connection.read().is_some()
    }

    pub fn connected_channel(&self) -> Option<ChannelId> {
        self.shared.connection().map(|connection| connection.channel())
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.shared.settings.lock().looping
    }

    /// Volumen actual (0.0 - 1.0)
    pub fn volume(&self) -> f32 {
        self.shared.settings.lock().volume
    }

    pub fn state(&self) -> PlayerState {
        if self.shared.shutdown.is_cancelled() {
            PlayerState::Stopped
        } else if !self.is_connected() {
            PlayerState::Idle
        } else if self.shared.current.read().is_some() {
            PlayerState::Playing
        } else {
            PlayerState::Waiting
        }
    }

    /// Conecta al canal de destino, o mueve la conexión si quien lo pide es
    /// el dueño del servidor.
    pub async fn join(
        &self,
        destination: ChannelId,
        caller_is_owner: bool,
    ) -> MusicResult<JoinOutcome> {
        let _guard = self.shared.connect_lock.lock().await;

        match self.shared.connection() {
            None => {
                self.shared.connect(destination).await?;
                Ok(JoinOutcome::Joined(destination))
            }
            Some(connection) if connection.channel() == destination => {
                Err(MusicError::AlreadyConnected(destination))
            }
            Some(connection) if caller_is_owner => {
                connection.move_to(destination).await?;
                info!(
                    "🔀 Conexión movida a {} en guild {}",
                    destination, self.shared.guild_id
                );
                Ok(JoinOutcome::Moved(destination))
            }
            Some(connection) => Err(MusicError::Unauthorized(connection.channel())),
        }
    }

    /// Conecta solo si no hay conexión. Nunca mueve al bot.
    pub async fn ensure_connected(&self, destination: ChannelId) -> MusicResult<ChannelId> {
        let _guard = self.shared.connect_lock.lock().await;

        if let Some(connection) = self.shared.connection() {
            return Ok(connection.channel());
        }
        self.shared.connect(destination).await?;
        Ok(destination)
    }

    /// Corta la canción actual; el bucle pasa a la siguiente por el mismo
    /// camino que un final natural.
    pub async fn skip(&self) -> MusicResult<Song> {
        let connection = self.shared.connection().ok_or(MusicError::NotConnected)?;
        let song = self.current().ok_or(MusicError::NothingPlaying)?;

        connection.stop().await;
        info!("⏭️ Saltada: {}", song.title());
        Ok(song)
    }

    pub async fn pause(&self) -> MusicResult<()> {
        let connection = self.shared.connection().ok_or(MusicError::NotConnected)?;

        if connection.is_playing().await {
            connection.pause().await?;
            info!("⏸️ Reproducción pausada en guild {}", self.shared.guild_id);
            Ok(())
        } else if connection.is_paused().await {
            Err(MusicError::AlreadyInState("paused"))
        } else {
            Err(MusicError::NothingPlaying)
        }
    }

    pub async fn resume(&self) -> MusicResult<()> {
        let connection = self.shared.connection().ok_or(MusicError::NotConnected)?;

        if connection.is_paused().await {
            connection.resume().await?;
            info!("▶️ Reproducción reanudada en guild {}", self.shared.guild_id);
            Ok(())
        } else if connection.is_playing().await {
            Err(MusicError::AlreadyInState("playing"))
        } else {
            Err(MusicError::NothingPlaying)
        }
    }

    /// Limpia la cola, apaga el loop, corta la reproducción y suelta la
    /// conexión. Devuelve si había algo sonando.
    pub async fn stop(&self) -> bool {
        self.shared.halt().await.was_playing
    }

    /// Ajusta el volumen en porcentaje (0 - 100).
    pub async fn set_volume(&self, percent: i64) -> MusicResult<f32> {
        if !(0..=100).contains(&percent) {
            return Err(MusicError::InvalidArgument(
                "Volume must be a number between 0 and 100. Please try again.".to_string(),
            ));
        }

        let volume = percent as f32 / 100.0;
        self.shared.settings.lock().volume = volume;

        if let Some(connection) = self.shared.connection() {
            if self.is_playing() {
                connection.set_volume(volume).await;
            }
        }

        info!("🔊 Volumen ajustado a {}% en guild {}", percent, self.shared.guild_id);
        Ok(volume)
    }

    /// Activa o desactiva la repetición de la canción actual.
    pub fn toggle_loop(&self) -> MusicResult<bool> {
        if !self.is_playing() {
            return Err(MusicError::NothingPlaying);
        }

        let mut settings = self.shared.settings.lock();
        settings.looping = !settings.looping;
        if settings.looping {
            info!("🔂 Repetir canción activado");
        } else {
            info!("➡️ Repetición desactivada");
        }
        Ok(settings.looping)
    }

    /// Detiene todo y termina el bucle de reproducción.
    ///
    /// Al volver, la tarea ya no está corriendo. Llamarlo de nuevo no hace nada.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.shared.halt().await;

        let task = self.task.lock().take();
        let Some(mut task) = task else {
            return;
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_panic() => {
                error!(
                    "💥 El bucle de reproducción de guild {} terminó con pánico: {:?}",
                    self.shared.guild_id, e
                );
            }
            Ok(Err(_)) => {}
            Err(_) => {
                warn!(
                    "⚠️ El bucle de guild {} no terminó a tiempo, abortando",
                    self.shared.guild_id
                );
                task.abort();
                let _ = task.await;
            }
        }

        info!("🛑 Estado de voz cerrado para guild {}", self.shared.guild_id);
    }
}

impl Drop for GuildVoiceState {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl Shared {
    fn connection(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.connection.read().clone()
    }

    fn is_playing(&self) -> bool {
        self.connection.read().is_some() && self.current.read().is_some()
    }

    /// Requiere `connect_lock`
    async fn connect(&self, destination: ChannelId) -> MusicResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(MusicError::NotConnected);
        }

        let connection = self.deps.connector.connect(self.guild_id, destination).await?;
        *self.connection.write() = Some(connection);

        info!("🔊 Conectado al canal {} en guild {}", destination, self.guild_id);
        Ok(())
    }

    async fn halt(&self) -> Halted {
        let _guard = self.connect_lock.lock().await;

        let was_playing = self.is_playing();
        self.settings.lock().looping = false;
        self.songs.clear();

        let connection = self.connection.write().take();
        self.current.write().take();

        let disconnected = connection.is_some();
        if let Some(connection) = connection {
            connection.stop().await;
            if let Err(e) = connection.disconnect().await {
                warn!("Error al desconectar en guild {}: {}", self.guild_id, e);
            }
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }

        Halted {
            was_playing,
            disconnected,
        }
    }

    async fn run(self: Arc<Self>) {
        debug!("▶️ Bucle de reproducción iniciado en guild {}", self.guild_id);

        while !self.shutdown.is_cancelled() {
            let Some(song) = self.next_song().await else {
                continue;
            };

            let Some(finished) = self.start(song.clone()).await else {
                continue;
            };

            debug!("⏳ Esperando a que termine: {}", song.title());
            let outcome = tokio::select! {
                outcome = finished => outcome,
                _ = self.shutdown.cancelled() => break,
            };

            match outcome {
                Some(reason) => {
                    error!(
                        "❌ Error reproduciendo '{}' en guild {}: {}",
                        song.title(),
                        self.guild_id,
                        reason
                    );
                    self.current.write().take();
                    self.notify(PlaybackEvent::PlaybackFailed {
                        song,
                        error: MusicError::PlaybackFailure(reason),
                    })
                    .await;
                }
                None => {
                    debug!("✅ Terminada: {}", song.title());
                    if !self.settings.lock().looping {
                        self.current.write().take();
                    }
                }
            }
        }

        debug!("⏹️ Bucle de reproducción terminado en guild {}", self.guild_id);
    }

    /// La canción actual si está en loop, o la siguiente de la cola.
    async fn next_song(&self) -> Option<Song> {
        let looped = {
            let settings = self.settings.lock();
            if settings.looping {
                self.current.read().clone()
            } else {
                None
            }
        };
        if let Some(song) = looped {
            debug!("🔂 Repitiendo: {}", song.title());
            return Some(song);
        }

        debug!("📭 Esperando una canción en guild {}...", self.guild_id);
        match self
            .songs
            .dequeue_timeout(&self.shutdown, self.deps.idle_timeout)
            .await
        {
            Ok(song) => {
                *self.current.write() = Some(song.clone());
                Some(song)
            }
            Err(QueueError::TimedOut) => {
                self.on_idle_timeout().await;
                None
            }
            Err(QueueError::Cancelled) => None,
        }
    }

    async fn on_idle_timeout(&self) {
        debug!(
            "⌛ Sin canciones en {:?} para guild {}",
            self.deps.idle_timeout, self.guild_id
        );

        if self.halt().await.disconnected {
            info!("💤 Desconectado por inactividad en guild {}", self.guild_id);
            self.notify(PlaybackEvent::IdleDisconnect).await;
        }
    }

    /// Empieza a reproducir `song`. `None` si se tuvo que saltar.
    async fn start(&self, song: Song) -> Option<TrackFinished> {
        let Some(connection) = self.connection() else {
            self.skip_failed(song, MusicError::NotConnected).await;
            return None;
        };

        let stream = match self.deps.library.open_stream(&song).await {
            Ok(stream) => stream,
            Err(e) => {
                self.skip_failed(song, e).await;
                return None;
            }
        };

        // Un stop / leave durante la resolución ya soltó la conexión y la canción
        let guard = self.connect_lock.lock().await;
        let still_active = self
            .connection()
            .is_some_and(|active| Arc::ptr_eq(&active, &connection))
            && self.current.read().is_some();
        if !still_active {
            debug!(
                "🗑️ Descartada '{}' en guild {}: la reproducción se detuvo",
                song.title(),
                self.guild_id
            );
            return None;
        }

        let volume = self.settings.lock().volume;
        let (completion, finished) = TrackCompletion::pair();
        let played = connection.play(stream, volume, completion).await;
        drop(guard);

        if let Err(e) = played {
            self.skip_failed(song, e).await;
            return None;
        }

        info!("🎵 Reproduciendo: {} en guild {}", song.title(), self.guild_id);
        self.notify(PlaybackEvent::NowPlaying(song)).await;
        Some(finished)
    }

    async fn skip_failed(&self, song: Song, error: MusicError) {
        warn!(
            "⏭️ Saltando '{}' en guild {}: {}",
            song.title(),
            self.guild_id,
            error
        );
        self.current.write().take();
        self.notify(PlaybackEvent::PlaybackFailed { song, error }).await;
    }

    async fn notify(&self, event: PlaybackEvent) {
        self.deps.notifier.notify(self.announce_channel, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{song, TestEnv, TEST_CHANNEL};
    use pretty_assertions::assert_eq;

    const OTHER_CHANNEL: ChannelId = ChannelId::new(777);

    fn spawn_state(env: &TestEnv) -> Arc<GuildVoiceState> {
        GuildVoiceState::spawn(
            GuildId::new(1),
            ChannelId::new(10),
            env.deps.clone(),
            env.live_tasks.clone(),
        )
    }

    #[tokio::test]
    async fn test_skip_advances_to_next_song() {
        let mut env = TestEnv::new(1..=3);
        let state = spawn_state(&env);
        state.join(TEST_CHANNEL, false).await.unwrap();

        for id in 1..=3 {
            state.songs().enqueue(song(id));
        }
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(1)));

        let skipped = state.skip().await.unwrap();
        assert_eq!(skipped.id().0, 1);

        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(2)));
        assert_eq!(state.current(), Some(song(2)));
        assert_eq!(state.songs().len(), 1);
    }

    #[tokio::test]
    async fn test_loop_keeps_current_song() {
        let mut env = TestEnv::new(1..=2);
        let state = spawn_state(&env);
        state.join(TEST_CHANNEL, false).await.unwrap();
        state.songs().enqueue(song(1));
        state.songs().enqueue(song(2));

        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(1)));
        assert_eq!(state.toggle_loop(), Ok(true));

        let connection = env.connector.last().unwrap();
        assert!(connection.finish(None));
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(1)));
        assert_eq!(state.songs().len(), 1);

        assert_eq!(state.toggle_loop(), Ok(false));
        assert!(connection.finish(None));
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(2)));
        assert!(state.songs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_releases_connection() {
        let mut env = TestEnv::new(1..=1);
        let state = spawn_state(&env);
        state.join(TEST_CHANNEL, false).await.unwrap();
        assert_eq!(state.state(), PlayerState::Waiting);

        assert_eq!(env.next_event().await, PlaybackEvent::IdleDisconnect);
        assert_eq!(state.state(), PlayerState::Idle);
        assert!(env.connector.last().unwrap().is_disconnected());
        assert_eq!(env.running_tasks(), 1);

        assert_eq!(
            state.join(TEST_CHANNEL, false).await,
            Ok(JoinOutcome::Joined(TEST_CHANNEL))
        );
        assert_eq!(env.connector.connections().len(), 2);

        state.songs().enqueue(song(1));
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(1)));
    }

    #[tokio::test]
    async fn test_stop_clears_queue_and_disconnects() {
        let mut env = TestEnv::new(1..=4);
        let state = spawn_state(&env);
        state.join(TEST_CHANNEL, false).await.unwrap();
        for id in 1..=3 {
            state.songs().enqueue(song(id));
        }
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(1)));

        assert!(state.stop().await);
        assert_eq!(state.songs().len(), 0);
        assert_eq!(state.current(), None);
        assert!(!state.is_looping());
        assert!(env.connector.last().unwrap().is_disconnected());

        // Idempotente
        assert!(!state.stop().await);

        state.join(TEST_CHANNEL, false).await.unwrap();
        state.songs().enqueue(song(4));
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(4)));
    }

    #[tokio::test]
    async fn test_volume_validation() {
        let env = TestEnv::new(1..=1);
        let state = spawn_state(&env);

        assert!(matches!(
            state.set_volume(-1).await,
            Err(MusicError::InvalidArgument(_))
        ));
        assert!(matches!(
            state.set_volume(101).await,
            Err(MusicError::InvalidArgument(_))
        ));
        assert_eq!(state.set_volume(0).await, Ok(0.0));
        assert_eq!(state.set_volume(100).await, Ok(1.0));
        assert_eq!(state.volume(), 1.0);
    }

    #[tokio::test]
    async fn test_volume_applies_to_playing_and_next_tracks() {
        let mut env = TestEnv::new(1..=2);
        let state = spawn_state(&env);
        state.join(TEST_CHANNEL, false).await.unwrap();
        state.songs().enqueue(song(1));
        state.songs().enqueue(song(2));
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(1)));

        let connection = env.connector.last().unwrap();
        assert_eq!(connection.volume(), 0.5);

        state.set_volume(30).await.unwrap();
        assert_eq!(connection.volume(), 0.3);

        connection.finish(None);
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(2)));
        assert_eq!(connection.volume(), 0.3);
    }

    #[tokio::test]
    async fn test_pause_and_resume_report_state() {
        let mut env = TestEnv::new(1..=1);
        let state = spawn_state(&env);

        assert_eq!(state.pause().await, Err(MusicError::NotConnected));

        state.join(TEST_CHANNEL, false).await.unwrap();
        assert_eq!(state.pause().await, Err(MusicError::NothingPlaying));
        assert_eq!(state.resume().await, Err(MusicError::NothingPlaying));

        state.songs().enqueue(song(1));
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(1)));

        assert_eq!(state.resume().await, Err(MusicError::AlreadyInState("playing")));
        assert_eq!(state.pause().await, Ok(()));
        assert_eq!(state.pause().await, Err(MusicError::AlreadyInState("paused")));
        assert_eq!(state.resume().await, Ok(()));
        assert_eq!(state.current(), Some(song(1)));
    }

    #[tokio::test]
    async fn test_unresolvable_stream_is_skipped() {
        let mut env = TestEnv::new(1..=2);
        env.library.break_stream(1);
        let state = spawn_state(&env);
        state.join(TEST_CHANNEL, false).await.unwrap();
        state.songs().enqueue(song(1));
        state.songs().enqueue(song(2));

        match env.next_event().await {
            PlaybackEvent::PlaybackFailed { song: failed, .. } => assert_eq!(failed.id().0, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(2)));
    }

    #[tokio::test]
    async fn test_stop_while_resolving_stream_drops_song() {
        let mut env = TestEnv::new(1..=2);
        let release = env.library.hold_stream(1);
        let state = spawn_state(&env);
        state.join(TEST_CHANNEL, false).await.unwrap();
        state.songs().enqueue(song(1));

        env.library.stream_requested().await;
        assert!(state.stop().await);
        release.notify_one();

        state.join(TEST_CHANNEL, false).await.unwrap();
        state.songs().enqueue(song(2));
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(2)));

        let connections = env.connector.connections();
        assert!(connections[0].played().is_empty());
        assert_eq!(connections[1].played(), vec![song(2).stream().clone()]);
    }

    #[tokio::test]
    async fn test_playback_failure_does_not_stall_loop() {
        let mut env = TestEnv::new(1..=2);
        let state = spawn_state(&env);
        state.join(TEST_CHANNEL, false).await.unwrap();
        state.songs().enqueue(song(1));
        state.songs().enqueue(song(2));
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(1)));

        env.connector.last().unwrap().finish(Some("decoder error"));

        assert_eq!(
            env.next_event().await,
            PlaybackEvent::PlaybackFailed {
                song: song(1),
                error: MusicError::PlaybackFailure("decoder error".to_string()),
            }
        );
        assert_eq!(env.next_event().await, PlaybackEvent::NowPlaying(song(2)));
    }

    #[tokio::test]
    async fn test_join_rules() {
        let env = TestEnv::new(1..=1);
        let state = spawn_state(&env);

        assert_eq!(
            state.join(TEST_CHANNEL, false).await,
            Ok(JoinOutcome::Joined(TEST_CHANNEL))
        );
        assert_eq!(
            state.join(TEST_CHANNEL, true).await,
            Err(MusicError::AlreadyConnected(TEST_CHANNEL))
        );
        assert_eq!(
            state.join(OTHER_CHANNEL, false).await,
            Err(MusicError::Unauthorized(TEST_CHANNEL))
        );
        assert_eq!(
            state.join(OTHER_CHANNEL, true).await,
            Ok(JoinOutcome::Moved(OTHER_CHANNEL))
        );
        assert_eq!(state.connected_channel(), Some(OTHER_CHANNEL));
        assert_eq!(env.connector.connections().len(), 1);

        assert_eq!(state.ensure_connected(TEST_CHANNEL).await, Ok(OTHER_CHANNEL));
    }

    #[tokio::test]
    async fn test_shutdown_ends_background_task() {
        let env = TestEnv::new(1..=1);
        let state = spawn_state(&env);
        state.join(TEST_CHANNEL, false).await.unwrap();
        assert_eq!(env.running_tasks(), 1);

        state.shutdown().await;
        assert_eq!(env.running_tasks(), 0);
        assert_eq!(state.state(), PlayerState::Stopped);
        assert!(env.connector.last().unwrap().is_disconnected());

        state.shutdown().await;
        assert_eq!(env.running_tasks(), 0);
        assert_eq!(state.join(TEST_CHANNEL, false).await, Err(MusicError::NotConnected));
    }
}
