//! In-memory doubles for the library and voice layers, shared by the unit
//! tests of the audio and bot modules.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{mpsc, Notify};

use crate::{
    audio::{
        player::{PlayerDeps, DEFAULT_IDLE_TIMEOUT},
        voice::{
            PlaybackEvent, PlaybackNotifier, TrackCompletion, VoiceConnection, VoiceConnector,
        },
    },
    error::{MusicError, MusicResult},
    library::{LibraryProvider, Song, SongId, StreamHandle},
};

pub const TEST_CHANNEL: ChannelId = ChannelId::new(500);

pub fn song(id: u64) -> Song {
    Song::new(
        SongId(id),
        format!("Song {}", id),
        format!("Artist {}", id),
        Duration::from_secs(180 + id),
        StreamHandle::new(format!("/music/{}.mp3", id)),
    )
}

#[derive(Default)]
pub struct FakeLibrary {
    songs: BTreeMap<SongId, Song>,
    broken: Mutex<HashSet<SongId>>,
    held: Mutex<HashMap<SongId, Arc<Notify>>>,
    requested: Notify,
}

impl FakeLibrary {
    pub fn with_songs(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            songs: ids.into_iter().map(|id| (SongId(id), song(id))).collect(),
            broken: Mutex::default(),
            held: Mutex::default(),
            requested: Notify::new(),
        }
    }

    /// Hace que el stream de la canción no se pueda abrir
    pub fn break_stream(&self, id: u64) {
        self.broken.lock().insert(SongId(id));
    }

    /// Retiene la apertura del stream de la canción hasta que se notifique
    /// el `Notify` devuelto
    pub fn hold_stream(&self, id: u64) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.held.lock().insert(SongId(id), release.clone());
        release
    }

    /// Espera a que alguien pida un stream retenido
    pub async fn stream_requested(&self) {
        self.requested.notified().await;
    }
}

#[async_trait]
impl LibraryProvider for FakeLibrary {
    fn song(&self, id: SongId) -> MusicResult<Song> {
        self.songs
            .get(&id)
            .cloned()
            .ok_or_else(|| MusicError::NotFound(format!("song {}", id)))
    }

    fn all_song_ids(&self) -> Vec<SongId> {
        self.songs.keys().copied().collect()
    }

    async fn open_stream(&self, song: &Song) -> MusicResult<StreamHandle> {
        let held = self.held.lock().remove(&song.id());
        if let Some(release) = held {
            self.requested.notify_one();
            release.notified().await;
        }

        if self.broken.lock().contains(&song.id()) {
            return Err(MusicError::NotFound(format!(
                "the audio file of {}",
                song.raw_name()
            )));
        }
        Ok(song.stream().clone())
    }
}

#[derive(Default)]
pub struct FakeConnector {
    connections: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeConnector {
    pub fn connections(&self) -> Vec<Arc<FakeConnection>> {
        self.connections.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<FakeConnection>> {
        self.connections.lock().last().cloned()
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn VoiceConnection>> {
        let connection = Arc::new(FakeConnection::new(channel_id));
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

pub struct FakeConnection {
    channel: Mutex<ChannelId>,
    track: Mutex<Option<TrackCompletion>>,
    played: Mutex<Vec<StreamHandle>>,
    paused: AtomicBool,
    disconnected: AtomicBool,
    volume: Mutex<f32>,
}

impl FakeConnection {
    fn new(channel_id: ChannelId) -> Self {
        Self {
            channel: Mutex::new(channel_id),
            track: Mutex::new(None),
            played: Mutex::default(),
            paused: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            volume: Mutex::new(0.0),
        }
    }

    /// Termina la pista actual como lo haría la capa de audio
    pub fn finish(&self, error: Option<&str>) -> bool {
        match self.track.lock().take() {
            Some(completion) => {
                completion.complete(error.map(str::to_string));
                true
            }
            None => false,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn played(&self) -> Vec<StreamHandle> {
        self.played.lock().clone()
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn channel(&self) -> ChannelId {
        *self.channel.lock()
    }

    async fn move_to(&self, channel_id: ChannelId) -> MusicResult<()> {
        *self.channel.lock() = channel_id;
        Ok(())
    }

    async fn disconnect(&self) -> MusicResult<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        self.finish(None);
        Ok(())
    }

    async fn play(
        &self,
        stream: StreamHandle,
        volume: f32,
        completion: TrackCompletion,
    ) -> MusicResult<()> {
        if self.is_disconnected() {
            return Err(MusicError::NotConnected);
        }
        self.played.lock().push(stream);
        *self.volume.lock() = volume;
        self.paused.store(false, Ordering::SeqCst);
        *self.track.lock() = Some(completion);
        Ok(())
    }

    async fn stop(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.finish(None);
    }

    async fn pause(&self) -> MusicResult<()> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> MusicResult<()> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume;
    }

    async fn is_playing(&self) -> bool {
        self.track.lock().is_some() && !self.paused.load(Ordering::SeqCst)
    }

    async fn is_paused(&self) -> bool {
        self.track.lock().is_some() && self.paused.load(Ordering::SeqCst)
    }
}

pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<PlaybackEvent>,
}

#[async_trait]
impl PlaybackNotifier for RecordingNotifier {
    async fn notify(&self, _channel_id: ChannelId, event: PlaybackEvent) {
        let _ = self.tx.send(event);
    }
}

/// Dependencias falsas más los extremos para observarlas
pub struct TestEnv {
    pub deps: PlayerDeps,
    pub library: Arc<FakeLibrary>,
    pub connector: Arc<FakeConnector>,
    pub live_tasks: Arc<AtomicUsize>,
    events: mpsc::UnboundedReceiver<PlaybackEvent>,
}

impl TestEnv {
    pub fn new(song_ids: impl IntoIterator<Item = u64>) -> Self {
        let library = Arc::new(FakeLibrary::with_songs(song_ids));
        let connector = Arc::new(FakeConnector::default());
        let (tx, events) = mpsc::unbounded_channel();

        Self {
            deps: PlayerDeps {
                library: library.clone(),
                connector: connector.clone(),
                notifier: Arc::new(RecordingNotifier { tx }),
                idle_timeout: DEFAULT_IDLE_TIMEOUT,
                default_volume: 0.5,
            },
            library,
            connector,
            live_tasks: Arc::new(AtomicUsize::new(0)),
            events,
        }
    }

    pub async fn next_event(&mut self) -> PlaybackEvent {
        tokio::time::timeout(Duration::from_secs(600), self.events.recv())
            .await
            .expect("timed out waiting for a playback event")
            .expect("notifier channel closed")
    }

    pub fn running_tasks(&self) -> usize {
        self.live_tasks.load(Ordering::SeqCst)
    }
}
