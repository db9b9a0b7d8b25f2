//! # Library Module
//!
//! Types shared between the playback core and the music library:
//! [`Song`], [`Playlist`] and the provider traits the core consumes.
//!
//! The core never reads the library files itself. It only asks a
//! [`LibraryProvider`] for songs and audio streams and a [`PlaylistProvider`]
//! for ordered lists of song ids. [`crate::storage::LibraryStore`] is the
//! production implementation; tests use in-memory doubles.

use async_trait::async_trait;
use regex::Regex;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use crate::error::{MusicError, MusicResult};

/// Identificador numérico de una canción (único dentro de la biblioteca)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SongId(pub u64);

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Referencia opaca a una fuente de audio decodificable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    path: PathBuf,
}

impl StreamHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Canción de la biblioteca. Inmutable una vez creada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    id: SongId,
    title: String,
    artist: String,
    duration: Duration,
    stream: StreamHandle,
}

impl Song {
    pub fn new(
        id: SongId,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration: Duration,
        stream: StreamHandle,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            duration,
            stream,
        }
    }

    // Getters
    pub fn id(&self) -> SongId {
        self.id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn artist(&self) -> &str {
        &self.artist
    }
    pub fn duration(&self) -> Duration {
        self.duration
    }
    pub fn stream(&self) -> &StreamHandle {
        &self.stream
    }

    /// Nombre con el que se muestra en las opciones de comando: `[12] Title`
    pub fn raw_name(&self) -> String {
        format!("[{}] {}", self.id, self.title)
    }

    /// Duración como `m:ss` o `h:mm:ss`
    pub fn duration_str(&self) -> String {
        format_duration(self.duration)
    }
}

/// Lista ordenada de canciones con nombre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: u64,
    pub name: String,
    pub song_ids: Vec<SongId>,
}

/// Acceso a la biblioteca de música local.
#[async_trait]
pub trait LibraryProvider: Send + Sync {
    /// Resuelve una canción por id. Falla con [`MusicError::NotFound`].
    fn song(&self, id: SongId) -> MusicResult<Song>;

    /// Todos los ids de la biblioteca en orden ascendente.
    fn all_song_ids(&self) -> Vec<SongId>;

    /// Obtiene el stream de audio de una canción encolada.
    async fn open_stream(&self, song: &Song) -> MusicResult<StreamHandle>;
}

/// Acceso a las playlists guardadas.
#[cfg_attr(test, mockall::automock)]
pub trait PlaylistProvider: Send + Sync {
    /// Falla con [`MusicError::NotFound`] si el id no existe.
    fn playlist(&self, id: u64) -> MusicResult<Playlist>;

    fn playlists(&self) -> Vec<Playlist>;
}

/// Extrae el id de una selección de canción.
///
/// Acepta tanto la forma mostrada en la lista (`[12] Bring Me To Life`) como un
/// id suelto (`12`).
pub fn parse_song_selection(selection: &str) -> MusicResult<SongId> {
    static SONG_ID_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = SONG_ID_REGEX.get_or_init(|| {
        Regex::new(r"^\s*\[(\d+)\]").expect("song id regex is valid")
    });

    let trimmed = selection.trim();
    let digits = match regex.captures(trimmed) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or_default(),
        None => trimmed,
    };

    match digits.parse::<u64>() {
        Ok(id) if id > 0 => Ok(SongId(id)),
        _ => Err(MusicError::InvalidArgument(format!(
            "`{}` is not a song from the library.",
            selection
        ))),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
