use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{MusicError, MusicResult};
use crate::library::{
    format_duration, LibraryProvider, Playlist, PlaylistProvider, Song, SongId, StreamHandle,
};

const LIBRARY_FILE: &str = "library.json";
const PLAYLISTS_FILE: &str = "playlists.json";

/// Entrada de `library.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongRecord {
    pub title: String,
    #[serde(default)]
    pub artist: String,
    pub duration_secs: u64,
    pub filepath: PathBuf,
}

/// Entrada de `playlists.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub name: String,
    #[serde(default)]
    pub song_ids: Vec<u64>,
}

/// Biblioteca de música y playlists cargadas desde archivos JSON.
///
/// Both files are keyed by numeric id written as a string:
///
/// ```json
/// { "12": { "title": "Numb", "artist": "Linkin Park", "duration_secs": 185, "filepath": "numb.mp3" } }
/// { "1": { "name": "Gym", "song_ids": [12, 4] } }
/// ```
///
/// Relative song paths are resolved against the music directory. A missing
/// file loads as an empty collection.
pub struct LibraryStore {
    data_dir: PathBuf,
    songs: BTreeMap<SongId, Song>,
    playlists: BTreeMap<u64, Playlist>,
}

impl LibraryStore {
    pub async fn load(data_dir: PathBuf, music_dir: &Path) -> Result<Self> {
        // Crear directorio de datos si no existe
        fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("no se pudo crear {}", data_dir.display()))?;

        let songs = load_songs(&data_dir.join(LIBRARY_FILE), music_dir).await?;
        let playlists = load_playlists(&data_dir.join(PLAYLISTS_FILE)).await?;

        info!(
            "📁 Biblioteca cargada desde {}: {} canciones, {} playlists",
            data_dir.display(),
            songs.len(),
            playlists.len()
        );

        Ok(Self {
            data_dir,
            songs,
            playlists,
        })
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            songs: self.songs.len(),
            playlists: self.playlists.len(),
            total_duration: self.songs.values().map(Song::duration).sum(),
            data_dir: self.data_dir.clone(),
        }
    }
}

async fn read_json<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> Result<T> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        warn!("📂 {} no existe, se usa una colección vacía", path.display());
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("no se pudo leer {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("JSON inválido en {}", path.display()))
}

/// Ids de las claves JSON; descarta las que no son un entero positivo
fn parse_key(key: &str, file: &Path) -> Option<u64> {
    match key.trim().parse::<u64>() {
        Ok(id) if id > 0 => Some(id),
        _ => {
            warn!("Id inválido '{}' en {}, ignorado", key, file.display());
            None
        }
    }
}

async fn load_songs(path: &Path, music_dir: &Path) -> Result<BTreeMap<SongId, Song>> {
    let records: BTreeMap<String, SongRecord> = read_json(path).await?;

    Ok(records
        .into_iter()
        .filter_map(|(key, record)| {
            let id = SongId(parse_key(&key, path)?);
            let filepath = if record.filepath.is_absolute() {
                record.filepath
            } else {
                music_dir.join(record.filepath)
            };
            let song = Song::new(
                id,
                record.title,
                record.artist,
                Duration::from_secs(record.duration_secs),
                StreamHandle::new(filepath),
            );
            Some((id, song))
        })
        .collect())
}

async fn load_playlists(path: &Path) -> Result<BTreeMap<u64, Playlist>> {
    let records: BTreeMap<String, PlaylistRecord> = read_json(path).await?;

    Ok(records
        .into_iter()
        .filter_map(|(key, record)| {
            let id = parse_key(&key, path)?;
            let playlist = Playlist {
                id,
                name: record.name,
                song_ids: record.song_ids.into_iter().map(SongId).collect(),
            };
            Some((id, playlist))
        })
        .collect())
}

#[async_trait]
impl LibraryProvider for LibraryStore {
    fn song(&self, id: SongId) -> MusicResult<Song> {
        self.songs
            .get(&id)
            .cloned()
            .ok_or_else(|| MusicError::NotFound(format!("a song with id {}", id)))
    }

    fn all_song_ids(&self) -> Vec<SongId> {
        self.songs.keys().copied().collect()
    }

    async fn open_stream(&self, song: &Song) -> MusicResult<StreamHandle> {
        let stream = song.stream();
        match fs::try_exists(stream.path()).await {
            Ok(true) => Ok(stream.clone()),
            _ => Err(MusicError::NotFound(format!(
                "the audio file of {}",
                song.raw_name()
            ))),
        }
    }
}

impl PlaylistProvider for LibraryStore {
    fn playlist(&self, id: u64) -> MusicResult<Playlist> {
        self.playlists
            .get(&id)
            .cloned()
            .ok_or_else(|| MusicError::NotFound(format!("a playlist with id {}", id)))
    }

    fn playlists(&self) -> Vec<Playlist> {
        self.playlists.values().cloned().collect()
    }
}

/// Estadísticas de la biblioteca cargada
#[derive(Debug)]
pub struct StorageStats {
    pub songs: usize,
    pub playlists: usize,
    pub total_duration: Duration,
    pub data_dir: PathBuf,
}

impl std::fmt::Display for StorageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "📊 Library Stats:\n\
             📁 Data Directory: {}\n\
             🎵 Songs: {} ({})\n\
             📝 Playlists: {}",
            self.data_dir.display(),
            self.songs,
            format_duration(self.total_duration),
            self.playlists
        )
    }
}
