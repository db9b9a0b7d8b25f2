use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    #[serde(with = "humantime_serde_compat")]
    pub idle_timeout: Duration,

    // Rendimiento
    pub worker_threads: usize,

    // Paths
    pub data_dir: PathBuf,
    pub music_dir: PathBuf,
    pub channels_file: Option<PathBuf>,

    /// Canal de anuncios por guild (guild id → channel id)
    pub announce_channels: HashMap<u64, u64>,
}

/// Formato de la tabla `[channels]` del archivo de canales
#[derive(Debug, Default, Deserialize)]
struct ChannelsFile {
    #[serde(default)]
    channels: HashMap<String, u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let channels_file: Option<PathBuf> = std::env::var("CHANNELS_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(Into::into);

        let announce_channels = match &channels_file {
            Some(path) => load_announce_channels(path)?,
            None => HashMap::new(),
        };

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID no definido")?
                .parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            idle_timeout: humantime::parse_duration(
                &std::env::var("IDLE_TIMEOUT").unwrap_or_else(|_| "180s".to_string()),
            )
            .context("IDLE_TIMEOUT inválido (ejemplos: 180s, 3m)")?,

            // Rendimiento
            worker_threads: match std::env::var("WORKER_THREADS") {
                Ok(val) if !val.trim().is_empty() => val.parse()?,
                _ => num_cpus::get(),
            },

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "/app/data".to_string())
                .into(),
            music_dir: std::env::var("MUSIC_DIR")
                .unwrap_or_else(|_| "/app/music".to_string())
                .into(),
            channels_file,
            announce_channels,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Idle timeout must be greater than zero
    /// - At least one worker thread
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 1.0, got: {}",
                self.default_volume
            );
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.worker_threads == 0 {
            anyhow::bail!("Worker threads must be greater than 0");
        }

        Ok(())
    }

    /// Canales de anuncios configurados. Ignora ids en cero.
    pub fn announce_channel_map(&self) -> HashMap<GuildId, ChannelId> {
        self.announce_channels
            .iter()
            .filter(|(&guild, &channel)| guild != 0 && channel != 0)
            .map(|(&guild, &channel)| (GuildId::new(guild), ChannelId::new(channel)))
            .collect()
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, idle timeout {}\n  \
            Paths: data {}, music {}\n  \
            Runtime: {} worker threads, {} announcement channels",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0).round() as u32,
            humantime::format_duration(self.idle_timeout),
            self.data_dir.display(),
            self.music_dir.display(),
            self.worker_threads,
            self.announce_channels.len()
        )
    }
}

/// Lee la tabla `[channels]` (guild id → canal de anuncios) de un archivo TOML.
///
/// ```toml
/// [channels]
/// "123456789012345678" = 234567890123456789
/// ```
///
/// Un archivo inexistente equivale a una tabla vacía.
pub fn load_announce_channels(path: &Path) -> Result<HashMap<u64, u64>> {
    let settings = config::Config::builder()
        .add_source(
            config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(false),
        )
        .build()
        .with_context(|| format!("no se pudo leer {}", path.display()))?;

    let file: ChannelsFile = settings
        .try_deserialize()
        .with_context(|| format!("tabla [channels] inválida en {}", path.display()))?;

    file.channels
        .into_iter()
        .map(|(guild, channel)| {
            let guild = guild
                .trim()
                .parse::<u64>()
                .with_context(|| format!("id de guild inválido en [channels]: {}", guild))?;
            Ok((guild, channel))
        })
        .collect()
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Audio defaults
            default_volume: 0.5,
            idle_timeout: Duration::from_secs(180),

            // Performance defaults
            worker_threads: num_cpus::get(),

            // Path defaults
            data_dir: "/app/data".into(),
            music_dir: "/app/music".into(),
            channels_file: None,
            announce_channels: HashMap::new(),
        }
    }
}

/// `Duration` como texto humantime (`"3m"`) al serializar la configuración
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.idle_timeout, Duration::from_secs(180));
        assert!(config.summary().contains("50% vol, idle timeout 3m"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let loud = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(loud.validate().is_err());

        let no_timeout = Config {
            idle_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(no_timeout.validate().is_err());

        let no_threads = Config {
            worker_threads: 0,
            ..Config::default()
        };
        assert!(no_threads.validate().is_err());
    }

    #[test]
    fn test_load_announce_channels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[channels]\n\"111\" = 222\n\"333\" = 444\n",
        )
        .unwrap();

        let channels = load_announce_channels(&path).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels.get(&111), Some(&222));

        let config = Config {
            announce_channels: channels,
            ..Config::default()
        };
        let map = config.announce_channel_map();
        assert_eq!(map.get(&GuildId::new(333)), Some(&ChannelId::new(444)));
        assert_eq!(map.get(&GuildId::new(999)), None);
    }

    #[test]
    fn test_missing_channels_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let channels = load_announce_channels(&dir.path().join("missing.toml")).unwrap();
        assert!(channels.is_empty());
    }
}
