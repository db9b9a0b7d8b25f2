use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tracing::{debug, info};

use crate::audio::player::{GuildVoiceState, PlayerDeps};

/// Estados de voz por guild.
///
/// `None` marca una guild conocida sin estado todavía. La creación pasa por
/// el lock de la entrada del `DashMap`, así que dos comandos simultáneos de la
/// misma guild nunca crean dos estados.
pub struct VoiceStateRegistry {
    states: DashMap<GuildId, Option<Arc<GuildVoiceState>>>,
    deps: PlayerDeps,
    live_tasks: Arc<AtomicUsize>,
}

impl VoiceStateRegistry {
    pub fn new(deps: PlayerDeps) -> Self {
        Self {
            states: DashMap::new(),
            deps,
            live_tasks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Devuelve el estado de la guild, creándolo (y arrancando su bucle) si
    /// no existe.
    pub fn get_or_create(
        &self,
        guild_id: GuildId,
        announce_channel: ChannelId,
    ) -> Arc<GuildVoiceState> {
        let spawn = || {
            GuildVoiceState::spawn(
                guild_id,
                announce_channel,
                self.deps.clone(),
                self.live_tasks.clone(),
            )
        };

        match self.states.entry(guild_id) {
            Entry::Occupied(mut entry) => match entry.get() {
                Some(state) => state.clone(),
                None => {
                    let state = spawn();
                    entry.insert(Some(state.clone()));
                    state
                }
            },
            Entry::Vacant(entry) => {
                let state = spawn();
                entry.insert(Some(state.clone()));
                state
            }
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildVoiceState>> {
        self.states.get(&guild_id).and_then(|entry| entry.clone())
    }

    /// Separa el estado de la guild. Quien llama ya debe haberlo cerrado.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<GuildVoiceState>> {
        self.states
            .get_mut(&guild_id)
            .and_then(|mut entry| entry.take())
    }

    /// Cierra y separa el estado de la guild. Sin estado no hace nada.
    pub async fn leave(&self, guild_id: GuildId) -> bool {
        let Some(state) = self.remove(guild_id) else {
            debug!("Guild {} sin estado de voz, nada que cerrar", guild_id);
            return false;
        };

        state.shutdown().await;
        info!("👋 Estado de voz eliminado para guild {}", guild_id);
        true
    }

    /// Cierra el estado solo si sigue conectado a `channel_id`.
    ///
    /// Un aviso de desconexión atrasado no debe tirar una conexión nueva.
    pub async fn leave_if_connected_to(&self, guild_id: GuildId, channel_id: ChannelId) -> bool {
        let matches = self
            .get(guild_id)
            .is_some_and(|state| state.connected_channel() == Some(channel_id));
        if !matches {
            debug!(
                "Desconexión de {} en guild {} ignorada: ya no es la conexión activa",
                channel_id, guild_id
            );
            return false;
        }

        self.leave(guild_id).await
    }

    /// Reinicio tras reconectar: cierra los estados vivos y marca cada guild
    /// conocida como sin estado.
    pub async fn reset(&self, guild_ids: impl IntoIterator<Item = GuildId>) {
        let live: Vec<Arc<GuildVoiceState>> = self
            .states
            .iter_mut()
            .filter_map(|mut entry| entry.value_mut().take())
            .collect();

        futures::future::join_all(live.iter().map(|state| state.shutdown())).await;

        for guild_id in guild_ids {
            self.states.insert(guild_id, None);
        }

        info!(
            "🔄 Registro de voz reiniciado ({} guilds, {} estados cerrados)",
            self.states.len(),
            live.len()
        );
    }

    /// Tareas de reproducción corriendo ahora mismo
    pub fn running_tasks(&self) -> usize {
        self.live_tasks.load(Ordering::SeqCst)
    }

    pub fn active_guilds(&self) -> Vec<GuildId> {
        self.states
            .iter()
            .filter(|entry| entry.value().is_some())
            .map(|entry| *entry.key())
            .collect()
    }
}
