//! # Bot Module
//!
//! Discord side of Phanbeats.
//!
//! - [`commands`]: slash command definitions and registration
//! - [`handlers`]: interaction parsing, dispatch and responses
//! - [`controller`]: the guild-level command operations, free of Discord types
//!
//! [`PhanbeatsBot`] implements Serenity's [`EventHandler`]. It owns the
//! [`MusicController`] and, through it, the voice state registry.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod controller;
pub mod handlers;

use crate::{bot::controller::MusicController, config::Config};

pub struct PhanbeatsBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    controller: Arc<MusicController>,
}

impl PhanbeatsBot {
    pub fn new(config: Config, controller: Arc<MusicController>) -> Self {
        Self {
            config: Arc::new(config),
            controller,
        }
    }

    pub fn controller(&self) -> &MusicController {
        &self.controller
    }

    /// Registra los comandos slash en la guild de desarrollo o globalmente.
    ///
    /// - **Guild commands**: ~1 second propagation time
    /// - **Global commands**: ~1 hour propagation time
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                let guild_id = GuildId::new(guild_id);

                // Verificar que el bot esté en la guild
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for PhanbeatsBot {
    /// Reinicia el registro de voz con las guilds conocidas y registra los
    /// comandos. Se ejecuta también tras cada reconexión.
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        self.controller
            .registry()
            .reset(ready.guilds.iter().map(|guild| guild.id))
            .await;

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Si alguien desconecta al bot a mano, cierra el estado de la guild.
    ///
    /// Solo cuenta si el estado sigue conectado al canal que se abandonó: las
    /// desconexiones propias (stop, inactividad) ya soltaron esa conexión.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };
        let Some(left_channel) = old.and_then(|old| old.channel_id) else {
            return;
        };

        if self
            .controller
            .registry()
            .leave_if_connected_to(guild_id, left_channel)
            .await
        {
            info!(
                "🔌 Bot desconectado externamente de {} en guild {}",
                left_channel, guild_id
            );
        }
    }
}
