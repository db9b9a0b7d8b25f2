use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandData, CommandDataOption, CommandDataOptionValue, CommandInteraction},
        id::GuildId,
    },
    prelude::Context,
};
use tracing::{debug, info, warn};

use crate::{
    bot::{
        controller::{CommandContext, MusicController, Reply},
        PhanbeatsBot,
    },
    error::{MusicError, MusicResult},
    ui::embeds,
};

/// Comando slash ya parseado
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicCommand {
    Join,
    Leave,
    PlaySong(String),
    PlayAll,
    PlayPlaylist(u64),
    Volume(i64),
    Pause,
    Resume,
    Stop,
    Skip,
    Queue(usize),
    Loop,
    Shuffle,
    NowPlaying,
}

impl MusicCommand {
    pub fn parse(data: &CommandData) -> MusicResult<Self> {
        let command = match data.name.as_str() {
            "join" => Self::Join,
            "leave" => Self::Leave,
            "play" => Self::parse_play(&data.options)?,
            "volume" => Self::Volume(int_option(&data.options, "volume").ok_or_else(|| {
                MusicError::InvalidArgument("Please give a volume between 0 and 100.".to_string())
            })?),
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "stop" => Self::Stop,
            "skip" => Self::Skip,
            "queue" => {
                let page = int_option(&data.options, "page").unwrap_or(1);
                Self::Queue(usize::try_from(page).unwrap_or(0))
            }
            "loop" => Self::Loop,
            "shuffle" => Self::Shuffle,
            "nowplaying" => Self::NowPlaying,
            other => {
                return Err(MusicError::InvalidArgument(format!(
                    "Unknown command `/{}`.",
                    other
                )))
            }
        };
        Ok(command)
    }

    fn parse_play(options: &[CommandDataOption]) -> MusicResult<Self> {
        let missing = || MusicError::InvalidArgument("Please pick something to play.".to_string());

        let subcommand = options.first().ok_or_else(missing)?;
        let CommandDataOptionValue::SubCommand(sub_options) = &subcommand.value else {
            return Err(missing());
        };

        match subcommand.name.as_str() {
            "song" => sub_options
                .iter()
                .find(|opt| opt.name == "selection")
                .and_then(|opt| opt.value.as_str())
                .map(|selection| Self::PlaySong(selection.to_string()))
                .ok_or_else(missing),
            "all" => Ok(Self::PlayAll),
            "playlist" => int_option(sub_options, "selection")
                .and_then(|id| u64::try_from(id).ok())
                .map(Self::PlayPlaylist)
                .ok_or_else(missing),
            _ => Err(missing()),
        }
    }

    /// Comandos que pueden tardar (conexión de voz) y se difieren
    fn needs_defer(&self) -> bool {
        matches!(
            self,
            Self::Join | Self::PlaySong(_) | Self::PlayAll | Self::PlayPlaylist(_)
        )
    }
}

fn int_option(options: &[CommandDataOption], name: &str) -> Option<i64> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Ejecuta un comando sobre el controlador
pub async fn execute(
    controller: &MusicController,
    ctx: &CommandContext,
    command: MusicCommand,
) -> MusicResult<Reply> {
    match command {
        MusicCommand::Join => controller.join(ctx).await,
        MusicCommand::Leave => controller.leave(ctx).await,
        MusicCommand::PlaySong(selection) => controller.play_song(ctx, &selection).await,
        MusicCommand::PlayAll => controller.play_all(ctx).await,
        MusicCommand::PlayPlaylist(id) => controller.play_playlist(ctx, id).await,
        MusicCommand::Volume(percent) => controller.volume(ctx, percent).await,
        MusicCommand::Pause => controller.pause(ctx).await,
        MusicCommand::Resume => controller.resume(ctx).await,
        MusicCommand::Stop => controller.stop(ctx).await,
        MusicCommand::Skip => controller.skip(ctx).await,
        MusicCommand::Queue(page) => controller.queue(ctx, page).await,
        MusicCommand::Loop => controller.toggle_loop(ctx).await,
        MusicCommand::Shuffle => controller.shuffle(ctx).await,
        MusicCommand::NowPlaying => controller.now_playing(ctx).await,
    }
}

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &PhanbeatsBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("❌ This command can't be used in DM channels.")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let parsed = MusicCommand::parse(&command.data);
    let deferred = parsed.as_ref().is_ok_and(MusicCommand::needs_defer);

    if deferred {
        // Defer la respuesta ya que conectar puede tomar tiempo
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;
    }

    let command_ctx = command_context(ctx, &command, guild_id);
    let result = match parsed {
        Ok(parsed) => execute(bot.controller(), &command_ctx, parsed).await,
        Err(e) => Err(e),
    };

    let reply = result.unwrap_or_else(|e| {
        debug!("Comando /{} rechazado: {}", command.data.name, e);
        Reply::from_error(&e)
    });
    let embed = embeds::create_reply_embed(&reply);

    if deferred {
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
            .await?;
    } else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new().embed(embed),
                ),
            )
            .await?;
    }

    Ok(())
}

/// Resuelve quién llama, si es el dueño y en qué canal de voz está
fn command_context(ctx: &Context, command: &CommandInteraction, guild_id: GuildId) -> CommandContext {
    let (is_guild_owner, voice_channel) = match guild_id.to_guild_cached(&ctx.cache) {
        Some(guild) => (
            guild.owner_id == command.user.id,
            guild
                .voice_states
                .get(&command.user.id)
                .and_then(|voice_state| voice_state.channel_id),
        ),
        None => {
            warn!("Guild {} no encontrada en caché", guild_id);
            (false, None)
        }
    };

    CommandContext {
        guild_id,
        user_id: command.user.id,
        is_guild_owner,
        voice_channel,
        text_channel: command.channel_id,
    }
}
