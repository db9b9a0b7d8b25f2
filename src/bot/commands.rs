use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Todos los comandos slash del bot
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        play_command(),
        volume_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        skip_command(),
        queue_command(),
        loop_command(),
        shuffle_command(),
        nowplaying_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Connects the music bot to your voice channel")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Disconnects the music bot from its voice channel")
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Use this to play music")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "song",
                "Plays a single song from the library",
            )
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "selection",
                    "The song to play, as its ID or `[ID] Title`",
                )
                .required(true),
            ),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "all",
            "Plays the entire music library",
        ))
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "playlist",
                "Plays a saved playlist",
            )
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "selection",
                    "The ID of the playlist to play",
                )
                .min_int_value(1)
                .required(true),
            ),
        )
}

// Comandos de control

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Changes the volume of the music bot from 0% to 100%")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "volume", "Volume (0-100)")
                .min_int_value(0)
                .max_int_value(100)
                .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pauses the music bot")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resumes the music bot if paused")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stops the music bot and clears the queue")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skips the current song")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Shows the current song queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Enter page")
                .min_int_value(1),
        )
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Toggles looping for the current song")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Shuffles the queue")
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Shows the song that is playing right now")
}
