use anyhow::Result;
use serenity::{
    http::Http,
    model::{gateway::GatewayIntents, id::GuildId},
    Client,
};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use phanbeats::{
    audio::{
        player::PlayerDeps, registry::VoiceStateRegistry, songbird_voice::SongbirdConnector,
    },
    bot::{controller::MusicController, PhanbeatsBot},
    config::Config,
    storage::LibraryStore,
    ui::embeds::ChannelNotifier,
};

fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phanbeats=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Phanbeats v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    // Biblioteca y playlists
    let store = Arc::new(LibraryStore::load(config.data_dir.clone(), &config.music_dir).await?);
    info!("{}", store.stats());

    let songbird = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));

    let deps = PlayerDeps {
        library: store.clone(),
        connector: Arc::new(SongbirdConnector::new(songbird.clone())),
        notifier: Arc::new(ChannelNotifier::new(http)),
        idle_timeout: config.idle_timeout,
        default_volume: config.default_volume,
    };
    let registry = Arc::new(VoiceStateRegistry::new(deps));

    let controller = Arc::new(
        MusicController::new(registry.clone(), store.clone(), store)
            .with_announce_channels(config.announce_channel_map()),
    );

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = PhanbeatsBot::new(config.clone(), controller);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        registry.reset(std::iter::empty::<GuildId>()).await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
