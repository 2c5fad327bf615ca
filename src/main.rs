use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;

use ipscout::api;
use ipscout::core::error_logger::{DbErrorSink, ErrorSink};
use ipscout::core::{config, init_logger};
use ipscout::geo::{GeoProvider, IpstackClient};
use ipscout::storage::db::create_pool;
use ipscout::storage::migrations::run_migrations;
use ipscout::storage::{get_connection, users};
use ipscout::telegram::send::{MessageSink, TelegramSink};
use ipscout::telegram::{create_bot, run_update_loop, setup_bot_commands, Engine};

/// Main entry point for the bot.
///
/// Brings up configuration, storage and the two long-running halves of the
/// process: the REST API (spawned) and the sequential update loop (run in
/// the foreground until the update stream ends).
///
/// # Errors
/// Returns an error if initialization fails (configuration, logging,
/// database, bot creation) — the only fatal failures in the process.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    init_logger()?;

    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) environment variable not set");
    }
    let admin_tg_id = config::admin::initial_admin_id()?;

    // Storage: pool, schema, initial admin
    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH)
            .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );
    {
        let mut conn = get_connection(&db_pool)?;
        run_migrations(&mut conn)?;
        users::seed_admin(&conn, admin_tg_id)?;
    }
    log::info!("Database ready at {}", *config::DATABASE_PATH);

    // Telegram bootstrap
    let bot = create_bot()?;
    let me = bot.get_me().await?;
    log::info!("Authorized on account {}", me.username.as_deref().unwrap_or("<unnamed>"));
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    // REST façade, served concurrently with the update loop
    let api_port = *config::api::PORT;
    let api_db = Arc::clone(&db_pool);
    tokio::spawn(async move {
        if let Err(e) = api::start_api_server(api_port, api_db).await {
            log::error!("API server error: {}", e);
        }
    });

    // Conversation engine over the production collaborators
    let sink: Arc<dyn MessageSink> = Arc::new(TelegramSink::new(bot.clone()));
    let geo: Arc<dyn GeoProvider> = Arc::new(IpstackClient::from_env()?);
    let errors: Arc<dyn ErrorSink> = Arc::new(DbErrorSink::new(Arc::clone(&db_pool)));
    let engine = Engine::new(db_pool, sink, geo, errors);

    run_update_loop(bot, me.id, engine).await
}
