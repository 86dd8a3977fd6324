use crate::bot::handlers::{
    handle_callback, handle_command, handle_text, is_link_candidate, Command,
};
use crate::bot::transport::{ChatTransport, TelegramTransport};
use crate::config::Settings;
use crate::extractor::{MediaExtractor, YtDlpExtractor};
use crate::flow::SessionFlow;
use crate::session::SessionStore;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

/// Run the Telegram bot until Ctrl-C.
pub async fn run_bot(settings: Arc<Settings>) {
    let bot = Bot::new(settings.telegram_token.clone());

    let extractor = init_extractor(&settings).await;
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(bot.clone()));
    let sessions = init_sessions(&settings);
    let flow = Arc::new(SessionFlow::new(
        transport.clone(),
        extractor,
        sessions,
        settings.clone(),
    ));

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![flow, transport])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn init_extractor(settings: &Settings) -> Arc<dyn MediaExtractor> {
    let extractor = YtDlpExtractor::new(settings.ytdlp_path.clone());
    match extractor.version().await {
        Ok(version) => info!("yt-dlp {version} found at '{}'.", settings.ytdlp_path),
        Err(e) => warn!(
            "yt-dlp probe failed ({e}); downloads will fail until '{}' is available.",
            settings.ytdlp_path
        ),
    }
    Arc::new(extractor)
}

fn init_sessions(settings: &Settings) -> SessionStore {
    info!(
        "Initializing SessionStore (ttl: {}s, max_size: {})",
        settings.session_ttl_secs, settings.session_max_capacity
    );
    SessionStore::new(settings.session_ttl(), settings.session_max_capacity)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some_and(is_link_candidate))
                        .endpoint(handle_text),
                ),
        )
}
