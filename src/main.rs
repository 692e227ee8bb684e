mod app;
mod config;
mod conversation;
mod error;
mod event;
mod logging;
mod query;
mod session;
mod theme;

use app::QueryChatApp;
use config::ClientConfig;
use conversation::Conversation;
use eframe::egui;
use query::QueryClient;
use session::manager::SessionManager;
use session::store::ChatStore;
use std::sync::mpsc;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = ClientConfig::load()?;
    logging::init_logging(&config.log_level);
    info!(
        endpoint = %config.query_url(),
        data_dir = %config.data_dir.display(),
        "starting querychat"
    );

    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("querychat-runtime")
        .build()?;

    let store = ChatStore::open_or_memory(&config.storage_dir());
    let sessions = SessionManager::initialize(store);
    let client = QueryClient::new(config.query_url());
    let conversation = Conversation::new(sessions, client, runtime.handle().clone(), tx);

    let app = QueryChatApp::new(rx, conversation);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Query Chat")
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Query Chat",
        native_options,
        Box::new(move |_creation_context| Ok(Box::new(app))),
    )?;

    Ok(())
}
