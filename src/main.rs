use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use warp::Filter;

use fotovault::config::Config;
use fotovault::db;
use fotovault::db_user::bootstrap_default_users;
use fotovault::events::LogNotifier;
use fotovault::handlers_batch::batch_routes;
use fotovault::handlers_health::health_routes;
use fotovault::handlers_session::session_routes;
use fotovault::photo_delete::DiskRemover;
use fotovault::warp_helpers::{cors, handle_rejection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env()?;
    let port = config.port;
    let addr: SocketAddr = format!("{}:{}", config.host, port).parse()?;

    info!("Starting fotovault server on {}", addr);
    info!("Database: {}", config.db_path);
    info!("Originals: {}", config.originals_path);

    if !is_port_available(addr) {
        error!(
            "Port {} is already in use. Please stop any existing fotovault instances or use a different port.",
            port
        );
        return Err(format!("Port {} is already in use", port).into());
    }

    let db_pool = db::create_db_pool(&config.db_path)?;
    bootstrap_default_users(&db_pool)?;
    info!("Default users seeded");

    let notifier = Arc::new(LogNotifier) as Arc<dyn fotovault::events::ChangeNotifier>;
    let remover = Arc::new(DiskRemover::new(config.originals_path.clone()))
        as Arc<dyn fotovault::photo_delete::FileRemover>;

    let routes = health_routes(db_pool.clone())
        .or(session_routes(db_pool.clone(), config.clone()))
        .or(batch_routes(db_pool, config, notifier, remover))
        .with(cors())
        .with(warp::log("fotovault"))
        .recover(handle_rejection);

    info!("Server started successfully, listening on http://{}", addr);

    warp::serve(routes).run(addr).await;

    Ok(())
}

fn is_port_available(addr: SocketAddr) -> bool {
    TcpListener::bind(addr).is_ok()
}
