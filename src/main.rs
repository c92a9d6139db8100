use tracing::{error, info};

use warden::{AppState, Collaborators, Config, WebServer};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env();
            config
        }
    };

    if let Err(e) = warden::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        warden::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> warden::Result<()> {
    info!("warden {}", env!("CARGO_PKG_VERSION"));

    let collaborators = Collaborators::from_config(&config).await?;
    let state = AppState::new(&config, collaborators)?;
    let server = WebServer::new(&config, state)?;

    info!("Server configured on {}", server.addr());
    server.run().await
}
