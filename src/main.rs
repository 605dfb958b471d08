use rgenstudio::{logger, server, Config, StudioClient};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    logger::init()?;
    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = Config::from_env();
    let port = config.port.unwrap_or(8080);
    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), port);
    logger::log_config_info(&config);

    let client = match StudioClient::new(config) {
        Ok(client) => {
            log::info!("✅ Studio client initialized successfully");
            client
        }
        Err(e) => {
            log::error!("❌ Failed to initialize Studio client: {}", e);
            return Err(e.into());
        }
    };

    server::run(client, port).await?;
    Ok(())
}
