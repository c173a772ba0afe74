// Standard library imports
use std::path::Path;
use std::sync::Arc;

// External crate imports
use anyhow::Result;
use dotenv::dotenv;
use log::{info, warn};

// Internal crate imports
use renko_scalper::config_loader::AppConfig;
use renko_scalper::infrastructure::bus::EventBus;
use renko_scalper::infrastructure::fix::session::FixHandler;
use renko_scalper::infrastructure::fix::{
    Credentials, FixApplication, Initiator, SandboxExecutor, SessionSettings,
};
use renko_scalper::strategies::renko_scalper::{RenkoScalper, ScalperConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    dotenv().ok();
    // Use a more explicit Builder that doesn't check environment variables
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .init();
    info!("Logger initialized");

    // Load configuration from TOML file (first try relative path, then alternate as backup)
    let config_path = Path::new("./config.toml");
    let config = match AppConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config from {}: {}", config_path.display(), e);
            let alt_path = Path::new("../config.toml");
            info!("Attempting to load from alternate path: {}", alt_path.display());
            AppConfig::from_file(alt_path)?
        }
    };

    run_engine(config).await
}

async fn run_engine(config: AppConfig) -> Result<()> {
    let bus = EventBus::new();
    bus.start();

    RenkoScalper::install(
        ScalperConfig {
            symbol: config.engine.symbol.clone(),
            brick_size: config.engine.renko_size,
            order_size: config.engine.order_size,
            max_position_held: config.engine.max_position_held,
            price_source: config.engine.price_source,
        },
        &bus,
    );

    let application = FixApplication::new(config.fix.account_id.clone(), bus.clone());
    application.install(&bus, config.engine.sandbox_execution);
    if config.engine.sandbox_execution {
        SandboxExecutor::new(bus.clone()).install(&bus);
    }

    let settings = SessionSettings::from_file(&config.fix.session_config)?;
    let initiator = Initiator::new(
        settings,
        Credentials {
            username: config.fix.username.clone(),
            password: config.fix.password.clone(),
        },
    );
    application.register_sessions(initiator.sessions());
    initiator.start(application.clone() as Arc<dyn FixHandler>)?;
    info!("Engine started, trading {}", config.engine.symbol);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    // Logout and stop the FIX sessions before the dispatcher so in-flight
    // reports still reach the strategy.
    initiator.stop().await;
    bus.stop();
    info!("Engine stopped");
    Ok(())
}
