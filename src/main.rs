use account_service::core::MessageBroker;
use account_service::utils::{logger, validation::Validate};
use account_service::{
    BrokerHub, CliArgs, InMemoryBroker, InMemoryStore, ProviderRegistry, SeedData, ServiceConfig,
};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default(),
    };

    if config.is_json_logging() {
        logger::init_json_logger(if args.verbose { "debug" } else { config.logging.level.as_str() });
    } else {
        logger::init_logger(args.verbose);
    }

    tracing::info!(service = %config.service.name, "starting account service");
    if args.verbose {
        tracing::debug!("config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("configuration validation failed: {}", e);
        eprintln!("{}", e.user_friendly_message());
        std::process::exit(1);
    }

    let store = InMemoryStore::new();
    if let Some(path) = &args.seed {
        let seed = SeedData::from_file(path)?;
        if let Err(e) = store.load(seed).await {
            tracing::error!("seed data rejected: {}", e);
            eprintln!("{}", e.user_friendly_message());
            std::process::exit(1);
        }
    }

    let broker = match InMemoryBroker::initialize(
        BrokerHub::new(),
        &config.broker.address,
        config.broker_options(),
    )
    .await
    {
        Ok(broker) => Arc::new(broker),
        Err(e) => {
            tracing::error!("broker initialization failed: {}", e);
            eprintln!("{}", e.user_friendly_message());
            std::process::exit(2);
        }
    };

    let registry = ProviderRegistry::new(
        broker.clone(),
        store.repositories(),
        config.query_defaults(),
        config.registration_policy(),
    );

    // startup continues with whatever registered
    if let Err(e) = registry.register_all().await {
        tracing::warn!("{}", e);
    }
    tracing::info!(
        registered = registry.registered().await.len(),
        "account service ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    registry.shutdown().await;
    broker.dispose().await?;
    Ok(())
}
