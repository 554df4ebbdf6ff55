use std::sync::Arc;

use platform_adapters::{
    Platform, StaticCredentialSource, facebook::FacebookAdapter, instagram::InstagramAdapter,
    zoom::ZoomAdapter,
};
use resilient_client::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use castguard::alert::{AlertDispatcher, LogNotifier, OwnerContacts, StaticContactResolver};
use castguard::config::AppConfig;
use castguard::database;
use castguard::database::repositories::{SqlxAnalyticsRepository, SqlxBroadcastRepository};
use castguard::monitor::AdapterMap;
use castguard::monitor::health::HealthMonitor;
use castguard::monitor::quality::{QualityMonitor, SimulatedMetricsSource};
use castguard::supervisor::MonitorSupervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // Initialize logging
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "castguard=debug,sqlx=warn".into()),
    );
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Initialize database
    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let broadcasts = Arc::new(SqlxBroadcastRepository::new(pool.clone()));
    let analytics = Arc::new(SqlxAnalyticsRepository::new(pool.clone()));

    let adapters = Arc::new(build_adapters());
    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::new(LogNotifier),
        Arc::new(StaticContactResolver::new(owner_contacts())),
        analytics.clone(),
    ));

    let health = Arc::new(HealthMonitor::new(
        broadcasts.clone(),
        analytics.clone(),
        adapters,
        dispatcher.clone(),
        config.health.clone(),
    ));
    let quality = Arc::new(QualityMonitor::new(
        broadcasts,
        analytics,
        Arc::new(SimulatedMetricsSource),
        dispatcher,
        config.quality.clone(),
    ));

    let supervisor = MonitorSupervisor::new(health, quality);
    let handles = supervisor.spawn();
    tracing::info!("castguard monitoring started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    supervisor.shutdown();
    for handle in handles {
        handle.await?;
    }

    Ok(())
}

/// Build an adapter per platform that has credentials configured.
fn build_adapters() -> AdapterMap {
    let mut adapters = AdapterMap::new();

    if let (Ok(token), Ok(user_id)) = (
        std::env::var("ZOOM_API_TOKEN"),
        std::env::var("ZOOM_USER_ID"),
    ) {
        adapters.insert(
            Platform::Zoom,
            Arc::new(ZoomAdapter::new(
                ClientConfig::default(),
                Box::new(StaticCredentialSource::new(token)),
                user_id,
            )),
        );
    }

    if let (Ok(token), Ok(page_id)) = (
        std::env::var("FACEBOOK_ACCESS_TOKEN"),
        std::env::var("FACEBOOK_PAGE_ID"),
    ) {
        adapters.insert(
            Platform::Facebook,
            Arc::new(FacebookAdapter::new(
                ClientConfig::default(),
                Box::new(StaticCredentialSource::new(token)),
                page_id,
            )),
        );
    }

    if let (Ok(token), Ok(account_id)) = (
        std::env::var("INSTAGRAM_ACCESS_TOKEN"),
        std::env::var("INSTAGRAM_ACCOUNT_ID"),
    ) {
        adapters.insert(
            Platform::Instagram,
            Arc::new(InstagramAdapter::new(
                ClientConfig::default(),
                Box::new(StaticCredentialSource::new(token)),
                account_id,
            )),
        );
    }

    if adapters.is_empty() {
        tracing::warn!("no platform adapters configured, health checks will report errors");
    }
    adapters
}

/// Alert recipients from the environment.
fn owner_contacts() -> OwnerContacts {
    OwnerContacts {
        emails: env_list("ALERT_EMAILS"),
        phone_numbers: env_list("ALERT_PHONE_NUMBERS"),
        push_targets: env_list("ALERT_PUSH_TARGETS"),
        webhook_url: std::env::var("ALERT_WEBHOOK_URL").ok(),
        organisation_id: std::env::var("ORGANISATION_ID").unwrap_or_else(|_| "default".into()),
        branch_id: std::env::var("BRANCH_ID").ok(),
    }
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
