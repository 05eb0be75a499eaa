use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::info;

use crate::{
    billing::BillingRepository,
    config::Config,
    directory::DirectoryRepository,
    error::AppResult,
    notifications::Notifier,
    payments::{
        provider::{PaymentGateway, WaveClient},
        webhook::WaveWebhookProcessor,
        PaymentLifecycle, PaymentRepository,
    },
    transactions::TransactionRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub billing: Arc<BillingRepository>,
    pub payments: Arc<PaymentRepository>,
    pub transactions: Arc<TransactionRepository>,
    pub directory: Arc<DirectoryRepository>,
    pub notifier: Notifier,
    pub gateway: Arc<dyn PaymentGateway>,
    pub lifecycle: Arc<PaymentLifecycle>,
    pub webhooks: Arc<WaveWebhookProcessor>,
}

pub async fn initialize_app_state(config: Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // Database pool
    let pool = initialize_database(&config.database_url).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("✅ Database migrations applied");

    // Repositories
    let billing = Arc::new(BillingRepository::new(pool.clone()));
    let payments = Arc::new(PaymentRepository::new(pool.clone()));
    let transactions = Arc::new(TransactionRepository::new(pool.clone()));
    let directory = Arc::new(DirectoryRepository::new(pool.clone()));
    let notifier = Notifier::new(pool.clone());

    // Wave gateway client with a bounded per-call timeout
    let gateway: Arc<dyn PaymentGateway> = Arc::new(WaveClient::new(
        config.wave_api_url.clone(),
        config.wave_api_key.clone(),
        Duration::from_secs(config.wave_timeout_secs),
    )?);
    info!("✅ Wave gateway client initialized ({})", config.wave_api_url);

    // Payment lifecycle service
    let lifecycle = Arc::new(PaymentLifecycle::new(
        billing.clone(),
        payments.clone(),
        directory.clone(),
        gateway.clone(),
        notifier.clone(),
    ));

    // Webhook reconciliation
    let webhooks = Arc::new(WaveWebhookProcessor::new(
        payments.clone(),
        transactions.clone(),
        directory.clone(),
        lifecycle.clone(),
        gateway.clone(),
        notifier.clone(),
    ));

    info!("✅ Application state initialized");

    Ok(AppState {
        config: Arc::new(config),
        billing,
        payments,
        transactions,
        directory,
        notifier,
        gateway,
        lifecycle,
        webhooks,
    })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    info!("✅ Database pool connected");
    Ok(pool)
}
