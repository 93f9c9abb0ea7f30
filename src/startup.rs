//! Application startup and lifecycle management.
//!
//! Wires configuration into adapters, builds the reconciler and handlers, and
//! runs the HTTP server, the bot dispatcher and the webhook purge task until
//! shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use teloxide::Bot;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapters::http::{membership_router, MembershipAppState};
use crate::adapters::memory::{InMemoryProcessedWebhookStore, InMemoryUserRecordStore};
use crate::adapters::postgres::{
    run_migrations, PostgresProcessedWebhookStore, PostgresUserRecordStore,
};
use crate::adapters::stripe::{StripeConfig, StripePaymentGateway};
use crate::adapters::telegram::{run_dispatcher, TelegramAccessNotifier};
use crate::adapters::video::{VdoCipherConfig, VdoCipherVideoProvider};
use crate::application::handlers::membership::{
    BotCommandHandler, HandlePaymentWebhookHandler, OpenBillingPortalHandler,
    VerifyVideoAccessHandler,
};
use crate::application::reconciler::{ReconcilerTimeouts, SubscriptionReconciler};
use crate::config::{AppConfig, ConfigError, DatabaseConfig, ServerConfig, ValidationError};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{
    PaymentError, PaymentGateway, ProcessedWebhookStore, UserRecordStore, VideoError,
};

/// Grace period for the bot dispatcher after the HTTP server stops.
const DISPATCHER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Errors that stop the application from starting or running.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store setup failed: {0}")]
    Store(#[from] DomainError),

    #[error("Payment gateway setup failed: {0}")]
    Payment(#[from] PaymentError),

    #[error("Video provider setup failed: {0}")]
    Video(#[from] VideoError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `server.log_level`. Production logs are JSON.
pub fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    listener: TcpListener,
    router: axum::Router,
    bot: Bot,
    bot_handler: Arc<BotCommandHandler>,
    reconciler: Arc<SubscriptionReconciler>,
    processed: Arc<dyn ProcessedWebhookStore>,
    retention_days: u32,
    purge_interval: Duration,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AppConfig) -> Result<Self, StartupError> {
        config.validate()?;

        let (store, processed) = build_stores(config.database.as_ref()).await?;

        let gateway_timeout = config.reconciler.gateway_timeout();
        let store_timeout = config.reconciler.store_timeout();

        let payment = &config.payment;
        let gateway: Arc<dyn PaymentGateway> = Arc::new(StripePaymentGateway::new(
            StripeConfig::new(
                payment.stripe_api_key.clone(),
                payment.stripe_webhook_secret.clone(),
                payment.stripe_price_id.clone(),
            )
            .with_redirect_urls(payment.success_url.clone(), payment.cancel_url.clone())
            .with_base_url(payment.api_base_url.clone())
            .with_require_livemode(payment.require_livemode)
            .with_request_timeout(gateway_timeout),
        )?);

        let videos = Arc::new(VdoCipherVideoProvider::new(
            VdoCipherConfig::new(config.video.api_secret.clone())
                .with_base_url(config.video.api_base_url.clone())
                .with_otp_ttl_secs(config.video.otp_ttl_secs)
                .with_request_timeout(gateway_timeout),
        )?);

        let bot = Bot::new(config.telegram.bot_token.clone());
        let notifier = Arc::new(TelegramAccessNotifier::new(
            bot.clone(),
            config.telegram.group_chat_id,
        ));

        let reconciler = Arc::new(SubscriptionReconciler::new(
            store,
            Arc::clone(&gateway),
            notifier,
            ReconcilerTimeouts {
                gateway: gateway_timeout,
                store: store_timeout,
                notifier: config.reconciler.notifier_timeout(),
            },
        ));

        let state = MembershipAppState {
            webhook_handler: Arc::new(HandlePaymentWebhookHandler::new(
                Arc::clone(&reconciler),
                Arc::clone(&gateway),
                Arc::clone(&processed),
                store_timeout,
            )),
            portal_handler: Arc::new(OpenBillingPortalHandler::new(
                Arc::clone(&gateway),
                payment.portal_return_url.clone(),
                gateway_timeout,
            )),
            video_handler: Arc::new(VerifyVideoAccessHandler::new(
                Arc::clone(&reconciler),
                videos,
                gateway_timeout,
            )),
        };

        let bot_handler = Arc::new(BotCommandHandler::new(
            Arc::clone(&reconciler),
            gateway,
            payment.portal_return_url.clone(),
            gateway_timeout,
        ));

        let addr = config.server.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %addr, "HTTP listener bound");

        Ok(Self {
            listener,
            router: membership_router(state, config.server.request_timeout()),
            bot,
            bot_handler,
            reconciler,
            processed,
            retention_days: config.reconciler.webhook_retention_days,
            purge_interval: config.reconciler.purge_interval(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Run every background task and serve HTTP until a shutdown signal.
    pub async fn run_until_stopped(self) -> Result<(), StartupError> {
        let purge = spawn_purge_task(
            Arc::clone(&self.processed),
            Arc::clone(&self.reconciler),
            self.retention_days,
            self.purge_interval,
        );
        let dispatcher = tokio::spawn(run_dispatcher(self.bot, self.bot_handler));

        let served = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        purge.abort();
        if tokio::time::timeout(DISPATCHER_SHUTDOWN_GRACE, dispatcher)
            .await
            .is_err()
        {
            tracing::warn!("Bot dispatcher did not stop in time");
        }

        served?;
        Ok(())
    }
}

async fn build_stores(
    database: Option<&DatabaseConfig>,
) -> Result<(Arc<dyn UserRecordStore>, Arc<dyn ProcessedWebhookStore>), StartupError> {
    let Some(database) = database else {
        tracing::warn!("No database configured, subscriber state is kept in memory");
        return Ok((
            Arc::new(InMemoryUserRecordStore::new()),
            Arc::new(InMemoryProcessedWebhookStore::new()),
        ));
    };

    let pool = database.pool_options().connect(&database.url).await?;
    if database.run_migrations {
        run_migrations(&pool).await?;
    }
    tracing::info!(
        max_connections = database.max_connections,
        "Connected to PostgreSQL"
    );

    Ok((
        Arc::new(PostgresUserRecordStore::new(pool.clone())),
        Arc::new(PostgresProcessedWebhookStore::new(pool)),
    ))
}

/// Periodically forget old processed webhook ids and idle per-user locks.
pub fn spawn_purge_task(
    processed: Arc<dyn ProcessedWebhookStore>,
    reconciler: Arc<SubscriptionReconciler>,
    retention_days: u32,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            purge_once(processed.as_ref(), &reconciler, retention_days, Timestamp::now()).await;
        }
    })
}

/// One purge pass. Returns the number of webhook records deleted.
pub async fn purge_once(
    processed: &dyn ProcessedWebhookStore,
    reconciler: &SubscriptionReconciler,
    retention_days: u32,
    now: Timestamp,
) -> u64 {
    let cutoff = now.plus_days(-i64::from(retention_days));
    let deleted = match processed.delete_before(cutoff).await {
        Ok(deleted) => deleted,
        Err(e) => {
            tracing::error!(error = %e, "Processed webhook purge failed");
            0
        }
    };
    let pruned = reconciler.prune_idle_locks();

    if deleted > 0 || pruned > 0 {
        tracing::debug!(deleted, pruned_locks = pruned, "Purge pass finished");
    }
    deleted
}

/// Resolves on ctrl-c or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::adapters::telegram::RecordingAccessNotifier;
    use crate::ports::ProcessedWebhookRecord;

    fn reconciler() -> SubscriptionReconciler {
        SubscriptionReconciler::new(
            Arc::new(InMemoryUserRecordStore::new()),
            Arc::new(MockPaymentGateway::new()),
            Arc::new(RecordingAccessNotifier::new()),
            ReconcilerTimeouts::default(),
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Purge Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn purge_deletes_records_past_retention() {
        let processed = InMemoryProcessedWebhookStore::new();
        processed
            .save(ProcessedWebhookRecord::applied("evt_old", "invoice.payment_failed"))
            .await
            .unwrap();

        let deleted = purge_once(
            &processed,
            &reconciler(),
            30,
            Timestamp::now().plus_days(31),
        )
        .await;

        assert_eq!(deleted, 1);
        assert!(processed.find_by_event_id("evt_old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_keeps_records_within_retention() {
        let processed = InMemoryProcessedWebhookStore::new();
        processed
            .save(ProcessedWebhookRecord::applied("evt_new", "invoice.payment_failed"))
            .await
            .unwrap();

        let deleted = purge_once(&processed, &reconciler(), 30, Timestamp::now()).await;

        assert_eq!(deleted, 0);
        assert!(processed.find_by_event_id("evt_new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn memory_stores_are_used_without_database() {
        let (store, processed) = build_stores(None).await.unwrap();

        assert!(processed.find_by_event_id("evt_1").await.unwrap().is_none());
        assert!(store
            .find(&crate::domain::foundation::ExternalUserId::from_numeric(1))
            .await
            .unwrap()
            .is_none());
    }
}
