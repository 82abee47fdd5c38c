//! HTTP API server with observability for order fulfillment.
//!
//! Provides REST endpoints for creating and reading orders, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use domain::{Money, ProductRecord};
use fulfillment::{
    EventPublisher, InMemoryEventPublisher, InMemoryPaymentAuthority, InMemoryUserDirectory,
    LedgerProductCatalog, OrderOrchestrator, UserProfile,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use store::{
    InMemoryInventoryStore, InMemoryOrderStore, InventoryLedger, PostgresInventoryStore,
    PostgresOrderStore, ProductId,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", get(routes::orders::list).post(routes::orders::create))
        .route("/orders/{id}", get(routes::orders::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Handles to the in-memory collaborators behind a default state.
#[derive(Clone, Default)]
pub struct InMemoryBackends {
    pub orders: InMemoryOrderStore,
    pub inventory: InMemoryInventoryStore,
    pub users: InMemoryUserDirectory,
    pub payments: InMemoryPaymentAuthority,
    pub publisher: InMemoryEventPublisher,
}

/// Creates the default application state with every collaborator in memory.
pub fn create_default_state(config: &Config) -> (Arc<AppState>, InMemoryBackends) {
    let backends = InMemoryBackends::default();
    let ledger = Arc::new(InventoryLedger::new(
        backends.inventory.clone(),
        config.retry_policy(),
    ));

    let orchestrator = OrderOrchestrator::new(
        Arc::new(backends.orders.clone()),
        Arc::new(backends.users.clone()),
        Arc::new(LedgerProductCatalog::new(ledger)),
        Arc::new(backends.payments.clone()),
        Arc::new(backends.publisher.clone()),
    )
    .with_config(config.fulfillment());

    (Arc::new(AppState { orchestrator }), backends)
}

/// Creates application state with orders and inventory in PostgreSQL.
///
/// Users and payments stay in memory; the reward publisher is chosen by
/// [`create_publisher`].
pub fn create_postgres_state(
    config: &Config,
    pool: PgPool,
    users: InMemoryUserDirectory,
    payments: InMemoryPaymentAuthority,
) -> Result<Arc<AppState>, fulfillment::FulfillmentError> {
    let ledger = Arc::new(InventoryLedger::new(
        PostgresInventoryStore::new(pool.clone()),
        config.retry_policy(),
    ));

    let orchestrator = OrderOrchestrator::new(
        Arc::new(PostgresOrderStore::new(pool)),
        Arc::new(users),
        Arc::new(LedgerProductCatalog::new(ledger)),
        Arc::new(payments),
        create_publisher(config)?,
    )
    .with_config(config.fulfillment());

    Ok(Arc::new(AppState { orchestrator }))
}

/// Returns the Kafka publisher when brokers are configured, the in-memory
/// publisher otherwise.
#[cfg(feature = "kafka")]
pub fn create_publisher(
    config: &Config,
) -> Result<Arc<dyn EventPublisher>, fulfillment::FulfillmentError> {
    match &config.kafka_brokers {
        Some(brokers) => Ok(Arc::new(fulfillment::KafkaEventPublisher::new(
            brokers,
            config.step_timeout,
        )?)),
        None => Ok(Arc::new(InMemoryEventPublisher::new())),
    }
}

/// Returns the in-memory publisher; broker support needs the `kafka` feature.
#[cfg(not(feature = "kafka"))]
pub fn create_publisher(
    config: &Config,
) -> Result<Arc<dyn EventPublisher>, fulfillment::FulfillmentError> {
    if config.kafka_brokers.is_some() {
        tracing::warn!("KAFKA_BROKERS is set but the kafka feature is disabled");
    }
    Ok(Arc::new(InMemoryEventPublisher::new()))
}

fn demo_user() -> UserProfile {
    UserProfile::new(1, "demo", "Demo User")
}

fn demo_product() -> ProductRecord {
    ProductRecord::new(ProductId::new(1), "Demo Widget", Money::from_units(100), 10)
}

/// Seeds a demo user (id 1) and a demo product (id 1, price 100, 10 units).
pub async fn seed_demo_data(users: &InMemoryUserDirectory, inventory: &InMemoryInventoryStore) {
    users.add_user(demo_user()).await;
    inventory.insert_product(demo_product()).await;
}

/// Seeds the demo user and, unless the row already exists, the demo product.
///
/// Existing stock survives restarts.
pub async fn seed_postgres_demo_data(
    users: &InMemoryUserDirectory,
    inventory: &PostgresInventoryStore,
) -> store::Result<()> {
    users.add_user(demo_user()).await;
    if inventory.insert_product_if_missing(&demo_product()).await? {
        tracing::info!("seeded demo product 1");
    }
    Ok(())
}
