use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    billing::handlers::{
        conversion_report, convert_quotation, create_quotation, get_invoice, get_quotation,
        list_invoices, list_quotations,
    },
    bootstrap::AppState,
    directory::handlers::{
        create_client, create_provider, get_client, get_provider, list_clients, list_providers,
    },
    middleware::{cors::create_cors_layer, rate_limit::{rate_limit_middleware, RateLimitLayer}},
    notifications::list_notifications,
    payments::handlers::{
        confirm_payment, create_payment_link, create_payout, expire_payment_link, get_payout,
        list_expenses, mark_invoice_paid, payout_expenses, refresh_payout, refund_payment,
        reverse_payout, wave_webhook,
    },
    transactions::handlers::{
        list_conflicts, list_transactions, resolve_transaction, transaction_summary,
    },
};

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    // Public endpoints reachable without account identity; rate limited
    let public = Router::new()
        .route("/webhooks/wave", post(wave_webhook))
        .route("/payments/confirm", post(confirm_payment))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(Extension(Arc::new(RateLimitLayer::new(60, 60))));

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Quotation endpoints
                .route("/quotations", post(create_quotation).get(list_quotations))
                .route("/quotations/:id", get(get_quotation))
                .route("/quotations/:id/conversion", get(conversion_report))
                .route("/quotations/:id/convert", post(convert_quotation))
                // Invoice endpoints
                .route("/invoices", get(list_invoices))
                .route("/invoices/:id", get(get_invoice))
                .route("/invoices/:id/payment-link", post(create_payment_link))
                .route("/invoices/:id/payment-link/expire", post(expire_payment_link))
                .route("/invoices/:id/payment-link/refund", post(refund_payment))
                .route("/invoices/:id/mark-paid", post(mark_invoice_paid))
                // Payout endpoints
                .route("/payouts", post(create_payout))
                .route("/payouts/:id", get(get_payout))
                .route("/payouts/:id/reverse", post(reverse_payout))
                .route("/payouts/:id/refresh", post(refresh_payout))
                .route("/payouts/:id/expenses", get(payout_expenses))
                // Expense ledger
                .route("/expenses", get(list_expenses))
                // Inbound transaction endpoints
                .route("/transactions", get(list_transactions))
                .route("/transactions/conflicts", get(list_conflicts))
                .route("/transactions/summary", get(transaction_summary))
                .route("/transactions/:id/resolve", post(resolve_transaction))
                // Directory endpoints
                .route("/clients", post(create_client).get(list_clients))
                .route("/clients/:id", get(get_client))
                .route("/providers", post(create_provider).get(list_providers))
                .route("/providers/:id", get(get_provider))
                // Notifications
                .route("/notifications", get(list_notifications))
                // Public surface (webhooks, checkout confirmation)
                .merge(public),
        )
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(create_cors_layer())
        // Add request tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(
    app: Router,
    bind_address: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
