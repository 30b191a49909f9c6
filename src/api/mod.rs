pub mod extract;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings.clone());

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/pix", pix_routes(settings.pix.is_production()))
        .nest("/token", token_routes())

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn pix_routes(production: bool) -> Router<AppState> {
    let mut router = Router::new()
        .route("/cobranca", post(handlers::charges::create))
        .route(
            "/cobranca/:txid",
            get(handlers::charges::get)
                .delete(handlers::charges::cancel)
                .patch(handlers::charges::update),
        )
        .route("/cobranca/:txid/atualizar", get(handlers::charges::refresh))
        .route("/cobranca/:txid/detalhes", get(handlers::charges::details))
        .route("/cobranca/:txid/status", get(handlers::charges::payment_status))
        .route("/cobranca/:txid/devolucao", get(handlers::charges::refund))
        .route("/cobranca/:txid/qrcode", get(handlers::charges::qr_code))
        .route("/cobrancas", get(handlers::charges::list))
        .route("/cobrancas-vencimento/periodo", get(handlers::charges::list_by_period))
        .route("/cobrancas-vencimento/vencidas", get(handlers::charges::list_overdue));

    // Payment simulation only exists against the homologation PSP
    if !production {
        router = router.route("/cobranca/:txid/pagar", post(handlers::charges::pay));
    }

    router
}

fn token_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::tokens::get_token))
        .route("/renovar", post(handlers::tokens::renew))
        .route("/status", get(handlers::tokens::status))
}
