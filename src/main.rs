mod config;
mod db;
mod identity;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use crate::identity::IdentityService;
use crate::identity::gotrue::{GoTrueClient, build_http_client};
use crate::services::profile::PgProfileStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let http = build_http_client(&config.identity).expect("identity http client init failed");
    let identity_config = config.identity.clone();
    let identity_factory: state::IdentityFactory =
        Arc::new(move || Arc::new(GoTrueClient::new(http.clone(), &identity_config)) as Arc<dyn IdentityService>);
    tracing::info!(identity_url = %config.identity.base_url, "identity client configured");

    let profiles = Arc::new(PgProfileStore::new(pool.clone()));
    let state = state::AppState::new(pool, profiles, identity_factory, config.cookie_secure);

    // Spawn background idle-session sweeper.
    let _sweeper = services::sweeper::spawn_session_sweeper(
        state.sessions.clone(),
        config.session_idle_ttl,
        services::sweeper::sweep_interval(config.session_idle_ttl),
    );

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "compilerlab listening");
    axum::serve(listener, app).await.expect("server failed");
}
