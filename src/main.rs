mod app;
mod auth;
mod cache;
mod config;
mod error;
mod extract;
mod health;
mod response;
mod state;
mod throttle;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "userdir=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = state::AppState::init().await?;
    tracing::info!(
        issuer = %state.config.jwt.issuer,
        hash_cost = state.config.hash.cost,
        throttle_limit = state.config.throttle.limit,
        throttle_ttl = state.config.throttle.ttl_seconds,
        "configuration loaded"
    );

    if let Err(e) = sqlx::migrate!("./migrations").run(&state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let addr = state.config.server.addr()?;
    app::serve(app::build_app(state), addr).await
}
