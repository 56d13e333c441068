mod app;
mod auth;
mod clock;
mod config;
mod contacts;
mod db;
mod error;
#[cfg(test)]
mod memory;
mod ratelimit;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "contactbook=debug,axum=info,tower_http=info".to_string());
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
    let _sweeper = app::spawn_limiter_sweeper(&state);

    let router = app::build_app(state.clone());
    app::serve(router, &state).await
}
