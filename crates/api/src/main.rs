use anyhow::Context;

use painterp_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; variables may come from the environment.
    let dotenv = dotenvy::dotenv();
    painterp_observability::init();
    if let Err(e) = &dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env file");
        }
    }

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = painterp_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        environment = ?config.environment,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
