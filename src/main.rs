use todo_app::config::ServerConfig;
use todo_app::todos::{AppState, TodoStore, todo_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;

    let mut store = TodoStore::in_memory();
    if config.seed_demo {
        store.seed_demo()?;
    }
    let state = AppState::new(store);
    let app = todo_routes(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let addr = listener.local_addr()?;

    eprintln!("📝 Todo server v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   REST: http://{addr}/api/todos");
    eprintln!("   Feed: ws://{addr}/ws/todos");
    tracing::info!(%addr, seed_demo = config.seed_demo, "Todo server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Todo server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
