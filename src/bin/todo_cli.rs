use anyhow::Context;
use tokio::io::BufReader;

use todo_app::cli::{TodoBoard, run_session};
use todo_app::config::ClientConfig;
use todo_app::storage::FileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env();

    let kv = FileStore::open(&config.data_dir)
        .with_context(|| format!("opening data dir {}", config.data_dir.display()))?;

    // Logs go to a file; the terminal belongs to the session.
    let appender = tracing_appender::rolling::never(&config.data_dir, "todo-cli.log");
    let (writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let mut board = TodoBoard::open(kv).context("loading saved todos")?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        todos = board.store().len(),
        "Todo client started"
    );

    println!(
        "📝 Todo v{} ({} todos). Type `help` for commands.",
        env!("CARGO_PKG_VERSION"),
        board.store().len()
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let export_dir = std::env::current_dir().context("resolving export directory")?;
    run_session(&mut board, stdin, &mut stdout, &export_dir).await?;

    tracing::info!("Todo client stopped");
    Ok(())
}
