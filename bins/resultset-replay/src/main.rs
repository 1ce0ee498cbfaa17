use std::io::Write;

use clap::Parser;
use tokio::io::AsyncBufReadExt;

use resultset_api::Chunk;
use resultset_engine::{ChunkSender, ResultStream, StreamConfig, TransportError};

#[derive(Parser)]
#[command(
    name = "resultset-replay",
    about = "Replay a captured partial result stream and print the reassembled rows"
)]
struct Cli {
    /// Capture file: one JSON chunk message per line.
    #[arg(long, env = "RESULTSET_CAPTURE")]
    capture: String,

    /// Path to TOML configuration file.
    #[arg(long, env = "RESULTSET_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            tracing::info!(config = %path, "loading configuration");
            match StreamConfig::load(path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "failed to load config");
                    std::process::exit(1);
                }
            }
        }
        None => StreamConfig::default(),
    };
    let json_options = config.json.clone();

    let (tx, mut stream) = ResultStream::channel(config);
    let capture = cli.capture.clone();
    tokio::spawn(async move {
        if let Err(e) = feed_capture(&capture, &tx).await {
            tracing::error!(capture = %capture, error = %e, "capture replay failed");
            let _ = tx.send(Err(e)).await;
        }
    });

    let mut stdout = std::io::stdout().lock();
    let mut rows = 0usize;
    while let Some(row) = stream.next_row().await {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(rows, error = %e, "stream failed");
                std::process::exit(1);
            }
        };
        let json = match row.to_json(&json_options) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(row = rows, error = %e, "failed to render row");
                std::process::exit(1);
            }
        };
        if let Err(e) = writeln!(stdout, "{json}") {
            tracing::error!(error = %e, "failed to write row");
            std::process::exit(1);
        }
        rows += 1;
    }

    match stream.stats().and_then(|s| s.row_count_exact) {
        Some(exact) => tracing::info!(rows, row_count_exact = exact, "replay finished"),
        None => tracing::info!(rows, "replay finished"),
    }
}

/// Read the capture line by line and push each chunk to the stream.
async fn feed_capture(path: &str, tx: &ChunkSender) -> Result<(), TransportError> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = tokio::io::BufReader::new(file).lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(&line)
            .map_err(|e| format!("{path}:{line_no}: {e}"))?;
        if tx.send(Ok(chunk)).await.is_err() {
            tracing::debug!("stream closed, stopping replay");
            break;
        }
    }
    Ok(())
}
