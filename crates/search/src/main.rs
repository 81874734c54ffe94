//! NoteForge command line
//!
//! Answers one query against the configured vault:
//! - Hybrid family modes print the assembled context (or a synthesized answer)
//! - Precision mode prints `score  citation` lines with excerpts

use clap::Parser;
use noteforge_common::{config::AppConfig, context::SynthesisOptions, metrics, AppError, VERSION};
use noteforge_search::{cli::Cli, RetrievalResult, Retriever};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config);
    info!("Starting NoteForge v{}", VERSION);

    config.validate()?;
    metrics::register_metrics();

    let request = cli.into_request();

    let config = Arc::new(config);
    let retriever = Retriever::from_config(Arc::clone(&config))?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let outcome = retriever.retrieve(&request, &cancel).await?;

    match outcome.result {
        RetrievalResult::NoResults => println!("No results."),
        RetrievalResult::Passages { hits, rerank_mode } => {
            info!(?rerank_mode, hits = hits.len(), "Precision results");
            for hit in hits {
                let score = hit
                    .score
                    .map(|s| format!("{:>4.1}", s))
                    .unwrap_or_else(|| "   -".to_string());
                println!("{}  {}\n{}\n", score, hit.citation, hit.excerpt);
            }
        }
        RetrievalResult::Context { documents, context } => {
            info!(
                documents = documents.len(),
                chars = context.char_count,
                "Context assembled"
            );

            if context.is_empty() {
                println!("No results.");
            } else if retriever.completer().is_available() {
                match retriever
                    .synthesize(&request.query, &context, SynthesisOptions::default(), &cancel)
                    .await
                {
                    Ok(answer) => {
                        println!("{}\n", answer.answer);
                        for citation in answer.citations {
                            println!("[{}] {}", citation.index, citation.source.relative_path);
                        }
                    }
                    Err(AppError::Cancelled) => return Err(AppError::Cancelled.into()),
                    Err(e) => {
                        warn!(error = %e, "Synthesis failed, printing context");
                        print!("{}", context.text);
                    }
                }
            } else {
                print!("{}", context.text);
            }
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, cancelling query"),
        _ = terminate => info!("Received SIGTERM, cancelling query"),
    }
}
