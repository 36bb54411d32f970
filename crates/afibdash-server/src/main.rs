//! AFib Dashboard: anonymous AFib community survey and clinical picture API.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use afibdash_core::AppConfig;
use afibdash_server::scheduler::start_summary_scheduler;
use afibdash_server::{build_router, AppState};
use afibdash_store::Store;
use afibdash_summarize::{run_summary, SummaryConfig};

fn print_help() {
    println!("AFib Dashboard: anonymous AFib community survey and clinical picture API");
    println!();
    println!("Usage: afibdash [command]");
    println!();
    println!("Commands:");
    println!("  (none)       Start the server");
    println!("  summarize    Generate a fresh clinical picture summary and exit");
    println!("  help         Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        None => {}
        Some("--help" | "-h" | "help") => {
            print_help();
            return Ok(());
        }
        Some("--summarize" | "summarize") => {}
        Some(other) => {
            eprintln!("Unknown command: {}. Use 'afibdash help' for usage.", other);
            std::process::exit(1);
        }
    }

    let config = AppConfig::from_env()?;
    let summary_config = SummaryConfig::from_env();

    let store = Store::open(&config.store)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    if command.is_some() {
        // One-shot summary for external cron.
        let client = reqwest::Client::new();
        match run_summary(&store, &client, &summary_config).await {
            Ok(outcome) => {
                println!(
                    "Stored summary from {} shares ({} sampled)",
                    outcome.source_rows, outcome.sampled_rows
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("Summary failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let port = config.port;
    let state = Arc::new(AppState::new(config, summary_config, store));

    start_summary_scheduler(state.clone());

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("AFib Dashboard server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
