//! Portfolio Grid - Main entry point

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use portfolio_grid::constants::APP_VERSION;
use portfolio_grid::utils::get_data_dir;
use portfolio_grid::{HtmlGrid, HttpSource, Loader, PassOutcome, Settings};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Initialize file logging. Returns a guard that must be held for the app lifetime.
fn init_logging(data_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let logs_dir = data_dir.join("logs");
    std::fs::create_dir_all(&logs_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "portfolio-grid.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,portfolio_grid=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir).ok();

    // Initialize logging - guard must live for entire app lifetime
    let _log_guard = init_logging(&data_dir);

    info!(version = APP_VERSION, "Portfolio Grid starting");

    let settings = Settings::load(&data_dir);
    let source = match HttpSource::new(&settings.base_url) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, base_url = %settings.base_url, "Invalid base URL");
            return ExitCode::FAILURE;
        }
    };

    let grid = HtmlGrid::new();
    let loader = Loader::new(Arc::new(source), settings.clone());
    let result = loader.run_pass(Some(&grid)).await;

    // The grid holds either the tiles or the error message at this point
    let html = grid.to_html();
    match settings.output_path() {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &html) {
                error!(error = %e, path = %path.display(), "Failed to write grid");
                return ExitCode::FAILURE;
            }
            info!(path = %path.display(), "Grid written");
        }
        None => println!("{}", html),
    }

    match result {
        Ok(PassOutcome::Completed(report)) => {
            info!(rendered = report.rendered, failed = report.failed, "Done");
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            info!(?outcome, "Pass ended early");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Could not load portfolio");
            ExitCode::FAILURE
        }
    }
}
