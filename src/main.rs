use essay_agents::{cli::Cli, config::Config, utils::init_logger, AppError};
use std::path::Path;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {} ({})", e, e.category());
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing; the guard flushes the log file on exit
    let _log_guard = match init_logger(config.logging.file.as_deref().map(Path::new)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: could not initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match essay_agents::run(&cli.run_request(), &config).await {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, category = e.category(), "Essay run failed");
            eprintln!("{}", diagnostic(&e));
            ExitCode::FAILURE
        }
    }
}

fn diagnostic(error: &AppError) -> String {
    match error.stage() {
        Some(stage) => format!(
            "error: stage '{}' failed ({}): {}",
            stage,
            error.category(),
            error.root()
        ),
        None => format!("error: {} ({})", error.category(), error.root()),
    }
}
