//! dbshift CLI - versioned schema migrations.

use dbshift::{CliArgs, MigrationRunner, ResultReporter};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{debug, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(run());
    // A prompt abandoned on SIGINT still occupies a blocking thread.
    runtime.shutdown_background();
    code
}

async fn run() -> ExitCode {
    let mut reporter = ResultReporter::stdio();

    let args = match CliArgs::parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => return ExitCode::from(reporter.report(&Err(e))),
    };

    setup_logging(&args.verbosity, &args.log_format);
    let cancel_token = setup_signal_handler();

    let mut runner = MigrationRunner::new().with_cancellation(cancel_token);
    let result = runner.run(&args).await;
    if let Err(e) = &result {
        debug!("{}", e.format_detailed());
    }
    ExitCode::from(reporter.report(&result))
}

/// Log lines go to stderr; stdout carries help, version and the record list.
/// `RUST_LOG` overrides `--verbosity` when set.
fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the run on SIGINT (Ctrl-C) or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Disconnecting and shutting down...", name);
                    token.cancel();
                }
                Err(e) => warn!("Failed to install {} handler: {}", name, e),
            }
        });
    }

    cancel_token
}

/// Cancel the run on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Disconnecting and shutting down...");
                token.cancel();
            }
            Err(e) => warn!("Failed to install Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}
