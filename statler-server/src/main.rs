use std::{env, io, process::ExitCode};

use statler::{CollectorBuilder, CollectorError, LogSink, ReportSink, StatHatSink};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
use self::config::{Command, Config};

mod signal;
use self::signal::Shutdown;

#[derive(Debug, Error)]
enum ServerError {
    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error("failed to start StatHat workers: {0}")]
    StatHat(#[source] io::Error),

    #[error("failed to start signal handler runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[source] io::Error),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("statler");
    let opts = config::opts();

    let rest = args.get(1..).unwrap_or_default();
    let config = match Command::parse(&opts, rest, |name| env::var(name).ok()) {
        Ok(Command::Serve(config)) => config,
        Ok(Command::Help) => {
            print!("{}", config::usage(program, &opts));
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!(error = %e, "Failed to parse command line args.");
            eprint!("{}", config::usage(program, &opts));
            return ExitCode::from(2);
        }
    };

    match serve(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Collector failed.");
            ExitCode::FAILURE
        }
    }
}

fn serve(config: Config) -> Result<(), ServerError> {
    let sink: Box<dyn ReportSink> = match config.stathat_api_key {
        Some(key) => {
            info!("Relaying stats to StatHat.");
            Box::new(StatHatSink::new(key).map_err(ServerError::StatHat)?)
        }
        None => {
            info!("No StatHat API key configured, logging stats instead.");
            Box::new(LogSink)
        }
    };

    let mut builder = CollectorBuilder::new().with_bind_address(&config.bind_address);
    if let Some(readers) = config.readers {
        builder = builder.with_readers(readers);
    }
    let collector = builder.spawn(sink)?;

    // The readers run on their own threads; this thread only waits to be told to stop.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ServerError::Runtime)?;
    let signal = runtime
        .block_on(async {
            let mut shutdown = Shutdown::listen()?;
            shutdown.recv().await
        })
        .map_err(ServerError::Signal)?;

    info!(signal, "Shutdown signal received, stopping collector.");

    // Dropping the last reader also drops the sink, which flushes any queued StatHat reports.
    collector.shutdown();
    Ok(())
}
