//! fits-mosaic - stitch adjacent FITS patches into one mosaic.
//!
//! This binary parses the command line, runs the mosaic pipeline over local
//! files and writes the composite.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fits_mosaic::{build_mosaic, Config, LocalTileSource, MosaicOutput};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let channels: Vec<_> = config.channels().iter().map(|c| c.name()).collect();
    info!("Stitching {} tiles", config.files.len());
    info!("  Channels: {}", channels.join(", "));
    info!("  Output: {}", config.out.display());

    let source = LocalTileSource::new();
    let output = match build_mosaic(&source, &config.request()).await {
        Ok(output) => output,
        Err(e) => {
            error!("Stitching failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.json {
        print_summary(&output);
    }

    let Some(data) = &output.data else {
        error!("No channel could be stitched; nothing written");
        return ExitCode::FAILURE;
    };

    if let Err(e) = tokio::fs::write(&config.out, data).await {
        error!("Failed to write {}: {}", config.out.display(), e);
        return ExitCode::FAILURE;
    }
    info!("Wrote {} ({} bytes)", config.out.display(), data.len());

    if !output.is_complete() {
        for failure in &output.summary.failures {
            warn!("  {} channel missing: {}", failure.channel, failure.error);
        }
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn print_summary(output: &MosaicOutput) {
    match serde_json::to_string_pretty(&output.summary) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize summary: {}", e),
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "fits_mosaic=debug"
    } else {
        "fits_mosaic=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
