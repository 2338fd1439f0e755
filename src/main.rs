use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_fetch::utils::{self, format_duration, format_file_size};
use media_fetch::{
    server, Cli, Commands, Config, MediaAcquirer, MediaFormat, MediaInfo, OptionProfile,
    StagingArea, YtDlpAcquirer,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = Config::load().await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let config = config.with_overrides(host, port);

            // Non-fatal: the tools may still be reachable at request time
            for dep in utils::check_dependencies(&config.acquisition.yt_dlp_path).await {
                tracing::warn!("Missing dependency: {}", dep);
            }

            server::start_server(config).await?;
        }
        Commands::Fetch { url, format, output } => {
            fetch(&config, &url, format, output, cli.quiet).await?;
        }
        Commands::Info { url } => {
            let staging = StagingArea::new(&config.staging.dir);
            let acquirer = YtDlpAcquirer::from_config(&config.acquisition, staging);
            print_info(&acquirer.probe(&url).await?);
        }
        Commands::Config { show: _, init } => {
            if init {
                let path = config.save().await?;
                println!("Configuration written to: {}", path.display());
            } else {
                config.display();
            }
        }
        Commands::Formats => {
            println!("Supported formats:");
            for format in MediaFormat::ALL {
                let profile = OptionProfile::for_format(format, "<id>.%(ext)s");
                println!("  • {} ({}): {}", format, format.mime_type(), profile.describe());
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "media_fetch=debug,tower_http=debug"
    } else {
        "media_fetch=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// One-off acquisition straight to a local file
async fn fetch(
    config: &Config,
    url: &str,
    format: MediaFormat,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let staging = StagingArea::new(&config.staging.dir);
    staging.ensure()?;
    let acquirer = YtDlpAcquirer::from_config(&config.acquisition, staging);

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    progress.enable_steady_tick(Duration::from_millis(120));
    progress.set_message(format!("Fetching {} as {}...", url, format));

    let staged = match acquirer.acquire(url, format).await {
        Ok(staged) => staged,
        Err(e) => {
            progress.finish_with_message("Fetch failed");
            return Err(e);
        }
    };
    progress.finish_with_message("Fetch complete");

    let destination = match output {
        Some(path) if path.is_dir() => path.join(staged.file_name()),
        Some(path) => path,
        None => std::env::current_dir()?.join(staged.file_name()),
    };

    let size = fs_err::copy(staged.path(), &destination)
        .context("Failed to copy fetched file")?;
    drop(staged);

    println!("Saved to: {} ({})", destination.display(), format_file_size(size));
    Ok(())
}

fn print_info(info: &MediaInfo) {
    let unknown = || "unknown".to_string();

    println!("Title:     {}", info.title.clone().unwrap_or_else(unknown));
    println!("Uploader:  {}", info.uploader.clone().unwrap_or_else(unknown));
    println!(
        "Duration:  {}",
        info.duration.map(format_duration).unwrap_or_else(unknown)
    );
    if let Some(views) = info.view_count {
        println!("Views:     {}", views);
    }
    if let Some(extractor) = &info.extractor {
        println!("Extractor: {}", extractor);
    }

    if info.formats.is_empty() {
        return;
    }
    println!("Formats:");
    for format in &info.formats {
        println!(
            "  • {:<8} {:<5} {:>10} {}",
            format.quality.as_deref().unwrap_or("?"),
            format.container.as_deref().unwrap_or("?"),
            format.size.as_deref().unwrap_or("unknown"),
            format.fps.map(|fps| format!("{}fps", fps)).unwrap_or_default()
        );
    }
}
