use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookscribe::pipeline::PipelineOptions;
use bookscribe::{download, utils, BookPipeline, Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "bookscribe=debug"
    } else {
        "bookscribe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Check for required external dependencies (non-fatal)
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() && !cli.quiet {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    let config = Config::load().await?;

    match cli.command {
        Commands::Fetch {
            title,
            email,
            password,
            output,
            activation_bytes,
            skip_transcription,
        } => {
            let options = PipelineOptions {
                activation_bytes,
                skip_transcription,
                quiet: cli.quiet,
            };
            let pipeline = BookPipeline::new(config, options);

            tracing::info!("Starting fetch for title: {}", title);
            let report = pipeline.run(&email, &password, &title, output).await?;
            report.print_summary();
        }
        Commands::Convert {
            container,
            activation_bytes,
            skip_transcription,
        } => {
            utils::check_file_accessible(&container)?;

            let options = PipelineOptions {
                activation_bytes,
                skip_transcription,
                quiet: cli.quiet,
            };
            let pipeline = BookPipeline::new(config, options);

            let report = pipeline.process_container(&container).await?;
            report.print_summary();
        }
        Commands::Transcribe { audio, output_dir } => {
            let options = PipelineOptions {
                quiet: cli.quiet,
                ..PipelineOptions::default()
            };
            let pipeline = BookPipeline::new(config, options);

            let dir = pipeline.transcribe_only(&audio, output_dir).await?;
            println!("Transcripts written to: {}", dir.display());
        }
        Commands::Download { url, output } => {
            let destination = match output {
                Some(path) => path,
                None => PathBuf::from(utils::filename_from_url(&url).ok_or_else(|| {
                    anyhow::anyhow!("Could not derive a filename from {}; pass --output", url)
                })?),
            };

            let client = reqwest::Client::new();
            let written = download::fetch_to_file(&client, &url, &destination, cli.quiet).await?;
            println!(
                "Saved {} to: {}",
                utils::format_file_size(written),
                destination.display()
            );
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Config file: {}", Config::location()?.display());
                println!("Edit it to change storefront, conversion or transcription settings.");
            }
        }
    }

    Ok(())
}
