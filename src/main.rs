use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recipe_scribe::cli::{Cli, Commands};
use recipe_scribe::extractors::{resolve_video_id, ExtractionOrchestrator};
use recipe_scribe::{output, server, utils, AnalyzeRequest, Analyzer, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "recipe_scribe=debug" } else { "recipe_scribe=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(cli.config.as_deref()).await?;

    if !matches!(cli.command, Commands::Config { .. }) {
        // Non-fatal: the caption fallback works without the extraction script
        let missing_deps = utils::check_dependencies(&config).await;
        if !missing_deps.is_empty() {
            eprintln!("⚠️  Dependency check warnings:");
            for dep in missing_deps {
                eprintln!("   • {}", dep);
            }
            eprintln!("   (Continuing anyway - the caption API fallback will be used)");
        }
    }

    match cli.command {
        Commands::Analyze {
            url,
            speech_fallback,
            no_speech_retry,
            format,
            output,
            save_transcript,
        } => {
            resolve_video_id(&url)?;
            let analyzer = Analyzer::from_config(&config)?;

            tracing::info!("Starting analysis for URL: {}", url);

            let request = AnalyzeRequest {
                url,
                use_speech_fallback: speech_fallback,
            };
            let progress = spinner(cli.quiet, "Extracting transcript and generating recipe...");
            let result = if no_speech_retry {
                analyzer.analyze(&request).await
            } else {
                analyzer.analyze_with_speech_retry(&request).await
            };
            progress.finish_and_clear();
            let analysis = result?;

            if save_transcript {
                let path = output::save_transcript(&analysis.extraction, std::path::Path::new("."))?;
                eprintln!("Transcript saved to: {}", path.display());
            }

            match output {
                Some(path) => {
                    output::save_to_file(&analysis, &path, &format)?;
                    println!("Recipe saved to: {} ({})", path.display(), format);
                }
                None => {
                    output::print_to_console(&analysis, &format)?;
                }
            }
        }
        Commands::Transcript {
            url,
            speech_fallback,
            output,
        } => {
            resolve_video_id(&url)?;
            let orchestrator = ExtractionOrchestrator::from_config(&config)?;

            let progress = spinner(cli.quiet, "Extracting transcript...");
            let result = orchestrator.extract(&url, speech_fallback).await;
            progress.finish_and_clear();
            let extraction = result?;

            output::write_extraction(&extraction, output.as_deref())?;
            if let Some(path) = output {
                println!("Transcript saved to: {}", path.display());
            }
        }
        Commands::Serve { bind } => {
            let analyzer = Analyzer::from_config(&config)?;
            server::serve(analyzer, &bind).await?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                match &cli.config {
                    Some(path) => println!("Using configuration file: {}", path.display()),
                    None => println!("Using configuration file: {}", Config::config_path()?.display()),
                }
                println!("Run with --show to print the effective configuration.");
            }
        }
    }

    Ok(())
}

fn spinner(quiet: bool, message: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}
