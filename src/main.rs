use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use video_translator::config::Config;
use video_translator::output::{self, JobReport};
use video_translator::server::{self, AppState};
use video_translator::telemetry::{init_tracing, TracingConfig};
use video_translator::{parse_video_id, utils, BroadcastHub, Cli, Commands, JobPipeline, JobRequest, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).await?;
    init_tracing(TracingConfig::from_config(&config, cli.verbose));

    match cli.command {
        Commands::Serve { host, port } => {
            config.validate()?;
            warn_missing_dependencies(&config).await;

            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let hub = Arc::new(BroadcastHub::new(config.pipeline.observer_buffer));
            let pipeline = Arc::new(JobPipeline::from_config(&config, hub));

            println!("{} http://{}:{}", style("Serving on").green().bold(), host, port);
            server::serve(AppState::new(pipeline), &host, port, config.server.static_dir.clone()).await?;
        }
        Commands::Translate { url, lang, format, output } => {
            config.validate()?;
            warn_missing_dependencies(&config).await;

            translate_once(&config, url, lang, format, output).await?;
        }
        Commands::Parse { url } => match parse_video_id(&url) {
            Ok(video_id) => {
                println!("{}", video_id);
            }
            Err(e) => {
                eprintln!("{} {}", style("Error:").red().bold(), e);
                std::process::exit(2);
            }
        },
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
                println!("Edit it, or set OPENAI_API_KEY and GOOGLE_API_KEY in the environment.");
            }
        }
        Commands::Platforms => {
            println!("Supported URLs:");
            println!("  • youtube.com/watch?v=<id> (www., m., music. subdomains)");
            println!("  • youtube.com/embed/<id>, /shorts/<id>, /live/<id>, /v/<id>");
            println!("  • youtube-nocookie.com/embed/<id>");
            println!("  • youtu.be/<id>");
        }
    }

    Ok(())
}

async fn warn_missing_dependencies(config: &Config) {
    // Non-fatal: the tools may live somewhere the check cannot see
    let missing = utils::check_dependencies(&config.providers.extractor.yt_dlp_path).await;
    if !missing.is_empty() {
        eprintln!("{}", style("⚠️  Dependency check warnings:").yellow());
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

async fn translate_once(
    config: &Config,
    url: String,
    lang: Option<String>,
    format: OutputFormat,
    output_path: Option<std::path::PathBuf>,
) -> Result<()> {
    let hub = Arc::new(BroadcastHub::new(config.pipeline.observer_buffer));
    let pipeline = Arc::new(JobPipeline::from_config(config, hub));

    let handle = pipeline.start(JobRequest::new(url, lang))?;
    let job_id = handle.job_id;
    let video_id = handle.video_id.clone();
    let target_language = handle.target_language.clone();

    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    progress.enable_steady_tick(Duration::from_millis(120));
    progress.set_message(format!("Translating {} to {}...", video_id, target_language));

    let outcome = handle.wait().await?;
    progress.finish_and_clear();

    let report = JobReport::new(job_id, video_id.as_str(), &target_language, &outcome);
    match output_path {
        Some(path) => {
            output::save_to_file(&report, &path, format)?;
            println!("Result saved to: {}", path.display());
        }
        None => output::print_to_console(&report, format)?,
    }

    if !outcome.is_success() {
        anyhow::bail!("job {} did not complete", job_id);
    }

    Ok(())
}
