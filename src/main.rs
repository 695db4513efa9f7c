use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use yt_chapter_analyzer::config::OutputFormat;
use yt_chapter_analyzer::pipeline::dedupe_inputs;
use yt_chapter_analyzer::{description_block, Config, Pipeline, Registry, SrtWriter};

fn cli() -> Command {
    Command::new("yt-chapters")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Generate YouTube chapters and metadata from existing captions")
        .arg(
            Arg::new("videos")
                .value_name("URL")
                .help("YouTube URLs or 11-character video ids")
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("language")
                .short('l')
                .long("language")
                .value_name("CODE")
                .help("Caption language (defaults to the configured language)"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .value_parser(["json", "description", "srt"]),
        )
        .arg(
            Arg::new("no-demo")
                .long("no-demo")
                .help("Fail instead of substituting demo data when captions are unavailable")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUM")
                .help("Number of videos processed concurrently")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Write one file per video instead of printing"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
}

fn init_logging(verbose: bool, level: &str) {
    let default = if verbose {
        "yt_chapter_analyzer=debug,info".to_string()
    } else {
        format!("yt_chapter_analyzer={},warn", level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_format(value: &str) -> OutputFormat {
    match value {
        "description" => OutputFormat::Description,
        "srt" => OutputFormat::Srt,
        _ => OutputFormat::Json,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_result = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path).map(Config::with_env_overrides),
        None => Config::load(),
    };
    let mut config = config_result.unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    init_logging(matches.get_flag("verbose"), &config.output.log_level);

    if let Some(language) = matches.get_one::<String>("language") {
        config.default_language = language.clone();
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.performance.max_workers = *workers;
    }
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.output.output_dir = Some(PathBuf::from(dir));
    }
    let format = matches
        .get_one::<String>("format")
        .map(|f| parse_format(f))
        .unwrap_or(config.output.format);
    let allow_demo = !matches.get_flag("no-demo");

    config.validate()?;
    info!("🚀 YouTube Chapter Analyzer starting...");
    for line in config.summary().lines() {
        info!("{}", line);
    }

    let inputs: Vec<String> = matches
        .get_many::<String>("videos")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let videos = dedupe_inputs(&inputs);
    if videos.len() < inputs.len() {
        info!("Skipped {} duplicate inputs", inputs.len() - videos.len());
    }

    let registry = Arc::new(Registry::new(Duration::from_secs(config.performance.cache_ttl_seconds)));
    let pipeline = Pipeline::new(config.clone())?.with_registry(registry);

    let shutdown = pipeline.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            shutdown.cancel();
        }
    });

    if let OutputFormat::Srt = format {
        return write_transcripts(&pipeline, &videos, &config).await;
    }

    let batch = pipeline.process_batch(&videos, None, allow_demo).await;

    for item in &batch.items {
        let rendered = match (&item.outcome.data, format) {
            (Some(report), OutputFormat::Description) => {
                format!("{}\n\n{}", report.metadata.title, description_block(&report.chapters))
            }
            (Some(report), _) => to_json(report, config.output.pretty)?,
            (None, _) => {
                error!(
                    "❌ {}: {}",
                    item.input,
                    item.outcome.error.as_deref().unwrap_or("unknown error")
                );
                if let Some(suggestion) = &item.outcome.suggestion {
                    error!("💡 {}", suggestion);
                }
                continue;
            }
        };

        match (&config.output.output_dir, &item.outcome.data) {
            (Some(dir), Some(report)) => {
                tokio::fs::create_dir_all(dir).await?;
                let extension = if format == OutputFormat::Json { "json" } else { "txt" };
                let path = dir.join(format!("{}.{}", report.video_id, extension));
                tokio::fs::write(&path, rendered).await?;
                info!("💾 Saved {}", path.display());
            }
            _ => println!("{}", rendered),
        }

        if item.is_demo() {
            warn!("⚠️ {} used demo data; chapters do not reflect the real video", item.input);
        }
    }

    info!("✅ Successful: {}", batch.successful);
    info!("❌ Failed: {}", batch.failed);

    if batch.successful == 0 && batch.total > 0 {
        return Err(anyhow!("no chapters generated"));
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

async fn write_transcripts(pipeline: &Pipeline, videos: &[String], config: &Config) -> Result<()> {
    let mut failures = 0;
    for video in videos {
        let result = pipeline.transcript_for(video, None).await;

        let Some(data) = result.data else {
            failures += 1;
            error!("❌ {}: {}", video, result.error.unwrap_or_default());
            if let Some(suggestion) = result.suggestion {
                error!("💡 {}", suggestion);
            }
            continue;
        };

        let writer = SrtWriter::from_timeline(&data.timeline());
        match &config.output.output_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                writer.save_to_file(dir.join(format!("{}.srt", data.video_id))).await?;
            }
            None => print!("{}", writer.render()),
        }
    }

    if failures == videos.len() && !videos.is_empty() {
        return Err(anyhow!("no transcripts retrieved"));
    }
    Ok(())
}
