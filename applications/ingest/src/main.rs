/// Soul Ingest - probe, extract cover art and compute waveforms for audio files
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use soul_ingest::{
    FfmpegEngine, Ingestor, LibraryScanner, LocalAssetSink, ScanProgress, TagOverrides,
};
use soul_ingest_cli::IngestConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "soul-ingest")]
#[command(about = "Soul audio ingestion pipeline", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./soul-ingest.toml if present)
    #[arg(short, long, global = true, env = "SOUL_INGEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one audio file and print the result as JSON
    Ingest {
        /// Audio file
        file: PathBuf,
        /// Number of waveform points
        #[arg(short, long)]
        points: Option<usize>,
        /// Directory for extracted cover art
        #[arg(long)]
        artwork_dir: Option<PathBuf>,
        /// Title to use instead of the tagged one
        #[arg(long)]
        title: Option<String>,
        /// Artist to use instead of the tagged one
        #[arg(long)]
        artist: Option<String>,
        /// Album to use instead of the tagged one
        #[arg(long)]
        album: Option<String>,
        /// Genre to use instead of the tagged one
        #[arg(long)]
        genre: Option<String>,
    },
    /// Print normalized container metadata
    Probe {
        /// Audio file
        file: PathBuf,
    },
    /// Print the waveform envelope
    Waveform {
        /// Audio file
        file: PathBuf,
        /// Number of waveform points
        #[arg(short, long)]
        points: Option<usize>,
    },
    /// Ingest every supported file under a directory
    Scan {
        /// Directory path to scan
        path: PathBuf,
        /// Directory for extracted cover art
        #[arg(long)]
        artwork_dir: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ScanSummary {
    files_discovered: usize,
    ingested: usize,
    degraded: Vec<PathBuf>,
    rejected: Vec<RejectedFile>,
}

#[derive(Serialize)]
struct RejectedFile {
    path: PathBuf,
    error: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soul_ingest=info,soul_ingest_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = IngestConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest {
            file,
            points,
            artwork_dir,
            title,
            artist,
            album,
            genre,
        } => {
            apply_overrides(&mut config, points, artwork_dir);
            let overrides = TagOverrides {
                title,
                artist,
                album,
                genre,
            };
            ingest_file(&config, &file, &overrides).await?;
        }
        Commands::Probe { file } => {
            probe_file(&config, &file).await?;
        }
        Commands::Waveform { file, points } => {
            apply_overrides(&mut config, points, None);
            waveform(&config, &file).await?;
        }
        Commands::Scan { path, artwork_dir } => {
            apply_overrides(&mut config, None, artwork_dir);
            scan_directory(&config, &path).await?;
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut IngestConfig, points: Option<usize>, artwork_dir: Option<PathBuf>) {
    if let Some(points) = points {
        config.pipeline.waveform_points = points;
    }
    if let Some(dir) = artwork_dir {
        config.storage.artwork_dir = dir;
    }
}

async fn build_ingestor(
    config: &IngestConfig,
) -> anyhow::Result<Ingestor<FfmpegEngine, LocalAssetSink>> {
    config.validate()?;

    let engine = config.engine();
    if !engine.is_available().await {
        anyhow::bail!(
            "ffmpeg/ffprobe not found (ffmpeg: {}, ffprobe: {})",
            engine.ffmpeg_path().display(),
            engine.ffprobe_path().display()
        );
    }

    let sink = config.sink();
    sink.initialize()
        .await
        .with_context(|| format!("Cannot create {}", sink.base_path().display()))?;

    Ok(Ingestor::with_options(
        Arc::new(engine),
        Arc::new(sink),
        config.ingest_options(),
    ))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn ingest_file(
    config: &IngestConfig,
    file: &Path,
    overrides: &TagOverrides,
) -> anyhow::Result<()> {
    let ingestor = build_ingestor(config).await?;

    let result = ingestor
        .ingest_with_overrides(file, config.pipeline.waveform_points, overrides)
        .await
        .with_context(|| format!("Rejected {}", file.display()))?;

    print_json(&result)
}

async fn probe_file(config: &IngestConfig, file: &Path) -> anyhow::Result<()> {
    let ingestor = build_ingestor(config).await?;

    let metadata = ingestor
        .probe(file)
        .await
        .with_context(|| format!("Rejected {}", file.display()))?;

    print_json(&metadata)
}

async fn waveform(config: &IngestConfig, file: &Path) -> anyhow::Result<()> {
    let ingestor = build_ingestor(config).await?;

    let envelope = ingestor
        .waveform(file, config.pipeline.waveform_points)
        .await
        .with_context(|| format!("No waveform for {}", file.display()))?;

    print_json(&envelope)
}

async fn scan_directory(config: &IngestConfig, path: &Path) -> anyhow::Result<()> {
    let ingestor = Arc::new(build_ingestor(config).await?);
    let scanner = LibraryScanner::with_options(ingestor, config.scan_options());

    let (tx, mut rx) = mpsc::channel(100);

    let progress = tokio::spawn(async move {
        let mut done = 0usize;
        let mut total = 0usize;
        while let Some(update) = rx.recv().await {
            match update {
                ScanProgress::Started { total_files } => {
                    total = total_files;
                    tracing::info!("Found {} audio files", total_files);
                }
                ScanProgress::FileIngested { path, degraded } => {
                    done += 1;
                    if degraded {
                        tracing::info!("[{}/{}] {} (degraded)", done, total, path.display());
                    } else {
                        tracing::info!("[{}/{}] {}", done, total, path.display());
                    }
                }
                ScanProgress::FileRejected { path, error } => {
                    done += 1;
                    tracing::warn!("[{}/{}] {} rejected: {}", done, total, path.display(), error);
                }
                ScanProgress::Completed { ingested, rejected } => {
                    tracing::info!("Scan finished: {} ingested, {} rejected", ingested, rejected);
                }
            }
        }
    });

    let report = scanner.scan(path, Some(tx)).await?;
    let _ = progress.await;

    let summary = ScanSummary {
        files_discovered: report.files_discovered,
        ingested: report.ingested.len(),
        degraded: report
            .ingested
            .iter()
            .filter(|(_, result)| result.is_degraded())
            .map(|(path, _)| path.clone())
            .collect(),
        rejected: report
            .rejected
            .into_iter()
            .map(|(path, error)| RejectedFile { path, error })
            .collect(),
    };

    print_json(&summary)
}
