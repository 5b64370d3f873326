/// CLI configuration
use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use soul_ingest::{FfmpegEngine, IngestOptions, LocalAssetSink, ScanOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "soul-ingest.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_engine")]
    pub engine: EngineSettings,

    #[serde(default = "default_pipeline")]
    pub pipeline: PipelineSettings,

    #[serde(default = "default_storage")]
    pub storage: StorageSettings,

    #[serde(default = "default_scan")]
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Defaults to `ffprobe` next to `ffmpeg_path`
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    #[serde(default = "default_waveform_points")]
    pub waveform_points: usize,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_artwork_timeout_secs")]
    pub artwork_timeout_secs: u64,

    #[serde(default = "default_decode_timeout_secs")]
    pub decode_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_decodes")]
    pub max_concurrent_decodes: usize,

    #[serde(default = "default_enabled")]
    pub extract_artwork: bool,

    #[serde(default = "default_enabled")]
    pub compute_waveform: bool,

    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default = "default_artwork_dir")]
    pub artwork_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanSettings {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl IngestConfig {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise `soul-ingest.toml` is read if
    /// present. `SOUL_INGEST_*` variables override file values, with `__`
    /// between section and key (`SOUL_INGEST_PIPELINE__WAVEFORM_POINTS=200`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings =
                    settings.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SOUL_INGEST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.waveform_points == 0 {
            return Err(CliError::Invalid(
                "pipeline.waveform_points must be at least 1".to_string(),
            ));
        }

        let timeouts = [
            ("probe_timeout_secs", self.pipeline.probe_timeout_secs),
            ("artwork_timeout_secs", self.pipeline.artwork_timeout_secs),
            ("decode_timeout_secs", self.pipeline.decode_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(CliError::Invalid(format!("pipeline.{} must be non-zero", name)));
        }

        if self.pipeline.max_concurrent_decodes == 0 {
            return Err(CliError::Invalid(
                "pipeline.max_concurrent_decodes must be non-zero".to_string(),
            ));
        }

        if self.scan.max_in_flight == 0 {
            return Err(CliError::Invalid(
                "scan.max_in_flight must be non-zero".to_string(),
            ));
        }

        if self.scan.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(CliError::Invalid(
                "scan.extensions must list at least one extension".to_string(),
            ));
        }

        Ok(())
    }

    pub fn engine(&self) -> FfmpegEngine {
        let engine = FfmpegEngine::new(self.engine.ffmpeg_path.clone());
        match &self.engine.ffprobe_path {
            Some(ffprobe) => engine.with_ffprobe(ffprobe.clone()),
            None => engine,
        }
    }

    pub fn sink(&self) -> LocalAssetSink {
        LocalAssetSink::new(self.storage.artwork_dir.clone())
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            waveform_points: self.pipeline.waveform_points,
            probe_timeout: Duration::from_secs(self.pipeline.probe_timeout_secs),
            artwork_timeout: Duration::from_secs(self.pipeline.artwork_timeout_secs),
            decode_timeout: Duration::from_secs(self.pipeline.decode_timeout_secs),
            max_concurrent_decodes: self.pipeline.max_concurrent_decodes,
            extract_artwork: self.pipeline.extract_artwork,
            compute_waveform: self.pipeline.compute_waveform,
            scratch_dir: self.pipeline.scratch_dir.clone(),
        }
    }

    /// Extensions are normalized to lowercase without a leading dot
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self
                .scan
                .extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            max_in_flight: self.scan.max_in_flight,
        }
    }
}

// Default values
fn default_engine() -> EngineSettings {
    EngineSettings {
        ffmpeg_path: default_ffmpeg_path(),
        ffprobe_path: None,
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_pipeline() -> PipelineSettings {
    PipelineSettings {
        waveform_points: default_waveform_points(),
        probe_timeout_secs: default_probe_timeout_secs(),
        artwork_timeout_secs: default_artwork_timeout_secs(),
        decode_timeout_secs: default_decode_timeout_secs(),
        max_concurrent_decodes: default_max_concurrent_decodes(),
        extract_artwork: default_enabled(),
        compute_waveform: default_enabled(),
        scratch_dir: None,
    }
}

fn default_waveform_points() -> usize {
    soul_ingest::DEFAULT_POINTS
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_artwork_timeout_secs() -> u64 {
    30
}

fn default_decode_timeout_secs() -> u64 {
    120
}

fn default_max_concurrent_decodes() -> usize {
    IngestOptions::default().max_concurrent_decodes
}

fn default_enabled() -> bool {
    true
}

fn default_storage() -> StorageSettings {
    StorageSettings {
        artwork_dir: default_artwork_dir(),
    }
}

fn default_artwork_dir() -> PathBuf {
    PathBuf::from("uploads/album_art")
}

fn default_scan() -> ScanSettings {
    ScanSettings {
        extensions: default_extensions(),
        max_in_flight: default_max_in_flight(),
    }
}

fn default_extensions() -> Vec<String> {
    soul_ingest::DEFAULT_EXTENSIONS
        .iter()
        .map(|e| (*e).to_string())
        .collect()
}

fn default_max_in_flight() -> usize {
    ScanOptions::default().max_in_flight
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            pipeline: default_pipeline(),
            storage: default_storage(),
            scan: default_scan(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soul-ingest.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = IngestConfig::default();
        config.validate().unwrap();

        assert_eq!(config.pipeline.waveform_points, 100);
        assert_eq!(config.storage.artwork_dir, PathBuf::from("uploads/album_art"));
        assert_eq!(config.scan.extensions, vec!["mp3", "wav", "flac", "m4a"]);

        let options = config.ingest_options();
        assert_eq!(options.probe_timeout, Duration::from_secs(30));
        assert_eq!(options.decode_timeout, Duration::from_secs(120));
        assert!(options.extract_artwork && options.compute_waveform);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let (_dir, path) = write_config(
            r#"
[pipeline]
waveform_points = 250
decode_timeout_secs = 10

[storage]
artwork_dir = "/var/lib/soul/art"
"#,
        );

        let config = IngestConfig::load(Some(path.as_path())).unwrap();

        assert_eq!(config.pipeline.waveform_points, 250);
        assert_eq!(config.pipeline.decode_timeout_secs, 10);
        assert_eq!(config.pipeline.probe_timeout_secs, 30);
        assert_eq!(config.storage.artwork_dir, PathBuf::from("/var/lib/soul/art"));
        assert_eq!(config.engine.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = IngestConfig::load(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = IngestConfig::default();
        config.pipeline.waveform_points = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.pipeline.artwork_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("artwork_timeout_secs"));

        let mut config = IngestConfig::default();
        config.pipeline.max_concurrent_decodes = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.scan.extensions = vec![" ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scan_extensions_are_normalized() {
        let mut config = IngestConfig::default();
        config.scan.extensions = vec![".MP3".to_string(), "Flac".to_string(), String::new()];

        assert_eq!(config.scan_options().extensions, vec!["mp3", "flac"]);
    }

    #[test]
    fn test_engine_paths() {
        let mut config = IngestConfig::default();
        config.engine.ffmpeg_path = PathBuf::from("/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(
            config.engine().ffprobe_path(),
            Path::new("/opt/ffmpeg/bin/ffprobe")
        );

        config.engine.ffprobe_path = Some(PathBuf::from("/usr/local/bin/ffprobe"));
        assert_eq!(
            config.engine().ffprobe_path(),
            Path::new("/usr/local/bin/ffprobe")
        );
    }
}
