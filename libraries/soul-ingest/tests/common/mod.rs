//! Shared helpers for soul-ingest integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use soul_ingest::{
    ContainerInfo, DecodingEngine, EngineError, IngestOptions, Ingestor, LocalAssetSink, PcmFormat,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tempfile::TempDir;

static INIT: Once = Once::new();

/// Initialize test logging once
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// What the fake engine does when asked for the embedded picture
#[derive(Debug, Clone)]
pub enum PictureBehavior {
    /// Write these bytes to the destination
    Bytes(Vec<u8>),
    /// Report that the container has no picture
    NoStream,
    /// Write a partial file, then fail
    Fail,
}

/// What the fake engine does when asked for PCM
#[derive(Debug, Clone)]
pub enum PcmBehavior {
    /// Write these samples as s16le
    Samples(Vec<i16>),
    /// Write a partial file, then fail
    Fail,
}

/// Scriptable in-memory decoding engine
pub struct FakeEngine {
    pub info: ContainerInfo,
    pub picture: PictureBehavior,
    pub pcm: PcmBehavior,
    /// Files whose name contains one of these fail to probe
    pub unreadable: Vec<String>,
    /// Files whose name contains one of these make the probe panic
    pub panics: Vec<String>,
    pub probe_delay: Duration,
    pub picture_delay: Duration,
    pub pcm_delay: Duration,

    pub probe_calls: AtomicUsize,
    pub picture_calls: AtomicUsize,
    pub pcm_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub picture_dests: Mutex<Vec<PathBuf>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            info: tagged_info(&[("title", "Test Song"), ("artist", "Test Artist")], "2.0"),
            picture: PictureBehavior::NoStream,
            pcm: PcmBehavior::Samples(ramp(16000)),
            unreadable: Vec::new(),
            panics: Vec::new(),
            probe_delay: Duration::ZERO,
            picture_delay: Duration::ZERO,
            pcm_delay: Duration::ZERO,
            probe_calls: AtomicUsize::new(0),
            picture_calls: AtomicUsize::new(0),
            pcm_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            picture_dests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEngine {
    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.probe_calls.load(Ordering::SeqCst),
            self.picture_calls.load(Ordering::SeqCst),
            self.pcm_calls.load(Ordering::SeqCst),
        )
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }
}

/// Decrements the in-flight counter even when the call is cancelled
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl DecodingEngine for FakeEngine {
    async fn probe(&self, source: &Path) -> Result<ContainerInfo, EngineError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter();
        pause(self.probe_delay).await;

        let name = source.file_name().unwrap_or_default().to_string_lossy();
        if self.panics.iter().any(|p| name.contains(p.as_str())) {
            panic!("demuxer crashed on {}", name);
        }
        if self.unreadable.iter().any(|u| name.contains(u.as_str())) {
            return Err(EngineError::UnsupportedInput(format!(
                "{}: Invalid data found when processing input",
                name
            )));
        }
        Ok(self.info.clone())
    }

    async fn extract_picture(
        &self,
        _source: &Path,
        _stream: Option<usize>,
        dest: &Path,
    ) -> Result<(), EngineError> {
        self.picture_calls.fetch_add(1, Ordering::SeqCst);
        self.picture_dests.lock().unwrap().push(dest.to_path_buf());
        let _guard = self.enter();

        match &self.picture {
            PictureBehavior::NoStream => {
                pause(self.picture_delay).await;
                Err(EngineError::NoSuchStream("0:v:0".to_string()))
            }
            PictureBehavior::Fail => {
                std::fs::write(dest, b"partial")?;
                pause(self.picture_delay).await;
                Err(EngineError::Failed("muxer error".to_string()))
            }
            PictureBehavior::Bytes(bytes) => {
                // Partial write first so a timeout leaves something to clean up
                std::fs::write(dest, &bytes[..bytes.len() / 2])?;
                pause(self.picture_delay).await;
                std::fs::write(dest, bytes)?;
                Ok(())
            }
        }
    }

    async fn transcode_pcm(
        &self,
        _source: &Path,
        format: PcmFormat,
        dest: &Path,
    ) -> Result<(), EngineError> {
        self.pcm_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(format, PcmFormat::ANALYSIS);
        let _guard = self.enter();

        match &self.pcm {
            PcmBehavior::Samples(samples) => {
                std::fs::write(dest, b"\x00\x00")?;
                pause(self.pcm_delay).await;
                let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                std::fs::write(dest, bytes)?;
                Ok(())
            }
            PcmBehavior::Fail => {
                std::fs::write(dest, b"\x00\x00\x00")?;
                pause(self.pcm_delay).await;
                Err(EngineError::UnsupportedInput("unknown codec".to_string()))
            }
        }
    }
}

/// Container info with the given format tags and duration
pub fn tagged_info(tags: &[(&str, &str)], duration: &str) -> ContainerInfo {
    let mut info = ContainerInfo::default();
    for (key, value) in tags {
        info.tags.insert((*key).to_string(), (*value).to_string());
    }
    info.duration = Some(duration.to_string());
    info.bit_rate = Some("128000".to_string());
    info
}

/// Linearly increasing samples, 0 up to `len - 1` (clamped to i16)
pub fn ramp(len: usize) -> Vec<i16> {
    (0..len).map(|i| i16::try_from(i).unwrap_or(i16::MAX)).collect()
}

/// Temporary layout for one test: a source file, an art dir and a scratch dir
pub struct TestDirs {
    pub root: TempDir,
    pub art_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

impl TestDirs {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let art_dir = root.path().join("album_art");
        let scratch_dir = root.path().join("scratch");
        std::fs::create_dir_all(&art_dir).unwrap();
        std::fs::create_dir_all(&scratch_dir).unwrap();
        Self {
            root,
            art_dir,
            scratch_dir,
        }
    }

    /// Create a (fake) audio file and return its path
    pub fn source(&self, name: &str) -> PathBuf {
        let path = self.root.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"not really audio").unwrap();
        path
    }

    pub fn options(&self) -> IngestOptions {
        IngestOptions {
            scratch_dir: Some(self.scratch_dir.clone()),
            ..Default::default()
        }
    }

    pub fn ingestor(&self, engine: FakeEngine) -> (Arc<FakeEngine>, Ingestor<FakeEngine, LocalAssetSink>) {
        self.ingestor_with(engine, self.options())
    }

    pub fn ingestor_with(
        &self,
        engine: FakeEngine,
        options: IngestOptions,
    ) -> (Arc<FakeEngine>, Ingestor<FakeEngine, LocalAssetSink>) {
        let engine = Arc::new(engine);
        let sink = Arc::new(LocalAssetSink::new(self.art_dir.clone()));
        let ingestor = Ingestor::with_options(Arc::clone(&engine), sink, options);
        (engine, ingestor)
    }

    pub fn art_files(&self) -> Vec<PathBuf> {
        list(&self.art_dir)
    }

    pub fn scratch_files(&self) -> Vec<PathBuf> {
        list(&self.scratch_dir)
    }
}

fn list(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}

/// Check if ffmpeg and ffprobe are on PATH
pub async fn is_ffmpeg_available() -> bool {
    soul_ingest::FfmpegEngine::default().is_available().await
}

/// Write a mono 16-bit PCM WAV file
pub fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> std::io::Result<()> {
    let bits_per_sample: u16 = 16;
    let num_channels: u16 = 1;
    let data_size = u32::try_from(samples.len() * 2).unwrap();
    let file_size = 36 + data_size;

    let mut wav_data = Vec::new();

    // RIFF header
    wav_data.extend_from_slice(b"RIFF");
    wav_data.extend_from_slice(&file_size.to_le_bytes());
    wav_data.extend_from_slice(b"WAVE");

    // fmt chunk
    wav_data.extend_from_slice(b"fmt ");
    wav_data.extend_from_slice(&16u32.to_le_bytes());
    wav_data.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav_data.extend_from_slice(&num_channels.to_le_bytes());
    wav_data.extend_from_slice(&sample_rate.to_le_bytes());
    let byte_rate = sample_rate * u32::from(num_channels) * u32::from(bits_per_sample / 8);
    wav_data.extend_from_slice(&byte_rate.to_le_bytes());
    let block_align = num_channels * (bits_per_sample / 8);
    wav_data.extend_from_slice(&block_align.to_le_bytes());
    wav_data.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav_data.extend_from_slice(b"data");
    wav_data.extend_from_slice(&data_size.to_le_bytes());
    for sample in samples {
        wav_data.extend_from_slice(&sample.to_le_bytes());
    }

    std::fs::write(path, wav_data)
}
