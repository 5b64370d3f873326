/// FFmpeg-backed decoding engine
///
/// Runs `ffprobe` and `ffmpeg` as child processes. Children are killed when
/// their future is dropped, so a stage timeout or cancellation never leaves
/// a decoder running.
use super::{ContainerInfo, DecodingEngine, PcmFormat};
use crate::error::EngineError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FfmpegEngine {
    /// Create an engine for the given ffmpeg binary
    ///
    /// `ffprobe` is expected next to it; use [`FfmpegEngine::with_ffprobe`]
    /// when it lives elsewhere.
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        let ffprobe_path = sibling_ffprobe(&ffmpeg_path);
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }

    /// Override the ffprobe binary location
    pub fn with_ffprobe(mut self, ffprobe_path: PathBuf) -> Self {
        self.ffprobe_path = ffprobe_path;
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe_path
    }

    /// Check that both binaries can be started
    pub async fn is_available(&self) -> bool {
        for program in [&self.ffmpeg_path, &self.ffprobe_path] {
            let mut cmd = command(program);
            cmd.arg("-version");
            match run(program, cmd).await {
                Ok(output) if output.status.success() => {}
                _ => return false,
            }
        }
        true
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new(PathBuf::from("ffmpeg"))
    }
}

#[async_trait]
impl DecodingEngine for FfmpegEngine {
    async fn probe(&self, source: &Path) -> Result<ContainerInfo, EngineError> {
        let mut cmd = command(&self.ffprobe_path);
        cmd.arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(source);

        let output = run(&self.ffprobe_path, cmd).await?;

        if !output.status.success() {
            // ffprobe only fails this way when it cannot open or parse the container
            return Err(EngineError::UnsupportedInput(failure_message(
                "ffprobe", &output,
            )));
        }

        parse_probe_output(&output.stdout)
    }

    async fn extract_picture(
        &self,
        source: &Path,
        stream: Option<usize>,
        dest: &Path,
    ) -> Result<(), EngineError> {
        let mut cmd = command(&self.ffmpeg_path);
        cmd.arg("-v")
            .arg("error")
            .arg("-y") // Overwrite the allocated (possibly pre-created) file
            .arg("-i")
            .arg(source)
            .arg("-map")
            .arg(picture_map(stream))
            .arg("-an")
            .arg("-c:v")
            .arg("copy")
            .arg("-frames:v")
            .arg("1")
            .arg("-f")
            .arg("image2")
            .arg(dest);

        let output = run(&self.ffmpeg_path, cmd).await?;

        if output.status.success() {
            return Ok(());
        }

        let message = failure_message("ffmpeg", &output);
        Err(classify_ffmpeg_failure(message))
    }

    async fn transcode_pcm(
        &self,
        source: &Path,
        format: PcmFormat,
        dest: &Path,
    ) -> Result<(), EngineError> {
        let mut cmd = command(&self.ffmpeg_path);
        cmd.arg("-v")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(source)
            .arg("-vn")
            .arg("-ac")
            .arg(format.channels.to_string())
            .arg("-ar")
            .arg(format.sample_rate.to_string())
            .arg("-c:a")
            .arg("pcm_s16le")
            .arg("-f")
            .arg("s16le")
            .arg(dest);

        let output = run(&self.ffmpeg_path, cmd).await?;

        if output.status.success() {
            return Ok(());
        }

        let message = failure_message("ffmpeg", &output);
        Err(classify_ffmpeg_failure(message))
    }
}

fn picture_map(stream: Option<usize>) -> String {
    match stream {
        Some(index) => format!("0:{}", index),
        None => "0:v:0".to_string(),
    }
}

fn command(program: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

async fn run(program: &Path, mut cmd: Command) -> Result<Output, EngineError> {
    tracing::debug!("Running {:?}", cmd.as_std());
    cmd.output().await.map_err(|source| EngineError::Spawn {
        program: program.display().to_string(),
        source,
    })
}

fn sibling_ffprobe(ffmpeg_path: &Path) -> PathBuf {
    let mut ffprobe = ffmpeg_path.with_file_name("ffprobe");
    if let Some(ext) = ffmpeg_path.extension() {
        ffprobe.set_extension(ext);
    }
    ffprobe
}

fn failure_message(program: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("{} exited with {}", program, output.status)
    } else {
        format!("{} failed: {}", program, stderr)
    }
}

fn classify_ffmpeg_failure(message: String) -> EngineError {
    let lower = message.to_lowercase();
    if lower.contains("matches no streams") || lower.contains("does not contain any stream") {
        EngineError::NoSuchStream(message)
    } else if lower.contains("invalid data found when processing input")
        || lower.contains("no such file or directory")
    {
        EngineError::UnsupportedInput(message)
    } else {
        EngineError::Failed(message)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    index: Option<usize>,
    codec_type: Option<String>,
    codec_name: Option<String>,
    #[serde(default)]
    disposition: BTreeMap<String, i64>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl ProbeStream {
    fn is_type(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }

    fn is_attached_picture(&self) -> bool {
        self.disposition.get("attached_pic").copied().unwrap_or(0) == 1
    }
}

fn parse_probe_output(stdout: &[u8]) -> Result<ContainerInfo, EngineError> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| EngineError::MalformedOutput(format!("ffprobe JSON: {}", e)))?;

    let Some(format) = probe.format else {
        return Err(EngineError::UnsupportedInput(
            "ffprobe reported no container format".to_string(),
        ));
    };

    let mut tags = format.tags;

    // Ogg/Opus keep their comments on the audio stream rather than the container
    if let Some(audio) = probe.streams.iter().find(|s| s.is_type("audio")) {
        for (key, value) in &audio.tags {
            let present = tags.keys().any(|k| k.eq_ignore_ascii_case(key));
            if !present {
                tags.insert(key.clone(), value.clone());
            }
        }
    }

    let video_streams = || probe.streams.iter().filter(|s| s.is_type("video"));
    let picture = video_streams()
        .find(|s| s.is_attached_picture())
        .or_else(|| video_streams().next());

    Ok(ContainerInfo {
        duration: format.duration,
        bit_rate: format.bit_rate,
        size: format.size,
        tags,
        picture_codec: picture.and_then(|s| s.codec_name.clone()),
        picture_stream: picture.and_then(|s| s.index),
    })
}
