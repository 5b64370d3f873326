/// Container prober
///
/// Turns an engine probe into normalized track metadata. Missing tags are
/// filled field by field from [`TAG_DEFAULTS`], so a file with only an
/// artist tag still gets its artist and defaults for everything else.
use crate::engine::{ContainerInfo, DecodingEngine};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Descriptive tag fields with a defaulting rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagField {
    Title,
    Artist,
    Album,
    Genre,
}

/// Fallback values for absent tags
///
/// `Title` has no constant fallback; it defaults to the source's file name.
pub const TAG_DEFAULTS: [(TagField, &str); 3] = [
    (TagField::Artist, "Unknown Artist"),
    (TagField::Album, "Unknown Album"),
    (TagField::Genre, "Unknown Genre"),
];

impl TagField {
    pub const ALL: [TagField; 4] = [Self::Title, Self::Artist, Self::Album, Self::Genre];

    /// Tag key as written by common taggers
    pub fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Genre => "genre",
        }
    }

    /// Constant fallback for this field, if it has one
    pub fn default_value(self) -> Option<&'static str> {
        TAG_DEFAULTS
            .iter()
            .find(|(field, _)| *field == self)
            .map(|(_, value)| *value)
    }
}

/// Normalized container metadata for one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub duration_seconds: f64,
    pub bitrate: Option<String>,
    pub size_bytes: u64,
    /// Codec of the embedded picture stream, used to name extracted art
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_codec: Option<String>,
    /// Absolute index of the embedded picture stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_stream: Option<usize>,
}

impl ProbeResult {
    /// Build a result from raw engine output
    ///
    /// `file_size` is used when the engine does not report a size.
    pub fn from_container(source: &Path, info: &ContainerInfo, file_size: Option<u64>) -> Self {
        let title = tag_value(info, TagField::Title).unwrap_or_else(|| display_name(source));

        Self {
            title,
            artist: tag_or_default(info, TagField::Artist),
            album: tag_or_default(info, TagField::Album),
            genre: tag_or_default(info, TagField::Genre),
            duration_seconds: parse_duration(info.duration.as_deref()),
            bitrate: info
                .bit_rate
                .as_deref()
                .map(str::trim)
                .filter(|b| !b.is_empty() && *b != "N/A")
                .map(str::to_string),
            size_bytes: info
                .size
                .as_deref()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .or(file_size)
                .unwrap_or(0),
            picture_codec: info.picture_codec.clone(),
            picture_stream: info.picture_stream,
        }
    }

    /// Value of a descriptive field
    pub fn field(&self, field: TagField) -> &str {
        match field {
            TagField::Title => &self.title,
            TagField::Artist => &self.artist,
            TagField::Album => &self.album,
            TagField::Genre => &self.genre,
        }
    }

    /// Replace descriptive fields with caller-supplied values
    ///
    /// Each override applies on its own; blank overrides are ignored.
    pub fn with_overrides(mut self, overrides: &TagOverrides) -> Self {
        for field in TagField::ALL {
            if let Some(value) = overrides.get(field) {
                let slot = match field {
                    TagField::Title => &mut self.title,
                    TagField::Artist => &mut self.artist,
                    TagField::Album => &mut self.album,
                    TagField::Genre => &mut self.genre,
                };
                *slot = value.to_string();
            }
        }
        self
    }
}

/// User-entered values that take precedence over probed tags (upload forms)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagOverrides {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
}

impl TagOverrides {
    /// Non-blank override for `field`
    pub fn get(&self, field: TagField) -> Option<&str> {
        let value = match field {
            TagField::Title => &self.title,
            TagField::Artist => &self.artist,
            TagField::Album => &self.album,
            TagField::Genre => &self.genre,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Probe `source` and normalize the result
///
/// Any engine failure is returned as-is; the caller decides that it is fatal.
pub async fn probe<E>(engine: &E, source: &Path) -> Result<ProbeResult, EngineError>
where
    E: DecodingEngine + ?Sized,
{
    let info = engine.probe(source).await?;

    let file_size = match info.size {
        Some(_) => None,
        None => tokio::fs::metadata(source).await.ok().map(|m| m.len()),
    };

    let result = ProbeResult::from_container(source, &info, file_size);
    tracing::debug!(
        "Probed {}: \"{}\" by {} ({:.1}s)",
        source.display(),
        result.title,
        result.artist,
        result.duration_seconds
    );
    Ok(result)
}

/// Name shown for a source with no title tag
pub fn display_name(source: &Path) -> String {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string())
}

fn tag_value(info: &ContainerInfo, field: TagField) -> Option<String> {
    info.tag(field.key())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn tag_or_default(info: &ContainerInfo, field: TagField) -> String {
    tag_value(info, field)
        .or_else(|| field.default_value().map(str::to_string))
        .unwrap_or_default()
}

fn parse_duration(raw: Option<&str>) -> f64 {
    raw.and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0)
}
