use std::path::PathBuf;

/// Errors produced while loading, merging, cleaning or splitting annotation sets.
///
/// Only a few of these ever abort a run. Per-annotation and per-file problems
/// are caught by the stage that hit them and turned into counters in that
/// stage's report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported annotation format (expected .json or .xml): {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("unknown category `{label}`")]
    UnknownCategory { label: String },

    #[error("image file not found: {}", path.display())]
    MissingImageFile { path: PathBuf },

    #[error("image file name `{file_name}` escapes the image directory")]
    UnsafeImagePath { file_name: String },

    #[error("invalid split ratios {ratios:?}: {reason}")]
    InvalidRatios {
        ratios: Vec<f64>,
        reason: &'static str,
    },

    #[error("malformed polygon points `{0}`")]
    MalformedPoints(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse COCO json {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse CVAT xml {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: serde_xml_rs::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying I/O failure is a plain "file does not exist".
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::MissingImageFile { .. } => true,
            Error::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
