//! Experiment tracking: metric records, videos, artifacts and the backend
//! contract.
//!
//! The training loop emits one [`LogRecord`] per iteration and one
//! [`ModelArtifact`] at completion. Where they end up is the [`Tracker`]'s
//! business; [`LocalTracker`] writes them under the run directory.

pub mod local;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::env::Frame;

pub use local::LocalTracker;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// An evaluation video, laid out `[time, channel, height, width]` in `u8`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub fps: f64,
    pub shape: [usize; 4],
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Video {
    /// Stack captured frames into a `t c h w` video.
    ///
    /// Returns `None` when no well-formed frame was captured. Frames whose
    /// buffer does not hold `height * width * channels` bytes, or whose size
    /// differs from the first well-formed one, are dropped.
    pub fn from_frames(frames: &[Frame], fps: f64) -> Option<Self> {
        let first = frames.iter().find(|f| f.is_well_formed())?;
        let (h, w, c) = (first.height, first.width, first.channels);
        let frames: Vec<&Frame> = frames
            .iter()
            .filter(|f| f.is_well_formed() && f.height == h && f.width == w && f.channels == c)
            .collect();

        let mut data = Vec::with_capacity(frames.len() * c * h * w);
        for frame in &frames {
            for ch in 0..c {
                for y in 0..h {
                    for x in 0..w {
                        data.push(frame.data[(y * w + x) * c + ch]);
                    }
                }
            }
        }
        Some(Self {
            fps,
            shape: [frames.len(), c, h, w],
            data,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.shape[0]
    }
}

/// A single logged value.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    Scalar(f64),
    Video(Video),
}

/// One iteration's worth of metrics, keyed by dotted/slashed metric name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRecord {
    values: BTreeMap<String, LogValue>,
}

impl LogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_scalar(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), LogValue::Scalar(value));
    }

    pub fn insert_video(&mut self, key: impl Into<String>, video: Video) {
        self.values.insert(key.into(), LogValue::Video(video));
    }

    /// Merge another record into this one; later values win.
    pub fn extend(&mut self, other: LogRecord) {
        self.values.extend(other.values);
    }

    /// Merge plain scalar metrics.
    pub fn extend_scalars<I, K>(&mut self, metrics: I)
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        for (key, value) in metrics {
            self.insert_scalar(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&LogValue> {
        self.values.get(key)
    }

    pub fn get_scalar(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            LogValue::Scalar(v) => Some(*v),
            LogValue::Video(_) => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Scalar entries only, in key order.
    pub fn scalars(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().filter_map(|(k, v)| match v {
            LogValue::Scalar(x) => Some((k.as_str(), *x)),
            LogValue::Video(_) => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LogValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named, typed, versioned bundle of files plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    /// Artifact type, e.g. `model`.
    pub kind: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub files: Vec<PathBuf>,
}

impl ModelArtifact {
    /// A `model` artifact described by its own name.
    pub fn model(name: impl Into<String>, metadata: serde_json::Value) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            kind: "model".into(),
            metadata,
            files: Vec::new(),
        }
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>) {
        self.files.push(path.into());
    }
}

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

/// Experiment logging backend.
pub trait Tracker {
    /// Append one record.
    fn log(&mut self, record: &LogRecord) -> Result<()>;

    /// Register an artifact and return the version it was stored under.
    fn log_artifact(&mut self, artifact: &ModelArtifact) -> Result<u32>;

    /// Flush and close the run.
    fn finish(&mut self) -> Result<()>;
}
