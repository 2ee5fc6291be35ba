//! Filesystem tracking backend.
//!
//! Layout under the run directory:
//!
//! ```text
//! config.json                      full run configuration
//! metrics.jsonl                    one JSON object per log call
//! media/<key>_<step>.json          video header (fps, shape)
//! media/<key>_<step>.rgb           raw t-c-h-w bytes
//! artifacts/<name>/v<N>/           copied files + manifest.json
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Map, Value};

use super::{LogRecord, LogValue, ModelArtifact, Tracker, Video};

/// Writes metrics, media and artifacts below one directory.
#[derive(Debug)]
pub struct LocalTracker {
    dir: PathBuf,
    metrics: BufWriter<File>,
    step: u64,
}

impl LocalTracker {
    /// Open (or create) the tracking layout in `dir` and record `config`.
    pub fn new(dir: impl AsRef<Path>, config: &impl serde::Serialize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(dir.join("media"))
            .with_context(|| format!("Failed to create tracking dir {}", dir.display()))?;

        let config_json =
            serde_json::to_string_pretty(config).context("Failed to serialize run config")?;
        fs::write(dir.join("config.json"), config_json)
            .with_context(|| format!("Failed to write config to {}", dir.display()))?;

        let metrics_path = dir.join("metrics.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&metrics_path)
            .with_context(|| format!("Failed to open {}", metrics_path.display()))?;

        tracing::info!(dir = %dir.display(), "Local tracker initialised");
        Ok(Self {
            dir,
            metrics: BufWriter::new(file),
            step: 0,
        })
    }

    fn write_video(&self, key: &str, video: &Video) -> Result<PathBuf> {
        let stem = format!("{}_{}", sanitize(key), self.step);
        let header = self.dir.join("media").join(format!("{stem}.json"));
        let payload = self.dir.join("media").join(format!("{stem}.rgb"));

        fs::write(&header, serde_json::to_string(video)?)
            .with_context(|| format!("Failed to write {}", header.display()))?;
        fs::write(&payload, &video.data)
            .with_context(|| format!("Failed to write {}", payload.display()))?;
        Ok(header)
    }

    /// Next free version number for an artifact name.
    fn next_version(root: &Path) -> Result<u32> {
        if !root.exists() {
            return Ok(0);
        }
        let mut next = 0;
        for entry in fs::read_dir(root)? {
            let name = entry?.file_name();
            if let Some(v) = name
                .to_str()
                .and_then(|n| n.strip_prefix('v'))
                .and_then(|n| n.parse::<u32>().ok())
            {
                next = next.max(v + 1);
            }
        }
        Ok(next)
    }
}

impl Tracker for LocalTracker {
    fn log(&mut self, record: &LogRecord) -> Result<()> {
        let mut row = Map::new();
        row.insert("_step".into(), json!(self.step));
        row.insert("_timestamp".into(), json!(Utc::now().to_rfc3339()));
        for (key, value) in record.iter() {
            let value = match value {
                // JSON has no NaN; serde_json writes non-finite floats as null.
                LogValue::Scalar(x) => json!(x),
                LogValue::Video(video) => {
                    let path = self.write_video(key, video)?;
                    let rel = path.strip_prefix(&self.dir).unwrap_or(path.as_path());
                    json!(rel.display().to_string())
                }
            };
            row.insert(key.to_string(), value);
        }

        serde_json::to_writer(&mut self.metrics, &Value::Object(row))
            .context("Failed to serialize metrics row")?;
        self.metrics.write_all(b"\n")?;
        self.step += 1;
        Ok(())
    }

    fn log_artifact(&mut self, artifact: &ModelArtifact) -> Result<u32> {
        let root = self.dir.join("artifacts").join(sanitize(&artifact.name));
        let version = Self::next_version(&root)?;
        let target = root.join(format!("v{version}"));
        fs::create_dir_all(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;

        let mut files = Vec::with_capacity(artifact.files.len());
        for src in &artifact.files {
            let file_name = src
                .file_name()
                .with_context(|| format!("Artifact file {} has no name", src.display()))?;
            fs::copy(src, target.join(file_name))
                .with_context(|| format!("Failed to copy {} into artifact", src.display()))?;
            files.push(file_name.to_string_lossy().into_owned());
        }

        let manifest = json!({
            "name": artifact.name,
            "type": artifact.kind,
            "description": artifact.description,
            "version": version,
            "created_at": Utc::now().to_rfc3339(),
            "files": files,
            "metadata": artifact.metadata,
        });
        fs::write(
            target.join("manifest.json"),
            serde_json::to_string_pretty(&manifest)?,
        )
        .context("Failed to write artifact manifest")?;

        tracing::info!(
            name = %artifact.name,
            version,
            files = files.len(),
            "Logged artifact"
        );
        Ok(version)
    }

    fn finish(&mut self) -> Result<()> {
        self.metrics.flush().context("Failed to flush metrics")?;
        tracing::info!(dir = %self.dir.display(), records = self.step, "Tracker finished");
        Ok(())
    }
}

/// Make a metric key usable as a file name.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    fn read_rows(dir: &Path) -> Vec<Value> {
        fs::read_to_string(dir.join("metrics.jsonl"))
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_config_and_metrics_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let mut tracker = LocalTracker::new(tmp.path(), &json!({"seed": 3})).unwrap();

        let mut record = LogRecord::new();
        record.insert_scalar("env_frames", 128.0);
        tracker.log(&record).unwrap();
        tracker.log(&record).unwrap();
        tracker.finish().unwrap();

        let config: Value =
            serde_json::from_str(&fs::read_to_string(tmp.path().join("config.json")).unwrap())
                .unwrap();
        assert_eq!(config["seed"], 3);

        let rows = read_rows(tmp.path());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["_step"], 1);
        assert_eq!(rows[0]["env_frames"], 128.0);
    }

    #[test]
    fn test_videos_are_written_to_media() {
        let tmp = tempfile::tempdir().unwrap();
        let mut tracker = LocalTracker::new(tmp.path(), &json!({})).unwrap();
        let frame = Frame {
            height: 2,
            width: 2,
            channels: 3,
            data: vec![7; 12],
        };
        let mut record = LogRecord::new();
        record.insert_video("recording", Video::from_frames(&[frame], 25.0).unwrap());
        tracker.log(&record).unwrap();
        tracker.finish().unwrap();

        let rows = read_rows(tmp.path());
        assert_eq!(rows[0]["recording"], "media/recording_0.json");
        let bytes = fs::read(tmp.path().join("media/recording_0.rgb")).unwrap();
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn test_artifacts_get_increasing_versions() {
        let tmp = tempfile::tempdir().unwrap();
        let mut tracker = LocalTracker::new(tmp.path(), &json!({})).unwrap();
        let file = tmp.path().join("checkpoint_final.json");
        fs::write(&file, "{}").unwrap();

        let mut artifact = ModelArtifact::model("Hover-reinforce", json!({"seed": 1}));
        artifact.add_file(&file);
        assert_eq!(tracker.log_artifact(&artifact).unwrap(), 0);
        assert_eq!(tracker.log_artifact(&artifact).unwrap(), 1);

        let v1 = tmp.path().join("artifacts/Hover-reinforce/v1");
        assert!(v1.join("checkpoint_final.json").exists());
        let manifest: Value =
            serde_json::from_str(&fs::read_to_string(v1.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["type"], "model");
        assert_eq!(manifest["metadata"]["seed"], 1);
    }

    #[test]
    fn test_missing_artifact_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut tracker = LocalTracker::new(tmp.path(), &json!({})).unwrap();
        let mut artifact = ModelArtifact::model("m", json!(null));
        artifact.add_file(tmp.path().join("nope.json"));
        assert!(tracker.log_artifact(&artifact).is_err());
    }
}
