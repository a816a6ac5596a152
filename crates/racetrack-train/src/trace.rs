//! JSONL output: pose traces for renderers and per-episode statistics
//!
//! The environment loop is synchronous, so the pose sink only queues
//! records; a tokio task owns the file and drains the queue.

use std::path::Path;

use anyhow::{Context, Result};
use racetrack_core::RLError;
use racetrack_env::{FrameSink, TrackGeometry, VehicleState};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One line of a pose trace
#[derive(Debug, Clone, Serialize)]
pub struct PoseRecord {
    /// Frame counter across the whole run
    pub frame: u64,
    /// Car pose at this frame
    #[serde(flatten)]
    pub vehicle: VehicleState,
}

/// Frame sink that streams poses to a JSONL file
pub struct PoseTrace {
    tx: mpsc::UnboundedSender<PoseRecord>,
    frame: u64,
}

/// Handle on the task writing a pose trace
pub struct TraceWriter {
    handle: JoinHandle<std::io::Result<u64>>,
}

impl PoseTrace {
    /// Create (truncate) `path` and start the writer task
    pub async fn create(path: &Path) -> Result<(Self, TraceWriter)> {
        let file = File::create(path)
            .await
            .with_context(|| format!("Failed to create trace file {}", path.display()))?;
        let (tx, mut rx) = mpsc::unbounded_channel::<PoseRecord>();

        let handle = tokio::spawn(async move {
            let mut out = BufWriter::new(file);
            let mut written = 0_u64;
            while let Some(record) = rx.recv().await {
                let line = serde_json::to_string(&record)?;
                out.write_all(line.as_bytes()).await?;
                out.write_all(b"\n").await?;
                written += 1;
            }
            out.flush().await?;
            Ok::<_, std::io::Error>(written)
        });

        Ok((Self { tx, frame: 0 }, TraceWriter { handle }))
    }
}

impl FrameSink for PoseTrace {
    fn on_frame(&mut self, _track: &TrackGeometry, vehicle: &VehicleState) -> racetrack_core::Result<()> {
        let record = PoseRecord {
            frame: self.frame,
            vehicle: *vehicle,
        };
        self.tx
            .send(record)
            .map_err(|_| RLError::FrameSink("pose trace writer has stopped".into()))?;
        self.frame += 1;
        Ok(())
    }
}

impl TraceWriter {
    /// Wait for every queued pose to reach disk.
    ///
    /// Completes once the matching [`PoseTrace`] has been dropped. Returns
    /// the number of records written.
    pub async fn finish(self) -> Result<u64> {
        let written = self.handle.await.context("Trace writer task failed")??;
        Ok(written)
    }
}

/// Appends one JSON object per line
pub struct JsonlWriter {
    out: BufWriter<File>,
}

impl JsonlWriter {
    /// Open `path` for appending, creating it if needed
    pub async fn append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Write one record
    pub async fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.out.write_all(line.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        Ok(())
    }

    /// Flush buffered lines
    pub async fn flush(&mut self) -> Result<()> {
        self.out.flush().await?;
        Ok(())
    }
}
