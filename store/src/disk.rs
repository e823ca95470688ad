//! The single disk-writer task: append-only JSON Lines with rotation.
//!
//! One writer task serializes all disk I/O so the append hot path never
//! touches the filesystem. Events arrive over an unbounded channel; each is
//! written as one JSON line to the live file. Before a write, the writer
//! checks the rotation conditions: the live file's month key differs from
//! the event's month, or the live file has grown past the configured size
//! threshold. Rotation gzip-compresses the live file into a dated,
//! numbered part and truncates the live file.
//!
//! Every failure in here is logged and swallowed: durability is best-effort
//! by design, and a broken disk must never stall the in-memory pipeline.

use crate::config::StoreConfig;
use chrono::{DateTime, Utc};
use flate2::{Compression, write::GzEncoder};
use metrics::counter;
use pulsefeed_core::ActivityEvent;
use std::io::{self, Write as _};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// File name of the live (uncompressed) log inside the data directory.
pub const LIVE_FILE: &str = "activity.log";

/// Month key (`YYYY-MM`) for a millisecond timestamp.
#[must_use]
pub fn month_key_of_ms(ms: u64) -> String {
    let ts = i64::try_from(ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(ts)
        .unwrap_or_else(Utc::now)
        .format("%Y-%m")
        .to_string()
}

/// State of the disk-writer task.
pub(crate) struct LogWriter {
    data_dir: PathBuf,
    live_path: PathBuf,
    rotation_max_bytes: u64,
    /// Month key of the data currently in the live file. Lazily detected
    /// from the file's first line on the first write after startup.
    live_month: Option<String>,
}

impl LogWriter {
    pub(crate) fn new(config: &StoreConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            live_path: config.data_dir.join(LIVE_FILE),
            rotation_max_bytes: config.rotation_max_bytes,
            live_month: None,
        }
    }

    /// Drain the channel until every sender is gone, then stop.
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ActivityEvent>) {
        while let Some(event) = rx.recv().await {
            if let Err(e) = self.append(&event).await {
                counter!("pulsefeed_log_write_failures").increment(1);
                warn!(error = %e, event_id = %event.id, "activity log write failed; event kept in memory only");
            }
        }
        debug!("activity log writer stopped");
    }

    async fn append(&mut self, event: &ActivityEvent) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let month = month_key_of_ms(event.id.timestamp_ms());
        self.maybe_rotate(&month).await?;

        let mut line = serde_json::to_string(event).map_err(io::Error::other)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.live_path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Rotate the live file if its month key differs from `current_month`
    /// or its size exceeds the configured threshold.
    async fn maybe_rotate(&mut self, current_month: &str) -> io::Result<()> {
        let meta = match tokio::fs::metadata(&self.live_path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.live_month = Some(current_month.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if self.live_month.is_none() {
            self.live_month = self.detect_live_month().await;
        }
        let live_month = self
            .live_month
            .clone()
            .unwrap_or_else(|| current_month.to_string());

        if live_month != current_month || meta.len() > self.rotation_max_bytes {
            self.rotate(&live_month).await?;
            self.live_month = Some(current_month.to_string());
        }
        Ok(())
    }

    /// Month key of the data already in the live file, from its first line.
    async fn detect_live_month(&self) -> Option<String> {
        let content = tokio::fs::read_to_string(&self.live_path).await.ok()?;
        let first = content.lines().next()?;
        let event: ActivityEvent = serde_json::from_str(first).ok()?;
        Some(month_key_of_ms(event.id.timestamp_ms()))
    }

    /// Compress the live file into the next dated part, then truncate it.
    async fn rotate(&self, month: &str) -> io::Result<()> {
        let part = self.next_part_number(month).await?;
        let part_path = self.data_dir.join(format!("activity-{month}.{part}.log.gz"));
        let live_path = self.live_path.clone();
        let target = part_path.clone();

        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let bytes = std::fs::read(&live_path)?;
            let file = std::fs::File::create(&target)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&bytes)?;
            encoder.finish()?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)??;

        // Truncate the live file only after the part is safely on disk.
        tokio::fs::File::create(&self.live_path).await?;

        counter!("pulsefeed_log_rotations").increment(1);
        info!(part = %part_path.display(), "rotated activity log");
        Ok(())
    }

    /// Next free part number for `month` (counters restart per month key).
    async fn next_part_number(&self, month: &str) -> io::Result<u32> {
        let prefix = format!("activity-{month}.");
        let suffix = ".log.gz";
        let mut highest = 0u32;

        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(number) = rest.strip_suffix(suffix) else {
                continue;
            };
            if let Ok(n) = number.parse::<u32>() {
                highest = highest.max(n);
            }
        }
        Ok(highest + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_formats_utc() {
        // 2023-11-14T22:13:20Z
        assert_eq!(month_key_of_ms(1_700_000_000_000), "2023-11");
    }

    #[test]
    fn month_key_survives_overflow() {
        assert_eq!(month_key_of_ms(0), "1970-01");
    }
}
