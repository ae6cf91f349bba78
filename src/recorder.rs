// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Flat text log of sampled metrics (`.hwout` files).
//!
//! A file looks like:
//!
//! ```text
//! Watching NVIDIA A100, NVIDIA A100 on node01
//! Start date: 2025_01_31_14_02_11
//! Keys: Temperature Power
//! 0, 14:02:12.004: 41.000000 88.100000 | 39.000000 71.500000
//! 1, 14:02:13.004: 41.000000 90.300000 | 40.000000 70.900000
//! Finished recording
//! End date: 2025_01_31_14_02_14
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::common::config::AppConfig;
use crate::error::{Error, Result};
use crate::metrics::{MetricStore, ReaderId};

const DEVICE_SEPARATOR: &str = " | ";

/// Number of lines written by `start`.
pub const HEADER_LINES: usize = 3;
/// Number of lines written by `stop`.
pub const TRAILER_LINES: usize = 2;

struct LogSession {
    writer: BufWriter<File>,
    path: PathBuf,
    keys: Vec<String>,
    device_count: usize,
    rows_written: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogStatus {
    pub open: bool,
    pub path: Option<PathBuf>,
    pub rows_written: usize,
}

/// One parsed data line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub tick: i64,
    pub timestamp: String,
    /// `values[device][key]`
    pub values: Vec<Vec<f64>>,
}

#[derive(Default)]
pub struct FileLogger {
    session: Option<LogSession>,
}

/// Logger shared between the display refresh and the API handlers.
pub type SharedLogger = Arc<Mutex<FileLogger>>;

pub fn lock_logger(logger: &SharedLogger) -> MutexGuard<'_, FileLogger> {
    logger.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `<device>_<date>.hwout` with spaces in the device name replaced.
pub fn auto_filename(device_name: &str, now: &DateTime<Local>) -> PathBuf {
    let device = device_name.trim().replace(char::is_whitespace, "_");
    PathBuf::from(format!(
        "{device}_{}.{}",
        now.format(AppConfig::LOG_DATE_FORMAT),
        AppConfig::LOG_FILE_EXTENSION
    ))
}

impl FileLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    pub fn status(&self) -> LogStatus {
        LogStatus {
            open: self.is_open(),
            path: self.path().map(Path::to_path_buf),
            rows_written: self.session.as_ref().map_or(0, |s| s.rows_written),
        }
    }

    /// Open a new session and write the header. A session that is already
    /// open is stopped first.
    pub fn start(
        &mut self,
        target: Option<PathBuf>,
        device_names: &[String],
        host_name: &str,
        metric_keys: &[String],
    ) -> Result<PathBuf> {
        if device_names.is_empty() {
            return Err(Error::NoDevicesFound);
        }
        if metric_keys.is_empty() {
            return Err(Error::Config("a log session needs at least one metric key".into()));
        }
        self.stop()?;

        let now = Local::now();
        let path = target.unwrap_or_else(|| auto_filename(&device_names[0], &now));
        let mut writer = BufWriter::new(File::create(&path)?);

        writeln!(writer, "Watching {} on {host_name}", device_names.join(", "))?;
        writeln!(writer, "Start date: {}", now.format(AppConfig::LOG_DATE_FORMAT))?;
        writeln!(writer, "Keys: {}", metric_keys.join(" "))?;
        writer.flush()?;

        tracing::info!("Started recording to {}", path.display());
        self.session = Some(LogSession {
            writer,
            path: path.clone(),
            keys: metric_keys.to_vec(),
            device_count: device_names.len(),
            rows_written: 0,
        });
        Ok(path)
    }

    /// Start a session over every key of `store`. Samples already in the
    /// store are skipped; only ticks published from now on are logged.
    pub fn start_recording(
        &mut self,
        store: &MetricStore,
        target: Option<PathBuf>,
        device_names: &[String],
        host_name: &str,
    ) -> Result<PathBuf> {
        let path = self.start(target, device_names, host_name, store.keys())?;
        store.mark_read(ReaderId::LOGGER);
        Ok(path)
    }

    /// Write one line per tick. `rows[i][device]` holds the values of tick
    /// `i` for one device, in registered key order.
    pub fn append(
        &mut self,
        ticks: &[i64],
        timestamps: &[String],
        rows: &[Vec<Vec<f64>>],
    ) -> Result<usize> {
        let session = self.session.as_mut().ok_or(Error::LogNotOpen)?;
        if ticks.len() != timestamps.len() || ticks.len() != rows.len() {
            return Err(Error::RowWidthMismatch {
                expected: ticks.len(),
                actual: timestamps.len().min(rows.len()),
            });
        }

        let width = session.keys.len();
        for row in rows {
            if row.len() != session.device_count {
                return Err(Error::RowWidthMismatch {
                    expected: session.device_count,
                    actual: row.len(),
                });
            }
            if let Some(bad) = row.iter().find(|values| values.len() != width) {
                return Err(Error::RowWidthMismatch {
                    expected: width,
                    actual: bad.len(),
                });
            }
        }

        for ((tick, timestamp), row) in ticks.iter().zip(timestamps).zip(rows) {
            let groups: Vec<String> = row
                .iter()
                .map(|values| {
                    values
                        .iter()
                        .map(|v| format!("{v:.6}"))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            writeln!(
                session.writer,
                "{tick}, {timestamp}: {}",
                groups.join(DEVICE_SEPARATOR)
            )?;
        }
        session.writer.flush()?;
        session.rows_written += rows.len();
        Ok(rows.len())
    }

    /// Append everything the store holds that this logger has not written.
    ///
    /// Reads through the logger's own cursor, so repeated calls never write
    /// a tick twice and the display cursor is left alone. The cursor moves
    /// before the rows are written: an IO error drops that batch from the
    /// file, while a session whose keys the store lacks drains nothing.
    pub fn consume(&mut self, store: &MetricStore) -> Result<usize> {
        let session = self.session.as_ref().ok_or(Error::LogNotOpen)?;
        let known = session
            .keys
            .iter()
            .filter(|key| store.keys().contains(*key))
            .count();
        if known != session.keys.len() {
            return Err(Error::RowWidthMismatch {
                expected: session.keys.len(),
                actual: known,
            });
        }
        let devices: Vec<usize> = (0..session.device_count.min(store.device_count())).collect();
        let batch = store.drain(ReaderId::LOGGER, &devices, &session.keys);
        if batch.is_empty() {
            return Ok(0);
        }

        let ticks: Vec<i64> = batch.ticks.iter().map(|t| t.index).collect();
        let timestamps: Vec<String> = batch
            .ticks
            .iter()
            .map(|t| t.wall.format(AppConfig::LOG_TIMESTAMP_FORMAT).to_string())
            .collect();
        let rows: Vec<Vec<Vec<f64>>> = (0..batch.len()).map(|i| batch.row(i)).collect();
        self.append(&ticks, &timestamps, &rows)
    }

    /// Write the trailer and close the file. No-op when nothing is open.
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        writeln!(session.writer, "Finished recording")?;
        writeln!(
            session.writer,
            "End date: {}",
            Local::now().format(AppConfig::LOG_DATE_FORMAT)
        )?;
        session.writer.flush()?;
        tracing::info!(
            "Finished recording {} row(s) to {}",
            session.rows_written,
            session.path.display()
        );
        Ok(())
    }
}

impl Drop for FileLogger {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("Failed to close log session: {e}");
        }
    }
}

/// Parse a data line written by [`FileLogger::append`].
pub fn parse_line(line: &str) -> Result<LogLine> {
    let (tick, rest) = line
        .split_once(", ")
        .ok_or_else(|| Error::Parse(format!("missing tick separator in '{line}'")))?;
    let tick = tick
        .trim()
        .parse::<i64>()
        .map_err(|e| Error::Parse(format!("bad tick '{tick}': {e}")))?;
    let (timestamp, values) = rest
        .split_once(": ")
        .ok_or_else(|| Error::Parse(format!("missing timestamp separator in '{line}'")))?;

    let values = values
        .split(DEVICE_SEPARATOR)
        .map(|group| {
            group
                .split_whitespace()
                .map(|v| {
                    v.parse::<f64>()
                        .map_err(|e| Error::Parse(format!("bad value '{v}': {e}")))
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LogLine {
        tick,
        timestamp: timestamp.to_string(),
        values,
    })
}
