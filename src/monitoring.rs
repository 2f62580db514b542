//! Runtime stats for the capture: a once-a-second throughput/total line on the
//! terminal and, optionally, a timestamped sample count in a plain text log.
//! None of this may slow down or steer the capture path.

use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::{
    complex::BYTES_PER_SAMPLE,
    error::{Error, Result},
};

const UNITS: [char; 4] = [' ', 'k', 'M', 'G'];

/// Scale `val` down in steps of 1000 until it is below 1000 or we run out of units
pub fn autoscale(mut val: f64) -> (f64, char) {
    let mut unit = 0;
    while val >= 1000.0 && unit + 1 < UNITS.len() {
        val /= 1000.0;
        unit += 1;
    }
    (val, UNITS[unit])
}

/// Final human-readable byte count
pub fn summary(bytes: u64) -> String {
    let (v, u) = autoscale(bytes as f64);
    format!("wrote {:.2} {}Bytes ({} Bytes)", v, u, bytes)
}

/// Cumulative byte count at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSample {
    pub at: DateTime<Utc>,
    pub bytes: u64,
}

impl RateSample {
    /// Bytes per second between `earlier` and this sample
    pub fn rate_since(&self, earlier: &RateSample) -> f64 {
        let dt = (self.at - earlier.at)
            .num_microseconds()
            .map(|us| us as f64 / 1e6)
            .unwrap_or(f64::INFINITY);
        if dt <= 0.0 {
            return 0.0;
        }
        (self.bytes.saturating_sub(earlier.bytes)) as f64 / dt
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateReport {
    pub sample: RateSample,
    pub bytes_per_sec: f64,
}

impl fmt::Display for RateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rate, ru) = autoscale(self.bytes_per_sec);
        let (total, tu) = autoscale(self.sample.bytes as f64);
        write!(f, "~{:5.1} {}B/s, total: {:6.2} {}B", rate, ru, total, tu)
    }
}

/// Append-only log of `<unix seconds>.<micros> <samples>` lines
pub struct RateLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RateLog {
    /// Create the log, refusing to touch an existing file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| {
                if source.kind() == io::ErrorKind::AlreadyExists {
                    Error::AlreadyExists { path: path.clone() }
                } else {
                    Error::Log {
                        path: path.clone(),
                        source,
                    }
                }
            })?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, sample: &RateSample) -> io::Result<()> {
        writeln!(self.writer, "{}", log_line(sample))?;
        self.writer.flush()
    }
}

fn log_line(sample: &RateSample) -> String {
    format!(
        "{}.{:06} {}",
        sample.at.timestamp(),
        sample.at.timestamp_subsec_micros(),
        sample.bytes / BYTES_PER_SAMPLE as u64
    )
}

pub struct RateReporter<W: Write> {
    interval: Duration,
    last: Option<RateSample>,
    next_tick: Option<DateTime<Utc>>,
    log: Option<RateLog>,
    status: W,
}

impl<W: Write> RateReporter<W> {
    /// Report to `status` once a second
    pub fn new(status: W, log: Option<RateLog>) -> Self {
        Self {
            interval: Duration::seconds(1),
            last: None,
            next_tick: None,
            log,
            status,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Advance the tick state. The first call only arms the reporter, later calls
    /// produce a report once `interval` has passed since the previous tick.
    pub fn tick(&mut self, now: DateTime<Utc>, total_bytes: u64) -> Option<RateReport> {
        if matches!(self.next_tick, Some(next) if now < next) {
            return None;
        }
        self.next_tick = Some(now + self.interval);
        let sample = RateSample {
            at: now,
            bytes: total_bytes,
        };
        let report = self.last.map(|prev| RateReport {
            sample,
            bytes_per_sec: sample.rate_since(&prev),
        });
        self.last = Some(sample);
        report
    }

    pub fn observe(&mut self, total_bytes: u64) {
        self.observe_at(Utc::now(), total_bytes)
    }

    pub fn observe_at(&mut self, now: DateTime<Utc>, total_bytes: u64) {
        let Some(report) = self.tick(now, total_bytes) else {
            return;
        };
        // Nobody watching the terminal is not our problem
        let _ = write!(self.status, "\r{}", report);
        let _ = self.status.flush();
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.record(&report.sample) {
                warn!("Disabling rate log {}: {}", log.path().display(), e);
                self.log = None;
            }
        }
    }

    /// Blank out the status line
    pub fn clear(&mut self) {
        let _ = write!(self.status, "\r{:40}\r", "");
        let _ = self.status.flush();
    }

    pub fn status(&self) -> &W {
        &self.status
    }
}
