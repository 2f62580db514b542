//! This module contains all the capture logic

// The capture thread does one thing, as fast as possible: hand the radio the
// next unwritten slice of the mapped output file and move the cursor along.
// Everything else (rate display, logging) happens at most once a second.

use std::{
    fs,
    io::Write,
    path::PathBuf,
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    complex::sample_bytes,
    error::{DeviceError, Result},
    monitoring::{RateLog, RateReporter},
    shutdown::ShutdownSignal,
    sized_file::SizedFile,
    source::{RadioConfig, Receive, SampleSource},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Configuring,
    Streaming,
    Draining,
    Closed,
}

/// Why a capture stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The declared size is full
    CapacityReached,
    ShutdownRequested,
    /// The hardware dropped samples, everything before the gap is kept
    Overrun,
    /// The source delivered nothing without reporting an error
    EndOfStream,
    ConfigurationFailed(DeviceError),
    DeviceFailed(DeviceError),
}

impl Termination {
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            Termination::ConfigurationFailed(_) | Termination::DeviceFailed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    /// Bytes of sample data in the finalized file
    pub written_bytes: u64,
    pub termination: Termination,
}

impl CaptureReport {
    pub fn is_success(&self) -> bool {
        self.termination.is_success()
    }
}

/// Where and how much to capture
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub output: PathBuf,
    pub max_bytes: u64,
    pub log: Option<PathBuf>,
    pub radio: RadioConfig,
}

/// Set up the output file (and rate log) and run a capture from `source` into it.
///
/// A conflicting or unallocatable output leaves nothing on disk and never touches
/// the device. Once the output exists every way out goes through its finalization.
pub fn record<S: SampleSource, W: Write>(
    settings: &CaptureSettings,
    source: S,
    shutdown: &ShutdownSignal,
    status: W,
) -> Result<CaptureReport> {
    let log = settings.log.as_ref().map(RateLog::create).transpose()?;
    let file = match SizedFile::create(&settings.output, settings.max_bytes) {
        Ok(f) => f,
        Err(e) => {
            if let Some(log) = log {
                let path = log.path().to_path_buf();
                drop(log);
                let _ = fs::remove_file(path);
            }
            return Err(e);
        }
    };
    let reporter = RateReporter::new(status, log);
    CaptureLoop::new(source, file, shutdown.clone(), reporter).run(&settings.radio)
}

struct CaptureSession {
    file: SizedFile,
    overran: bool,
}

impl CaptureSession {
    fn max_bytes(&self) -> u64 {
        self.file.capacity()
    }

    fn written_bytes(&self) -> u64 {
        self.file.write_cursor()
    }
}

pub struct CaptureLoop<S, W: Write> {
    source: S,
    session: CaptureSession,
    shutdown: ShutdownSignal,
    reporter: RateReporter<W>,
    state: CaptureState,
}

impl<S: SampleSource, W: Write> CaptureLoop<S, W> {
    pub fn new(
        source: S,
        file: SizedFile,
        shutdown: ShutdownSignal,
        reporter: RateReporter<W>,
    ) -> Self {
        Self {
            source,
            session: CaptureSession {
                file,
                overran: false,
            },
            shutdown,
            reporter,
            state: CaptureState::Configuring,
        }
    }

    fn enter(&mut self, next: CaptureState) {
        debug!("Capture {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the session to completion. The output file is finalized and the
    /// device released on every path, including errors.
    pub fn run(mut self, radio: &RadioConfig) -> Result<CaptureReport> {
        info!(
            "Capturing up to {} bytes into {}",
            self.session.max_bytes(),
            self.session.file.path().display()
        );
        let outcome = match self.configure(radio) {
            Err(e) => {
                error!("Failed to configure device: {}", e);
                Ok(Termination::ConfigurationFailed(e))
            }
            Ok(()) => {
                self.enter(CaptureState::Streaming);
                info!("Receiving... Press Ctrl+C to abort.");
                let outcome = self.stream(radio.timeout);
                self.enter(CaptureState::Draining);
                self.drain(&outcome);
                outcome
            }
        };

        self.enter(CaptureState::Closed);
        let Self {
            source, session, ..
        } = self;
        drop(source);
        let written = session.written_bytes();
        session.file.close(written)?;
        let termination = outcome?;
        Ok(CaptureReport {
            written_bytes: written,
            termination,
        })
    }

    fn configure(&mut self, radio: &RadioConfig) -> std::result::Result<(), DeviceError> {
        self.source.configure(radio)?;
        self.source.start()
    }

    fn stream(&mut self, timeout: Duration) -> Result<Termination> {
        let limit = self.source.max_batch().max(1);
        loop {
            if self.session.overran {
                return Ok(Termination::Overrun);
            }
            if self.shutdown.is_requested() {
                return Ok(Termination::ShutdownRequested);
            }
            let remaining = self.session.file.remaining_samples();
            if remaining == 0 {
                return Ok(Termination::CapacityReached);
            }
            let batch = remaining.min(limit);
            let region = &mut self.session.file.unwritten_mut()?[..batch];

            let (delivered, overrun) = match self.source.receive(region, timeout) {
                Receive::Delivered(0) => return Ok(Termination::EndOfStream),
                Receive::Delivered(n) => (n, false),
                Receive::Overrun(n) => (n, true),
                Receive::Error(e) => {
                    // An interrupted read is how a stop request usually shows up
                    if self.shutdown.is_requested() {
                        debug!("Receive ended by shutdown: {}", e);
                        return Ok(Termination::ShutdownRequested);
                    }
                    return Ok(Termination::DeviceFailed(e));
                }
            };
            if delivered > batch {
                warn!("Source claimed {} samples for a batch of {}", delivered, batch);
            }
            self.session.file.advance(sample_bytes(delivered.min(batch)))?;
            self.reporter.observe(self.session.written_bytes());
            self.session.overran |= overrun;
        }
    }

    fn drain(&mut self, outcome: &Result<Termination>) {
        if let Err(e) = self.source.stop() {
            warn!("Failed to disable RX: {}", e);
        }
        self.reporter.clear();
        let written = self.session.written_bytes();
        match outcome {
            Ok(Termination::Overrun) => {
                warn!("OVERRUN OCCURRED! Capture stopped after {} bytes", written)
            }
            Ok(Termination::DeviceFailed(e)) => error!("Receive failed: {}", e),
            Ok(Termination::ShutdownRequested) => info!("Shutdown requested"),
            Ok(Termination::CapacityReached) => info!("Reached the declared size"),
            Ok(Termination::EndOfStream) => info!("Source ended the stream"),
            Ok(Termination::ConfigurationFailed(_)) => {}
            Err(e) => error!("Capture aborted: {}", e),
        }
    }
}
