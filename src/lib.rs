//! Stream I/Q samples from an SDR straight into a pre-sized, memory-mapped
//! file, reporting throughput as we go.

pub mod args;
pub mod capture;
pub mod complex;
pub mod error;
pub mod monitoring;
pub mod shutdown;
pub mod sized_file;
pub mod source;

pub use capture::{record, CaptureReport, CaptureSettings, Termination};
pub use error::{DeviceError, Error};
pub use shutdown::ShutdownSignal;
pub use source::{GainMode, RadioConfig, Receive, SampleSource};
