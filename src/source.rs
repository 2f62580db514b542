//! The streaming sample feed the capture loop pulls from

use std::time::Duration;

use crate::{complex::IqSample, error::DeviceError};

#[cfg(feature = "soapy")]
pub mod soapy;

pub const DEFAULT_FREQUENCY: f64 = 866_450_000.0;
pub const DEFAULT_SAMPLE_RATE: f64 = 8_000_000.0;
pub const DEFAULT_BANDWIDTH: f64 = 7_000_000.0;
pub const DEFAULT_DEVICE: &str = "driver=bladerf";

/// Tuner gain control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GainMode {
    #[default]
    Automatic,
    /// Fixed gain in dB. Range checking is up to the driver.
    Manual(i32),
}

/// Everything the radio needs before it can stream
#[derive(Debug, Clone, PartialEq)]
pub struct RadioConfig {
    /// Driver arguments to select the device
    pub device: String,
    pub channel: usize,
    /// Center frequency in Hz
    pub frequency: f64,
    /// Sample rate in samples/s
    pub sample_rate: f64,
    /// Analog filter bandwidth in Hz
    pub bandwidth: f64,
    pub gain: GainMode,
    /// Number of hardware buffers in the streaming pipeline
    pub num_buffers: usize,
    /// Samples per hardware buffer, also the largest batch we ask for
    pub buffer_samples: usize,
    /// USB transfers in flight
    pub num_transfers: usize,
    /// Longest a single receive may block
    pub timeout: Duration,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_owned(),
            channel: 0,
            frequency: DEFAULT_FREQUENCY,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bandwidth: DEFAULT_BANDWIDTH,
            gain: GainMode::Automatic,
            num_buffers: 64,
            buffer_samples: 127 * 2048,
            num_transfers: 16,
            timeout: Duration::from_millis(3500),
        }
    }
}

/// Outcome of one blocking receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receive {
    /// `n` samples were written to the front of the buffer
    Delivered(usize),
    /// `n` samples were written, then the hardware reported dropped samples
    Overrun(usize),
    Error(DeviceError),
}

pub trait SampleSource {
    /// Open and set up the device, once
    fn configure(&mut self, config: &RadioConfig) -> Result<(), DeviceError>;
    fn start(&mut self) -> Result<(), DeviceError>;
    fn stop(&mut self) -> Result<(), DeviceError>;
    /// Largest number of samples a single `receive` should be asked for
    fn max_batch(&self) -> usize;
    /// Block for up to `timeout` filling `buf` from the front
    fn receive(&mut self, buf: &mut [IqSample], timeout: Duration) -> Receive;
}
