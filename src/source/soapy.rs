//! SoapySDR-backed sample source (requires the `soapy` feature)

use std::time::Duration;

use soapysdr::{Device, Direction, ErrorCode, RxStream};
use tracing::{debug, info};

use super::{GainMode, RadioConfig, Receive, SampleSource};
use crate::{complex::IqSample, error::DeviceError};

/// Streams SC16 samples from a single RX channel
#[derive(Default)]
pub struct SoapySource {
    device: Option<Device>,
    stream: Option<RxStream<IqSample>>,
    batch: usize,
}

impl SoapySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self) -> Result<&mut RxStream<IqSample>, DeviceError> {
        self.stream
            .as_mut()
            .ok_or_else(|| DeviceError::new("stream not configured"))
    }
}

fn diag(stage: &str, err: soapysdr::Error) -> DeviceError {
    DeviceError::new(format!("{stage}: {err}"))
}

impl SampleSource for SoapySource {
    fn configure(&mut self, config: &RadioConfig) -> Result<(), DeviceError> {
        let ch = config.channel;
        let device = Device::new(config.device.as_str()).map_err(|e| diag("open", e))?;
        if let Ok(hw) = device.hardware_key() {
            info!("Opened {} ({})", hw, config.device);
        }

        device
            .set_frequency(Direction::Rx, ch, config.frequency, ())
            .map_err(|e| diag("set frequency", e))?;
        device
            .set_sample_rate(Direction::Rx, ch, config.sample_rate)
            .map_err(|e| diag("set sample rate", e))?;
        device
            .set_bandwidth(Direction::Rx, ch, config.bandwidth)
            .map_err(|e| diag("set bandwidth", e))?;

        device
            .set_gain_mode(Direction::Rx, ch, config.gain == GainMode::Automatic)
            .map_err(|e| diag("set gain mode", e))?;
        if let GainMode::Manual(db) = config.gain {
            device
                .set_gain(Direction::Rx, ch, db as f64)
                .map_err(|e| diag("set manual gain", e))?;
        }

        let stream_args = format!(
            "buffers={},buflen={},transfers={}",
            config.num_buffers, config.buffer_samples, config.num_transfers
        );
        let stream = device
            .rx_stream_args::<IqSample, _>(&[ch], stream_args.as_str())
            .map_err(|e| diag("set up RX stream", e))?;
        debug!("RX stream ready ({})", stream_args);

        self.batch = config.buffer_samples;
        self.stream = Some(stream);
        self.device = Some(device);
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        self.stream()?
            .activate(None)
            .map_err(|e| diag("enable RX", e))
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.stream()?
            .deactivate(None)
            .map_err(|e| diag("disable RX", e))
    }

    fn max_batch(&self) -> usize {
        self.batch
    }

    fn receive(&mut self, buf: &mut [IqSample], timeout: Duration) -> Receive {
        let stream = match self.stream() {
            Ok(s) => s,
            Err(e) => return Receive::Error(e),
        };
        match stream.read(&mut [buf], timeout.as_micros() as i64) {
            Ok(n) => Receive::Delivered(n),
            Err(e) if matches!(e.code, ErrorCode::Overflow) => Receive::Overrun(0),
            Err(e) => Receive::Error(diag("receive", e)),
        }
    }
}
