//! Argument parsing for running from the command line

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use clap_verbosity_flag::InfoLevel;

use crate::{
    capture::CaptureSettings,
    source::{
        GainMode, RadioConfig, DEFAULT_BANDWIDTH, DEFAULT_DEVICE, DEFAULT_FREQUENCY,
        DEFAULT_SAMPLE_RATE,
    },
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Output file for raw SC16 samples (must not exist yet)
    #[clap(short = 'f', long)]
    pub file: PathBuf,
    /// Maximum output size with a M, G or T suffix (powers of 1000), e.g. 500G
    #[clap(short = 's', long, value_parser = parse_size)]
    pub size: u64,
    /// Manual gain in dB, automatic gain control if not given
    #[clap(short = 'g', long, allow_hyphen_values = true)]
    pub gain: Option<i32>,
    /// Append-only log of per-second sample counts (must not exist yet)
    #[clap(short = 'l', long)]
    pub log: Option<PathBuf>,
    /// SoapySDR device arguments
    #[clap(long, default_value = DEFAULT_DEVICE)]
    pub device: String,
    /// Center frequency in Hz
    #[clap(long, default_value_t = DEFAULT_FREQUENCY)]
    pub frequency: f64,
    /// Sample rate in samples/s
    #[clap(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: f64,
    /// RX filter bandwidth in Hz
    #[clap(long, default_value_t = DEFAULT_BANDWIDTH)]
    pub bandwidth: f64,
    /// Longest a single receive may block, in ms
    #[clap(long, default_value_t = 3500)]
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<InfoLevel>,
}

impl Args {
    pub fn gain_mode(&self) -> GainMode {
        self.gain.map_or(GainMode::Automatic, GainMode::Manual)
    }

    pub fn settings(&self) -> CaptureSettings {
        CaptureSettings {
            output: self.file.clone(),
            max_bytes: self.size,
            log: self.log.clone(),
            radio: RadioConfig {
                device: self.device.clone(),
                frequency: self.frequency,
                sample_rate: self.sample_rate,
                bandwidth: self.bandwidth,
                gain: self.gain_mode(),
                timeout: Duration::from_millis(self.timeout_ms),
                ..Default::default()
            },
        }
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

/// Parse `<int><M|G|T>` into bytes
pub fn parse_size(s: &str) -> Result<u64, String> {
    let (digits, mult) = match s.chars().last() {
        Some('M') => (&s[..s.len() - 1], 1_000_000u64),
        Some('G') => (&s[..s.len() - 1], 1_000_000_000),
        Some('T') => (&s[..s.len() - 1], 1_000_000_000_000),
        _ => return Err("size needs a M, G or T suffix".to_string()),
    };
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size {:?}", digits))?;
    match n.checked_mul(mult) {
        Some(0) => Err("size must be nonzero".to_string()),
        Some(bytes) => Ok(bytes),
        None => Err("size is too large".to_string()),
    }
}
