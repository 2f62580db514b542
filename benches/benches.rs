use std::{io, time::Duration};

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use iq_slurper::{
    complex::{Complex, IqSample},
    monitoring::{autoscale, RateReporter},
    record, CaptureSettings, DeviceError, RadioConfig, Receive, SampleSource, ShutdownSignal,
};
use rand::prelude::*;

const BATCH: usize = 127 * 2048;
const CAPTURE_BYTES: u64 = 64_000_000;

/// Copies a fixed block of noise into every batch, like a radio that never stalls
struct NoiseSource {
    noise: Vec<IqSample>,
}

impl SampleSource for NoiseSource {
    fn configure(&mut self, _config: &RadioConfig) -> Result<(), DeviceError> {
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn max_batch(&self) -> usize {
        self.noise.len()
    }

    fn receive(&mut self, buf: &mut [IqSample], _timeout: Duration) -> Receive {
        let n = buf.len();
        buf.copy_from_slice(&self.noise[..n]);
        Receive::Delivered(n)
    }
}

fn benchmark(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let noise: Vec<IqSample> = (0..BATCH)
        .map(|_| Complex::new(rng.gen(), rng.gen()))
        .collect();

    c.bench_function("autoscale", |b| b.iter(|| autoscale(black_box(123_456_789.0))));

    c.bench_function("reporter tick", |b| {
        let mut reporter = RateReporter::new(io::sink(), None);
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut total = 0u64;
        b.iter(|| {
            total += 4 * BATCH as u64;
            reporter.observe_at(black_box(start), black_box(total))
        })
    });

    let mut group = c.benchmark_group("capture");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(CAPTURE_BYTES));
    group.bench_function("64 MB into mapped file", |b| {
        b.iter_batched(
            || {
                let dir = tempfile::tempdir().unwrap();
                let settings = CaptureSettings {
                    output: dir.path().join("bench.iq"),
                    max_bytes: CAPTURE_BYTES,
                    log: None,
                    radio: RadioConfig::default(),
                };
                (dir, settings)
            },
            |(dir, settings)| {
                let source = NoiseSource {
                    noise: noise.clone(),
                };
                let report = record(&settings, source, &ShutdownSignal::new(), io::sink()).unwrap();
                drop(dir);
                report
            },
            BatchSize::PerIteration,
        )
    });
    group.finish();
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
