use std::process::ExitCode;

use clap::Parser;
use iq_slurper::{
    args::{convert_filter, Args},
    monitoring::summary,
    CaptureReport,
};
use tracing::error;

fn main() -> ExitCode {
    // Usage errors exit with 1, not clap's default
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(&args) {
        Ok(report) => {
            println!("{}", summary(report.written_bytes));
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "soapy")]
fn run(args: &Args) -> anyhow::Result<CaptureReport> {
    use anyhow::Context;
    use iq_slurper::{record, source::soapy::SoapySource, ShutdownSignal};

    let settings = args.settings();
    let shutdown = ShutdownSignal::install().context("failed to install signal handlers")?;
    record(&settings, SoapySource::new(), &shutdown, std::io::stdout())
        .with_context(|| format!("capture into {}", settings.output.display()))
}

#[cfg(not(feature = "soapy"))]
fn run(_args: &Args) -> anyhow::Result<CaptureReport> {
    anyhow::bail!("no radio driver: built without the `soapy` feature")
}
