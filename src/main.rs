use anyhow::{Context, Result};
use clap::Parser;
use lantern::artifacts::ComputedContext;
use lantern::cli::{Cli, OutputFormat};
use lantern::fixture::{FixtureSource, PageLoadFixture};
use lantern::metrics::request_metrics;
use lantern::report::MetricReport;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let settings = args.throttling_settings()?;
    let fixture = PageLoadFixture::from_file(&args.fixture)?;
    let kinds = args.metric_kinds();

    let data = fixture.computation_data(settings.clone());
    let mut report = MetricReport::new(fixture.id.clone(), settings);
    let context = ComputedContext::new(FixtureSource::new(fixture));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("Failed to start async runtime")?;
    let results = runtime.block_on(request_metrics(&kinds, &data, &context))?;

    for (kind, result) in &results {
        report.add_metric(*kind, result);
    }

    match args.format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    Ok(())
}
