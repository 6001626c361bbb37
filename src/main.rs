use std::process;

use clap::Parser;
use commit_lens::error::LensError;
use commit_lens::Cli;

#[tokio::main]
async fn main() {
    // Logs go to stderr so they never mix with command output on stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        let kind = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<LensError>())
            .map_or("error", |err| err.kind().as_str());
        eprintln!("Error [{kind}]: {e}");

        let mut source = e.source();
        while let Some(err) = source {
            eprintln!("  Caused by: {err}");
            source = err.source();
        }

        process::exit(1);
    }
}
