//! Rebundle - run transform plugins over a bundle and re-serialize it.

use clap::Parser;
use rebundle_engine::{ExecPluginLoader, Pipeline, PipelineConfig};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rebundle")]
#[command(
    about = "Transform the entries of a bundle with plugins and re-serialize it",
    disable_version_flag = true
)]
struct Cli {
    /// File containing the bundle (stdin is read if omitted)
    file: Option<PathBuf>,

    /// The encoding to use for text bundle formats
    #[arg(long, short, value_name = "NAME", default_value = "utf8")]
    encoding: String,

    /// The bundle format to use (bundle, bundle.cjs, bundle.mjs, bundle.json)
    #[arg(long, short, value_name = "NAME")]
    format: Option<String>,

    /// Print the current version
    #[arg(long, short = 'v')]
    version: bool,

    /// A plugin to run on the bundle (repeatable, applied in order)
    #[arg(long = "plugin", value_name = "PATH")]
    plugins: Vec<String>,

    /// The output path of the transformed bundle (stdout if omitted)
    #[arg(long, short, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // stdout may carry the bundle, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cwd = std::env::current_dir()?;
    let config = PipelineConfig {
        input: cli.file,
        output: cli.out,
        format: cli.format,
        encoding: cli.encoding,
        plugins: cli.plugins,
        cwd: cwd.clone(),
    };

    let loader = ExecPluginLoader::new(cwd);
    let pipeline = Pipeline::prepare(config, &loader)?;
    let summary = pipeline.run().await?;

    debug!("{:?}", summary.report);
    match summary.destination {
        Some(path) => info!("Bundle written to {:?} as {}", path, summary.format),
        None => debug!("Bundle written to stdout as {}", summary.format),
    }

    Ok(())
}
