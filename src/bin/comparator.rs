use anyhow::Context as _;
use clap::Parser;
use comparator::{Comparator, Config, RenderResult};
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;

/// Find where two functions of x intersect.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// The first function (e.g. "5*x^3 + 2*x").
    func1: String,
    /// The second function (e.g. "x^2 - 4").
    func2: String,
    /// Read settings from this file instead of the default location.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Print the sampled curves and annotations as JSON.
    #[arg(long)]
    json: bool,
    /// Leave out sample points where a function isn't defined instead of
    /// failing.
    #[arg(long)]
    skip_invalid: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| {
            format!("Unable to load the config from \"{}\"", path.display())
        })?,
        None => Config::load_or_default()
            .context("Unable to load the default config file")?,
    };
    if args.skip_invalid {
        config.plot.policy = comparator::plot::SamplePolicy::SkipInvalid;
    }

    let comparator = Comparator::new(config);

    match comparator.solve_and_plot(&args.func1, &args.func2) {
        Ok(result) if args.json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        },
        Ok(result) => {
            print_summary(&result);
            Ok(ExitCode::SUCCESS)
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(ExitCode::FAILURE)
        },
    }
}

fn print_summary(result: &RenderResult) {
    println!("Intersections:");
    for annotation in &result.annotations {
        println!("  {}", annotation.label);
    }

    let curves = [&result.curve1, &result.curve2];

    for (name, curve) in result.legend.iter().zip(curves.iter()) {
        match (curve.first(), curve.last()) {
            (Some(first), Some(last)) => println!(
                "{}: {} points from x = {} to x = {}",
                name,
                curve.len(),
                first.x,
                last.x
            ),
            _ => println!("{}: no points", name),
        }
    }
}
