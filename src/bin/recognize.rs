use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use burn::config::Config;
use clap::Parser;
use handwriting_recognition::{DefaultBackend, ParameterLifecycle, RecognizerConfig};

/// Recognize the handwritten character in an image.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// File holding the base64 encoded image, `-` reads it from stdin.
    encoded: Option<PathBuf>,
    /// Raw image file (PNG, JPEG, BMP or GIF) to encode and recognize.
    #[clap(long, conflicts_with = "encoded")]
    image: Option<PathBuf>,
    /// JSON recognizer configuration.
    #[clap(long)]
    config: Option<PathBuf>,
    /// Build the classifier once and reuse it for every input.
    #[clap(long)]
    shared: bool,
    /// Seed the random parameter initialization.
    #[clap(long)]
    seed: Option<u64>,
    /// Also print the class index and raw score.
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RecognizerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RecognizerConfig::new(),
    };
    if args.shared {
        config.lifecycle = ParameterLifecycle::Shared;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let encoded = read_input(&args)?;
    let recognizer = config.init::<DefaultBackend>(&Default::default());
    tracing::debug!("Using configuration {}", recognizer.config());
    let prediction = recognizer
        .predict(&encoded)
        .context("failed to recognize the image")?;

    if args.verbose {
        println!(
            "{} (class {}, score {})",
            prediction.character, prediction.index, prediction.score
        );
    } else {
        println!("{}", prediction.character);
    }

    Ok(())
}

fn read_input(args: &Args) -> Result<String> {
    if let Some(path) = &args.image {
        tracing::info!("Encoding image from: {}", path.display());
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        return Ok(STANDARD.encode(bytes));
    }

    match &args.encoded {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        Some(_) => {
            let mut encoded = String::new();
            io::stdin()
                .read_to_string(&mut encoded)
                .context("failed to read stdin")?;
            Ok(encoded)
        }
        None => bail!("Must specify either an encoded image file, `-` or --image"),
    }
}
