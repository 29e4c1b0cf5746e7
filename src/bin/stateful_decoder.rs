//! Check the stateful RADAE decoder against the batch decoder
//!
//! Encodes a feature file with a trained checkpoint, decodes the latent with
//! both decoders, prints the three distortion losses and writes the stateful
//! decoder's output as a 36-channel `.f32` feature file.
//!
//! Usage:
//!     cargo run --release --bin stateful_decoder -- model.pth speech.f32 speech_hat.f32
//!     cargo run --release --bin stateful_decoder -- model.pth speech.f32 speech_hat.f32 --loss_test 0.3

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use radae::features::{FeatureBuffer, NB_TOTAL_FEATURES};
use radae::{check, Bottleneck, DeviceKind, Radae, RadaeConfig};

/// Compare stateful and batch decoder output for a RADAE checkpoint
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to model checkpoint (.pth with a state_dict entry, or .safetensors)
    model_name: PathBuf,

    /// Path to input feature file in .f32 format
    features: PathBuf,

    /// Path to output feature file in .f32 format
    features_hat: PathBuf,

    /// Number of symbols produced by the encoder per step (default: 80)
    #[arg(long)]
    latent_dim: Option<usize>,

    /// Compare the stateful loss to this value and print PASS/FAIL (<= 0 disables)
    #[arg(long = "loss_test", alias = "loss-test", default_value_t = 0.0)]
    loss_test: f64,

    /// Model config JSON; --latent-dim and --bottleneck override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Encoder bottleneck (tanh, linear)
    #[arg(long)]
    bottleneck: Option<Bottleneck>,

    /// Device for inference (cpu, cuda, cuda:N, metal)
    #[arg(long, default_value_t = DeviceKind::Cpu)]
    device: DeviceKind,

    /// Write the losses and verdict as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Chrome trace output (only with the `profiling` feature)
    #[arg(long)]
    trace: Option<PathBuf>,
}

fn resolve_config(args: &Args) -> Result<RadaeConfig> {
    let mut config = match &args.config {
        Some(path) => RadaeConfig::from_file(path)?,
        None => RadaeConfig::default(),
    };
    if let Some(latent_dim) = args.latent_dim {
        config.latent_dim = latent_dim;
    }
    if let Some(bottleneck) = args.bottleneck {
        config.bottleneck = bottleneck;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the results, so logs go to stderr
    let profiling_guard = radae::profiling::init(args.trace.as_deref());
    if profiling_guard.is_none() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .init();
    }

    let config = resolve_config(&args)?;
    let device = args.device.open()?;
    tracing::info!("Device: {}", args.device);

    let mut model = Radae::load(&args.model_name, config, &device)?;

    let features_in = FeatureBuffer::load(&args.features, NB_TOTAL_FEATURES)?;
    let features = check::prepare_features(&model, &features_in.to_tensor(&device)?)?;
    let (_, frames, _) = features.dims3()?;
    println!("Processing: {} feature vectors", frames);
    if frames < features_in.frames() {
        tracing::info!(
            "dropped {} trailing frames to fill whole modem frames",
            features_in.frames() - frames
        );
    }

    let outcome = check::run_check(&mut model, &features, args.loss_test)?;
    let report = &outcome.report;
    println!("{}", report.loss_line());
    if let Some(verdict) = report.verdict {
        println!("{}", verdict);
    }
    tracing::info!("Inference took {:.1} ms", report.inference_ms);

    outcome.save_features_hat(&args.features_hat)?;
    tracing::info!("Wrote {}", args.features_hat.display());

    if let Some(path) = &args.report {
        report.save_json(path)?;
        tracing::info!("Wrote report {}", path.display());
    }

    Ok(())
}
