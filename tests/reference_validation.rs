//! Checks against a real trained checkpoint.
//!
//! Skipped unless both variables are set:
//! `RADAE_CHECKPOINT=/path/to/model.pth RADAE_FEATURES=/path/to/speech.f32 cargo test --test reference_validation -- --nocapture`
//!
//! Optionally `RADAE_LATENT_DIM` (default 80) and `RADAE_LOSS_TEST`, the
//! stateful loss the checkpoint is expected to beat.

use anyhow::Result;
use candle_core::Device;
use std::path::PathBuf;

use radae::check::{prepare_features, run_check, Verdict, LOSS_DELTA_BOUND};
use radae::features::{FeatureBuffer, NB_TOTAL_FEATURES};
use radae::models::{Radae, RadaeConfig};

fn env_paths() -> Option<(PathBuf, PathBuf)> {
    let checkpoint = std::env::var_os("RADAE_CHECKPOINT")?;
    let features = std::env::var_os("RADAE_FEATURES")?;
    Some((checkpoint.into(), features.into()))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[test]
fn trained_checkpoint_stateful_matches_batch() -> Result<()> {
    let Some((checkpoint, features)) = env_paths() else {
        eprintln!("skipping: RADAE_CHECKPOINT / RADAE_FEATURES are not set");
        return Ok(());
    };

    let device = Device::Cpu;
    let config = RadaeConfig::with_latent_dim(env_parse("RADAE_LATENT_DIM").unwrap_or(80));
    let mut model = Radae::load(&checkpoint, config, &device)?;

    let raw = FeatureBuffer::load(&features, NB_TOTAL_FEATURES)?;
    let input = prepare_features(&model, &raw.to_tensor(&device)?)?;

    let threshold: f64 = env_parse("RADAE_LOSS_TEST").unwrap_or(0.0);
    let outcome = run_check(&mut model, &input, threshold)?;
    let report = &outcome.report;
    println!("  frames={} {}", report.frames, report.loss_line());

    assert!(
        f64::from(report.loss_delta) < LOSS_DELTA_BOUND,
        "stateful decoder diverged from batch decoder: delta={}",
        report.loss_delta
    );
    if let Some(verdict) = report.verdict {
        assert_eq!(verdict, Verdict::Pass, "stateful loss {}", report.loss_stateful);
    }
    Ok(())
}
