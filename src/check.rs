//! Stateful vs batch decoder consistency check
//!
//! Encodes a feature sequence once, decodes the latent with both decoders and
//! scores the results with [`distortion_loss`](crate::loss::distortion_loss).

use anyhow::{Context, Result};
use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Instant;

use crate::features::{pad_channels, prepare_input, FeatureBuffer, NB_TOTAL_FEATURES};
use crate::loss::distortion_loss_scalar;
use crate::models::Radae;

/// Largest batch vs stateful distortion that still passes.
pub const LOSS_DELTA_BOUND: f64 = 0.01;

/// Outcome of the optional loss threshold test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// `None` when `threshold <= 0`, which disables the test.
    ///
    /// Losses are widened to f64 before comparing, so an f32 loss is tested
    /// against the threshold exactly as given on the command line.
    pub fn evaluate(loss_stateful: f32, loss_delta: f32, threshold: f64) -> Option<Self> {
        if threshold <= 0.0 {
            return None;
        }
        if f64::from(loss_stateful) < threshold && f64::from(loss_delta) < LOSS_DELTA_BOUND {
            Some(Verdict::Pass)
        } else {
            Some(Verdict::Fail)
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Losses from one check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossReport {
    /// Feature frames processed after rounding to whole modem frames
    pub frames: usize,
    /// Input vs batch decoder output
    pub loss: f32,
    /// Input vs stateful decoder output
    pub loss_stateful: f32,
    /// Batch vs stateful decoder output
    pub loss_delta: f32,
    /// Threshold the stateful loss was tested against, if any
    pub threshold: Option<f64>,
    pub verdict: Option<Verdict>,
    /// Wall time for encoding and both decodes (ms)
    pub inference_ms: f64,
}

impl LossReport {
    /// `loss: <batch> <stateful> <delta>` with three decimals.
    pub fn loss_line(&self) -> String {
        format!(
            "loss: {:5.3} {:5.3} {:5.3}",
            self.loss, self.loss_stateful, self.loss_delta
        )
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        Ok(())
    }
}

/// Report plus the stateful decoder's reconstruction `[1, frames, feature_dim]`.
pub struct CheckOutcome {
    pub report: LossReport,
    pub features_hat_statefull: Tensor,
}

impl CheckOutcome {
    /// Write the stateful reconstruction with trailing zero channels up to
    /// [`NB_TOTAL_FEATURES`] per frame.
    pub fn save_features_hat<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let padded = pad_channels(&self.features_hat_statefull, NB_TOTAL_FEATURES)?;
        FeatureBuffer::from_tensor(&padded)?.save(path)
    }
}

/// Round raw `[1, frames, 36]` features to whole modem frames and keep the
/// model's channels. Returns an error when not even one modem frame fits.
pub fn prepare_features(model: &Radae, features_in: &Tensor) -> Result<Tensor> {
    let (_, frames, _) = features_in.dims3()?;
    let rounded = model.num_10ms_timesteps_rounded_to_modem_frames(frames);
    if rounded == 0 {
        anyhow::bail!(
            "{} feature frames is shorter than one modem frame ({} frames)",
            frames,
            model.config().modem_frame_timesteps()
        );
    }
    prepare_input(features_in, rounded, model.config().feature_dim)
}

/// Run the consistency check on prepared features.
///
/// The stateful decoder is reset first, so it always starts from zero
/// state like the batch decoder.
pub fn run_check(model: &mut Radae, features: &Tensor, threshold: f64) -> Result<CheckOutcome> {
    let (_, frames, _) = features.dims3()?;
    let start = Instant::now();

    let z = model.core_encoder().forward(features)?;
    let features_hat = model.core_decoder().forward(&z)?;

    let stateful = model.core_decoder_statefull();
    stateful.reset();
    let features_hat_statefull = stateful.forward(&z)?;
    stateful.reset();

    let inference_ms = start.elapsed().as_secs_f64() * 1000.0;

    let loss = distortion_loss_scalar(features, &features_hat)?;
    let loss_stateful = distortion_loss_scalar(features, &features_hat_statefull)?;
    let loss_delta = distortion_loss_scalar(&features_hat, &features_hat_statefull)?;
    tracing::debug!(
        "losses: batch={} stateful={} delta={}",
        loss,
        loss_stateful,
        loss_delta
    );

    let verdict = Verdict::evaluate(loss_stateful, loss_delta, threshold);
    Ok(CheckOutcome {
        report: LossReport {
            frames,
            loss,
            loss_stateful,
            loss_delta,
            threshold: (threshold > 0.0).then_some(threshold),
            verdict,
            inference_ms,
        },
        features_hat_statefull,
    })
}
