//! Feature distortion loss
//!
//! Weighted squared error over the 20 model features: 18 cepstral bands,
//! pitch (index 18) and voicing correlation (index 19). Pitch errors count
//! double and are scaled by how voiced the reference frame is.

use anyhow::Result;
use candle_core::{Tensor, D};

const NUM_CEPS: usize = 18;
const PITCH: usize = 18;
const CORR: usize = 19;
const NUM_FEATURES: usize = 20;

/// Distortion between reference `y_true` and reconstruction `y_pred`.
///
/// Both tensors are `[batch, frames, 20]`; the result has shape `[batch]`
/// (mean over frames).
pub fn distortion_loss(y_true: &Tensor, y_pred: &Tensor) -> Result<Tensor> {
    if y_true.dim(D::Minus1)? != NUM_FEATURES {
        anyhow::bail!(
            "distortion loss is designed to work with {} features, got {}",
            NUM_FEATURES,
            y_true.dim(D::Minus1)?
        );
    }
    if y_true.dims() != y_pred.dims() {
        anyhow::bail!(
            "distortion loss shape mismatch: {:?} vs {:?}",
            y_true.dims(),
            y_pred.dims()
        );
    }

    let slice = |t: &Tensor, start: usize, len: usize| t.narrow(D::Minus1, start, len);

    let ceps_error = (slice(y_pred, 0, NUM_CEPS)? - slice(y_true, 0, NUM_CEPS)?)?;
    let pitch_error = ((slice(y_pred, PITCH, 1)? - slice(y_true, PITCH, 1)?)? * 2.0)?;
    let corr_error = (slice(y_pred, CORR, 1)? - slice(y_true, CORR, 1)?)?;
    let pitch_weight = (slice(y_true, CORR, 1)? + 0.5)?.relu()?.sqr()?;

    // Pitch and voicing terms are per frame; averaging them over the cepstral
    // bands leaves them unchanged
    let ceps_term = ceps_error.sqr()?.mean_keepdim(D::Minus1)?;
    let pitch_term = (pitch_error.abs()?.mul(&pitch_weight)? * (3.0 * 10.0 / 18.0))?;
    let corr_term = (corr_error.sqr()? * (1.0 / 18.0))?;

    let per_frame = (ceps_term + pitch_term)?.add(&corr_term)?.squeeze(D::Minus1)?;
    Ok(per_frame.mean(D::Minus1)?)
}

/// [`distortion_loss`] for the first batch element, as a scalar.
pub fn distortion_loss_scalar(y_true: &Tensor, y_pred: &Tensor) -> Result<f32> {
    let loss = distortion_loss(y_true, y_pred)?;
    let values: Vec<f32> = loss.to_dtype(candle_core::DType::F32)?.to_vec1()?;
    values
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("distortion loss over an empty batch"))
}
