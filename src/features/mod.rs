//! Speech feature handling for RADAE
//!
//! Feature files hold 36 values per 10 ms frame. The autoencoder only
//! consumes the leading 20 (cepstrum, pitch, voicing); the rest are dropped on
//! input and written back as zeros on output.

mod io;

pub use io::{read_f32_file, write_f32_file, FeatureBuffer};

use anyhow::Result;
use candle_core::{Tensor, D};

/// Values per frame in a feature file
pub const NB_TOTAL_FEATURES: usize = 36;

/// Leading values per frame used by the model
pub const NUM_USED_FEATURES: usize = 20;

/// Keep the first `frames` frames and the first `channels` channels of
/// `[batch, frames, total]` features.
pub fn prepare_input(features: &Tensor, frames: usize, channels: usize) -> Result<Tensor> {
    let (_, available, total) = features.dims3()?;
    if frames > available {
        anyhow::bail!("requested {} frames but only {} available", frames, available);
    }
    if channels > total {
        anyhow::bail!("requested {} channels but frames have {}", channels, total);
    }
    Ok(features
        .narrow(1, 0, frames)?
        .narrow(D::Minus1, 0, channels)?
        .contiguous()?)
}

/// Append zero channels so every frame has `total_channels` values.
pub fn pad_channels(features: &Tensor, total_channels: usize) -> Result<Tensor> {
    let channels = features.dim(D::Minus1)?;
    if channels > total_channels {
        anyhow::bail!(
            "cannot pad {} channels down to {}",
            channels,
            total_channels
        );
    }
    Ok(features.pad_with_zeros(D::Minus1, 0, total_channels - channels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, IndexOp};

    #[test]
    fn test_prepare_input() {
        let device = Device::Cpu;
        let data: Vec<f32> = (0..5 * 36).map(|i| i as f32).collect();
        let features = Tensor::from_vec(data, (1, 5, 36), &device).unwrap();

        let prepared = prepare_input(&features, 4, 20).unwrap();
        assert_eq!(prepared.dims(), &[1, 4, 20]);

        // Frame 1 starts at value 36 and keeps channels 0..20
        let frame: Vec<f32> = prepared.i((0, 1)).unwrap().to_vec1().unwrap();
        assert_eq!(frame[0], 36.0);
        assert_eq!(frame[19], 55.0);
    }

    #[test]
    fn test_prepare_input_bounds() {
        let device = Device::Cpu;
        let features = Tensor::zeros((1, 5, 36), DType::F32, &device).unwrap();
        assert!(prepare_input(&features, 6, 20).is_err());
        assert!(prepare_input(&features, 5, 37).is_err());
    }

    #[test]
    fn test_pad_channels_appends_zeros() {
        let device = Device::Cpu;
        let features = Tensor::ones((1, 3, 20), DType::F32, &device).unwrap();
        let padded = pad_channels(&features, NB_TOTAL_FEATURES).unwrap();
        assert_eq!(padded.dims(), &[1, 3, 36]);

        let head: f32 = padded.narrow(2, 0, 20).unwrap().sum_all().unwrap().to_scalar().unwrap();
        let tail: f32 = padded.narrow(2, 20, 16).unwrap().abs().unwrap().sum_all().unwrap().to_scalar().unwrap();
        assert_eq!(head, 60.0);
        assert_eq!(tail, 0.0);
    }

    #[test]
    fn test_pad_channels_rejects_shrinking() {
        let device = Device::Cpu;
        let features = Tensor::ones((1, 3, 40), DType::F32, &device).unwrap();
        assert!(pad_channels(&features, NB_TOTAL_FEATURES).is_err());
    }
}
