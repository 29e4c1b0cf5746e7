//! RADAE core decoder (batch)
//!
//! Reconstructs feature frames from a whole latent sequence at once. The
//! parameter layout is shared with [`StatefulDecoder`](super::StatefulDecoder),
//! which runs the same layers one latent vector at a time.

use anyhow::Result;
use candle_core::{Module, Tensor, D};
use candle_nn::rnn::{gru, GRUConfig, GRU};
use candle_nn::{linear, Linear, VarBuilder};

use super::config::RadaeConfig;
use super::conv::CausalConv1d;
use super::gru_sequence;

const DENSE_DIM: usize = 96;
const GRU_DIM: usize = 96;
const CONV_DIM: usize = 32;
const NUM_ROUNDS: usize = 5;

/// Decoder parameters: `dense_1`, `gru1..5`, `conv1..5`, `output`.
pub(crate) struct DecoderLayers {
    pub(crate) dense_1: Linear,
    pub(crate) grus: Vec<GRU>,
    pub(crate) convs: Vec<CausalConv1d>,
    pub(crate) output: Linear,
    pub(crate) frames_per_step: usize,
    pub(crate) feature_dim: usize,
    pub(crate) latent_dim: usize,
}

impl DecoderLayers {
    pub(crate) fn new(config: &RadaeConfig, vb: VarBuilder) -> Result<Self> {
        let dense_1 = linear(config.latent_dim, DENSE_DIM, vb.pp("dense_1"))?;

        let mut grus = Vec::with_capacity(NUM_ROUNDS);
        let mut convs = Vec::with_capacity(NUM_ROUNDS);
        let mut width = DENSE_DIM;
        for i in 1..=NUM_ROUNDS {
            grus.push(gru(width, GRU_DIM, GRUConfig::default(), vb.pp(format!("gru{i}")))?);
            width += GRU_DIM;
            convs.push(CausalConv1d::new(width, CONV_DIM, 1, vb.pp(format!("conv{i}")))?);
            width += CONV_DIM;
        }

        let output = linear(
            width,
            config.enc_stride * config.feature_dim,
            vb.pp("output"),
        )?;

        Ok(Self {
            dense_1,
            grus,
            convs,
            output,
            frames_per_step: config.enc_stride,
            feature_dim: config.feature_dim,
            latent_dim: config.latent_dim,
        })
    }

    pub(crate) fn check_latent(&self, z: &Tensor) -> Result<(usize, usize)> {
        let (batch, steps, dim) = z.dims3()?;
        if dim != self.latent_dim {
            anyhow::bail!("decoder expects latent dim {}, got {}", self.latent_dim, dim);
        }
        if steps == 0 {
            anyhow::bail!("decoder needs at least one latent vector");
        }
        Ok((batch, steps))
    }

    /// Unfold `[batch, steps, frames_per_step * feature_dim]` into frames.
    pub(crate) fn unfold_frames(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, steps, _) = x.dims3()?;
        Ok(x.contiguous()?
            .reshape((batch, steps * self.frames_per_step, self.feature_dim))?)
    }
}

/// Batch decoder: GRUs and convolutions run over the full latent sequence.
pub struct CoreDecoder {
    layers: DecoderLayers,
}

impl CoreDecoder {
    /// Build the decoder from weights under `vb` (usually `core_decoder`).
    pub fn new(config: &RadaeConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            layers: DecoderLayers::new(config, vb)?,
        })
    }

    /// Decode latents `[batch, steps, latent_dim]` to features
    /// `[batch, steps * enc_stride, feature_dim]`.
    #[tracing::instrument(skip_all, name = "core_decoder")]
    pub fn forward(&self, z: &Tensor) -> Result<Tensor> {
        let layers = &self.layers;
        layers.check_latent(z)?;

        let mut x = layers.dense_1.forward(z)?.tanh()?;
        for (gru, conv) in layers.grus.iter().zip(&layers.convs) {
            let h = gru_sequence(gru, &x)?;
            x = Tensor::cat(&[&x, &h], D::Minus1)?;
            let c = conv.forward(&x)?;
            x = Tensor::cat(&[&x, &c], D::Minus1)?;
        }

        let x = layers.output.forward(&x)?;
        layers.unfold_frames(&x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_decoder_output_shape() {
        let device = Device::Cpu;
        let config = RadaeConfig::default();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let decoder = CoreDecoder::new(&config, vb.pp("core_decoder")).unwrap();

        let z = Tensor::randn(0.0f32, 1.0, (2, 3, 80), &device).unwrap();
        let features = decoder.forward(&z).unwrap();
        assert_eq!(features.dims(), &[2, 12, 20]);
    }

    #[test]
    fn test_decoder_layer_widths() {
        let device = Device::Cpu;
        let config = RadaeConfig::with_latent_dim(40);
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let _decoder = CoreDecoder::new(&config, vb.pp("core_decoder")).unwrap();

        let data = varmap.data().lock().unwrap();
        let dims = |name: &str| data.get(name).unwrap().as_tensor().dims().to_vec();
        assert_eq!(dims("core_decoder.dense_1.weight"), vec![96, 40]);
        assert_eq!(dims("core_decoder.gru3.weight_hh_l0"), vec![288, 96]);
        assert_eq!(dims("core_decoder.conv1.conv.weight"), vec![32, 192, 2]);
        assert_eq!(dims("core_decoder.output.weight"), vec![80, 736]);
    }

    #[test]
    fn test_decoder_rejects_wrong_latent_dim() {
        let device = Device::Cpu;
        let config = RadaeConfig::default();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let decoder = CoreDecoder::new(&config, vb).unwrap();

        let z = Tensor::zeros((1, 3, 64), DType::F32, &device).unwrap();
        assert!(decoder.forward(&z).is_err());
    }
}
