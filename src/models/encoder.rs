//! RADAE core encoder
//!
//! Maps 10 ms speech feature frames to latent vectors, one latent per
//! `enc_stride` frames. Layers are organised like a DenseNet: each GRU and
//! conv output is concatenated onto its input before the next layer.

use anyhow::Result;
use candle_core::{Module, Tensor, D};
use candle_nn::rnn::{gru, GRUConfig, GRU};
use candle_nn::{linear, Linear, VarBuilder};

use super::config::{Bottleneck, RadaeConfig};
use super::conv::CausalConv1d;
use super::gru_sequence;

const DENSE_DIM: usize = 64;
const GRU_DIM: usize = 64;
const CONV_DIM: usize = 96;
const NUM_ROUNDS: usize = 5;

pub struct CoreEncoder {
    dense_1: Linear,
    grus: Vec<GRU>,
    convs: Vec<CausalConv1d>,
    z_dense: Linear,
    frames_per_step: usize,
    feature_dim: usize,
    bottleneck: Bottleneck,
}

impl CoreEncoder {
    /// Build the encoder from weights under `vb` (usually `core_encoder`).
    pub fn new(config: &RadaeConfig, vb: VarBuilder) -> Result<Self> {
        let input_dim = config.enc_stride * config.feature_dim;
        let dense_1 = linear(input_dim, DENSE_DIM, vb.pp("dense_1"))?;

        let mut grus = Vec::with_capacity(NUM_ROUNDS);
        let mut convs = Vec::with_capacity(NUM_ROUNDS);
        let mut width = DENSE_DIM;
        for i in 1..=NUM_ROUNDS {
            grus.push(gru(width, GRU_DIM, GRUConfig::default(), vb.pp(format!("gru{i}")))?);
            width += GRU_DIM;
            let dilation = if i == 1 { 1 } else { 2 };
            convs.push(CausalConv1d::new(
                width,
                CONV_DIM,
                dilation,
                vb.pp(format!("conv{i}")),
            )?);
            width += CONV_DIM;
        }

        let z_dense = linear(width, config.latent_dim, vb.pp("z_dense"))?;

        Ok(Self {
            dense_1,
            grus,
            convs,
            z_dense,
            frames_per_step: config.enc_stride,
            feature_dim: config.feature_dim,
            bottleneck: config.bottleneck,
        })
    }

    /// Encode features `[batch, frames, feature_dim]` to `[batch, frames / enc_stride, latent_dim]`.
    ///
    /// `frames` must be a non-zero multiple of `enc_stride`.
    #[tracing::instrument(skip_all, name = "core_encoder")]
    pub fn forward(&self, features: &Tensor) -> Result<Tensor> {
        let (batch, frames, channels) = features.dims3()?;
        if channels != self.feature_dim {
            anyhow::bail!(
                "encoder expects {} feature channels, got {}",
                self.feature_dim,
                channels
            );
        }
        if frames == 0 || frames % self.frames_per_step != 0 {
            anyhow::bail!(
                "encoder needs a non-zero multiple of {} frames, got {}",
                self.frames_per_step,
                frames
            );
        }

        let x = features.contiguous()?.reshape((
            batch,
            frames / self.frames_per_step,
            self.frames_per_step * channels,
        ))?;

        let mut x = self.dense_1.forward(&x)?.tanh()?;
        for (gru, conv) in self.grus.iter().zip(&self.convs) {
            let h = gru_sequence(gru, &x)?;
            x = Tensor::cat(&[&x, &h], D::Minus1)?;
            let c = conv.forward(&x)?;
            x = Tensor::cat(&[&x, &c], D::Minus1)?;
        }

        let z = self.z_dense.forward(&x)?;
        let z = match self.bottleneck {
            Bottleneck::Tanh => z.tanh()?,
            Bottleneck::Linear => z,
        };
        tracing::debug!("encoded {} frames to latent {:?}", frames, z.dims());
        Ok(z)
    }
}
