//! Stateful (streaming) RADAE decoder
//!
//! Runs the core decoder layers one latent vector at a time, carrying GRU
//! hidden states and convolution history between calls. It is never trained
//! on its own: weights are copied from the batch decoder after loading a
//! checkpoint, so for the same latents both decoders must agree.

use anyhow::Result;
use candle_core::{DType, IndexOp, Module, Tensor, D};
use candle_nn::rnn::{GRUState, RNN};
use candle_nn::VarBuilder;

use super::config::RadaeConfig;
use super::conv::ConvState;
use super::decoder::DecoderLayers;

/// Per-layer streaming state: one GRU hidden state and one conv history per round.
pub struct DecoderState {
    gru: Vec<GRUState>,
    conv: Vec<ConvState>,
    batch: usize,
}

impl DecoderState {
    pub fn batch_size(&self) -> usize {
        self.batch
    }
}

pub struct StatefulDecoder {
    layers: DecoderLayers,
    state: Option<DecoderState>,
    steps_decoded: usize,
}

impl StatefulDecoder {
    /// Build the decoder from weights under `vb` (usually `core_decoder_statefull`).
    pub fn new(config: &RadaeConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            layers: DecoderLayers::new(config, vb)?,
            state: None,
            steps_decoded: 0,
        })
    }

    /// Drop all carried state. The next step starts from zeros.
    pub fn reset(&mut self) {
        self.state = None;
        self.steps_decoded = 0;
    }

    /// Number of latent vectors consumed since the last reset.
    pub fn steps_decoded(&self) -> usize {
        self.steps_decoded
    }

    pub fn state(&self) -> Option<&DecoderState> {
        self.state.as_ref()
    }

    fn zero_state(&self, batch: usize, dtype: DType) -> Result<DecoderState> {
        let gru = self
            .layers
            .grus
            .iter()
            .map(|g| g.zero_state(batch))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let conv = self
            .layers
            .convs
            .iter()
            .map(|c| c.zero_state(batch, dtype))
            .collect::<Result<Vec<_>>>()?;
        Ok(DecoderState { gru, conv, batch })
    }

    /// Decode one latent vector `[batch, latent_dim]` to `[batch, enc_stride, feature_dim]`.
    pub fn step(&mut self, z: &Tensor) -> Result<Tensor> {
        let (batch, dim) = z.dims2()?;
        if dim != self.layers.latent_dim {
            anyhow::bail!(
                "decoder expects latent dim {}, got {}",
                self.layers.latent_dim,
                dim
            );
        }

        let mut state = match self.state.take() {
            Some(state) if state.batch != batch => {
                let previous = state.batch;
                self.state = Some(state);
                anyhow::bail!(
                    "batch size changed mid-stream ({} -> {}); reset the decoder first",
                    previous,
                    batch
                );
            }
            Some(state) => state,
            None => self.zero_state(batch, z.dtype())?,
        };

        let layers = &self.layers;
        let mut x = layers.dense_1.forward(z)?.tanh()?;
        for (i, (gru, conv)) in layers.grus.iter().zip(&layers.convs).enumerate() {
            let h = gru.step(&x, &state.gru[i])?;
            x = Tensor::cat(&[&x, h.h()], D::Minus1)?;
            state.gru[i] = h;

            let (c, conv_state) = conv.step(&x, &state.conv[i])?;
            x = Tensor::cat(&[&x, &c], D::Minus1)?;
            state.conv[i] = conv_state;
        }

        let x = layers.output.forward(&x)?;
        self.state = Some(state);
        self.steps_decoded += 1;

        layers.unfold_frames(&x.unsqueeze(1)?)
    }

    /// Decode a latent sequence `[batch, steps, latent_dim]` by stepping
    /// through it, continuing from the current state.
    #[tracing::instrument(skip_all, name = "core_decoder_statefull")]
    pub fn forward(&mut self, z: &Tensor) -> Result<Tensor> {
        let (_, steps) = self.layers.check_latent(z)?;

        let mut frames = Vec::with_capacity(steps);
        for t in 0..steps {
            frames.push(self.step(&z.i((.., t, ..))?.contiguous()?)?);
        }
        tracing::debug!("stateful decoder consumed {} latent vectors", steps);
        Ok(Tensor::cat(&frames, 1)?)
    }
}
