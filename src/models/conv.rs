//! Causal dilated convolution used by the RADAE encoder and decoders
//!
//! A kernel-2 Conv1d followed by tanh. The output at step t depends on the
//! inputs at t and t - dilation only. Tensors are time-major:
//! `[batch, time, channels]`, matching the GRU layers around it.

use anyhow::Result;
use candle_core::{DType, Module, Tensor};
use candle_nn::{conv1d, Conv1d, Conv1dConfig, VarBuilder};

const KERNEL_SIZE: usize = 2;

/// Causal kernel-2 convolution with tanh activation.
///
/// Weights live under `conv.weight` / `conv.bias` relative to the layer
/// prefix, with shape `[out_channels, in_channels, 2]`.
pub struct CausalConv1d {
    conv: Conv1d,
    dilation: usize,
    in_channels: usize,
    out_channels: usize,
}

/// Streaming history for one [`CausalConv1d`]: the last `dilation` inputs.
#[derive(Clone)]
pub struct ConvState {
    history: Tensor,
}

impl ConvState {
    /// History tensor, shape `[batch, dilation, in_channels]`.
    pub fn history(&self) -> &Tensor {
        &self.history
    }
}

impl CausalConv1d {
    /// Create a new causal conv layer.
    ///
    /// # Arguments
    /// * `in_channels` - Number of input channels
    /// * `out_channels` - Number of output channels
    /// * `dilation` - Distance between the two kernel taps
    /// * `vb` - Variable builder for the enclosing layer (weights under `conv`)
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        dilation: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let config = Conv1dConfig {
            padding: 0,
            stride: 1,
            dilation,
            groups: 1,
            ..Default::default()
        };
        let conv = conv1d(in_channels, out_channels, KERNEL_SIZE, config, vb.pp("conv"))?;

        Ok(Self {
            conv,
            dilation,
            in_channels,
            out_channels,
        })
    }

    pub fn dilation(&self) -> usize {
        self.dilation
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Whole-sequence forward pass.
    ///
    /// Input shape: `[batch, time, in_channels]`
    /// Output shape: `[batch, time, out_channels]`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        // Left pad `dilation` zero frames so the first outputs only see the past
        let padded = x.pad_with_zeros(1, self.dilation, 0)?;
        let y = self.conv.forward(&padded.transpose(1, 2)?.contiguous()?)?;
        Ok(y.tanh()?.transpose(1, 2)?.contiguous()?)
    }

    /// All-zero history, equivalent to the left padding of [`forward`](Self::forward).
    pub fn zero_state(&self, batch: usize, dtype: DType) -> Result<ConvState> {
        let history = Tensor::zeros(
            (batch, self.dilation, self.in_channels),
            dtype,
            self.conv.weight().device(),
        )?;
        Ok(ConvState { history })
    }

    /// Consume a single frame `[batch, in_channels]` and return `[batch, out_channels]`.
    pub fn step(&self, x: &Tensor, state: &ConvState) -> Result<(Tensor, ConvState)> {
        let window = Tensor::cat(&[&state.history, &x.unsqueeze(1)?], 1)?;
        // Window spans exactly one dilated kernel, so the conv yields one output
        let y = self
            .conv
            .forward(&window.transpose(1, 2)?.contiguous()?)?
            .tanh()?
            .squeeze(2)?;
        let history = window.narrow(1, 1, self.dilation)?.contiguous()?;
        Ok((y, ConvState { history }))
    }
}
