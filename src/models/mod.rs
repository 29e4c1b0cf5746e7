//! Neural network models for RADAE
//!
//! This module contains:
//! - `config`: Model configuration
//! - `conv`: Causal dilated convolution shared by every network
//! - `encoder`: CoreEncoder, features to latent vectors
//! - `decoder`: CoreDecoder, whole-sequence latent decoding
//! - `stateful_decoder`: StatefulDecoder, step-by-step latent decoding
//! - `radae`: Checkpoint loading and the three networks together

pub mod config;
pub mod conv;
pub mod decoder;
pub mod encoder;
pub mod radae;
pub mod stateful_decoder;

pub use config::{Bottleneck, RadaeConfig};
pub use conv::{CausalConv1d, ConvState};
pub use decoder::CoreDecoder;
pub use encoder::CoreEncoder;
pub use radae::Radae;
pub use stateful_decoder::{DecoderState, StatefulDecoder};

use anyhow::Result;
use candle_core::Tensor;
use candle_nn::rnn::{GRU, RNN};

/// Run a GRU over `[batch, time, in]` from a zero state, returning every
/// hidden state as `[batch, time, hidden]`.
pub(crate) fn gru_sequence(gru: &GRU, x: &Tensor) -> Result<Tensor> {
    let states = gru.seq(&x.contiguous()?)?;
    let hidden: Vec<Tensor> = states.iter().map(|s| s.h().clone()).collect();
    Ok(Tensor::stack(&hidden, 1)?)
}
