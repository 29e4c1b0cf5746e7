//! RADAE model: core encoder plus batch and stateful decoders
//!
//! Checkpoints from training carry `core_encoder.*` and `core_decoder.*`
//! parameters (and possibly others, such as the modem's, which are ignored).
//! The stateful decoder is never trained, so its parameters are copied from
//! the batch decoder when the model is built.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use std::collections::HashMap;
use std::path::Path;

use super::config::RadaeConfig;
use super::decoder::CoreDecoder;
use super::encoder::CoreEncoder;
use super::stateful_decoder::StatefulDecoder;
use crate::weights::{copy_prefix, load_checkpoint};

pub const ENCODER_PREFIX: &str = "core_encoder";
pub const DECODER_PREFIX: &str = "core_decoder";
pub const STATEFUL_DECODER_PREFIX: &str = "core_decoder_statefull";

pub struct Radae {
    config: RadaeConfig,
    core_encoder: CoreEncoder,
    core_decoder: CoreDecoder,
    core_decoder_statefull: StatefulDecoder,
    device: Device,
}

impl Radae {
    /// Load a checkpoint file (`.pth` or `.safetensors`).
    pub fn load<P: AsRef<Path>>(path: P, config: RadaeConfig, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading RADAE checkpoint from: {}", path.display());
        let tensors = load_checkpoint(path, device)?;
        Self::from_tensors(tensors, config, device)
            .with_context(|| format!("incompatible checkpoint {}", path.display()))
    }

    /// Build the model from a state dict, copying the batch decoder's
    /// parameters into the stateful decoder.
    pub fn from_tensors(
        mut tensors: HashMap<String, Tensor>,
        config: RadaeConfig,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;

        let has_prefix = |tensors: &HashMap<String, Tensor>, prefix: &str| {
            let prefix = format!("{prefix}.");
            tensors.keys().any(|k| k.starts_with(&prefix))
        };
        if has_prefix(&tensors, STATEFUL_DECODER_PREFIX) {
            tracing::warn!(
                "checkpoint already contains {} parameters; replacing them with {}",
                STATEFUL_DECODER_PREFIX,
                DECODER_PREFIX
            );
        }

        let copied = copy_prefix(&mut tensors, DECODER_PREFIX, STATEFUL_DECODER_PREFIX);
        if copied == 0 {
            anyhow::bail!("checkpoint has no {DECODER_PREFIX} parameters");
        }
        tracing::debug!("copied {} decoder tensors into the stateful decoder", copied);

        let unused = tensors
            .keys()
            .filter(|k| {
                ![ENCODER_PREFIX, DECODER_PREFIX, STATEFUL_DECODER_PREFIX]
                    .iter()
                    .any(|p| k.starts_with(&format!("{p}.")))
            })
            .count();
        if unused > 0 {
            tracing::debug!("ignoring {} checkpoint tensors outside the core networks", unused);
        }

        let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
        let core_encoder = CoreEncoder::new(&config, vb.pp(ENCODER_PREFIX))
            .context("failed to build core encoder")?;
        let core_decoder = CoreDecoder::new(&config, vb.pp(DECODER_PREFIX))
            .context("failed to build core decoder")?;
        let core_decoder_statefull = StatefulDecoder::new(&config, vb.pp(STATEFUL_DECODER_PREFIX))
            .context("failed to build stateful decoder")?;

        tracing::info!(
            "RADAE ready: {} features, latent dim {}, {} frames per modem frame",
            config.feature_dim,
            config.latent_dim,
            config.modem_frame_timesteps()
        );

        Ok(Self {
            config,
            core_encoder,
            core_decoder,
            core_decoder_statefull,
            device: device.clone(),
        })
    }

    pub fn config(&self) -> &RadaeConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn core_encoder(&self) -> &CoreEncoder {
        &self.core_encoder
    }

    pub fn core_decoder(&self) -> &CoreDecoder {
        &self.core_decoder
    }

    /// The stateful decoder carries state between calls, so access is mutable.
    pub fn core_decoder_statefull(&mut self) -> &mut StatefulDecoder {
        &mut self.core_decoder_statefull
    }

    /// See [`RadaeConfig::num_10ms_timesteps_rounded_to_modem_frames`].
    pub fn num_10ms_timesteps_rounded_to_modem_frames(&self, num_timesteps: usize) -> usize {
        self.config
            .num_10ms_timesteps_rounded_to_modem_frames(num_timesteps)
    }
}
