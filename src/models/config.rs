//! Model configuration for RADAE

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output non-linearity applied to the encoder's latent vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bottleneck {
    /// `tanh(z)`, keeps every latent component in [-1, 1]
    #[default]
    Tanh,
    /// Raw `z_dense` output
    Linear,
}

impl std::str::FromStr for Bottleneck {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tanh" => Ok(Bottleneck::Tanh),
            "linear" => Ok(Bottleneck::Linear),
            other => anyhow::bail!("unknown bottleneck '{other}'. Supported: tanh, linear"),
        }
    }
}

/// RADAE core encoder/decoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadaeConfig {
    /// Feature channels consumed by the encoder and produced by the decoders
    #[serde(default = "default_feature_dim")]
    pub feature_dim: usize,

    /// Latent vector size produced by the encoder per step
    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,

    /// 10 ms feature frames folded into one latent step
    #[serde(default = "default_enc_stride")]
    pub enc_stride: usize,

    /// Latent vectors carried by one modem frame
    #[serde(default = "default_latents_per_modem_frame")]
    pub latents_per_modem_frame: usize,

    /// Encoder output non-linearity
    #[serde(default)]
    pub bottleneck: Bottleneck,
}

fn default_feature_dim() -> usize {
    20
}
fn default_latent_dim() -> usize {
    80
}
fn default_enc_stride() -> usize {
    4
}
fn default_latents_per_modem_frame() -> usize {
    3
}

impl Default for RadaeConfig {
    fn default() -> Self {
        Self {
            feature_dim: default_feature_dim(),
            latent_dim: default_latent_dim(),
            enc_stride: default_enc_stride(),
            latents_per_modem_frame: default_latents_per_modem_frame(),
            bottleneck: Bottleneck::default(),
        }
    }
}

impl RadaeConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with a custom latent size.
    pub fn with_latent_dim(latent_dim: usize) -> Self {
        Self {
            latent_dim,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.feature_dim == 0 || self.latent_dim == 0 {
            anyhow::bail!(
                "feature_dim and latent_dim must be non-zero (got {} and {})",
                self.feature_dim,
                self.latent_dim
            );
        }
        if self.enc_stride == 0 || self.latents_per_modem_frame == 0 {
            anyhow::bail!(
                "enc_stride and latents_per_modem_frame must be non-zero (got {} and {})",
                self.enc_stride,
                self.latents_per_modem_frame
            );
        }
        Ok(())
    }

    /// Number of 10 ms feature frames in one modem frame (12 = 120 ms by default).
    pub fn modem_frame_timesteps(&self) -> usize {
        self.enc_stride * self.latents_per_modem_frame
    }

    /// Round a 10 ms frame count down to a whole number of modem frames.
    pub fn num_10ms_timesteps_rounded_to_modem_frames(&self, num_timesteps: usize) -> usize {
        let step = self.modem_frame_timesteps();
        (num_timesteps / step) * step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RadaeConfig::default();
        assert_eq!(config.feature_dim, 20);
        assert_eq!(config.latent_dim, 80);
        assert_eq!(config.enc_stride, 4);
        assert_eq!(config.modem_frame_timesteps(), 12);
        assert_eq!(config.bottleneck, Bottleneck::Tanh);
    }

    #[test]
    fn test_rounding_to_modem_frames() {
        let config = RadaeConfig::default();
        assert_eq!(config.num_10ms_timesteps_rounded_to_modem_frames(0), 0);
        assert_eq!(config.num_10ms_timesteps_rounded_to_modem_frames(11), 0);
        assert_eq!(config.num_10ms_timesteps_rounded_to_modem_frames(12), 12);
        assert_eq!(config.num_10ms_timesteps_rounded_to_modem_frames(100), 96);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RadaeConfig =
            serde_json::from_str(r#"{"latent_dim": 40, "bottleneck": "linear"}"#).unwrap();
        assert_eq!(config.latent_dim, 40);
        assert_eq!(config.feature_dim, 20);
        assert_eq!(config.bottleneck, Bottleneck::Linear);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"latent_dim": 64}"#).unwrap();
        let config = RadaeConfig::from_file(&path).unwrap();
        assert_eq!(config.latent_dim, 64);
    }

    #[test]
    fn test_validate_rejects_zero_dims() {
        let config = RadaeConfig::with_latent_dim(0);
        assert!(config.validate().is_err());

        let config = RadaeConfig {
            enc_stride: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bottleneck_from_str() {
        assert_eq!("TANH".parse::<Bottleneck>().unwrap(), Bottleneck::Tanh);
        assert_eq!("linear".parse::<Bottleneck>().unwrap(), Bottleneck::Linear);
        assert!("relu".parse::<Bottleneck>().is_err());
    }
}
