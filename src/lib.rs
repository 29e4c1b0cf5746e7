//! # RADAE
//!
//! Pure Rust inference for the core networks of RADAE, the radio
//! autoencoder that maps speech features to latent symbols and back, plus a
//! harness that checks the streaming decoder against the batch decoder.
//!
//! ## Features
//!
//! - **Checkpoint loading** from PyTorch `.pth` (`state_dict` entry) or `.safetensors`
//! - **Batch and stateful decoders** sharing one parameter layout
//! - **CPU inference** with optional MKL/Accelerate, CUDA or Metal backends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use radae::{check, features, Radae, RadaeConfig};
//! use candle_core::Device;
//!
//! let device = Device::Cpu;
//! let mut model = Radae::load("checkpoint.pth", RadaeConfig::default(), &device)?;
//!
//! let raw = features::FeatureBuffer::load("speech.f32", features::NB_TOTAL_FEATURES)?;
//! let input = check::prepare_features(&model, &raw.to_tensor(&device)?)?;
//!
//! let outcome = check::run_check(&mut model, &input, 0.3)?;
//! println!("{}", outcome.report.loss_line());
//! outcome.save_features_hat("speech_hat.f32")?;
//! ```
//!
//! ## Architecture
//!
//! 1. **CoreEncoder**: folds 4 feature frames (40 ms) into one step and runs
//!    a DenseNet-style stack of GRU and dilated conv layers down to a
//!    latent vector.
//!
//! 2. **CoreDecoder**: the mirror stack, run over the whole latent sequence.
//!
//! 3. **StatefulDecoder**: the same layers stepped one latent vector at a
//!    time with explicit GRU and conv state, for streaming receivers. Its
//!    parameters are copied from the batch decoder at load time.
//!
//! Feature frames are processed in whole modem frames: 3 latent vectors,
//! i.e. 12 frames (120 ms).

pub mod check;
pub mod device;
pub mod features;
pub mod loss;
pub mod models;
pub mod profiling;
pub mod weights;

pub use check::{run_check, CheckOutcome, LossReport, Verdict};
pub use device::DeviceKind;
pub use features::FeatureBuffer;
pub use loss::distortion_loss;
pub use models::{Bottleneck, CoreDecoder, CoreEncoder, Radae, RadaeConfig, StatefulDecoder};
