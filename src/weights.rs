//! Checkpoint loading
//!
//! Two formats are accepted:
//! - PyTorch `.pth`/`.pt` pickles holding a dict with a `state_dict` entry
//! - `.safetensors` files holding the state dict directly
//!
//! Tensors are returned by their PyTorch parameter names and upcast to F32.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use std::collections::HashMap;
use std::path::Path;

/// Key under which training scripts store the model parameters in a `.pth` checkpoint.
pub const STATE_DICT_KEY: &str = "state_dict";

/// On-disk checkpoint format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    Pth,
    Safetensors,
}

impl CheckpointFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("safetensors") => Self::Safetensors,
            _ => Self::Pth,
        }
    }
}

/// Load every tensor of a checkpoint onto `device`.
pub fn load_checkpoint<P: AsRef<Path>>(path: P, device: &Device) -> Result<HashMap<String, Tensor>> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!("checkpoint not found: {}", path.display());
    }

    let format = CheckpointFormat::from_path(path);
    let tensors: HashMap<String, Tensor> = match format {
        CheckpointFormat::Safetensors => candle_core::safetensors::load(path, device)
            .with_context(|| format!("failed to read safetensors {}", path.display()))?,
        CheckpointFormat::Pth => {
            candle_core::pickle::read_all_with_key(path, Some(STATE_DICT_KEY))
                .with_context(|| {
                    format!(
                        "failed to read '{}' from checkpoint {}",
                        STATE_DICT_KEY,
                        path.display()
                    )
                })?
                .into_iter()
                .map(|(name, tensor)| Ok((name, tensor.to_device(device)?)))
                .collect::<Result<_>>()?
        }
    };

    let tensors = tensors
        .into_iter()
        .map(|(name, tensor)| {
            let tensor = if tensor.dtype() == DType::F32 {
                tensor
            } else {
                tensor.to_dtype(DType::F32)?
            };
            Ok((name, tensor))
        })
        .collect::<Result<HashMap<_, _>>>()?;

    tracing::info!(
        "Loaded {} tensors from {} ({:?})",
        tensors.len(),
        path.display(),
        format
    );
    Ok(tensors)
}

/// Duplicate every tensor under `from.` to the same name under `to.`,
/// replacing existing entries. Returns the number of tensors copied.
pub fn copy_prefix(tensors: &mut HashMap<String, Tensor>, from: &str, to: &str) -> usize {
    let source = format!("{from}.");
    let copies: Vec<(String, Tensor)> = tensors
        .iter()
        .filter_map(|(name, tensor)| {
            name.strip_prefix(&source)
                .map(|rest| (format!("{to}.{rest}"), tensor.clone()))
        })
        .collect();

    let count = copies.len();
    tensors.extend(copies);
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(value: f32) -> Tensor {
        Tensor::new(&[value], &Device::Cpu).unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            CheckpointFormat::from_path(Path::new("model.safetensors")),
            CheckpointFormat::Safetensors
        );
        assert_eq!(
            CheckpointFormat::from_path(Path::new("checkpoints/checkpoint_epoch_100.pth")),
            CheckpointFormat::Pth
        );
        assert_eq!(CheckpointFormat::from_path(Path::new("model")), CheckpointFormat::Pth);
    }

    #[test]
    fn test_copy_prefix() {
        let mut tensors = HashMap::new();
        tensors.insert("core_decoder.dense_1.weight".to_string(), tensor(1.0));
        tensors.insert("core_decoder.gru1.bias_ih_l0".to_string(), tensor(2.0));
        tensors.insert("core_decoder_statefull.dense_1.weight".to_string(), tensor(9.0));
        tensors.insert("core_encoder.dense_1.weight".to_string(), tensor(3.0));

        let copied = copy_prefix(&mut tensors, "core_decoder", "core_decoder_statefull");
        assert_eq!(copied, 2);
        assert_eq!(tensors.len(), 5);

        let value: Vec<f32> = tensors["core_decoder_statefull.dense_1.weight"]
            .to_vec1()
            .unwrap();
        assert_eq!(value, vec![1.0]);
        assert!(tensors.contains_key("core_decoder_statefull.gru1.bias_ih_l0"));
    }

    #[test]
    fn test_copy_prefix_does_not_match_longer_names() {
        let mut tensors = HashMap::new();
        tensors.insert("core_decoder_statefull.output.bias".to_string(), tensor(1.0));
        let copied = copy_prefix(&mut tensors, "core_decoder", "other");
        assert_eq!(copied, 0);
    }

    #[test]
    fn test_load_safetensors_upcasts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let mut tensors = HashMap::new();
        tensors.insert(
            "core_encoder.dense_1.bias".to_string(),
            Tensor::new(&[1.0f32, 2.0], &Device::Cpu)
                .unwrap()
                .to_dtype(DType::F16)
                .unwrap(),
        );
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let loaded = load_checkpoint(&path, &Device::Cpu).unwrap();
        let bias = &loaded["core_encoder.dense_1.bias"];
        assert_eq!(bias.dtype(), DType::F32);
        assert_eq!(bias.to_vec1::<f32>().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_load_pth_state_dict() {
        // torch zip checkpoint: {"epoch": 3, "state_dict": {...}}
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/tiny_checkpoint.pth");
        let loaded = load_checkpoint(path, &Device::Cpu).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(!loaded.contains_key("epoch"));

        let output_bias = &loaded["core_decoder.output.bias"];
        assert_eq!(output_bias.dims(), &[2, 3]);
        assert_eq!(output_bias.dtype(), DType::F32);
        assert_eq!(
            output_bias.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![0.5, -1.0, 2.0, 0.25, 3.5, -0.75]
        );
        assert_eq!(
            loaded["core_encoder.dense_1.bias"].to_vec1::<f32>().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_missing_checkpoint() {
        assert!(load_checkpoint("/nonexistent/model.pth", &Device::Cpu).is_err());
    }
}
