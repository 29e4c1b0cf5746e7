//! Inference device selection for the `--device` flag.
//!
//! The check runs on CPU unless a GPU backend is both requested and
//! compiled in.

use anyhow::{bail, Result};
use candle_core::Device;
use std::fmt;
use std::str::FromStr;

/// Device named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceKind {
    #[default]
    Cpu,
    /// CUDA device ordinal
    Cuda(usize),
    Metal,
}

impl FromStr for DeviceKind {
    type Err = anyhow::Error;

    /// Accepts `cpu`, `cuda`, `cuda:N` and `metal`, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(DeviceKind::Cpu),
            "cuda" => Ok(DeviceKind::Cuda(0)),
            "metal" => Ok(DeviceKind::Metal),
            _ => match s.strip_prefix("cuda:") {
                Some(ordinal) => match ordinal.parse() {
                    Ok(ordinal) => Ok(DeviceKind::Cuda(ordinal)),
                    Err(_) => bail!("invalid CUDA ordinal '{ordinal}'"),
                },
                None => bail!("unknown device '{s}' (expected cpu, cuda, cuda:N or metal)"),
            },
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            DeviceKind::Metal => write!(f, "metal"),
        }
    }
}

impl DeviceKind {
    /// Open the device. Fails when the backend was not compiled in.
    pub fn open(self) -> Result<Device> {
        let device = match self {
            DeviceKind::Cpu => Device::Cpu,
            #[cfg(feature = "cuda")]
            DeviceKind::Cuda(ordinal) => Device::new_cuda(ordinal)?,
            #[cfg(feature = "metal")]
            DeviceKind::Metal => Device::new_metal(0)?,
            #[allow(unreachable_patterns)]
            other => bail!("{other} requested but this build has no such backend"),
        };
        tracing::debug!("opened {} device", self);
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_names() {
        assert_eq!("cpu".parse::<DeviceKind>().unwrap(), DeviceKind::Cpu);
        assert_eq!(" CPU ".parse::<DeviceKind>().unwrap(), DeviceKind::Cpu);
        assert_eq!("cuda".parse::<DeviceKind>().unwrap(), DeviceKind::Cuda(0));
        assert_eq!("cuda:2".parse::<DeviceKind>().unwrap(), DeviceKind::Cuda(2));
        assert_eq!("Metal".parse::<DeviceKind>().unwrap(), DeviceKind::Metal);
        assert_eq!(DeviceKind::default(), DeviceKind::Cpu);
    }

    #[test]
    fn test_parse_device_rejects_unknown() {
        assert!("tpu".parse::<DeviceKind>().is_err());
        assert!("auto".parse::<DeviceKind>().is_err());
        assert!("cuda:x".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for kind in [DeviceKind::Cpu, DeviceKind::Cuda(1), DeviceKind::Metal] {
            assert_eq!(kind.to_string().parse::<DeviceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_open_cpu() {
        assert!(DeviceKind::Cpu.open().unwrap().is_cpu());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_open_cuda_without_backend() {
        let err = DeviceKind::Cuda(0).open().unwrap_err();
        assert!(err.to_string().contains("no such backend"));
    }
}
