//! Raw `.f32` feature file I/O.

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use candle_core::{Device, Tensor};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Frame-major feature data: `frames * channels` little-endian f32 values.
///
/// # Example
///
/// ```rust,ignore
/// let features = FeatureBuffer::load("speech.f32", 36)?;
/// println!("{} frames", features.frames());
/// let tensor = features.to_tensor(&device)?; // [1, frames, 36]
/// ```
#[derive(Debug, Clone)]
pub struct FeatureBuffer {
    /// Values laid out frame by frame
    pub data: Vec<f32>,
    /// Values per frame
    pub channels: usize,
}

impl FeatureBuffer {
    /// Create a buffer, checking that `data` holds whole frames.
    pub fn new(data: Vec<f32>, channels: usize) -> Result<Self> {
        if channels == 0 {
            anyhow::bail!("feature buffer needs at least one channel");
        }
        if data.len() % channels != 0 {
            anyhow::bail!(
                "{} values do not divide into frames of {} channels",
                data.len(),
                channels
            );
        }
        Ok(Self { data, channels })
    }

    /// Create from a tensor of shape `[1, frames, channels]` or `[frames, channels]`.
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        let channels = tensor.dim(candle_core::D::Minus1)?;
        let data: Vec<f32> = tensor.flatten_all()?.to_vec1()?;
        Self::new(data, channels)
    }

    /// Convert to a `[1, frames, channels]` tensor.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(
            &self.data,
            (1, self.frames(), self.channels),
            device,
        )?)
    }

    pub fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Load a feature file with `channels` values per frame.
    pub fn load<P: AsRef<Path>>(path: P, channels: usize) -> Result<Self> {
        let path = path.as_ref();
        let data = read_f32_file(path)?;
        Self::new(data, channels)
            .with_context(|| format!("malformed feature file: {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_f32_file(path, &self.data)
    }
}

/// Read a file of little-endian f32 values.
pub fn read_f32_file<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open feature file: {}", path.display()))?;
    let len = file.metadata()?.len() as usize;
    if len % 4 != 0 {
        anyhow::bail!(
            "{} is {} bytes, not a whole number of f32 values",
            path.display(),
            len
        );
    }

    let mut values = vec![0f32; len / 4];
    BufReader::new(file).read_f32_into::<LittleEndian>(&mut values)?;
    Ok(values)
}

/// Write values as little-endian f32.
pub fn write_f32_file<P: AsRef<Path>>(path: P, values: &[f32]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create feature file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for &value in values {
        writer.write_f32::<LittleEndian>(value)?;
    }
    writer.flush()?;
    Ok(())
}
