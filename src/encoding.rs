//! Quantization encodings and weight serialization formats.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::{DeviceSpec, DeviceType};

/// Weight quantization encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "float32")]
    Float32,
    #[serde(rename = "bfloat16")]
    Bfloat16,
    #[serde(rename = "float16")]
    Float16,
    #[serde(rename = "q4_0")]
    Q40,
    #[serde(rename = "q4_k")]
    Q4K,
    #[serde(rename = "q6_k")]
    Q6K,
    #[serde(rename = "gptq")]
    Gptq,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float32 => write!(f, "float32"),
            Self::Bfloat16 => write!(f, "bfloat16"),
            Self::Float16 => write!(f, "float16"),
            Self::Q40 => write!(f, "q4_0"),
            Self::Q4K => write!(f, "q4_k"),
            Self::Q6K => write!(f, "q6_k"),
            Self::Gptq => write!(f, "gptq"),
        }
    }
}

impl Encoding {
    /// Detect the encoding tagged in a weight file name.
    ///
    /// Returns `None` for names that carry no tag (e.g. bare sharded
    /// safetensors sets).
    pub fn parse_from_file_name(name: &str) -> Option<Encoding> {
        let name = name.to_ascii_lowercase();
        // "bfloat16" contains "float16" and "bf16" contains "f16", so the
        // bfloat checks must run first.
        if name.contains("bfloat16") || name.contains("bf16") {
            Some(Self::Bfloat16)
        } else if name.contains("float16") || name.contains("f16") {
            Some(Self::Float16)
        } else if name.contains("float32") || name.contains("f32") {
            Some(Self::Float32)
        } else if name.contains("q4_k") {
            Some(Self::Q4K)
        } else if name.contains("q6_k") {
            Some(Self::Q6K)
        } else if name.contains("q4_0") {
            Some(Self::Q40)
        } else if name.contains("gptq") {
            Some(Self::Gptq)
        } else {
            None
        }
    }

    /// Whether this encoding can run on `device`.
    pub fn supported_on(&self, device: &DeviceSpec) -> bool {
        match device.device_type {
            DeviceType::Cpu => matches!(self, Self::Float32 | Self::Q40 | Self::Q4K | Self::Q6K),
            DeviceType::Gpu => {
                matches!(self, Self::Float32 | Self::Bfloat16 | Self::Float16 | Self::Gptq)
            }
        }
    }

    /// The encoding a repository may substitute for this one.
    ///
    /// The float encodings cast losslessly into each other, so a request for
    /// one can be served by weights stored in the other.
    pub fn alternate(&self) -> Option<Encoding> {
        match self {
            Self::Float32 => Some(Self::Bfloat16),
            Self::Bfloat16 => Some(Self::Float32),
            _ => None,
        }
    }
}

/// On-disk weight serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightsFormat {
    Safetensors,
    Gguf,
    Pytorch,
}

impl fmt::Display for WeightsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safetensors => write!(f, "safetensors"),
            Self::Gguf => write!(f, "gguf"),
            Self::Pytorch => write!(f, "pytorch"),
        }
    }
}

impl WeightsFormat {
    /// Classify a weight file by extension.
    pub fn from_path(path: &Path) -> Option<WeightsFormat> {
        match path.extension()?.to_str()? {
            "safetensors" => Some(Self::Safetensors),
            "gguf" => Some(Self::Gguf),
            "bin" | "pt" | "pth" => Some(Self::Pytorch),
            _ => None,
        }
    }
}

/// Order in which formats are preferred when the caller's default format has
/// no files.
pub(crate) const FORMAT_PREFERENCE: [WeightsFormat; 3] = [
    WeightsFormat::Safetensors,
    WeightsFormat::Gguf,
    WeightsFormat::Pytorch,
];

/// The single serialization format shared by `paths`.
///
/// Returns `None` when the list is empty, mixes formats, or contains a file
/// that cannot be classified.
pub fn weights_format(paths: &[PathBuf]) -> Option<WeightsFormat> {
    let mut format = None;
    for path in paths {
        let next = WeightsFormat::from_path(path)?;
        match format {
            None => format = Some(next),
            Some(prev) if prev != next => return None,
            Some(_) => {}
        }
    }
    format
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_file_name() {
        assert_eq!(
            Encoding::parse_from_file_name("model-bf16.safetensors"),
            Some(Encoding::Bfloat16)
        );
        assert_eq!(
            Encoding::parse_from_file_name("model-bfloat16.safetensors"),
            Some(Encoding::Bfloat16)
        );
        assert_eq!(
            Encoding::parse_from_file_name("model-f16.gguf"),
            Some(Encoding::Float16)
        );
        assert_eq!(
            Encoding::parse_from_file_name("llama-x.q4_k.gguf"),
            Some(Encoding::Q4K)
        );
        assert_eq!(
            Encoding::parse_from_file_name("llama-x-GPTQ.safetensors"),
            Some(Encoding::Gptq)
        );
        assert_eq!(
            Encoding::parse_from_file_name("model-00001-of-00002.safetensors"),
            None
        );
    }

    #[test]
    fn test_bfloat_wins_over_float() {
        // A name tagged bfloat16 must never be read as float16.
        assert_eq!(
            Encoding::parse_from_file_name("weights.bfloat16.bin"),
            Some(Encoding::Bfloat16)
        );
    }

    #[test]
    fn test_supported_on() {
        let cpu = DeviceSpec::cpu(0);
        let gpu = DeviceSpec::gpu(0);
        assert!(Encoding::Float32.supported_on(&cpu));
        assert!(Encoding::Float32.supported_on(&gpu));
        assert!(!Encoding::Bfloat16.supported_on(&cpu));
        assert!(Encoding::Bfloat16.supported_on(&gpu));
        assert!(Encoding::Q4K.supported_on(&cpu));
        assert!(!Encoding::Q4K.supported_on(&gpu));
        assert!(Encoding::Gptq.supported_on(&gpu));
        assert!(!Encoding::Gptq.supported_on(&cpu));
    }

    #[test]
    fn test_alternate_float_pair() {
        assert_eq!(Encoding::Float32.alternate(), Some(Encoding::Bfloat16));
        assert_eq!(Encoding::Bfloat16.alternate(), Some(Encoding::Float32));
        assert_eq!(Encoding::Q4K.alternate(), None);
    }

    #[test]
    fn test_weights_format() {
        let safetensors = vec![
            PathBuf::from("model-00001-of-00002.safetensors"),
            PathBuf::from("model-00002-of-00002.safetensors"),
        ];
        assert_eq!(weights_format(&safetensors), Some(WeightsFormat::Safetensors));

        let pytorch = vec![PathBuf::from("pytorch_model.bin")];
        assert_eq!(weights_format(&pytorch), Some(WeightsFormat::Pytorch));

        let mixed = vec![
            PathBuf::from("model.safetensors"),
            PathBuf::from("model.gguf"),
        ];
        assert_eq!(weights_format(&mixed), None);
        assert_eq!(weights_format(&[]), None);
        assert_eq!(weights_format(&[PathBuf::from("README.md")]), None);
    }
}
