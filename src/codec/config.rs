//! Configuration for integer stream codecs.

use serde::{Deserialize, Serialize};

use crate::error::{BlockpostError, Result};

/// Largest block, in values, a stream may declare.
///
/// Readers allocate their decode buffer from the declared size, so this also
/// caps the memory a single reader holds.
pub const MAX_BLOCK_SIZE: usize = 1 << 24;

/// Codec and block policy of a stream.
///
/// # Kinds
///
/// - **FixedVInt**: fixed blocks, every value a varint
/// - **FixedPacked**: fixed blocks, bit-packed at the block's widest value
/// - **VariableVInt**: codec-chosen block lengths with look-ahead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodecKind {
    FixedVInt,
    FixedPacked,
    VariableVInt,
}

impl CodecKind {
    /// Get a human-readable name for the codec kind.
    pub fn name(&self) -> &str {
        match self {
            CodecKind::FixedVInt => "FixedVInt",
            CodecKind::FixedPacked => "FixedPacked",
            CodecKind::VariableVInt => "VariableVInt",
        }
    }

    /// Whether streams of this kind use fixed-size blocks.
    pub fn is_fixed(&self) -> bool {
        !matches!(self, CodecKind::VariableVInt)
    }
}

/// Configuration for creating integer streams.
///
/// # Example
///
/// ```
/// use blockpost::codec::config::{CodecConfig, CodecKind};
///
/// let config = CodecConfig {
///     kind: CodecKind::FixedPacked,
///     block_size: 256,
///     ..Default::default()
/// };
/// config.validate().unwrap();
///
/// let json = config.to_json().unwrap();
/// assert_eq!(CodecConfig::from_json(&json).unwrap(), config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Codec and block policy.
    pub kind: CodecKind,

    /// Values per block for the fixed kinds.
    pub block_size: usize,

    /// Short block length of the variable codec; long blocks are twice this.
    pub base_block_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            kind: CodecKind::FixedVInt,
            block_size: 128,
            base_block_size: 64,
        }
    }
}

impl CodecConfig {
    /// Check that the sizes used by `kind` can be written and read back.
    pub fn validate(&self) -> Result<()> {
        let (field, size) = if self.kind.is_fixed() {
            ("block_size", self.block_size)
        } else {
            ("base_block_size", self.base_block_size)
        };

        if size == 0 {
            return Err(BlockpostError::invalid_config(format!(
                "{field} must be greater than zero"
            )));
        }

        if self.max_block_size() > MAX_BLOCK_SIZE {
            return Err(BlockpostError::invalid_config(format!(
                "{field} {size} gives blocks of {} values, limit is {MAX_BLOCK_SIZE}",
                self.max_block_size()
            )));
        }

        Ok(())
    }

    /// Decode buffer size a stream of this configuration declares.
    pub fn max_block_size(&self) -> usize {
        if self.kind.is_fixed() {
            self.block_size
        } else {
            // Long blocks plus the same amount of look-ahead.
            self.base_block_size.saturating_mul(4)
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CodecConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CodecConfig::default();
        assert_eq!(config.kind, CodecKind::FixedVInt);
        assert_eq!(config.block_size, 128);
        assert_eq!(config.base_block_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let config = CodecConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // The variable kind ignores block_size.
        let config = CodecConfig {
            kind: CodecKind::VariableVInt,
            block_size: 0,
            base_block_size: 0,
        };
        assert!(config.validate().is_err());

        let config = CodecConfig {
            kind: CodecKind::VariableVInt,
            block_size: 0,
            base_block_size: 8,
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.max_block_size(), 32);
    }

    #[test]
    fn test_oversized_block_is_rejected() {
        let config = CodecConfig {
            kind: CodecKind::VariableVInt,
            base_block_size: MAX_BLOCK_SIZE,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BlockpostError::Config(_))
        ));
    }

    #[test]
    fn test_json_defaults_and_round_trip() {
        let config = CodecConfig::from_json(r#"{ "kind": "FixedPacked" }"#).unwrap();
        assert_eq!(config.kind, CodecKind::FixedPacked);
        assert_eq!(config.block_size, 128);

        let json = config.to_json().unwrap();
        assert_eq!(CodecConfig::from_json(&json).unwrap(), config);

        assert!(CodecConfig::from_json(r#"{ "kind": "Unknown" }"#).is_err());
        assert!(CodecConfig::from_json(r#"{ "block_size": 0 }"#).is_err());
    }
}
