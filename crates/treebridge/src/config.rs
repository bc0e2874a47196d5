// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tree and buffer configuration.
//!
//! [`TreeConfig`] carries the hints passed to the engine when a branch is
//! created and the sizing rules of the buffers behind each branch. With the
//! `config-loaders` feature (on by default) it can be read from YAML:
//!
//! ```yaml
//! # tree.yaml
//! buffer_size: 32000
//! split_level: 32
//! sequence_capacity: 64
//! text_capacity: 128
//! growth_factor: 2
//! max_sequence_len: 100000
//! ```
//!
//! Missing keys keep their default value.

use crate::error::{Error, Result};

/// Default engine buffer size hint (bytes).
pub const DEFAULT_BUFFER_SIZE: u32 = 32_000;

/// Default split level for composite branches.
pub const DEFAULT_SPLIT_LEVEL: u32 = 32;

/// Per-tree configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    /// Engine buffer size hint passed with every `create_branch`.
    pub buffer_size: u32,

    /// Split level for composite branches (0 keeps a composite in one leaf).
    pub split_level: u32,

    /// Elements reserved per sequence field when a buffer is first allocated.
    pub sequence_capacity: usize,

    /// Bytes reserved per text field when a buffer is first allocated.
    pub text_capacity: usize,

    /// Multiplier applied to the capacity when a buffer must grow.
    pub growth_factor: usize,

    /// Longest sequence (or text, in bytes) accepted by the encoder.
    pub max_sequence_len: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            split_level: DEFAULT_SPLIT_LEVEL,
            sequence_capacity: 16,
            text_capacity: 64,
            growth_factor: 2,
            max_sequence_len: u32::MAX,
        }
    }
}

impl TreeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set engine buffer size hint.
    pub fn with_buffer_size(mut self, bytes: u32) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Builder: set split level.
    pub fn with_split_level(mut self, level: u32) -> Self {
        self.split_level = level;
        self
    }

    /// Builder: set initial capacities of variable-length fields.
    pub fn with_capacities(mut self, sequence_elems: usize, text_bytes: usize) -> Self {
        self.sequence_capacity = sequence_elems;
        self.text_capacity = text_bytes;
        self
    }

    /// Builder: set growth factor.
    pub fn with_growth_factor(mut self, factor: usize) -> Self {
        self.growth_factor = factor;
        self
    }

    /// Builder: set the encoder's sequence length limit.
    pub fn with_max_sequence_len(mut self, len: u32) -> Self {
        self.max_sequence_len = len;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.growth_factor < 2 {
            return Err(Error::Config("growth_factor must be >= 2".into()));
        }
        if self.buffer_size == 0 {
            return Err(Error::Config("buffer_size must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(feature = "config-loaders")]
mod yaml {
    use super::TreeConfig;
    use crate::error::{Error, Result};
    use serde::Deserialize;
    use std::fs;
    use std::io;
    use std::path::Path;

    /// YAML document for [`TreeConfig`]; every key is optional.
    #[derive(Debug, Deserialize, Default)]
    #[serde(default, deny_unknown_fields)]
    struct YamlTreeConfig {
        buffer_size: Option<u32>,
        split_level: Option<u32>,
        sequence_capacity: Option<usize>,
        text_capacity: Option<usize>,
        growth_factor: Option<usize>,
        max_sequence_len: Option<u32>,
    }

    impl TreeConfig {
        /// Parse a configuration from YAML text.
        pub fn from_yaml_str(yaml_content: &str) -> Result<Self> {
            let doc: YamlTreeConfig = serde_yaml::from_str(yaml_content)
                .map_err(|e| Error::Config(format!("Failed to parse YAML: {}", e)))?;

            let mut config = TreeConfig::default();
            if let Some(v) = doc.buffer_size {
                config.buffer_size = v;
            }
            if let Some(v) = doc.split_level {
                config.split_level = v;
            }
            if let Some(v) = doc.sequence_capacity {
                config.sequence_capacity = v;
            }
            if let Some(v) = doc.text_capacity {
                config.text_capacity = v;
            }
            if let Some(v) = doc.growth_factor {
                config.growth_factor = v;
            }
            if let Some(v) = doc.max_sequence_len {
                config.max_sequence_len = v;
            }
            config.validate()?;
            Ok(config)
        }

        /// Load a configuration from a YAML file.
        pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            let yaml_content = fs::read_to_string(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::ConfigFileNotFound(path.display().to_string()),
                _ => Error::Io(e),
            })?;
            log::debug!("[TreeConfig::from_yaml_file] loading {}", path.display());
            Self::from_yaml_str(&yaml_content)
        }
    }
}
