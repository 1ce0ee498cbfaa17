use serde::Deserialize;

use resultset_api::JsonOptions;

use crate::error::ReassemblyError;
use crate::merge::MergePolicy;

/// Stream configuration, parsed from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamConfig {
    /// Handling of chunked scalars that cannot be concatenated.
    #[serde(default)]
    pub merge_policy: MergePolicy,

    /// Capacity of the channel between the transport and the stream.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// JSON rendering of formatted rows.
    #[serde(default)]
    pub json: JsonOptions,
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            channel_capacity: default_channel_capacity(),
            json: JsonOptions::default(),
        }
    }
}

impl StreamConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ReassemblyError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReassemblyError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ReassemblyError> {
        let config: StreamConfig =
            toml::from_str(toml_str).map_err(|e| ReassemblyError::Config(e.to_string()))?;
        if config.channel_capacity == 0 {
            return Err(ReassemblyError::Config("channel_capacity must be positive".into()));
        }
        Ok(config)
    }
}
