//! Digest tuning.
//!
//! ```toml
//! max-rounds = 10
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

/// Default round budget before a digest is declared non-convergent.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Tuning knobs for the digest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DigestConfig {
	/// Number of dirty rounds a digest may run before failing.
	pub max_rounds: usize,
}

impl Default for DigestConfig {
	fn default() -> Self {
		Self {
			max_rounds: DEFAULT_MAX_ROUNDS,
		}
	}
}

impl DigestConfig {
	pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
		self.max_rounds = max_rounds;
		self
	}

	/// Parses and validates a TOML document. Missing fields take defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_rounds == 0 {
			return Err(ConfigError::Invalid {
				field: "max-rounds",
				reason: "must be at least 1".to_string(),
			});
		}
		Ok(())
	}
}
