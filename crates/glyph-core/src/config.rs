//! Router configuration.
//!
//! | Key | Env | Default | Description |
//! |-----|-----|---------|-------------|
//! | suffix_min_matches | GLYPH__SUFFIX_MIN_MATCHES | 2 | Action suffixes a foreign prefix must share with a suffix-catalog entry to borrow its signature. |
//! | discovery_enabled | GLYPH__DISCOVERY_ENABLED | true | Re-scan the capability catalog on every detection call. |
//! | candidate_cap | GLYPH__CANDIDATE_CAP | 5 | Candidate templates kept per signature (1..=5). |
//! | auto_template_id | GLYPH__AUTO_TEMPLATE_ID | SystemAutoTable | Template id given to discovered signatures. |

use crate::artifacts::MAX_CANDIDATES;
use crate::error::RouterError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_CONFIG_PATH: &str = "GLYPH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/glyph";
pub const DEFAULT_AUTO_TEMPLATE_ID: &str = "SystemAutoTable";

fn default_suffix_min_matches() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_candidate_cap() -> usize {
    MAX_CANDIDATES
}

fn default_auto_template_id() -> String {
    DEFAULT_AUTO_TEMPLATE_ID.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_suffix_min_matches")]
    pub suffix_min_matches: usize,
    #[serde(default = "default_true")]
    pub discovery_enabled: bool,
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,
    #[serde(default = "default_auto_template_id")]
    pub auto_template_id: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            suffix_min_matches: default_suffix_min_matches(),
            discovery_enabled: true,
            candidate_cap: default_candidate_cap(),
            auto_template_id: default_auto_template_id(),
        }
    }
}

impl RouterConfig {
    /// Load from `GLYPH_CONFIG` (default `config/glyph`, any extension the config crate knows)
    /// and `GLYPH__*` environment variables. A missing file is not an error.
    pub fn load() -> Result<Self, RouterError> {
        let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, RouterError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let built = config::Config::builder()
            .set_default("suffix_min_matches", default_suffix_min_matches() as i64)?
            .set_default("discovery_enabled", true)?
            .set_default("candidate_cap", default_candidate_cap() as i64)?
            .set_default("auto_template_id", DEFAULT_AUTO_TEMPLATE_ID)?
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("GLYPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: RouterConfig = built.try_deserialize()?;
        Ok(config.sanitized())
    }

    /// Clamp values into their valid ranges.
    pub fn sanitized(mut self) -> Self {
        self.suffix_min_matches = self.suffix_min_matches.max(1);
        self.candidate_cap = self.candidate_cap.clamp(1, MAX_CANDIDATES);
        if self.auto_template_id.trim().is_empty() {
            self.auto_template_id = default_auto_template_id();
        }
        self
    }
}
