//! TOML configuration: tuning tables plus the roster.
//!
//! Every tuning field is optional and defaults to the built-in values,
//! so a config can be as small as its `[[occupant]]` entries. The
//! roster itself is mandatory: monitoring a box with no known tags
//! would drop every reading as unknown.

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

use nestbox_core::{
    EngineConfig, MultiPolicy, Occupant, Roster, TagId, ValidatorConfig,
};
use nestbox_reader::capture::READ_WINDOW_MS;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NestboxConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub validator: ValidatorSection,
    #[serde(default)]
    pub multi: MultiSection,
    #[serde(default)]
    pub reader: ReaderSection,
    #[serde(default, rename = "occupant")]
    pub occupants: Vec<OccupantEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub presence_check_period_ms: u64,
    pub confirmation_window_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        let d = EngineConfig::default();
        Self {
            presence_check_period_ms: d.presence_check_period_ms,
            confirmation_window_ms: d.confirmation_window_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidatorSection {
    pub repeat_window_ms: u64,
    pub accept_threshold: u32,
}

impl Default for ValidatorSection {
    fn default() -> Self {
        let d = ValidatorConfig::default();
        Self {
            repeat_window_ms: d.repeat_window_ms,
            accept_threshold: d.accept_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MultiSection {
    pub quick_change_max_secs: u64,
    pub quick_change_streak: u32,
    pub distinct_tag_threshold: usize,
    pub single_readings_threshold: u32,
    pub evidence_timeout_ms: u64,
}

impl Default for MultiSection {
    fn default() -> Self {
        let d = MultiPolicy::default();
        Self {
            quick_change_max_secs: d.quick_change_max_secs,
            quick_change_streak: d.quick_change_streak,
            distinct_tag_threshold: d.distinct_tag_threshold,
            single_readings_threshold: d.single_readings_threshold,
            evidence_timeout_ms: d.evidence_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    pub read_window_ms: u64,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self { read_window_ms: READ_WINDOW_MS }
    }
}

/// One roster line as written in the config. Tags are normalized
/// (uppercased) while building the [`Roster`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OccupantEntry {
    pub tag: String,
    pub name: String,
    pub number: u8,
}

impl NestboxConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            presence_check_period_ms: self.engine.presence_check_period_ms,
            confirmation_window_ms: self.engine.confirmation_window_ms,
            multi: MultiPolicy {
                quick_change_max_secs: self.multi.quick_change_max_secs,
                quick_change_streak: self.multi.quick_change_streak,
                distinct_tag_threshold: self.multi.distinct_tag_threshold,
                single_readings_threshold: self.multi.single_readings_threshold,
                evidence_timeout_ms: self.multi.evidence_timeout_ms,
            },
        }
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            repeat_window_ms: self.validator.repeat_window_ms,
            accept_threshold: self.validator.accept_threshold,
        }
    }

    pub fn read_window(&self) -> Duration {
        Duration::from_millis(self.reader.read_window_ms)
    }

    /// Build the validated roster from the `[[occupant]]` entries.
    pub fn roster(&self) -> anyhow::Result<Roster> {
        let mut occupants = Vec::with_capacity(self.occupants.len());
        for entry in &self.occupants {
            let tag: TagId = entry
                .tag
                .parse()
                .with_context(|| format!("occupant {:?} has a bad tag", entry.name))?;
            occupants.push(Occupant {
                tag,
                name: entry.name.clone(),
                number: entry.number,
            });
        }
        Roster::new(occupants).context("invalid roster")
    }
}

// ─── Tests ────────────────────────────────────────────────────────
