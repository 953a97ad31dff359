//! Agent profiles — the per-deployment knobs of the orchestration loop.
//!
//! Two presets exist: `primary` (full data, higher iteration ceiling) and
//! `masked` (PHI masking, privacy notice, lower ceiling). Everything a
//! request needs from its deployment comes from the profile.

use serde::{Deserialize, Serialize};

const PRIMARY_PROMPT: &str = include_str!("../prompts/primary.md");
const MASKED_PROMPT: &str = include_str!("../prompts/masked.md");
const DEMO_SUFFIX: &str = include_str!("../prompts/demo_suffix.md");

/// Which preset a deployment runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    #[default]
    Primary,
    Masked,
}

impl std::str::FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "masked" => Ok(Self::Masked),
            other => Err(format!("unknown profile '{other}' (expected primary or masked)")),
        }
    }
}

/// Whether the model may fall back to synthetic sample data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataMode {
    /// Live data only; the model must call a function for every answer
    #[default]
    Real,
    /// Stakeholder demos; empty results may be padded with sample data
    Demo,
}

impl std::str::FromStr for DataMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(Self::Real),
            "demo" => Ok(Self::Demo),
            other => Err(format!("unknown data mode '{other}' (expected real or demo)")),
        }
    }
}

/// When and how the conversation is cut down before a model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPolicy {
    /// Truncate only when the history is strictly longer than this
    pub threshold: usize,
    /// Number of trailing messages kept after truncation
    pub window: usize,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            threshold: 7,
            window: 6,
        }
    }
}

/// The full behavior profile of one agent deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub kind: ProfileKind,

    /// Instructions prepended to every request
    pub system_prompt: String,

    /// Iteration ceiling of the orchestration loop
    pub max_iterations: u32,

    pub history: HistoryPolicy,

    /// Mask PHI fields in function results before the model sees them
    pub phi_masking: bool,

    /// Append the privacy notice to the final output
    pub privacy_notice: bool,
}

impl AgentProfile {
    /// Full-data profile: ceiling 10, no masking.
    pub fn primary(data_mode: DataMode) -> Self {
        let mut system_prompt = PRIMARY_PROMPT.trim_end().to_string();
        if data_mode == DataMode::Demo {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(DEMO_SUFFIX.trim_end());
        }
        Self {
            kind: ProfileKind::Primary,
            system_prompt,
            max_iterations: 10,
            history: HistoryPolicy::default(),
            phi_masking: false,
            privacy_notice: false,
        }
    }

    /// Masked profile: ceiling 5, PHI masking and the privacy notice on.
    pub fn masked() -> Self {
        Self {
            kind: ProfileKind::Masked,
            system_prompt: MASKED_PROMPT.trim_end().to_string(),
            max_iterations: 5,
            history: HistoryPolicy::default(),
            phi_masking: true,
            privacy_notice: true,
        }
    }

    pub fn for_kind(kind: ProfileKind, data_mode: DataMode) -> Self {
        match kind {
            ProfileKind::Primary => Self::primary(data_mode),
            ProfileKind::Masked => Self::masked(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self::primary(DataMode::Real)
    }
}
