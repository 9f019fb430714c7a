//! Plan data model: tasks, material lines, risks, and the assembled plan.
//!
//! Tasks go through two stages. A [`TaskDraft`] is the validated minimal
//! form produced from generator output; the enrichment engine consumes it
//! and returns a [`Task`] with duration, costs and materials filled in.
//! Nothing mutates a `Task` after that.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Construction phase vocabulary used in generator prompts.
///
/// Tasks store their phase as free text so unknown phases (e.g. the
/// fallback task's "General") survive; this enum is used to classify them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    SitePrep,
    Foundation,
    Framing,
    Enclosure,
    Mep,
    Finishes,
}

impl Phase {
    /// All phases in construction order.
    pub const ALL: [Phase; 6] = [
        Self::SitePrep,
        Self::Foundation,
        Self::Framing,
        Self::Enclosure,
        Self::Mep,
        Self::Finishes,
    ];

    /// Whether work in this phase is exposed to the weather.
    pub fn is_outdoor(self) -> bool {
        matches!(
            self,
            Self::SitePrep | Self::Foundation | Self::Framing | Self::Enclosure
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SitePrep => "Site Prep",
            Self::Foundation => "Foundation",
            Self::Framing => "Framing",
            Self::Enclosure => "Enclosure",
            Self::Mep => "MEP",
            Self::Finishes => "Finishes",
        };
        f.write_str(s)
    }
}

impl FromStr for Phase {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "site prep" | "site preparation" => Ok(Self::SitePrep),
            "foundation" => Ok(Self::Foundation),
            "framing" => Ok(Self::Framing),
            "enclosure" => Ok(Self::Enclosure),
            "mep" => Ok(Self::Mep),
            "finishes" => Ok(Self::Finishes),
            _ => Err(PhaseParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an unknown [`Phase`] string.
#[derive(Debug, Clone)]
pub struct PhaseParseError(pub String);

impl fmt::Display for PhaseParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown phase: {:?}", self.0)
    }
}

impl std::error::Error for PhaseParseError {}

// ---------------------------------------------------------------------------

/// Likelihood attached to a [`RiskFactor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Probability {
    Low,
    Medium,
    High,
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One priced material quantity attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
}

/// A validated, not yet enriched task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub id: String,
    pub description: String,
    pub phase: String,
    /// Ids of tasks that must finish first. Unique, in order of first mention.
    pub dependencies: Vec<String>,
}

/// A fully enriched task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub phase: String,
    pub duration_days: u32,
    pub labor_cost: f64,
    pub material_cost: f64,
    /// Always `labor_cost + material_cost`.
    pub total_cost: f64,
    pub dependencies: Vec<String>,
    pub materials: Vec<MaterialLine>,
}

impl Task {
    /// The task's phase, if it belongs to the known vocabulary.
    pub fn phase_kind(&self) -> Option<Phase> {
        self.phase.parse().ok()
    }
}

/// A plan-level risk with its mitigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub risk_type: String,
    pub probability: Probability,
    pub mitigation_strategy: String,
}

/// Free-text description of a project to plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    #[serde(default = "unknown")]
    pub project_id: String,
    #[serde(default = "unknown")]
    pub location: String,
    #[serde(default)]
    pub notes: String,
}

impl Default for ProjectContext {
    fn default() -> Self {
        Self {
            project_id: unknown(),
            location: unknown(),
            notes: String::new(),
        }
    }
}

fn unknown() -> String {
    "Unknown".to_string()
}

/// The synthesized execution plan for one project.
///
/// Totals are derived from `tasks` by [`ProjectPlan::new`]; there is no way
/// to supply them independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPlan {
    pub project_id: String,
    pub tasks: Vec<Task>,
    pub risks: Vec<RiskFactor>,
    pub total_estimated_cost: f64,
    pub total_duration_days: u32,
    pub critical_path: Vec<String>,
    /// Repairs applied to untrusted generator output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ProjectPlan {
    /// Assemble a plan, summing task costs.
    ///
    /// `total_duration_days` and `critical_path` come from the schedule
    /// computation over the same tasks.
    pub fn new(
        project_id: impl Into<String>,
        tasks: Vec<Task>,
        risks: Vec<RiskFactor>,
        schedule: crate::plan::Schedule,
        warnings: Vec<String>,
    ) -> Self {
        let total_estimated_cost = tasks.iter().map(|t| t.total_cost).sum();
        Self {
            project_id: project_id.into(),
            tasks,
            risks,
            total_estimated_cost,
            total_duration_days: schedule.total_duration_days,
            critical_path: schedule.critical_path,
            warnings,
        }
    }
}
