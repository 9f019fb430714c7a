//! Construction execution-plan synthesis.
//!
//! Turns a sparse project description into an ordered, costed task graph
//! with risks, total cost, total duration and critical path.
//!
//! # Modules
//!
//! - [`model`] - tasks, risks and the assembled plan
//! - [`rates`] - keyword rate table
//! - [`estimate`] - cost and duration enrichment
//! - [`plan`] - task graph generation, repair, scheduling and synthesis
//! - [`risk`] - plan-level risk assessment
//! - [`llm`] - generative-text collaborator and its OpenAI client
//! - [`index`] - in-memory document index
//! - [`extract`] - PDF text extraction

pub mod estimate;
pub mod extract;
pub mod index;
pub mod llm;
pub mod model;
pub mod plan;
pub mod rates;
pub mod risk;

pub use estimate::Estimator;
pub use index::{DocumentId, DocumentIndex, SearchHit};
pub use llm::{ERROR_SENTINEL, OpenAiConfig, OpenAiGenerator, TextGenerator};
pub use model::{
    MaterialLine, Phase, Probability, ProjectContext, ProjectPlan, RiskFactor, Task, TaskDraft,
};
pub use plan::PlanSynthesizer;
pub use rates::{RateEntry, RateModel, RateModelError};
