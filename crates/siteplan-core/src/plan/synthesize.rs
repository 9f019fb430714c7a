//! End-to-end plan synthesis.
//!
//! Pipeline: generate raw tasks -> validate shape (skip malformed) ->
//! repair the dependency graph -> enrich -> assess risks -> compute the
//! schedule -> assemble. Only generation suspends; the rest is a pure
//! function of the generated tasks, exposed as [`PlanSynthesizer::assemble`].
//!
//! Graph repair runs on drafts, before enrichment, so a [`Task`] is never
//! modified after the estimator builds it. Repair only looks at ids and
//! dependencies, so the result is the same as repairing afterwards.

use std::sync::Arc;

use tracing::{info, warn};

use crate::estimate::Estimator;
use crate::index::{DocumentIndex, SearchHit};
use crate::llm::TextGenerator;
use crate::model::{ProjectContext, ProjectPlan, Task, TaskDraft};
use crate::plan::generate::{GeneratedGraph, TaskGraphGenerator};
use crate::plan::graph::{compute_schedule, repair_graph};
use crate::plan::raw::RawTask;
use crate::risk::assess_risks;

/// Maximum reference snippets pulled from the document index per plan.
pub const MAX_REFERENCE_SNIPPETS: usize = 3;

/// Drives the planning pipeline for one request at a time.
///
/// Holds no per-request state; one instance can serve concurrent calls.
pub struct PlanSynthesizer {
    generator: TaskGraphGenerator,
    estimator: Estimator,
    index: Option<Arc<DocumentIndex>>,
}

impl PlanSynthesizer {
    pub fn new(llm: Arc<dyn TextGenerator>, estimator: Estimator) -> Self {
        Self {
            generator: TaskGraphGenerator::new(llm),
            estimator,
            index: None,
        }
    }

    /// Ground generator prompts in snippets from `index`.
    pub fn with_index(mut self, index: Arc<DocumentIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Produce a plan for `ctx`. Never fails.
    pub async fn synthesize(&self, ctx: &ProjectContext) -> ProjectPlan {
        let references = self.reference_snippets(ctx);
        let GeneratedGraph {
            tasks,
            used_fallback,
        } = self.generator.generate(ctx, &references).await;

        let mut plan = self.assemble(ctx, tasks);
        if used_fallback {
            plan.warnings.insert(
                0,
                "generator output was unusable; returned fallback task".to_string(),
            );
        }

        info!(
            project_id = %plan.project_id,
            tasks = plan.tasks.len(),
            total_cost = plan.total_estimated_cost,
            total_days = plan.total_duration_days,
            warnings = plan.warnings.len(),
            "plan synthesized"
        );
        plan
    }

    /// Turn raw generator output into a finished plan.
    pub fn assemble(&self, ctx: &ProjectContext, raw: Vec<RawTask>) -> ProjectPlan {
        let mut warnings = Vec::new();

        let drafts: Vec<TaskDraft> = raw
            .into_iter()
            .filter_map(|raw| {
                let hint = raw.id_hint();
                match raw.into_draft() {
                    Ok(draft) => Some(draft),
                    Err(e) => {
                        warn!(task_id = %hint, error = %e, "skipping malformed task");
                        warnings.push(format!("skipped malformed task {hint}: {e}"));
                        None
                    }
                }
            })
            .collect();

        let (drafts, repairs) = repair_graph(drafts);
        warnings.extend(repairs);

        let tasks: Vec<Task> = drafts
            .into_iter()
            .map(|d| self.estimator.enrich(d))
            .collect();

        let risks = assess_risks(ctx, &tasks);
        let schedule = compute_schedule(&tasks);

        ProjectPlan::new(ctx.project_id.clone(), tasks, risks, schedule, warnings)
    }

    /// Distinct snippets matching the location or any rate keyword, each
    /// prefixed with the name of the document it came from.
    fn reference_snippets(&self, ctx: &ProjectContext) -> Vec<String> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        if index.is_empty() {
            return Vec::new();
        }

        let queries = std::iter::once(ctx.location.as_str())
            .chain(self.estimator.rates().keys())
            .filter(|q| !q.trim().is_empty());

        let mut hits: Vec<SearchHit> = Vec::new();
        'queries: for query in queries {
            for hit in index.search_hits(query, MAX_REFERENCE_SNIPPETS) {
                if !hits.iter().any(|h| h.snippet == hit.snippet) {
                    hits.push(hit);
                }
                if hits.len() == MAX_REFERENCE_SNIPPETS {
                    break 'queries;
                }
            }
        }
        hits.into_iter()
            .map(|hit| format!("[{}]\n{}", hit.name, hit.snippet))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
