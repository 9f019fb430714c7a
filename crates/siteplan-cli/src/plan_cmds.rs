//! CLI handler for `siteplan plan`.
//!
//! Runs one synthesis against the configured generator, optionally grounding
//! it in a PDF specification first, and emits the plan as pretty JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use siteplan_core::extract::extract_text;
use siteplan_core::llm::TextGenerator;
use siteplan_core::{
    DocumentIndex, Estimator, OpenAiGenerator, PlanSynthesizer, ProjectContext, ProjectPlan,
    RateModel,
};

use crate::config::SiteplanConfig;

/// Arguments of `siteplan plan`.
#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub project_id: String,
    pub location: String,
    pub notes: String,
    /// PDF specification to ingest before planning.
    pub spec: Option<PathBuf>,
    /// Write the plan here instead of stdout.
    pub output: Option<PathBuf>,
}

impl PlanArgs {
    fn context(&self) -> ProjectContext {
        ProjectContext {
            project_id: self.project_id.clone(),
            location: self.location.clone(),
            notes: self.notes.clone(),
        }
    }
}

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_plan(config: &SiteplanConfig, args: PlanArgs) -> Result<()> {
    let llm = Arc::new(OpenAiGenerator::new(config.llm.clone()));
    tracing::info!(model = %llm.model(), project_id = %args.project_id, "planning");

    let plan = synthesize_plan(llm, config.rates.clone(), &args).await?;
    let json = render_plan(&plan)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write plan to {}", path.display()))?;
            print_summary(&plan, path);
        }
        None => println!("{json}"),
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Steps
// -----------------------------------------------------------------------

/// Build a synthesizer around `llm`, ingest the spec PDF if given, and plan.
pub async fn synthesize_plan(
    llm: Arc<dyn TextGenerator>,
    rates: RateModel,
    args: &PlanArgs,
) -> Result<ProjectPlan> {
    let mut synthesizer = PlanSynthesizer::new(llm, Estimator::new(rates));

    if let Some(spec) = &args.spec {
        let index = Arc::new(DocumentIndex::new());
        ingest_pdf(&index, spec).await?;
        synthesizer = synthesizer.with_index(index);
    }

    Ok(synthesizer.synthesize(&args.context()).await)
}

/// Read a PDF from disk and add its text to `index`.
async fn ingest_pdf(index: &DocumentIndex, path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read spec file {}", path.display()))?;
    let text = tokio::task::spawn_blocking(move || extract_text(&bytes))
        .await
        .context("PDF extraction task failed")?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let characters = text.chars().count();
    let doc_id = index.add(name, text);
    tracing::info!(doc_id = %doc_id, path = %path.display(), characters, "spec ingested");
    Ok(())
}

fn render_plan(plan: &ProjectPlan) -> Result<String> {
    serde_json::to_string_pretty(plan).context("failed to serialize plan")
}

fn print_summary(plan: &ProjectPlan, path: &Path) {
    println!("Plan written to {}", path.display());
    println!();
    println!("  Project:       {}", plan.project_id);
    println!("  Tasks:         {}", plan.tasks.len());
    println!("  Total cost:    {:.2}", plan.total_estimated_cost);
    println!("  Duration:      {} days", plan.total_duration_days);
    println!("  Critical path: {}", plan.critical_path.join(" -> "));

    if !plan.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &plan.warnings {
            println!("  - {w}");
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
