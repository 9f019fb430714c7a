//! Task graph generation: prompt construction and response repair.
//!
//! Asks the generative-text source for a JSON array of tasks and decodes the
//! answer into [`RawTask`]s. Unusable answers degrade to a single fallback
//! task instead of an error. Dependency references are not checked here;
//! the synthesizer repairs the graph once it sees every surviving task.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::TextGenerator;
use crate::model::{Phase, ProjectContext};
use crate::plan::raw::RawTask;

/// Sampling temperature for graph generation. Low to favour stable structure.
pub const GENERATION_TEMPERATURE: f32 = 0.1;

/// Id of the task returned when generator output is unusable.
pub const FALLBACK_TASK_ID: &str = "T-001";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Outcome of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedGraph {
    pub tasks: Vec<RawTask>,
    /// True when `tasks` is the fallback list rather than parsed output.
    pub used_fallback: bool,
}

/// Produces candidate task lists from a project description.
pub struct TaskGraphGenerator {
    llm: Arc<dyn TextGenerator>,
}

impl TaskGraphGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Generate raw tasks for `ctx`, optionally grounding the prompt in
    /// reference snippets from ingested documents.
    pub async fn generate(&self, ctx: &ProjectContext, references: &[String]) -> GeneratedGraph {
        let prompt = build_prompt(ctx, references);
        let response = self.llm.complete(&prompt, GENERATION_TEMPERATURE).await;
        debug!(
            project_id = %ctx.project_id,
            response_len = response.len(),
            "generate: received response"
        );

        match parse_task_array(&response) {
            Some(tasks) => GeneratedGraph {
                tasks,
                used_fallback: false,
            },
            None => {
                warn!(
                    project_id = %ctx.project_id,
                    "generator output unusable, falling back to single review task"
                );
                GeneratedGraph {
                    tasks: fallback_tasks(),
                    used_fallback: true,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

/// Output contract included in every prompt.
const OUTPUT_FORMAT: &str = r#"Generate a JSON list of construction tasks. Each task should have:
- id (e.g., "T-001")
- description (what work is done, including quantities and units where known)
- phase (one of the phases listed above)
- dependencies (list of task IDs that must complete first)

Output ONLY valid JSON, no other text.

Example format:
[
  {"id": "T-001", "description": "Clear and grade site", "phase": "Site Prep", "dependencies": []},
  {"id": "T-002", "description": "Pour 200 cubic yards of foundation concrete", "phase": "Foundation", "dependencies": ["T-001"]}
]
"#;

/// Build the natural-language instruction for the generator.
pub fn build_prompt(ctx: &ProjectContext, references: &[String]) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(
        "You are a construction project manager. \
         Create a realistic construction schedule for:\n",
    );
    prompt.push_str(&format!("- Project ID: {}\n", ctx.project_id));
    prompt.push_str(&format!("- Location: {}\n", ctx.location));
    prompt.push_str(&format!("- Notes: {}\n\n", ctx.notes));

    let phases: Vec<String> = Phase::ALL.iter().map(ToString::to_string).collect();
    prompt.push_str(&format!("Allowed phases: {}\n\n", phases.join(", ")));

    if !references.is_empty() {
        prompt.push_str("## Reference Documents\n\n");
        prompt.push_str("Excerpts from the project specification. Use the quantities they give.\n\n");
        for snippet in references {
            prompt.push_str("---\n");
            prompt.push_str(snippet);
            prompt.push('\n');
        }
        prompt.push_str("---\n\n");
    }

    prompt.push_str(OUTPUT_FORMAT);
    prompt
}

// ---------------------------------------------------------------------------
// Response repair
// ---------------------------------------------------------------------------

/// Strip a surrounding fenced code block and its language tag, if present.
///
/// Text without a leading fence is returned trimmed and otherwise untouched.
/// A missing closing fence is tolerated.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Language tag: the word after the opening fence, spaces allowed between.
    let rest = rest.trim_start_matches([' ', '\t']);
    let tag_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
        .unwrap_or(rest.len());
    let body = &rest[tag_len..];

    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim()
}

/// Decode repaired generator output into raw tasks.
///
/// Returns `None` when the text is not JSON or not a JSON array.
pub fn parse_task_array(response: &str) -> Option<Vec<RawTask>> {
    let body = strip_code_fence(response);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => Some(items.into_iter().map(RawTask).collect()),
        Ok(other) => {
            debug!(kind = json_kind(&other), "parse_task_array: not an array");
            None
        }
        Err(e) => {
            debug!(error = %e, "parse_task_array: invalid JSON");
            None
        }
    }
}

/// The single-task list used when generation fails.
pub fn fallback_tasks() -> Vec<RawTask> {
    vec![RawTask(serde_json::json!({
        "id": FALLBACK_TASK_ID,
        "description": "Review project requirements",
        "phase": "General",
        "dependencies": []
    }))]
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
