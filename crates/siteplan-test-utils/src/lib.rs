//! Shared test utilities for siteplan integration tests.
//!
//! Provides a scripted [`TextGenerator`] that replays canned responses and
//! records every prompt it receives, plus builders for generator output.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use siteplan_core::llm::TextGenerator;

/// One recorded call to [`ScriptedGenerator::complete`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub prompt: String,
    pub temperature: f32,
}

/// A [`TextGenerator`] that returns queued responses in order.
///
/// Once the queue is drained it keeps returning the last response (or the
/// empty string if it never had one).
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    /// A generator that always answers `response`.
    pub fn always(response: impl Into<String>) -> Arc<Self> {
        Self::sequence([response.into()])
    }

    /// A generator that answers each response once, in order.
    pub fn sequence<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            ..Self::default()
        })
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The most recent prompt, if any call was made.
    pub fn last_prompt(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|c| c.prompt.clone())
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, prompt: &str, temperature: f32) -> String {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            temperature,
        });
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            *last = next;
        }
        last.clone()
    }
}

// ---------------------------------------------------------------------------
// Response builders
// ---------------------------------------------------------------------------

/// A generator task object.
pub fn task_json(id: &str, description: &str, phase: &str, deps: &[&str]) -> Value {
    json!({
        "id": id,
        "description": description,
        "phase": phase,
        "dependencies": deps
    })
}

/// Serialize task objects as a generator answer.
pub fn response_of(tasks: &[Value]) -> String {
    Value::Array(tasks.to_vec()).to_string()
}

/// Wrap `body` in a fenced code block with the given language tag.
pub fn fenced(lang: &str, body: &str) -> String {
    format!("```{lang}\n{body}\n```")
}

/// The warehouse-extension scope used across tests: site prep, concrete
/// foundation, steel, siding, HVAC and finishes, with realistic ordering.
pub fn warehouse_response() -> String {
    response_of(&[
        task_json("T-001", "Site preparation and clearing", "Site Prep", &[]),
        task_json(
            "T-002",
            "Pour 200 cubic yards of concrete foundation",
            "Foundation",
            &["T-001"],
        ),
        task_json(
            "T-003",
            "Install 50 tons of structural steel",
            "Framing",
            &["T-002"],
        ),
        task_json(
            "T-004",
            "Install 4000 sf of metal siding",
            "Enclosure",
            &["T-003"],
        ),
        task_json("T-005", "Install HVAC systems", "MEP", &["T-003"]),
        task_json(
            "T-006",
            "Paint 5000 sf of interior finishes",
            "Finishes",
            &["T-004", "T-005"],
        ),
    ])
}
