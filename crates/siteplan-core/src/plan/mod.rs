//! Plan synthesis: generation, shape validation, graph repair, scheduling.

pub mod generate;
pub mod graph;
pub mod raw;
pub mod synthesize;

pub use generate::{
    FALLBACK_TASK_ID, GENERATION_TEMPERATURE, GeneratedGraph, TaskGraphGenerator, build_prompt,
    fallback_tasks, parse_task_array, strip_code_fence,
};
pub use graph::{DependencyNode, Schedule, compute_schedule, repair_graph, topological_order};
pub use raw::{RawTask, TaskShapeError};
pub use synthesize::{MAX_REFERENCE_SNIPPETS, PlanSynthesizer};
