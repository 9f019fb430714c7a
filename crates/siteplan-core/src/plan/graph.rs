//! Dependency graph repair and critical-path computation.
//!
//! Generator output is untrusted, so defects are repaired rather than
//! rejected:
//! - Repeated task ids: the first occurrence wins.
//! - Self-references and references to unknown ids are dropped.
//! - An edge that would close a cycle is dropped. Edges are considered in
//!   generation order, so the edge dropped is the last one of the cycle.
//!
//! The repaired graph is a DAG. The schedule is then computed with Kahn's
//! algorithm and earliest-finish propagation.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::warn;

use crate::model::{Task, TaskDraft};

/// Anything with an id and a list of dependency ids.
pub trait DependencyNode {
    fn node_id(&self) -> &str;
    fn node_dependencies(&self) -> &[String];
}

impl DependencyNode for TaskDraft {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl DependencyNode for Task {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

/// Repair the dependency graph formed by `drafts`.
///
/// Returns the surviving drafts in their original order plus one warning
/// per repair. Every repair is also logged.
pub fn repair_graph(drafts: Vec<TaskDraft>) -> (Vec<TaskDraft>, Vec<String>) {
    let mut warnings = Vec::new();

    // Unique ids, first occurrence wins.
    let mut seen = HashSet::new();
    let mut tasks: Vec<TaskDraft> = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if seen.insert(draft.id.clone()) {
            tasks.push(draft);
        } else {
            warn!(task_id = %draft.id, "dropping task with duplicate id");
            warnings.push(format!("dropped task with duplicate id {:?}", draft.id));
        }
    }

    let id_to_idx: HashMap<String, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.clone(), i))
        .collect();

    // dependents[d] lists the tasks that depend on d (accepted edges only).
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; tasks.len()];

    for task_idx in 0..tasks.len() {
        let declared = std::mem::take(&mut tasks[task_idx].dependencies);
        let mut kept = Vec::with_capacity(declared.len());

        for dep in declared {
            let task_id = &tasks[task_idx].id;
            let Some(&dep_idx) = id_to_idx.get(&dep) else {
                warn!(task_id = %task_id, dependency = %dep, "dropping dangling dependency");
                warnings.push(format!(
                    "task {task_id:?} depends on unknown task {dep:?}; dependency dropped"
                ));
                continue;
            };
            if dep_idx == task_idx {
                warn!(task_id = %task_id, "dropping self-dependency");
                warnings.push(format!("task {task_id:?} depends on itself; dependency dropped"));
                continue;
            }
            // Edge dep -> task closes a cycle iff task already reaches dep.
            if reaches(&dependents, task_idx, dep_idx) {
                warn!(task_id = %task_id, dependency = %dep, "dropping dependency that closes a cycle");
                warnings.push(format!(
                    "dependency {task_id:?} -> {dep:?} closes a cycle; dependency dropped"
                ));
                continue;
            }
            dependents[dep_idx].push(task_idx);
            kept.push(dep);
        }

        tasks[task_idx].dependencies = kept;
    }

    (tasks, warnings)
}

/// Depth-first search along accepted edges from `from` looking for `to`.
fn reaches(dependents: &[Vec<usize>], from: usize, to: usize) -> bool {
    let mut visited = vec![false; dependents.len()];
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if std::mem::replace(&mut visited[node], true) {
            continue;
        }
        stack.extend(dependents[node].iter().copied().filter(|&n| !visited[n]));
    }
    false
}

// ---------------------------------------------------------------------------
// Topological order
// ---------------------------------------------------------------------------

/// Topologically order `nodes` with Kahn's algorithm.
///
/// Ties between ready nodes go to the earlier node in `nodes`. References to
/// unknown ids are ignored. Returns `None` if the graph has a cycle.
pub fn topological_order<N: DependencyNode>(nodes: &[N]) -> Option<Vec<usize>> {
    let id_to_idx: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.node_id(), i))
        .collect();

    let n = nodes.len();
    let mut in_degree = vec![0usize; n];
    let mut adj: Vec<Vec<usize>> = vec![vec![]; n];

    for (node_idx, node) in nodes.iter().enumerate() {
        for dep in node.node_dependencies() {
            if let Some(&dep_idx) = id_to_idx.get(dep.as_str()) {
                // Edge: dep -> node (dep must complete before node).
                adj[dep_idx].push(node_idx);
                in_degree[node_idx] += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, deg)| **deg == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &next in &adj[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    (order.len() == n).then_some(order)
}

// ---------------------------------------------------------------------------
// Critical path
// ---------------------------------------------------------------------------

/// Schedule-wide metrics derived from an enriched task graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    /// Largest earliest-finish day across all tasks.
    pub total_duration_days: u32,
    /// Task ids on the longest dependency chain, first to last.
    pub critical_path: Vec<String>,
}

/// Compute earliest finishes and the critical path of a repaired graph.
///
/// `tasks` must form a DAG (see [`repair_graph`]). Should a cycle slip
/// through, the schedule is computed over the tasks outside it.
pub fn compute_schedule(tasks: &[Task]) -> Schedule {
    if tasks.is_empty() {
        return Schedule::default();
    }

    let order = topological_order(tasks).unwrap_or_else(|| {
        warn!("dependency cycle reached schedule computation; scheduling acyclic part only");
        acyclic_prefix(tasks)
    });

    let id_to_idx: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    // earliest_finish[i] = max(earliest_finish of deps, 0) + duration.
    let mut earliest_finish: Vec<Option<u64>> = vec![None; tasks.len()];
    // Best predecessor on the longest chain ending at i.
    let mut via: Vec<Option<usize>> = vec![None; tasks.len()];

    for &i in &order {
        let mut start = 0u64;
        for dep in &tasks[i].dependencies {
            let Some(&d) = id_to_idx.get(dep.as_str()) else {
                continue;
            };
            let Some(finish) = earliest_finish[d] else {
                continue;
            };
            // Strictly greater keeps the earliest-generated predecessor on ties.
            let better = match via[i] {
                None => true,
                Some(current) => finish > start || (finish == start && d < current),
            };
            if better {
                start = finish;
                via[i] = Some(d);
            }
        }
        earliest_finish[i] = Some(start + u64::from(tasks[i].duration_days));
    }

    // Last task of the critical path: largest finish, earliest index on ties.
    let Some((end, finish)) = earliest_finish
        .iter()
        .enumerate()
        .filter_map(|(i, f)| f.map(|f| (i, f)))
        .fold(None, |best: Option<(usize, u64)>, (i, f)| match best {
            Some((_, bf)) if bf >= f => best,
            _ => Some((i, f)),
        })
    else {
        return Schedule::default();
    };

    let mut path = vec![tasks[end].id.clone()];
    let mut cursor = end;
    while let Some(prev) = via[cursor] {
        path.push(tasks[prev].id.clone());
        cursor = prev;
    }
    path.reverse();

    Schedule {
        total_duration_days: u32::try_from(finish).unwrap_or(u32::MAX),
        critical_path: path,
    }
}

/// Kahn's order over whatever part of a cyclic graph can be ordered.
fn acyclic_prefix(tasks: &[Task]) -> Vec<usize> {
    let (repaired, _) = repair_graph(
        tasks
            .iter()
            .map(|t| TaskDraft {
                id: t.id.clone(),
                description: String::new(),
                phase: String::new(),
                dependencies: t.dependencies.clone(),
            })
            .collect(),
    );
    topological_order(&repaired).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
