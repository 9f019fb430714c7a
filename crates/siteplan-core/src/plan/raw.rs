//! Untrusted task records decoded from generator output.
//!
//! The generator only guarantees a JSON array; each element stays an opaque
//! [`serde_json::Value`] until [`RawTask::into_draft`] checks it field by
//! field. Elements that fail the check are dropped by the synthesizer.

use serde_json::Value;
use thiserror::Error;

use crate::model::TaskDraft;

/// Errors from validating a single raw task.
#[derive(Debug, Error, PartialEq)]
pub enum TaskShapeError {
    #[error("task is not a JSON object")]
    NotAnObject,

    #[error("missing required field {0:?}")]
    MissingField(&'static str),

    #[error("field {field:?} must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("task id must not be empty")]
    EmptyId,
}

/// One element of the generator's task array, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTask(pub Value);

impl RawTask {
    /// Best-effort id for log messages about a rejected task.
    pub fn id_hint(&self) -> String {
        match self.0.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "<missing>".to_string(),
        }
    }

    /// Validate the shape and convert into a [`TaskDraft`].
    ///
    /// `id`, `description` and `phase` are required strings. `dependencies`
    /// is optional (absent or `null` means none) but must otherwise be an
    /// array of strings. Repeated dependency ids collapse to the first
    /// mention; references to unknown ids are left for graph repair.
    pub fn into_draft(self) -> Result<TaskDraft, TaskShapeError> {
        let Value::Object(mut obj) = self.0 else {
            return Err(TaskShapeError::NotAnObject);
        };

        let id = take_string(&mut obj, "id")?;
        if id.trim().is_empty() {
            return Err(TaskShapeError::EmptyId);
        }
        let description = take_string(&mut obj, "description")?;
        let phase = take_string(&mut obj, "phase")?;

        let dependencies = match obj.remove("dependencies") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut deps: Vec<String> = Vec::with_capacity(items.len());
                for item in items {
                    let Value::String(dep) = item else {
                        return Err(TaskShapeError::WrongType {
                            field: "dependencies",
                            expected: "an array of strings",
                        });
                    };
                    if !deps.contains(&dep) {
                        deps.push(dep);
                    }
                }
                deps
            }
            Some(_) => {
                return Err(TaskShapeError::WrongType {
                    field: "dependencies",
                    expected: "an array of strings",
                });
            }
        };

        Ok(TaskDraft {
            id,
            description,
            phase,
            dependencies,
        })
    }
}

impl From<Value> for RawTask {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn take_string(
    obj: &mut serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, TaskShapeError> {
    match obj.remove(field) {
        Some(Value::String(s)) => Ok(s),
        None | Some(Value::Null) => Err(TaskShapeError::MissingField(field)),
        Some(_) => Err(TaskShapeError::WrongType {
            field,
            expected: "a string",
        }),
    }
}
