//! Cost and duration enrichment driven by the rate model.
//!
//! Enrichment is a total function: every description, including the empty
//! string, yields a task with `duration_days >= 1` and
//! `total_cost == labor_cost + material_cost`.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{MaterialLine, Task, TaskDraft};
use crate::rates::RateModel;

/// Quantity assumed when a description names none.
pub const DEFAULT_QUANTITY: f64 = 10.0;

/// Largest quantity a description can claim. Longer digit runs clamp here so
/// that quantity times [`crate::rates::MAX_RATE_VALUE`] stays finite.
pub const MAX_QUANTITY: f64 = 1e12;

static QUANTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("quantity pattern is valid"));

/// Extract the first run of ASCII digits as a quantity, clamped to
/// [`MAX_QUANTITY`].
pub fn extract_quantity(description_lower: &str) -> f64 {
    QUANTITY_RE
        .find(description_lower)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|q| if q.is_finite() { q.min(MAX_QUANTITY) } else { MAX_QUANTITY })
        .unwrap_or(DEFAULT_QUANTITY)
}

/// Prices task drafts against a [`RateModel`].
#[derive(Debug, Clone, Default)]
pub struct Estimator {
    rates: RateModel,
}

impl Estimator {
    pub fn new(rates: RateModel) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &RateModel {
        &self.rates
    }

    /// Fill in duration, costs and the material line for a draft.
    pub fn enrich(&self, draft: TaskDraft) -> Task {
        let desc = draft.description.to_lowercase();
        let quantity = extract_quantity(&desc);
        let entry = self.rates.classify(&desc);

        // Saturating float-to-int cast; huge quantities clamp to u32::MAX.
        let duration_days = ((quantity / entry.daily_output).floor() as u32).max(1);
        let material_cost = quantity * entry.unit_cost;
        let labor_cost = f64::from(duration_days) * self.rates.daily_labor_rate;

        Task {
            id: draft.id,
            description: draft.description,
            phase: draft.phase,
            duration_days,
            labor_cost,
            material_cost,
            total_cost: material_cost + labor_cost,
            dependencies: draft.dependencies,
            materials: vec![MaterialLine {
                name: entry.key.clone(),
                quantity,
                unit: entry.unit.clone(),
                unit_cost: entry.unit_cost,
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft(description: &str) -> TaskDraft {
        TaskDraft {
            id: "T-001".to_string(),
            description: description.to_string(),
            phase: "Foundation".to_string(),
            dependencies: vec![],
        }
    }

    #[test]
    fn concrete_foundation_example() {
        let task = Estimator::default().enrich(draft("Pour 200 cubic yards of concrete foundation"));
        assert_eq!(task.duration_days, 4);
        assert_eq!(task.material_cost, 30000.0);
        assert_eq!(task.labor_cost, 2000.0);
        assert_eq!(task.total_cost, 32000.0);
        assert_eq!(
            task.materials,
            vec![MaterialLine {
                name: "concrete".to_string(),
                quantity: 200.0,
                unit: "cy".to_string(),
                unit_cost: 150.0,
            }]
        );
    }

    #[test]
    fn steel_example() {
        let task = Estimator::default().enrich(draft("Install 50 tons of structural steel"));
        assert_eq!(task.duration_days, 10);
        assert_eq!(task.material_cost, 150000.0);
        assert_eq!(task.labor_cost, 5000.0);
    }

    #[test]
    fn missing_quantity_defaults_to_ten() {
        let task = Estimator::default().enrich(draft("Clear and grade site"));
        assert_eq!(task.materials[0].name, "default");
        assert_eq!(task.materials[0].quantity, 10.0);
        // 10 units at 1 per day.
        assert_eq!(task.duration_days, 10);
        assert_eq!(task.material_cost, 1000.0);
    }

    #[test]
    fn small_quantity_still_takes_a_day() {
        let task = Estimator::default().enrich(draft("Paint 5 sf of interior finish"));
        assert_eq!(task.duration_days, 1);
        assert_eq!(task.labor_cost, 500.0);
    }

    #[test]
    fn first_digit_run_wins() {
        assert_eq!(extract_quantity("phase 2 of 300 cy"), 2.0);
        assert_eq!(extract_quantity("no numbers"), DEFAULT_QUANTITY);
        assert_eq!(extract_quantity("1,500 lf"), 1.0);
    }

    #[test]
    fn empty_description_is_enriched() {
        let task = Estimator::default().enrich(draft(""));
        assert!(task.duration_days >= 1);
        assert_eq!(task.materials.len(), 1);
    }

    #[test]
    fn huge_quantity_saturates_duration() {
        let task = Estimator::default().enrich(draft("99999999999999999999999 units"));
        assert_eq!(task.duration_days, u32::MAX);
        assert_eq!(task.total_cost, task.labor_cost + task.material_cost);
    }

    #[test]
    fn long_digit_runs_clamp_to_max_quantity() {
        assert_eq!(extract_quantity("1000000000000 cy"), MAX_QUANTITY);
        assert_eq!(extract_quantity("5000000000000 cy"), MAX_QUANTITY);
        assert_eq!(extract_quantity(&"9".repeat(400)), MAX_QUANTITY);
        assert_eq!(extract_quantity("999999999999 cy"), 999_999_999_999.0);
    }

    #[test]
    fn overflowing_digit_run_keeps_costs_finite() {
        let description = format!("Pour {} cy of concrete", "9".repeat(400));
        let task = Estimator::default().enrich(draft(&description));
        assert_eq!(task.materials[0].quantity, MAX_QUANTITY);
        assert!(task.material_cost.is_finite());
        assert!(task.labor_cost.is_finite());
        assert!(task.total_cost.is_finite());
        assert_eq!(task.total_cost, task.labor_cost + task.material_cost);

        let json = serde_json::to_value(&task).unwrap();
        assert!(json["total_cost"].is_number());
        assert!(json["materials"][0]["quantity"].is_number());
    }

    #[test]
    fn free_material_with_huge_quantity_is_not_nan() {
        let toml = "daily_labor_rate = 500.0\nrates = []\n\n\
                    [fallback]\nkey = \"donated\"\nunit_cost = 0.0\ndaily_output = 1.0\nunit = \"ls\"\n";
        let rates = RateModel::parse(toml).unwrap();
        let description = format!("Haul {} loads", "9".repeat(400));
        let task = Estimator::new(rates).enrich(draft(&description));
        assert_eq!(task.material_cost, 0.0);
        assert!(task.total_cost.is_finite());
    }

    #[test]
    fn enrichment_keeps_identity_fields() {
        let d = TaskDraft {
            id: "T-009".to_string(),
            description: "Frame 1000 lf of walls with framing lumber".to_string(),
            phase: "Framing".to_string(),
            dependencies: vec!["T-002".to_string()],
        };
        let task = Estimator::default().enrich(d);
        assert_eq!(task.id, "T-009");
        assert_eq!(task.phase, "Framing");
        assert_eq!(task.dependencies, vec!["T-002"]);
        assert_eq!(task.duration_days, 2);
    }

    proptest! {
        #[test]
        fn enrichment_invariants_hold(description in ".{0,80}") {
            let estimator = Estimator::default();
            let a = estimator.enrich(draft(&description));
            let b = estimator.enrich(draft(&description));
            prop_assert!(a.duration_days >= 1);
            prop_assert_eq!(a.total_cost, a.labor_cost + a.material_cost);
            prop_assert!(a.labor_cost >= 0.0 && a.material_cost >= 0.0);
            prop_assert_eq!(a, b);
        }
    }
}
