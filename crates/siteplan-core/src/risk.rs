//! Plan-level risk assessment.
//!
//! Risks are derived from the project context and the enriched tasks. A
//! weather risk is always present; its probability rises when outdoor work
//! is planned and the context mentions adverse conditions.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Probability, ProjectContext, RiskFactor, Task};

/// Whole words about rain, snow, winter, storms or freezing, with their
/// common inflections. "drainage" or "stormwater" do not match.
static ADVERSE_WEATHER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:rain(?:s|y|ing|fall)?|snow(?:s|y|ing|fall)?|winters?|storms?|stormy|freez(?:e|es|ing))\b",
    )
    .expect("weather pattern is valid")
});

/// Assess the risks for a plan, in a fixed order.
pub fn assess_risks(ctx: &ProjectContext, tasks: &[Task]) -> Vec<RiskFactor> {
    let mut risks = vec![weather_risk(ctx, tasks)];

    if uses_material(tasks, "steel") {
        risks.push(RiskFactor {
            risk_type: "Material Lead Time".to_string(),
            probability: Probability::Medium,
            mitigation_strategy: "Place structural steel orders early and confirm delivery dates \
                                  before scheduling erection crews"
                .to_string(),
        });
    }

    if uses_material(tasks, "concrete") {
        risks.push(RiskFactor {
            risk_type: "Curing Time".to_string(),
            probability: Probability::Low,
            mitigation_strategy: "Allow curing time after concrete pours before loading \
                                  dependent work"
                .to_string(),
        });
    }

    risks
}

fn weather_risk(ctx: &ProjectContext, tasks: &[Task]) -> RiskFactor {
    let outdoor = tasks
        .iter()
        .any(|t| t.phase_kind().is_some_and(|p| p.is_outdoor()));
    let adverse =
        ADVERSE_WEATHER_RE.is_match(&ctx.notes) || ADVERSE_WEATHER_RE.is_match(&ctx.location);

    let probability = if outdoor && adverse {
        Probability::High
    } else {
        Probability::Medium
    };

    RiskFactor {
        risk_type: "Weather".to_string(),
        probability,
        mitigation_strategy: "Monitor weather forecasts and adjust schedules".to_string(),
    }
}

fn uses_material(tasks: &[Task], name: &str) -> bool {
    tasks
        .iter()
        .flat_map(|t| t.materials.iter())
        .any(|m| m.name == name)
}
