//! Risk: probability x impact per factor, grouped by category.

use std::collections::BTreeMap;

use probe_proto::{
    CompositeStrategy, Dimension, Insight, RiskAssessment, RiskCategory, RiskFactor, RiskLevel,
};

/// Fixed factor table: name, category, the dimension driving probability, impact.
pub const FACTORS: [(&str, RiskCategory, Dimension, f64); 8] = [
    ("latency", RiskCategory::Technical, Dimension::Performance, 70.0),
    ("data integrity", RiskCategory::Technical, Dimension::Quality, 90.0),
    ("security exposure", RiskCategory::Technical, Dimension::Security, 100.0),
    ("availability", RiskCategory::Operational, Dimension::Reliability, 90.0),
    ("error recovery", RiskCategory::Operational, Dimension::Usability, 50.0),
    ("customer experience", RiskCategory::Business, Dimension::Usability, 60.0),
    ("compliance", RiskCategory::Business, Dimension::Security, 80.0),
    ("workflow integrity", RiskCategory::Business, Dimension::Quality, 80.0),
];

/// Worse score, higher probability: `(100 - score) / 100`.
pub fn probability(score: f64) -> f64 {
    ((100.0 - score) / 100.0).clamp(0.0, 1.0)
}

pub(crate) fn assess(insights: &[Insight], strategy: CompositeStrategy) -> RiskAssessment {
    let score_of = |dimension: Dimension| {
        insights
            .iter()
            .find(|i| i.dimension == dimension)
            .map_or(0.0, |i| i.score)
    };

    let factors: Vec<RiskFactor> = FACTORS
        .iter()
        .map(|(name, category, source, impact)| {
            let probability = probability(score_of(*source));
            RiskFactor {
                name: (*name).to_string(),
                category: *category,
                source: *source,
                probability,
                impact: *impact,
                score: probability * impact,
            }
        })
        .collect();

    let mut category_scores = BTreeMap::new();
    for category in RiskCategory::ALL {
        let scores: Vec<f64> = factors
            .iter()
            .filter(|f| f.category == category)
            .map(|f| f.score)
            .collect();
        category_scores.insert(category, strategy.combine_risks(&scores));
    }

    let all: Vec<f64> = factors.iter().map(|f| f.score).collect();
    let overall_score = strategy.combine_risks(&all);

    RiskAssessment {
        factors,
        category_scores,
        overall_score,
        level: RiskLevel::from_score(overall_score),
        strategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insights(score: f64) -> Vec<Insight> {
        Dimension::ALL
            .into_iter()
            .map(|d| Insight::new(d, score))
            .collect()
    }

    #[test]
    fn test_perfect_scores_carry_no_risk() {
        let risk = assess(&insights(100.0), CompositeStrategy::Mean);
        assert_eq!(risk.overall_score, 0.0);
        assert_eq!(risk.level, RiskLevel::Low);
    }

    #[test]
    fn test_factor_score_is_probability_times_impact() {
        let risk = assess(&insights(40.0), CompositeStrategy::Mean);
        let security = risk
            .factors
            .iter()
            .find(|f| f.name == "security exposure")
            .unwrap();
        assert!((security.probability - 0.6).abs() < 1e-9);
        assert!((security.score - 60.0).abs() < 1e-9);

        // Mean impact is 77.5, so the mean risk is 0.6 * 77.5.
        assert!((risk.overall_score - 46.5).abs() < 1e-9);
        assert_eq!(risk.level, RiskLevel::Medium);
    }

    #[test]
    fn test_worst_of_strategy() {
        let risk = assess(&insights(40.0), CompositeStrategy::WorstOf);
        assert!((risk.overall_score - 60.0).abs() < 1e-9);
        assert_eq!(risk.level, RiskLevel::High);
        assert!((risk.category_scores[&RiskCategory::Operational] - 54.0).abs() < 1e-9);
    }
}
