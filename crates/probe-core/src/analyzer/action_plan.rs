//! Action plan: recommendations scheduled into 7, 21 and 90 day buckets.

use chrono::{DateTime, Duration, Utc};
use probe_proto::{
    ActionHorizon, ActionItem, ActionPlan, Recommendation, RecommendationPriority,
};

pub fn horizon_for(priority: RecommendationPriority) -> ActionHorizon {
    match priority {
        RecommendationPriority::Critical | RecommendationPriority::High => ActionHorizon::Immediate,
        RecommendationPriority::Medium => ActionHorizon::ShortTerm,
        RecommendationPriority::Low => ActionHorizon::LongTerm,
    }
}

fn success_criteria(recommendation: &Recommendation) -> Vec<String> {
    let estimate = &recommendation.estimate;
    vec![
        format!(
            "{} moves from {:.1} to at least {:.1}",
            estimate.metric, estimate.before, estimate.after
        ),
        format!(
            "No new {} findings in the next run",
            recommendation.category
        ),
        "Change verified by a repeated automated cycle".to_string(),
    ]
}

/// Buckets recommendations by urgency. Deadlines count from `from`.
pub(crate) fn plan(recommendations: &[Recommendation], from: DateTime<Utc>) -> ActionPlan {
    let mut plan = ActionPlan::default();
    for recommendation in recommendations {
        let horizon = horizon_for(recommendation.priority);
        let item = ActionItem {
            recommendation_id: recommendation.id.clone(),
            title: recommendation.title.clone(),
            horizon,
            deadline: from + Duration::days(horizon.days()),
            success_criteria: success_criteria(recommendation),
        };
        match horizon {
            ActionHorizon::Immediate => plan.immediate.push(item),
            ActionHorizon::ShortTerm => plan.short_term.push(item),
            ActionHorizon::LongTerm => plan.long_term.push(item),
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_proto::{Dimension, Effort, MetricEstimate};

    fn rec(id: &str, priority: RecommendationPriority) -> Recommendation {
        Recommendation {
            id: id.into(),
            priority,
            category: Dimension::Quality,
            title: id.into(),
            description: String::new(),
            effort: Effort::Low,
            timeline: String::new(),
            steps: Vec::new(),
            estimate: MetricEstimate {
                metric: "quality_score".into(),
                before: 70.0,
                after: 90.0,
            },
        }
    }

    #[test]
    fn test_buckets_and_deadlines() {
        let from = Utc::now();
        let plan = plan(
            &[
                rec("a", RecommendationPriority::Critical),
                rec("b", RecommendationPriority::High),
                rec("c", RecommendationPriority::Medium),
                rec("d", RecommendationPriority::Low),
            ],
            from,
        );

        assert_eq!(plan.immediate.len(), 2);
        assert_eq!(plan.short_term.len(), 1);
        assert_eq!(plan.long_term.len(), 1);
        assert_eq!(plan.immediate[0].deadline, from + Duration::days(7));
        assert_eq!(plan.short_term[0].deadline, from + Duration::days(21));
        assert_eq!(plan.long_term[0].deadline, from + Duration::days(90));
        assert_eq!(plan.immediate[0].success_criteria.len(), 3);
    }
}
