//! Rule-based recommendations.

use probe_proto::{
    Dimension, Effort, FlowDigest, Insight, MetricEstimate, Recommendation,
    RecommendationPriority,
};

use super::performance::HIGH_VARIABILITY;

/// A dimension scoring below its threshold triggers its recommendation.
pub fn threshold(dimension: Dimension) -> f64 {
    match dimension {
        Dimension::Performance => 80.0,
        Dimension::Reliability => 90.0,
        Dimension::Quality => 85.0,
        Dimension::Usability => 75.0,
        Dimension::Security => 90.0,
    }
}

/// Security is always critical. Otherwise the priority follows the score.
pub fn priority_for(dimension: Dimension, score: f64) -> RecommendationPriority {
    if dimension == Dimension::Security {
        RecommendationPriority::Critical
    } else if score < 60.0 {
        RecommendationPriority::High
    } else if score < 75.0 {
        RecommendationPriority::Medium
    } else {
        RecommendationPriority::Low
    }
}

fn timeline(priority: RecommendationPriority) -> &'static str {
    match priority {
        RecommendationPriority::Critical => "1 week",
        RecommendationPriority::High => "2 weeks",
        RecommendationPriority::Medium => "3 weeks",
        RecommendationPriority::Low => "next quarter",
    }
}

struct Template {
    title: &'static str,
    description: &'static str,
    effort: Effort,
    steps: &'static [&'static str],
}

fn template(dimension: Dimension) -> Template {
    match dimension {
        Dimension::Performance => Template {
            title: "Reduce response times",
            description: "Average latency or throughput is below target for the tested endpoints.",
            effort: Effort::Medium,
            steps: &[
                "Profile the slowest endpoints under representative load",
                "Add indexes or caching for the hottest queries",
                "Paginate large collection responses",
                "Re-run the load burst and compare p95",
            ],
        },
        Dimension::Reliability => Template {
            title: "Improve reliability",
            description: "Requests fail or go unanswered more often than the availability target allows.",
            effort: Effort::High,
            steps: &[
                "Group failures by the error taxonomy",
                "Add timeouts and retries on upstream calls",
                "Alert on error rate and availability",
                "Verify recovery with a repeated automated run",
            ],
        },
        Dimension::Quality => Template {
            title: "Tighten response contracts",
            description: "Responses deviate from their declared schemas or business rules.",
            effort: Effort::Medium,
            steps: &[
                "Review structural and business-rule findings per endpoint",
                "Fix serializers that drop or mistype fields",
                "Add contract tests to the service's own pipeline",
            ],
        },
        Dimension::Usability => Template {
            title: "Improve developer experience",
            description: "Payloads or client errors are harder to consume than they should be.",
            effort: Effort::Low,
            steps: &[
                "Return a structured body with a message on every 4xx",
                "Keep payload shapes consistent across endpoints",
                "Publish examples for each endpoint",
            ],
        },
        Dimension::Security => Template {
            title: "Harden API security",
            description: "Protective headers, transport security or authentication fall short.",
            effort: Effort::Medium,
            steps: &[
                "Serve every endpoint over HTTPS with HSTS",
                "Add the missing protective headers",
                "Remove headers and error bodies that disclose internals",
                "Require authentication on every non-public endpoint",
            ],
        },
    }
}

fn code(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Performance => "PERF",
        Dimension::Reliability => "REL",
        Dimension::Quality => "QUAL",
        Dimension::Usability => "UX",
        Dimension::Security => "SEC",
    }
}

fn for_dimension(insight: &Insight) -> Recommendation {
    let dimension = insight.dimension;
    let t = template(dimension);
    let priority = priority_for(dimension, insight.score);
    let target = (threshold(dimension) + 5.0).max(insight.score + 15.0).min(100.0);
    Recommendation {
        id: format!("REC-{}-001", code(dimension)),
        priority,
        category: dimension,
        title: t.title.to_string(),
        description: t.description.to_string(),
        effort: t.effort,
        timeline: timeline(priority).to_string(),
        steps: t.steps.iter().map(|s| (*s).to_string()).collect(),
        estimate: MetricEstimate {
            metric: format!("{dimension}_score"),
            before: insight.score,
            after: target,
        },
    }
}

/// Builds the recommendation list, most urgent first.
pub(crate) fn recommend(insights: &[Insight], flows: &[FlowDigest]) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = insights
        .iter()
        .filter(|i| i.score < threshold(i.dimension))
        .map(for_dimension)
        .collect();

    if let Some(performance) = insights.iter().find(|i| i.dimension == Dimension::Performance)
        && performance
            .weaknesses
            .iter()
            .any(|w| w.starts_with(HIGH_VARIABILITY))
    {
        let p99 = performance.metrics.get("p99_ms").copied().unwrap_or(0.0);
        let avg = performance.metrics.get("avg_response_ms").copied().unwrap_or(0.0);
        out.push(Recommendation {
            id: "REC-PERF-002".to_string(),
            priority: RecommendationPriority::Medium,
            category: Dimension::Performance,
            title: "Reduce latency variance".to_string(),
            description: format!(
                "Tail latency (p99 {p99:.0} ms) is far above the {avg:.0} ms mean."
            ),
            effort: Effort::Medium,
            timeline: timeline(RecommendationPriority::Medium).to_string(),
            steps: vec![
                "Identify requests in the slowest percentile".to_string(),
                "Look for lock contention, cold caches or GC pauses".to_string(),
                "Re-measure p99 after each fix".to_string(),
            ],
            estimate: MetricEstimate {
                metric: "p99_ms".to_string(),
                before: p99,
                after: avg * 2.0,
            },
        });
    }

    for (n, flow) in flows.iter().filter(|f| !f.passed).enumerate() {
        out.push(Recommendation {
            id: format!("REC-FLOW-{:03}", n + 1),
            priority: RecommendationPriority::High,
            category: Dimension::Quality,
            title: format!("Repair the '{}' journey", flow.flow),
            description: format!(
                "{} of {} steps passed.",
                flow.steps_passed, flow.steps_total
            ),
            effort: Effort::Medium,
            timeline: timeline(RecommendationPriority::High).to_string(),
            steps: flow
                .issues
                .iter()
                .map(|i| format!("Resolve: {i}"))
                .chain(std::iter::once("Re-run the flow end to end".to_string()))
                .collect(),
            estimate: MetricEstimate {
                metric: format!("{}_steps_passed", flow.flow),
                before: flow.steps_passed as f64,
                after: flow.steps_total as f64,
            },
        });
    }

    // Stable: ties keep insertion order.
    out.sort_by_key(|r| r.priority);
    out
}
