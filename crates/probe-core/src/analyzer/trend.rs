//! Trend: current scores against a historical baseline.

use std::collections::BTreeMap;

use probe_proto::{Dimension, DimensionTrend, ScoreDelta, TrendAnalysis, TrendDirection};

/// A swing larger than this many points counts as a change.
pub const TREND_THRESHOLD: f64 = 5.0;

/// Scores of one session, per dimension plus the composite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreCard {
    pub dimensions: BTreeMap<Dimension, f64>,
    pub overall: f64,
}

pub fn direction(delta: f64) -> TrendDirection {
    if delta > TREND_THRESHOLD {
        TrendDirection::Improving
    } else if delta < -TREND_THRESHOLD {
        TrendDirection::Degrading
    } else {
        TrendDirection::Stable
    }
}

fn score_delta(baseline: f64, current: f64) -> ScoreDelta {
    let delta = current - baseline;
    ScoreDelta {
        baseline,
        current,
        delta,
        direction: direction(delta),
    }
}

fn trend(dimension: Dimension, baseline: f64, current: f64) -> DimensionTrend {
    let change = score_delta(baseline, current);
    DimensionTrend {
        dimension,
        baseline: change.baseline,
        current: change.current,
        delta: change.delta,
        direction: change.direction,
    }
}

fn mean_card(cards: &[&ScoreCard]) -> ScoreCard {
    let n = cards.len().max(1) as f64;
    let mut out = ScoreCard::default();
    for dimension in Dimension::ALL {
        let sum: f64 = cards
            .iter()
            .map(|c| c.dimensions.get(&dimension).copied().unwrap_or(0.0))
            .sum();
        out.dimensions.insert(dimension, sum / n);
    }
    out.overall = cards.iter().map(|c| c.overall).sum::<f64>() / n;
    out
}

/// Compares `current` against `history` (oldest first).
///
/// With one prior session the baseline is that session. With more, the
/// series including `current` is split in two and the halves' means are
/// compared. Returns `None` without history.
pub fn analyze(history: &[ScoreCard], current: &ScoreCard) -> Option<TrendAnalysis> {
    if history.is_empty() {
        return None;
    }

    let series: Vec<&ScoreCard> = history.iter().chain(std::iter::once(current)).collect();
    let (baseline, latest, method) = if series.len() == 2 {
        (series[0].clone(), current.clone(), "previous")
    } else {
        let mid = series.len() / 2;
        (mean_card(&series[..mid]), mean_card(&series[mid..]), "split_halves")
    };

    let dimensions = Dimension::ALL
        .into_iter()
        .map(|d| {
            trend(
                d,
                baseline.dimensions.get(&d).copied().unwrap_or(0.0),
                latest.dimensions.get(&d).copied().unwrap_or(0.0),
            )
        })
        .collect();

    Some(TrendAnalysis {
        sessions_considered: series.len(),
        method: method.to_string(),
        dimensions,
        overall: score_delta(baseline.overall, latest.overall),
    })
}
