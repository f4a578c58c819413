//! Letter grading for normalized scores.
//!
//! Every score in Probe lives on a 0-100 scale and is mapped to a letter
//! through [`grade`]. Callers never re-derive bands locally.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter grade band for a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Returns the letter as a static string.
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    /// Lowest score that still earns this grade.
    pub fn floor(self) -> f64 {
        match self {
            Grade::A => 90.0,
            Grade::B => 80.0,
            Grade::C => 70.0,
            Grade::D => 60.0,
            Grade::F => 0.0,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a 0-100 score to its grade band.
///
/// A >= 90, B >= 80, C >= 70, D >= 60, anything else (including NaN) is F.
pub fn grade(score: f64) -> Grade {
    if score >= 90.0 {
        Grade::A
    } else if score >= 80.0 {
        Grade::B
    } else if score >= 70.0 {
        Grade::C
    } else if score >= 60.0 {
        Grade::D
    } else {
        Grade::F
    }
}

/// Clamps a raw score into the 0-100 range. NaN collapses to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_bands() {
        assert_eq!(grade(95.0), Grade::A);
        assert_eq!(grade(85.0), Grade::B);
        assert_eq!(grade(75.0), Grade::C);
        assert_eq!(grade(65.0), Grade::D);
        assert_eq!(grade(40.0), Grade::F);
    }

    #[test]
    fn test_grade_boundaries_are_inclusive() {
        assert_eq!(grade(90.0), Grade::A);
        assert_eq!(grade(89.999), Grade::B);
        assert_eq!(grade(80.0), Grade::B);
        assert_eq!(grade(70.0), Grade::C);
        assert_eq!(grade(60.0), Grade::D);
        assert_eq!(grade(59.9), Grade::F);
    }

    #[test]
    fn test_grade_nan_is_f() {
        assert_eq!(grade(f64::NAN), Grade::F);
    }

    #[test]
    fn test_floor_round_trips_through_grade() {
        for g in [Grade::A, Grade::B, Grade::C, Grade::D, Grade::F] {
            assert_eq!(grade(g.floor()), g);
        }
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(120.0), 100.0);
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }
}
