use crate::error::{GradebookError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 10.0;
pub const PASS_AVERAGE: f64 = 6.0;

/// One of the three sequential grading checkpoints of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    E1,
    E2,
    E3,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::E1, Stage::E2, Stage::E3];

    pub fn code(self) -> &'static str {
        match self {
            Stage::E1 => "E1",
            Stage::E2 => "E2",
            Stage::E3 => "E3",
        }
    }

    fn index(self) -> usize {
        match self {
            Stage::E1 => 0,
            Stage::E2 => 1,
            Stage::E3 => 2,
        }
    }

    pub fn parse(raw: &str) -> Result<Stage> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "E1" => Ok(Stage::E1),
            "E2" => Ok(Stage::E2),
            "E3" => Ok(Stage::E3),
            _ => Err(GradebookError::InvalidStage(raw.to_string())),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    Pending,
    Approved,
    Failed,
}

impl CourseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::Pending => "PENDING",
            CourseStatus::Approved => "APPROVED",
            CourseStatus::Failed => "FAILED",
        }
    }
}

/// Recorded scores of a course, one optional slot per stage.
///
/// An absent slot means "no score yet" and is distinct from a recorded 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageScores([Option<f64>; 3]);

impl StageScores {
    pub fn new(e1: Option<f64>, e2: Option<f64>, e3: Option<f64>) -> Self {
        Self([e1, e2, e3])
    }

    pub fn get(&self, stage: Stage) -> Option<f64> {
        self.0[stage.index()]
    }

    /// Returns a copy with `stage` set; `self` is untouched.
    pub fn with(&self, stage: Stage, score: f64) -> Self {
        let mut next = *self;
        next.0[stage.index()] = Some(score);
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, Option<f64>)> + '_ {
        Stage::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}

impl Serialize for StageScores {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(3))?;
        for (stage, score) in self.iter() {
            map.serialize_entry(stage.code(), &score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StageScores {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = std::collections::HashMap::<Stage, Option<f64>>::deserialize(deserializer)?;
        let mut out = StageScores::default();
        for (stage, score) in raw {
            out.0[stage.index()] = score;
        }
        Ok(out)
    }
}

/// Half-up rounding to two decimals for non-negative values.
///
/// The 1e-9 bias keeps values like 6.005 (stored as 6.00499999...) rounding up.
pub fn round_half_up_2(x: f64) -> f64 {
    ((100.0 * x) + 0.5 + 1e-9).floor() / 100.0
}

/// Checks a raw score value and returns it rounded to two decimals.
pub fn validate_score(raw: &serde_json::Value) -> Result<f64> {
    let Some(v) = raw.as_f64() else {
        return Err(GradebookError::InvalidScore(format!(
            "score must be a number, got {raw}"
        )));
    };
    check_score(v)
}

/// Range check for an already numeric score; returns it rounded to two decimals.
pub fn check_score(v: f64) -> Result<f64> {
    if !v.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&v) {
        return Err(GradebookError::InvalidScore(format!(
            "score must be between {SCORE_MIN} and {SCORE_MAX}, got {v}"
        )));
    }
    Ok(round_half_up_2(v))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradeSummary {
    pub average: Option<f64>,
    pub status: CourseStatus,
}

/// Derives the average and status of a course from its current scores.
///
/// The average only exists once every stage is recorded; until then the
/// course is pending.
pub fn grade_summary(scores: &StageScores) -> GradeSummary {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (_, score) in scores.iter() {
        if let Some(v) = score {
            sum += v;
            count += 1;
        }
    }

    if count < Stage::ALL.len() {
        return GradeSummary {
            average: None,
            status: CourseStatus::Pending,
        };
    }

    let average = round_half_up_2(sum / count as f64);
    let status = if average >= PASS_AVERAGE {
        CourseStatus::Approved
    } else {
        CourseStatus::Failed
    };
    GradeSummary {
        average: Some(average),
        status,
    }
}
