use crate::calc::{grade_summary, CourseStatus, StageScores};
use crate::error::{GradebookError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdType {
    Registration,
    NationalId,
}

impl IdType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdType::Registration => "REGISTRATION",
            IdType::NationalId => "NATIONAL_ID",
        }
    }

    pub fn parse(raw: &str) -> Result<IdType> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "REGISTRATION" => Ok(IdType::Registration),
            "NATIONAL_ID" => Ok(IdType::NationalId),
            _ => Err(GradebookError::Validation(format!(
                "idType must be one of: REGISTRATION, NATIONAL_ID (got {raw:?})"
            ))),
        }
    }
}

pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FMT).map_err(|_| {
        GradebookError::Validation(format!("{field} must be a YYYY-MM-DD date (got {raw:?})"))
    })
}

pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Stored course row. Average and status are not part of it; see [`Course::record`].
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: String,
    pub student_id: String,
    pub name: String,
    pub registration_date: NaiveDate,
    pub scores: StageScores,
}

impl Course {
    /// Outward view with the derived fields computed from the current scores.
    pub fn record(&self) -> CourseRecord {
        let summary = grade_summary(&self.scores);
        CourseRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            registration_date: format_date(self.registration_date),
            scores: self.scores,
            average: summary.average,
            status: summary.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: String,
    pub name: String,
    pub registration_date: String,
    pub scores: StageScores,
    pub average: Option<f64>,
    pub status: CourseStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub id_type: IdType,
    pub identifier: String,
    pub registration_date: NaiveDate,
    pub courses: Vec<Course>,
}

impl Student {
    pub fn record(&self) -> StudentRecord {
        StudentRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            id_type: self.id_type,
            identifier: self.identifier.clone(),
            registration_date: format_date(self.registration_date),
            courses: self.courses.iter().map(Course::record).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub id_type: IdType,
    pub identifier: String,
    pub registration_date: String,
    #[serde(default)]
    pub courses: Vec<CourseRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn course_record_derives_fields_from_scores() {
        let course = Course {
            id: "c1".into(),
            student_id: "s1".into(),
            name: "Algebra".into(),
            registration_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            scores: StageScores::new(Some(8.0), Some(5.0), Some(5.0)),
        };
        let v = serde_json::to_value(course.record()).unwrap();
        assert_eq!(
            v,
            json!({
                "id": "c1",
                "name": "Algebra",
                "registrationDate": "2024-03-01",
                "scores": { "E1": 8.0, "E2": 5.0, "E3": 5.0 },
                "average": 6.0,
                "status": "APPROVED"
            })
        );
    }

    #[test]
    fn id_type_and_date_parsing() {
        assert_eq!(IdType::parse("national_id").unwrap(), IdType::NationalId);
        assert_eq!(IdType::parse("CPF").unwrap_err().code(), "bad_params");
        assert_eq!(
            parse_date("registrationDate", "2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("registrationDate", "2023-02-29").is_err());
        assert!(parse_date("registrationDate", "01/02/2024").is_err());
    }
}
