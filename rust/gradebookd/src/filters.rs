use crate::calc::Stage;
use crate::error::{GradebookError, Result};
use crate::model::{parse_date, Course, IdType, Student};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// Criteria for `students.list`. Every present field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_type: Option<IdType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_min: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_max: Option<NaiveDate>,
}

/// Criteria for `courses.list`. Every present field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_with_grade: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_min: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_max: Option<NaiveDate>,
}

/// Reads an optional string criterion. Null and blank mean "no constraint".
fn opt_text(obj: &serde_json::Map<String, Value>, key: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(GradebookError::Validation(format!(
                    "filters.{key} must be string or null"
                )));
            };
            let t = s.trim();
            if t.is_empty() {
                Ok(None)
            } else {
                Ok(Some(t.to_string()))
            }
        }
    }
}

fn opt_date(obj: &serde_json::Map<String, Value>, key: &str) -> Result<Option<NaiveDate>> {
    opt_text(obj, key)?
        .map(|s| parse_date(&format!("filters.{key}"), &s))
        .transpose()
}

fn as_object<'a>(raw: Option<&'a Value>) -> Result<Option<&'a serde_json::Map<String, Value>>> {
    match raw {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_object()
            .map(Some)
            .ok_or_else(|| GradebookError::Validation("filters must be an object".into())),
    }
}

pub fn parse_student_filter(raw: Option<&Value>) -> Result<StudentFilter> {
    let Some(obj) = as_object(raw)? else {
        return Ok(StudentFilter::default());
    };
    Ok(StudentFilter {
        name: opt_text(obj, "name")?.map(|s| s.to_lowercase()),
        id_type: opt_text(obj, "idType")?
            .map(|s| IdType::parse(&s))
            .transpose()?,
        identifier: opt_text(obj, "identifier")?,
        date_min: opt_date(obj, "dateMin")?,
        date_max: opt_date(obj, "dateMax")?,
    })
}

pub fn parse_course_filter(raw: Option<&Value>) -> Result<CourseFilter> {
    let Some(obj) = as_object(raw)? else {
        return Ok(CourseFilter::default());
    };
    Ok(CourseFilter {
        name: opt_text(obj, "name")?.map(|s| s.to_lowercase()),
        stage_with_grade: opt_text(obj, "stageWithGrade")?
            .map(|s| Stage::parse(&s))
            .transpose()?,
        date_min: opt_date(obj, "dateMin")?,
        date_max: opt_date(obj, "dateMax")?,
    })
}

fn in_range(d: NaiveDate, min: Option<NaiveDate>, max: Option<NaiveDate>) -> bool {
    min.map_or(true, |m| d >= m) && max.map_or(true, |m| d <= m)
}

fn name_contains(name: &str, needle: Option<&str>) -> bool {
    needle.map_or(true, |n| name.to_lowercase().contains(&n.to_lowercase()))
}

impl StudentFilter {
    pub fn matches(&self, s: &Student) -> bool {
        name_contains(&s.name, self.name.as_deref())
            && self.id_type.map_or(true, |t| s.id_type == t)
            && self
                .identifier
                .as_deref()
                .map_or(true, |i| s.identifier == i)
            && in_range(s.registration_date, self.date_min, self.date_max)
    }
}

impl CourseFilter {
    pub fn matches(&self, c: &Course) -> bool {
        name_contains(&c.name, self.name.as_deref())
            && self
                .stage_with_grade
                .map_or(true, |stage| c.scores.get(stage).is_some())
            && in_range(c.registration_date, self.date_min, self.date_max)
    }
}

/// Keeps matching items, preserving their input order.
pub fn apply<T, F>(items: Vec<T>, pred: F) -> Vec<T>
where
    F: Fn(&T) -> bool,
{
    items.into_iter().filter(|it| pred(it)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::StageScores;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn student(id: &str, name: &str, t: IdType, ident: &str, d: &str) -> Student {
        Student {
            id: id.into(),
            name: name.into(),
            id_type: t,
            identifier: ident.into(),
            registration_date: date(d),
            courses: Vec::new(),
        }
    }

    fn course(id: &str, name: &str, d: &str, scores: StageScores) -> Course {
        Course {
            id: id.into(),
            student_id: "s".into(),
            name: name.into(),
            registration_date: date(d),
            scores,
        }
    }

    fn roster() -> Vec<Student> {
        vec![
            student("1", "Ana Souza", IdType::Registration, "R-1", "2024-01-10"),
            student("2", "Bruno Lima", IdType::NationalId, "111", "2024-02-01"),
            student("3", "anabela Reis", IdType::NationalId, "222", "2024-03-15"),
            student("4", "Carla Dias", IdType::Registration, "R-2", "2024-03-16"),
        ]
    }

    fn ids(items: &[Student]) -> Vec<&str> {
        items.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let f = parse_student_filter(None).unwrap();
        assert_eq!(f, StudentFilter::default());
        let out = apply(roster(), |s| f.matches(s));
        assert_eq!(ids(&out), vec!["1", "2", "3", "4"]);

        let f = parse_student_filter(Some(&json!({ "name": "  ", "idType": null }))).unwrap();
        assert_eq!(f, StudentFilter::default());
    }

    #[test]
    fn id_type_filter_is_exact() {
        let f = parse_student_filter(Some(&json!({ "idType": "NATIONAL_ID" }))).unwrap();
        let out = apply(roster(), |s| f.matches(s));
        assert_eq!(ids(&out), vec!["2", "3"]);
        assert!(out.iter().all(|s| s.id_type == IdType::NationalId));
    }

    #[test]
    fn predicates_combine_with_and() {
        let f = parse_student_filter(Some(&json!({
            "name": "ANA",
            "dateMin": "2024-02-01",
            "dateMax": "2024-03-15"
        })))
        .unwrap();
        let out = apply(roster(), |s| f.matches(s));
        assert_eq!(ids(&out), vec!["3"]);

        let f = parse_student_filter(Some(&json!({ "identifier": "R-2" }))).unwrap();
        assert_eq!(ids(&apply(roster(), |s| f.matches(s))), vec!["4"]);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let f = parse_student_filter(Some(&json!({
            "dateMin": "2024-01-10",
            "dateMax": "2024-01-10"
        })))
        .unwrap();
        assert_eq!(ids(&apply(roster(), |s| f.matches(s))), vec!["1"]);
    }

    #[test]
    fn malformed_criteria_are_rejected() {
        let e = parse_student_filter(Some(&json!({ "dateMin": "2024-13-01" }))).unwrap_err();
        assert_eq!(e.code(), "bad_params");
        let e = parse_student_filter(Some(&json!({ "idType": "PASSPORT" }))).unwrap_err();
        assert_eq!(e.code(), "bad_params");
        let e = parse_student_filter(Some(&json!(["x"]))).unwrap_err();
        assert_eq!(e.code(), "bad_params");
        let e = parse_course_filter(Some(&json!({ "stageWithGrade": "E4" }))).unwrap_err();
        assert_eq!(e.code(), "invalid_stage");
    }

    #[test]
    fn stage_with_grade_checks_presence_not_value() {
        let courses = vec![
            course("a", "Math", "2024-01-01", StageScores::new(Some(0.0), None, None)),
            course("b", "Physics", "2024-01-02", StageScores::new(None, Some(9.0), None)),
            course("c", "Mathematics II", "2024-01-03", StageScores::default()),
        ];
        let f = parse_course_filter(Some(&json!({ "stageWithGrade": "E1" }))).unwrap();
        let out = apply(courses.clone(), |c| f.matches(c));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");

        let f = parse_course_filter(Some(&json!({ "name": "math", "dateMin": "2024-01-02" })))
            .unwrap();
        let out = apply(courses, |c| f.matches(c));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "c");
    }
}
