use crate::calc::Stage;
use crate::model::{format_date, Student};

pub const HEADER: &str = "student_id,student_name,id_type,identifier,course_id,course_name,registration_date,e1,e2,e3,average,status";

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn score_cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_default()
}

/// Appends one line per course of `student`; returns the number of lines written.
fn push_student_rows(csv: &mut String, student: &Student) -> usize {
    for course in &student.courses {
        let r = course.record();
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{}\n",
            csv_quote(&student.id),
            csv_quote(&student.name),
            student.id_type.as_str(),
            csv_quote(&student.identifier),
            csv_quote(&course.id),
            csv_quote(&course.name),
            format_date(course.registration_date),
            score_cell(r.scores.get(Stage::E1)),
            score_cell(r.scores.get(Stage::E2)),
            score_cell(r.scores.get(Stage::E3)),
            score_cell(r.average),
            r.status.as_str(),
        ));
    }
    student.courses.len()
}

/// Per-course grade sheet of one student.
pub fn student_csv(student: &Student) -> (String, usize) {
    let mut csv = format!("{HEADER}\n");
    let rows = push_student_rows(&mut csv, student);
    (csv, rows)
}

/// Grade sheet of every student, in listing order.
pub fn class_csv(students: &[Student]) -> (String, usize) {
    let mut csv = format!("{HEADER}\n");
    let rows: usize = students
        .iter()
        .map(|s| push_student_rows(&mut csv, s))
        .sum();
    (csv, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::StageScores;
    use crate::model::{Course, IdType};
    use chrono::NaiveDate;

    fn student(id: &str, name: &str, courses: Vec<Course>) -> Student {
        Student {
            id: id.into(),
            name: name.into(),
            id_type: IdType::Registration,
            identifier: format!("R-{id}"),
            registration_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            courses,
        }
    }

    fn course(id: &str, name: &str, scores: StageScores) -> Course {
        Course {
            id: id.into(),
            student_id: "s".into(),
            name: name.into(),
            registration_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            scores,
        }
    }

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn student_sheet_reflects_derived_fields() {
        let s = student(
            "1",
            "Souza, Ana",
            vec![
                course("c1", "Math", StageScores::new(Some(8.0), Some(5.0), Some(5.0))),
                course("c2", "Art", StageScores::new(Some(7.5), None, None)),
            ],
        );
        let (csv, rows) = student_csv(&s);
        assert_eq!(rows, 2);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "1,\"Souza, Ana\",REGISTRATION,R-1,c1,Math,2024-02-01,8.00,5.00,5.00,6.00,APPROVED"
        );
        assert_eq!(
            lines[2],
            "1,\"Souza, Ana\",REGISTRATION,R-1,c2,Art,2024-02-01,7.50,,,,PENDING"
        );
    }

    #[test]
    fn class_sheet_concatenates_students_in_order() {
        let students = vec![
            student("1", "A", vec![course("c1", "Math", StageScores::default())]),
            student("2", "B", vec![]),
            student("3", "C", vec![course("c3", "Bio", StageScores::default())]),
        ];
        let (csv, rows) = class_csv(&students);
        assert_eq!(rows, 2);
        let ids: Vec<_> = csv
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}
