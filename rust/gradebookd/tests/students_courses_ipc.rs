use chrono::NaiveDate;
use gradebookd::calc::{CourseStatus, Stage};
use gradebookd::client::{Client, SessionStore};
use gradebookd::filters::{CourseFilter, StudentFilter};
use gradebookd::model::IdType;
use gradebookd::reports::HEADER;
use gradebookd::store::{NewStudent, StudentPatch};
use serde_json::json;

fn logged_in(workspace: &std::path::Path) -> Client {
    let ws = workspace.to_string_lossy().to_string();
    let mut client = Client::spawn(
        env!("CARGO_BIN_EXE_gradebookd"),
        &["--workspace", ws.as_str()],
        SessionStore::in_memory(),
    )
    .expect("spawn gradebookd");
    client.login("admin", "1234").expect("login");
    client
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn new_student(name: &str, id_type: IdType, ident: &str, date: NaiveDate) -> NewStudent {
    NewStudent {
        name: name.to_string(),
        id_type,
        identifier: ident.to_string(),
        registration_date: Some(date),
    }
}

#[test]
fn student_filters_and_insertion_order() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut client = logged_in(workspace.path());

    let seed = [
        ("Ana Souza", IdType::Registration, "R-1", ymd(2024, 1, 10)),
        ("Bruno Lima", IdType::NationalId, "111", ymd(2024, 2, 1)),
        ("Anabela Reis", IdType::NationalId, "222", ymd(2024, 3, 15)),
        ("Carla Dias", IdType::Registration, "R-2", ymd(2024, 3, 16)),
    ];
    let mut ids = Vec::new();
    for (name, t, ident, date) in seed {
        let s = client
            .create_student(&new_student(name, t, ident, date))
            .expect("create");
        ids.push(s.id);
    }

    let all = client
        .list_students(&StudentFilter::default())
        .expect("list all");
    let got: Vec<_> = all.iter().map(|s| s.id.clone()).collect();
    assert_eq!(got, ids);
    let again = client
        .list_students(&StudentFilter::default())
        .expect("list again");
    assert_eq!(all, again);

    let national = client
        .list_students(&StudentFilter {
            id_type: Some(IdType::NationalId),
            ..StudentFilter::default()
        })
        .expect("by type");
    assert_eq!(national.len(), 2);
    assert!(national.iter().all(|s| s.id_type == IdType::NationalId));

    let narrowed = client
        .list_students(&StudentFilter {
            name: Some("ANA".into()),
            date_min: Some(ymd(2024, 2, 1)),
            date_max: Some(ymd(2024, 3, 15)),
            ..StudentFilter::default()
        })
        .expect("combined");
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].name, "Anabela Reis");

    let e = client
        .call("students.list", json!({ "filters": { "dateMin": "15/03/2024" } }))
        .expect_err("bad date");
    assert_eq!(e.code(), Some("bad_params"));
}

#[test]
fn duplicate_identifier_conflicts_and_update_applies_fields() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut client = logged_in(workspace.path());

    let a = client
        .create_student(&new_student("A", IdType::Registration, "R-1", ymd(2024, 1, 1)))
        .expect("create a");
    let e = client
        .create_student(&new_student("B", IdType::Registration, "R-1", ymd(2024, 1, 1)))
        .expect_err("duplicate");
    assert_eq!(e.code(), Some("conflict"));
    client
        .create_student(&new_student("B", IdType::NationalId, "R-1", ymd(2024, 1, 1)))
        .expect("same identifier under another type");

    let updated = client
        .update_student(
            &a.id,
            &StudentPatch {
                name: Some("A. Prime".into()),
                registration_date: Some(ymd(2023, 12, 31)),
                ..StudentPatch::default()
            },
        )
        .expect("update");
    assert_eq!(updated.name, "A. Prime");
    assert_eq!(updated.identifier, "R-1");
    assert_eq!(updated.registration_date, "2023-12-31");

    let e = client
        .call(
            "students.create",
            json!({ "name": " ", "idType": "REGISTRATION", "identifier": "X" }),
        )
        .expect_err("blank name");
    assert_eq!(e.code(), Some("bad_params"));
    let e = client
        .call(
            "students.create",
            json!({ "name": "X", "idType": "PASSPORT", "identifier": "X" }),
        )
        .expect_err("bad id type");
    assert_eq!(e.code(), Some("bad_params"));
}

#[test]
fn deleting_student_cascades_to_courses() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut client = logged_in(workspace.path());

    let s = client
        .create_student(&new_student("Del", IdType::Registration, "D-1", ymd(2024, 1, 1)))
        .expect("create");
    let c1 = client.create_course(&s.id, "Math", None).expect("course 1");
    client.create_course(&s.id, "Art", None).expect("course 2");

    client.delete_student(&s.id).expect("delete");

    let e = client
        .list_courses(&s.id, &CourseFilter::default())
        .expect_err("courses gone");
    assert_eq!(e.code(), Some("not_found"));
    let e = client
        .set_grade(&s.id, &c1.id, Stage::E1, 5.0)
        .expect_err("course gone");
    assert_eq!(e.code(), Some("not_found"));
    let e = client.delete_student(&s.id).expect_err("already deleted");
    assert_eq!(e.code(), Some("not_found"));
    assert!(client
        .list_students(&StudentFilter::default())
        .expect("list")
        .is_empty());
}

#[test]
fn course_lifecycle_and_filters() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut client = logged_in(workspace.path());

    let s = client
        .create_student(&new_student("C", IdType::Registration, "C-1", ymd(2024, 1, 1)))
        .expect("create");
    let math = client
        .create_course(&s.id, "Mathematics", Some(ymd(2024, 2, 1)))
        .expect("math");
    let art = client
        .create_course(&s.id, "Art", Some(ymd(2024, 3, 1)))
        .expect("art");
    let bio = client
        .create_course(&s.id, "Applied Math", Some(ymd(2024, 4, 1)))
        .expect("bio");
    assert_eq!(math.status, CourseStatus::Pending);
    assert_eq!(math.scores.get(Stage::E1), None);

    client.set_grade(&s.id, &art.id, Stage::E2, 0.0).expect("grade");

    let graded = client
        .list_courses(
            &s.id,
            &CourseFilter {
                stage_with_grade: Some(Stage::E2),
                ..CourseFilter::default()
            },
        )
        .expect("stage filter");
    assert_eq!(graded.len(), 1);
    assert_eq!(graded[0].id, art.id);

    let by_name = client
        .list_courses(
            &s.id,
            &CourseFilter {
                name: Some("math".into()),
                date_max: Some(ymd(2024, 3, 31)),
                ..CourseFilter::default()
            },
        )
        .expect("name filter");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, math.id);

    let renamed = client
        .update_course(&s.id, &bio.id, "Biology", None)
        .expect("rename");
    assert_eq!(renamed.name, "Biology");
    assert_eq!(renamed.registration_date, "2024-04-01");

    client.delete_course(&s.id, &math.id).expect("delete course");
    let left: Vec<_> = client
        .list_courses(&s.id, &CourseFilter::default())
        .expect("list")
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(left, vec![art.id.clone(), bio.id.clone()]);

    let e = client
        .call(
            "courses.list",
            json!({ "studentId": s.id, "filters": { "stageWithGrade": "E9" } }),
        )
        .expect_err("bad stage filter");
    assert_eq!(e.code(), Some("invalid_stage"));
}

#[test]
fn csv_reports_reflect_derived_fields() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut client = logged_in(workspace.path());

    let s = client
        .create_student(&new_student("Rep, Ort", IdType::NationalId, "9", ymd(2024, 1, 1)))
        .expect("create");
    let c = client
        .create_course(&s.id, "Chem", Some(ymd(2024, 5, 2)))
        .expect("course");
    for (stage, score) in [(Stage::E1, 8.0), (Stage::E2, 5.0), (Stage::E3, 5.0)] {
        client.set_grade(&s.id, &c.id, stage, score).expect("grade");
    }

    let csv = client.student_report_csv(&s.id).expect("student csv");
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], HEADER);
    assert_eq!(
        lines[1],
        format!(
            "{},\"Rep, Ort\",NATIONAL_ID,9,{},Chem,2024-05-02,8.00,5.00,5.00,6.00,APPROVED",
            s.id, c.id
        )
    );

    let class = client.class_report_csv().expect("class csv");
    assert_eq!(class.lines().count(), 2);
}
