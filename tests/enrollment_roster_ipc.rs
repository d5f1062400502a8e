use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert!(
        !value.get("ok").and_then(|v| v.as_bool()).unwrap_or(true),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

fn create_user(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    username: &str,
    fullname: &str,
    role: &str,
) -> String {
    let res = request_ok(
        stdin,
        reader,
        id,
        "users.create",
        json!({
            "username": username,
            "password": "pw",
            "fullname": fullname,
            "role": role,
            "regno": format!("R-{}", username),
        }),
    );
    res.get("id")
        .and_then(|v| v.as_str())
        .expect("user id")
        .to_string()
}

fn create_class(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
    teacher_id: &str,
) -> String {
    let res = request_ok(
        stdin,
        reader,
        id,
        "classes.create",
        json!({ "name": name, "teacherId": teacher_id }),
    );
    res.get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string()
}

#[test]
fn duplicate_enrollment_is_rejected_without_partial_state() {
    let workspace = temp_dir("rollcall-enroll-dup");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let teacher_id = create_user(&mut stdin, &mut reader, "u1", "t.dup", "Tom Dup", "teacher");
    let student_id = create_user(&mut stdin, &mut reader, "u2", "s.dup", "Sue Dup", "student");
    let class_a = create_class(&mut stdin, &mut reader, "c1", "Alpha", &teacher_id);
    let class_b = create_class(&mut stdin, &mut reader, "c2", "Beta", &teacher_id);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "e1",
        "enrollment.create",
        json!({ "classId": class_a, "studentId": student_id, "rollNumber": 1 }),
    );

    // Same (class, student) pair again, even under another roll number.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "e2",
        "enrollment.create",
        json!({ "classId": class_a, "studentId": student_id, "rollNumber": 7 }),
    );
    assert_eq!(code, "constraint_violation");

    // The same student may join a different class, reusing the roll number.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "e3",
        "enrollment.create",
        json!({ "classId": class_b, "studentId": student_id, "rollNumber": 1 }),
    );

    let roster = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "classes.roster",
        json!({ "classId": class_a }),
    );
    let students = roster
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("students array");
    assert_eq!(students.len(), 1, "failed enrollment must not add rows");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn enrollment_requires_existing_class_and_student() {
    let workspace = temp_dir("rollcall-enroll-refs");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let teacher_id = create_user(&mut stdin, &mut reader, "u1", "t.ref", "Ty Ref", "teacher");
    let student_id = create_user(&mut stdin, &mut reader, "u2", "s.ref", "Sal Ref", "student");
    let class_id = create_class(&mut stdin, &mut reader, "c1", "Gamma", &teacher_id);

    let code = request_err(
        &mut stdin,
        &mut reader,
        "e1",
        "enrollment.create",
        json!({ "classId": "no-such-class", "studentId": student_id, "rollNumber": 1 }),
    );
    assert_eq!(code, "bad_reference");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "e2",
        "enrollment.create",
        json!({ "classId": class_id, "studentId": "no-such-user", "rollNumber": 1 }),
    );
    assert_eq!(code, "bad_reference");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn roster_lists_students_only_and_404s_when_empty() {
    let workspace = temp_dir("rollcall-roster");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let teacher_id = create_user(&mut stdin, &mut reader, "u1", "t.ros", "Tara Ros", "teacher");
    let aide_id = create_user(&mut stdin, &mut reader, "u2", "aide", "Al Aide", "teacher");
    let amy_id = create_user(&mut stdin, &mut reader, "u3", "amy.r", "Amy Reed", "student");
    let ben_id = create_user(&mut stdin, &mut reader, "u4", "ben.r", "Ben Reed", "student");
    let class_id = create_class(&mut stdin, &mut reader, "c1", "Delta", &teacher_id);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "e1",
        "enrollment.create",
        json!({ "classId": class_id, "studentId": ben_id, "rollNumber": 2 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "e2",
        "enrollment.create",
        json!({ "classId": class_id, "studentId": amy_id, "rollNumber": 1 }),
    );
    // A teacher-role member on the roster is not a student.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "e3",
        "enrollment.create",
        json!({ "classId": class_id, "studentId": aide_id, "rollNumber": 3 }),
    );

    let roster = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "classes.roster",
        json!({ "classId": class_id }),
    );
    let students = roster
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("students array");
    assert_eq!(students.len(), 2);
    assert_eq!(
        students[0].get("rollNumber").and_then(|v| v.as_i64()),
        Some(1)
    );
    assert_eq!(
        students[0].get("fullName").and_then(|v| v.as_str()),
        Some("Amy Reed")
    );
    assert_eq!(
        students[1].get("rollNumber").and_then(|v| v.as_i64()),
        Some(2)
    );
    assert_eq!(
        students[1].get("fullName").and_then(|v| v.as_str()),
        Some("Ben Reed")
    );

    // Zero student enrollments is the one query where absence is an error.
    let empty_class = create_class(&mut stdin, &mut reader, "c2", "Epsilon", &teacher_id);
    let code = request_err(
        &mut stdin,
        &mut reader,
        "r2",
        "classes.roster",
        json!({ "classId": empty_class }),
    );
    assert_eq!(code, "not_found");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "r3",
        "classes.roster",
        json!({ "classId": "no-such-class" }),
    );
    assert_eq!(code, "not_found");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn absentee_rolls_outside_the_roster_are_ignored() {
    let workspace = temp_dir("rollcall-unknown-rolls");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let teacher_id = create_user(&mut stdin, &mut reader, "u1", "t.unk", "Tim Unk", "teacher");
    let amy_id = create_user(&mut stdin, &mut reader, "u2", "amy.u", "Amy Usher", "student");
    let ben_id = create_user(&mut stdin, &mut reader, "u3", "ben.u", "Ben Usher", "student");
    let class_id = create_class(&mut stdin, &mut reader, "c1", "Zeta", &teacher_id);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "e1",
        "enrollment.create",
        json!({ "classId": class_id, "studentId": amy_id, "rollNumber": 1 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "e2",
        "enrollment.create",
        json!({ "classId": class_id, "studentId": ben_id, "rollNumber": 2 }),
    );

    // Roll 99 matches nobody; roll 2 is Ben.
    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "m1",
        "attendance.mark",
        json!({
            "classId": class_id,
            "date": "2024-05-06",
            "markedBy": teacher_id,
            "absentRollNumbers": [2, 99],
        }),
    );
    assert_eq!(marked.get("count").and_then(|v| v.as_u64()), Some(2));

    let amy = request_ok(
        &mut stdin,
        &mut reader,
        "h1",
        "attendance.studentHistory",
        json!({ "studentId": amy_id }),
    );
    assert_eq!(
        amy.get("records")
            .and_then(|v| v.as_array())
            .and_then(|a| a[0].get("status"))
            .and_then(|v| v.as_str()),
        Some("present")
    );

    let ben = request_ok(
        &mut stdin,
        &mut reader,
        "h2",
        "attendance.studentHistory",
        json!({ "studentId": ben_id }),
    );
    assert_eq!(
        ben.get("records")
            .and_then(|v| v.as_array())
            .and_then(|a| a[0].get("status"))
            .and_then(|v| v.as_str()),
        Some("absent")
    );

    let _ = std::fs::remove_dir_all(workspace);
}
