//! Roster persistence: students, faculty and classes
//!
//! Deletes are explicit transactions that remove dependent rows first, so the
//! cascade does not rely on SQLite foreign-key enforcement being switched on
//! for every connection.

use chrono::{DateTime, Utc};
use rollcall_common::auth::{delete_credentials, Role};
use rollcall_common::db::{Class, Faculty, FacultyContact, NewClass, NewFaculty, NewStudent, Student};
use rollcall_common::time::format_timestamp;
use rollcall_common::{Error, Result};
use sqlx::SqlitePool;

// ============================================================================
// Students
// ============================================================================

const STUDENT_COLUMNS: &str = "enrollment_no, name, semester, face_template_ref, created_at";

pub async fn list_students(pool: &SqlitePool) -> Result<Vec<Student>> {
    let students = sqlx::query_as::<_, Student>(&format!(
        "SELECT {} FROM students ORDER BY enrollment_no",
        STUDENT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(students)
}

pub async fn get_student(pool: &SqlitePool, enrollment_no: &str) -> Result<Option<Student>> {
    let student = sqlx::query_as::<_, Student>(&format!(
        "SELECT {} FROM students WHERE enrollment_no = ?",
        STUDENT_COLUMNS
    ))
    .bind(enrollment_no)
    .fetch_optional(pool)
    .await?;

    Ok(student)
}

pub async fn count_students(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Insert a student, or refresh name/semester of an existing one
///
/// An existing face template reference survives unless a new one is given.
pub async fn upsert_student(
    pool: &SqlitePool,
    student: &NewStudent,
    created_at: DateTime<Utc>,
) -> Result<Student> {
    sqlx::query(
        r#"
        INSERT INTO students (enrollment_no, name, semester, face_template_ref, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(enrollment_no) DO UPDATE SET
            name = excluded.name,
            semester = excluded.semester,
            face_template_ref = COALESCE(excluded.face_template_ref, students.face_template_ref)
        "#,
    )
    .bind(&student.enrollment_no)
    .bind(&student.name)
    .bind(&student.semester)
    .bind(&student.face_template_ref)
    .bind(format_timestamp(&created_at))
    .execute(pool)
    .await?;

    get_student(pool, &student.enrollment_no)
        .await?
        .ok_or_else(|| Error::Internal(format!("Student {} vanished after upsert", student.enrollment_no)))
}

pub async fn set_face_template(
    pool: &SqlitePool,
    enrollment_no: &str,
    template_ref: &str,
) -> Result<bool> {
    let updated = sqlx::query("UPDATE students SET face_template_ref = ? WHERE enrollment_no = ?")
        .bind(template_ref)
        .bind(enrollment_no)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(updated > 0)
}

/// Overwrite name and semester; returns false when the student does not exist
pub async fn update_student(
    pool: &SqlitePool,
    enrollment_no: &str,
    name: &str,
    semester: &str,
) -> Result<bool> {
    let updated = sqlx::query("UPDATE students SET name = ?, semester = ? WHERE enrollment_no = ?")
        .bind(name)
        .bind(semester)
        .bind(enrollment_no)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(updated > 0)
}

/// Delete a student with their attendance and credential
pub async fn delete_student(pool: &SqlitePool, enrollment_no: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM attendance WHERE enrollment_no = ?")
        .bind(enrollment_no)
        .execute(&mut *tx)
        .await?;

    delete_credentials(&mut *tx, Role::Student, enrollment_no).await?;

    let deleted = sqlx::query("DELETE FROM students WHERE enrollment_no = ?")
        .bind(enrollment_no)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(deleted > 0)
}

// ============================================================================
// Faculty
// ============================================================================

const FACULTY_COLUMNS: &str = "faculty_id, name, email, phone, created_at";

pub async fn list_faculty(pool: &SqlitePool) -> Result<Vec<Faculty>> {
    let faculty = sqlx::query_as::<_, Faculty>(&format!(
        "SELECT {} FROM faculty ORDER BY faculty_id",
        FACULTY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(faculty)
}

pub async fn get_faculty(pool: &SqlitePool, faculty_id: &str) -> Result<Option<Faculty>> {
    let faculty = sqlx::query_as::<_, Faculty>(&format!(
        "SELECT {} FROM faculty WHERE faculty_id = ?",
        FACULTY_COLUMNS
    ))
    .bind(faculty_id)
    .fetch_optional(pool)
    .await?;

    Ok(faculty)
}

/// Insert a faculty member; a taken id is a conflict
pub async fn insert_faculty(
    pool: &SqlitePool,
    faculty: &NewFaculty,
    created_at: DateTime<Utc>,
) -> Result<Faculty> {
    let result = sqlx::query(
        "INSERT INTO faculty (faculty_id, name, email, phone, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&faculty.faculty_id)
    .bind(&faculty.name)
    .bind(&faculty.email)
    .bind(&faculty.phone)
    .bind(format_timestamp(&created_at))
    .execute(pool)
    .await;

    match result.map_err(Error::from) {
        Ok(_) => Ok(Faculty {
            faculty_id: faculty.faculty_id.clone(),
            name: faculty.name.clone(),
            email: faculty.email.clone(),
            phone: faculty.phone.clone(),
            created_at,
        }),
        Err(e) if e.is_unique_violation() => Err(Error::Conflict(format!(
            "Faculty {} already exists",
            faculty.faculty_id
        ))),
        Err(e) => Err(e),
    }
}

/// Overwrite name and contact details; returns false when the faculty does not exist
pub async fn update_faculty(pool: &SqlitePool, faculty: &Faculty) -> Result<bool> {
    let updated =
        sqlx::query("UPDATE faculty SET name = ?, email = ?, phone = ? WHERE faculty_id = ?")
            .bind(&faculty.name)
            .bind(&faculty.email)
            .bind(&faculty.phone)
            .bind(&faculty.faculty_id)
            .execute(pool)
            .await?
            .rows_affected();
    Ok(updated > 0)
}

/// Delete a faculty member with their classes, sessions, attendance and credential
pub async fn delete_faculty(pool: &SqlitePool, faculty_id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM attendance WHERE session_id IN (
            SELECT s.id FROM sessions s JOIN classes c ON c.id = s.class_id
            WHERE c.faculty_id = ?
        )
        "#,
    )
    .bind(faculty_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM sessions WHERE class_id IN (SELECT id FROM classes WHERE faculty_id = ?)")
        .bind(faculty_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM classes WHERE faculty_id = ?")
        .bind(faculty_id)
        .execute(&mut *tx)
        .await?;

    delete_credentials(&mut *tx, Role::Faculty, faculty_id).await?;

    let deleted = sqlx::query("DELETE FROM faculty WHERE faculty_id = ?")
        .bind(faculty_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(deleted > 0)
}

// ============================================================================
// Classes
// ============================================================================

const CLASS_COLUMNS: &str = "id, title, course_code, faculty_id, created_at";

pub async fn list_classes(pool: &SqlitePool) -> Result<Vec<Class>> {
    let classes = sqlx::query_as::<_, Class>(&format!(
        "SELECT {} FROM classes ORDER BY id",
        CLASS_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(classes)
}

pub async fn list_classes_for_faculty(pool: &SqlitePool, faculty_id: &str) -> Result<Vec<Class>> {
    let classes = sqlx::query_as::<_, Class>(&format!(
        "SELECT {} FROM classes WHERE faculty_id = ? ORDER BY id",
        CLASS_COLUMNS
    ))
    .bind(faculty_id)
    .fetch_all(pool)
    .await?;

    Ok(classes)
}

pub async fn get_class(pool: &SqlitePool, class_id: i64) -> Result<Option<Class>> {
    let class = sqlx::query_as::<_, Class>(&format!(
        "SELECT {} FROM classes WHERE id = ?",
        CLASS_COLUMNS
    ))
    .bind(class_id)
    .fetch_optional(pool)
    .await?;

    Ok(class)
}

pub async fn insert_class(
    pool: &SqlitePool,
    class: &NewClass,
    created_at: DateTime<Utc>,
) -> Result<Class> {
    let id = sqlx::query(
        "INSERT INTO classes (title, course_code, faculty_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&class.title)
    .bind(&class.course_code)
    .bind(&class.faculty_id)
    .bind(format_timestamp(&created_at))
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Class {
        id,
        title: class.title.clone(),
        course_code: class.course_code.clone(),
        faculty_id: class.faculty_id.clone(),
        created_at,
    })
}

/// Overwrite title, course code and owner; returns false when the class does not exist
pub async fn update_class(pool: &SqlitePool, class: &Class) -> Result<bool> {
    let updated =
        sqlx::query("UPDATE classes SET title = ?, course_code = ?, faculty_id = ? WHERE id = ?")
            .bind(&class.title)
            .bind(&class.course_code)
            .bind(&class.faculty_id)
            .bind(class.id)
            .execute(pool)
            .await?
            .rows_affected();
    Ok(updated > 0)
}

/// Delete a class with its sessions and their attendance
pub async fn delete_class(pool: &SqlitePool, class_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM attendance WHERE session_id IN (SELECT id FROM sessions WHERE class_id = ?)")
        .bind(class_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM sessions WHERE class_id = ?")
        .bind(class_id)
        .execute(&mut *tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM classes WHERE id = ?")
        .bind(class_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(deleted > 0)
}

/// Session → class → faculty
pub async fn faculty_contact_for_session(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Option<FacultyContact>> {
    let contact = sqlx::query_as::<_, FacultyContact>(
        r#"
        SELECT f.faculty_id, f.name, f.email, f.phone
        FROM sessions s
        JOIN classes c ON c.id = s.class_id
        JOIN faculty f ON f.faculty_id = c.faculty_id
        WHERE s.id = ?
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(contact)
}
