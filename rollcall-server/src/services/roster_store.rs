//! Roster Store
//!
//! Admin-side lifecycle of students, faculty and classes. Enrollment forwards
//! the student's face image to the matcher; a matcher failure leaves the
//! student saved without a template rather than failing the enrollment.

use rollcall_common::auth::{set_password, Role};
use rollcall_common::db::{
    Class, ClassUpdate, Faculty, FacultyContact, FacultyUpdate, NewClass, NewFaculty, NewStudent,
    Student, StudentUpdate,
};
use rollcall_common::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db;
use crate::error::{CoreError, CoreResult};
use crate::services::face_gateway::FaceMatchGateway;

/// Enrollment request assembled by the HTTP layer
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub student: NewStudent,
    pub password: Option<String>,
    pub image: Option<Vec<u8>>,
}

fn require_text(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[derive(Clone)]
pub struct RosterStore {
    db: SqlitePool,
    gateway: Arc<FaceMatchGateway>,
    clock: Arc<dyn Clock>,
}

impl RosterStore {
    pub fn new(db: SqlitePool, gateway: Arc<FaceMatchGateway>, clock: Arc<dyn Clock>) -> Self {
        Self { db, gateway, clock }
    }

    // ------------------------------------------------------------------
    // Students
    // ------------------------------------------------------------------

    pub async fn list_students(&self) -> CoreResult<Vec<Student>> {
        Ok(db::roster::list_students(&self.db).await?)
    }

    pub async fn get_student(&self, enrollment_no: &str) -> CoreResult<Student> {
        db::roster::get_student(&self.db, enrollment_no)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Student {}", enrollment_no)))
    }

    /// Create or refresh a student, then register the face if an image came along
    pub async fn enroll_student(&self, enrollment: Enrollment) -> CoreResult<Student> {
        let Enrollment {
            student,
            password,
            image,
        } = enrollment;

        require_text("enrollment_no", &student.enrollment_no)?;
        require_text("name", &student.name)?;
        require_text("semester", &student.semester)?;

        let saved = db::roster::upsert_student(&self.db, &student, self.clock.now()).await?;

        if let Some(password) = password {
            set_password(&self.db, Role::Student, &saved.enrollment_no, &password).await?;
        }

        let Some(image) = image else {
            info!(enrollment_no = %saved.enrollment_no, "Student enrolled without face image");
            return Ok(saved);
        };

        match self.gateway.enroll(&saved.enrollment_no, &image).await {
            Ok(template_ref) => {
                db::roster::set_face_template(&self.db, &saved.enrollment_no, &template_ref).await?;
                info!(enrollment_no = %saved.enrollment_no, "Student enrolled with face template");
                self.get_student(&saved.enrollment_no).await
            }
            Err(e) => {
                warn!(
                    enrollment_no = %saved.enrollment_no,
                    error = %e,
                    "Face registration failed; student saved without template"
                );
                Ok(saved)
            }
        }
    }

    pub async fn update_student(
        &self,
        enrollment_no: &str,
        update: StudentUpdate,
    ) -> CoreResult<Student> {
        let current = self.get_student(enrollment_no).await?;

        let name = update.name.unwrap_or(current.name);
        let semester = update.semester.unwrap_or(current.semester);
        require_text("name", &name)?;
        require_text("semester", &semester)?;

        db::roster::update_student(&self.db, enrollment_no, &name, &semester).await?;
        self.get_student(enrollment_no).await
    }

    pub async fn delete_student(&self, enrollment_no: &str) -> CoreResult<()> {
        if !db::roster::delete_student(&self.db, enrollment_no).await? {
            return Err(CoreError::NotFound(format!("Student {}", enrollment_no)));
        }
        info!(enrollment_no, "Student deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Faculty
    // ------------------------------------------------------------------

    pub async fn list_faculty(&self) -> CoreResult<Vec<Faculty>> {
        Ok(db::roster::list_faculty(&self.db).await?)
    }

    pub async fn get_faculty(&self, faculty_id: &str) -> CoreResult<Faculty> {
        db::roster::get_faculty(&self.db, faculty_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Faculty {}", faculty_id)))
    }

    pub async fn create_faculty(
        &self,
        faculty: NewFaculty,
        password: Option<String>,
    ) -> CoreResult<Faculty> {
        require_text("faculty_id", &faculty.faculty_id)?;
        require_text("name", &faculty.name)?;

        let created = db::roster::insert_faculty(&self.db, &faculty, self.clock.now()).await?;

        if let Some(password) = password {
            set_password(&self.db, Role::Faculty, &created.faculty_id, &password).await?;
        }

        info!(faculty_id = %created.faculty_id, "Faculty created");
        Ok(created)
    }

    pub async fn update_faculty(&self, faculty_id: &str, update: FacultyUpdate) -> CoreResult<Faculty> {
        let mut faculty = self.get_faculty(faculty_id).await?;

        if let Some(name) = update.name {
            require_text("name", &name)?;
            faculty.name = name;
        }
        if update.email.is_some() {
            faculty.email = update.email;
        }
        if update.phone.is_some() {
            faculty.phone = update.phone;
        }

        db::roster::update_faculty(&self.db, &faculty).await?;
        Ok(faculty)
    }

    pub async fn delete_faculty(&self, faculty_id: &str) -> CoreResult<()> {
        if !db::roster::delete_faculty(&self.db, faculty_id).await? {
            return Err(CoreError::NotFound(format!("Faculty {}", faculty_id)));
        }
        info!(faculty_id, "Faculty deleted with classes and sessions");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    pub async fn list_classes(&self) -> CoreResult<Vec<Class>> {
        Ok(db::roster::list_classes(&self.db).await?)
    }

    pub async fn classes_for_faculty(&self, faculty_id: &str) -> CoreResult<Vec<Class>> {
        self.get_faculty(faculty_id).await?;
        Ok(db::roster::list_classes_for_faculty(&self.db, faculty_id).await?)
    }

    pub async fn get_class(&self, class_id: i64) -> CoreResult<Class> {
        db::roster::get_class(&self.db, class_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Class {}", class_id)))
    }

    pub async fn create_class(&self, mut class: NewClass) -> CoreResult<Class> {
        require_text("title", &class.title)?;

        // Blank owner means unassigned
        class.faculty_id = class.faculty_id.filter(|id| !id.trim().is_empty());
        if let Some(faculty_id) = &class.faculty_id {
            self.get_faculty(faculty_id).await?;
        }

        let created = db::roster::insert_class(&self.db, &class, self.clock.now()).await?;
        info!(class_id = created.id, title = %created.title, "Class created");
        Ok(created)
    }

    /// `faculty_id: Some("")` unassigns the class
    pub async fn update_class(&self, class_id: i64, update: ClassUpdate) -> CoreResult<Class> {
        let mut class = self.get_class(class_id).await?;

        if let Some(title) = update.title {
            require_text("title", &title)?;
            class.title = title;
        }
        if update.course_code.is_some() {
            class.course_code = update.course_code;
        }
        match update.faculty_id {
            Some(id) if id.trim().is_empty() => class.faculty_id = None,
            Some(id) => {
                self.get_faculty(&id).await?;
                class.faculty_id = Some(id);
            }
            None => {}
        }

        db::roster::update_class(&self.db, &class).await?;
        Ok(class)
    }

    pub async fn delete_class(&self, class_id: i64) -> CoreResult<()> {
        if !db::roster::delete_class(&self.db, class_id).await? {
            return Err(CoreError::NotFound(format!("Class {}", class_id)));
        }
        info!(class_id, "Class deleted with sessions and attendance");
        Ok(())
    }

    /// Owning faculty of a session's class
    pub async fn faculty_contact(&self, session_id: i64) -> CoreResult<FacultyContact> {
        db::roster::faculty_contact_for_session(&self.db, session_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("No faculty contact for session {}", session_id))
            })
    }
}
