//! Student request handlers.
//!
//! Each handler talks to the gateway through `&dyn SchoolStore` and returns an
//! [`Outcome`]; `views::render` turns that into a response. The `*_route`
//! functions adapt them to the router's handler signature.
use std::collections::BTreeSet;

use log::{error, info, warn};

use crate::forms::{FormData, StudentForm, ValidationErrors};
use crate::models::{Course, CourseId, Student, StudentId};
use crate::reconcile::{initial_course_ids, reconcile};
use crate::router::{AppState, Request, Response};
use crate::store::{SchoolStore, UnitOfWork};
use crate::views;

pub const STUDENTS_PATH: &str = "/students";
pub const SAVE_FAILED_MESSAGE: &str = "Unable to save changes.";

/// One entry of the course multi-select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: CourseId,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(StudentId),
}

/// Everything the rendering layer needs to draw the student form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormView {
    pub mode: FormMode,
    pub form: StudentForm,
    pub options: Vec<SelectOption>,
    pub errors: ValidationErrors,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Index(Vec<Student>),
    Form(FormView),
    Redirect(String),
    NotFound,
    /// A read failed; the message is shown as-is.
    Failure(String),
}

/// Build the course options in the order given, marking `selected` ids.
pub fn course_options(courses: &[Course], selected: &[CourseId]) -> Vec<SelectOption> {
    let selected: BTreeSet<CourseId> = selected.iter().copied().collect();
    courses
        .iter()
        .map(|c| SelectOption {
            value: c.id,
            label: c.title.clone(),
            selected: selected.contains(&c.id),
        })
        .collect()
}

fn parse_id(raw: Option<&str>) -> Option<StudentId> {
    raw.and_then(|s| s.trim().parse().ok())
}

async fn form_outcome(
    store: &dyn SchoolStore,
    mode: FormMode,
    form: StudentForm,
    errors: ValidationErrors,
) -> Outcome {
    match store.list_courses().await {
        Ok(courses) => {
            let options = course_options(&courses, form.selected().unwrap_or_default());
            Outcome::Form(FormView {
                mode,
                form,
                options,
                errors,
            })
        }
        Err(e) => {
            error!("Failed to load courses: {}", e);
            Outcome::Failure("Unable to load courses.".to_string())
        }
    }
}

/// List every student with their enrollments.
pub async fn index(store: &dyn SchoolStore) -> Outcome {
    match store.list_students().await {
        Ok(students) => Outcome::Index(students),
        Err(e) => {
            error!("Failed to list students: {}", e);
            Outcome::Failure("Unable to load students.".to_string())
        }
    }
}

/// Empty create form with no course selected.
pub async fn create_form(store: &dyn SchoolStore) -> Outcome {
    form_outcome(
        store,
        FormMode::Create,
        StudentForm::default(),
        ValidationErrors::default(),
    )
    .await
}

/// Create a student with enrollments taken straight from the selection.
pub async fn create(store: &dyn SchoolStore, body: &FormData) -> Outcome {
    let submitted = StudentForm::bind(body);
    let fields = match submitted.validate() {
        Ok(fields) => fields,
        Err(errors) => {
            info!("Create rejected: {} validation errors", errors.entries().len());
            return form_outcome(store, FormMode::Create, submitted, errors).await;
        }
    };

    let courses = match store.list_courses().await {
        Ok(courses) => courses,
        Err(e) => {
            error!("Failed to load courses: {}", e);
            return Outcome::Failure("Unable to load courses.".to_string());
        }
    };
    let universe: BTreeSet<CourseId> = courses.iter().map(|c| c.id).collect();

    let mut work = UnitOfWork::new();
    work.insert_student(fields, initial_course_ids(submitted.selected(), &universe));
    match store.commit(work).await {
        Ok(summary) => {
            info!(
                "Created student {:?} with {} enrollments",
                summary.inserted_students, summary.added_enrollments
            );
            Outcome::Redirect(STUDENTS_PATH.to_string())
        }
        Err(e) => {
            error!("Failed to create student: {}", e);
            let mut errors = ValidationErrors::default();
            errors.add_form_error(SAVE_FAILED_MESSAGE);
            form_outcome(store, FormMode::Create, submitted, errors).await
        }
    }
}

async fn load_student(store: &dyn SchoolStore, raw_id: Option<&str>) -> Result<Student, Outcome> {
    let Some(id) = parse_id(raw_id) else {
        warn!("Edit requested without a usable student id: {:?}", raw_id);
        return Err(Outcome::NotFound);
    };
    match store.get_student(id).await {
        Ok(Some(student)) => Ok(student),
        Ok(None) => Err(Outcome::NotFound),
        Err(e) => {
            error!("Failed to load student {}: {}", id, e);
            Err(Outcome::Failure("Unable to load student.".to_string()))
        }
    }
}

/// Edit form pre-filled with the student's fields and current courses.
pub async fn edit_form(store: &dyn SchoolStore, raw_id: Option<&str>) -> Outcome {
    let student = match load_student(store, raw_id).await {
        Ok(student) => student,
        Err(outcome) => return outcome,
    };
    let form = StudentForm::from_fields(&student.fields(), student.course_ids());
    form_outcome(
        store,
        FormMode::Edit(student.id),
        form,
        ValidationErrors::default(),
    )
    .await
}

/// Apply the submitted fields and reconcile enrollments for the student named
/// by the route id. Identity fields in the body are never read.
pub async fn edit(store: &dyn SchoolStore, raw_id: Option<&str>, body: &FormData) -> Outcome {
    let student = match load_student(store, raw_id).await {
        Ok(student) => student,
        Err(outcome) => return outcome,
    };
    let mode = FormMode::Edit(student.id);
    let submitted = StudentForm::bind(body);

    let fields = match submitted.validate() {
        Ok(fields) => fields,
        Err(errors) => {
            info!("Edit of student {} rejected: validation errors", student.id);
            return form_outcome(store, mode, submitted, errors).await;
        }
    };

    let courses = match store.list_courses().await {
        Ok(courses) => courses,
        Err(e) => {
            error!("Failed to load courses: {}", e);
            return Outcome::Failure("Unable to load courses.".to_string());
        }
    };
    let universe: BTreeSet<CourseId> = courses.iter().map(|c| c.id).collect();
    let delta = reconcile(submitted.selected(), &student.enrollments, &universe);

    let mut work = UnitOfWork::new();
    work.update_student(student.id, fields);
    delta.stage(student.id, &mut work);

    match store.commit(work).await {
        Ok(_) => {
            info!(
                "Updated student {}: +{} / -{} enrollments",
                student.id,
                delta.to_add.len(),
                delta.to_remove.len()
            );
            Outcome::Redirect(STUDENTS_PATH.to_string())
        }
        Err(e) => {
            error!("Failed to save student {}: {}", student.id, e);
            let mut errors = ValidationErrors::default();
            errors.add_form_error(SAVE_FAILED_MESSAGE);
            let options = course_options(&courses, submitted.selected().unwrap_or_default());
            Outcome::Form(FormView {
                mode,
                form: submitted,
                options,
                errors,
            })
        }
    }
}

pub async fn home_route(_req: Request, _state: AppState) -> Response {
    Response::redirect(STUDENTS_PATH)
}

pub async fn index_route(_req: Request, state: AppState) -> Response {
    views::render(&state.settings.template, index(state.store.as_ref()).await)
}

pub async fn create_form_route(_req: Request, state: AppState) -> Response {
    views::render(&state.settings.template, create_form(state.store.as_ref()).await)
}

pub async fn create_route(req: Request, state: AppState) -> Response {
    views::render(
        &state.settings.template,
        create(state.store.as_ref(), &req.form).await,
    )
}

pub async fn edit_form_route(req: Request, state: AppState) -> Response {
    views::render(
        &state.settings.template,
        edit_form(state.store.as_ref(), req.param("id")).await,
    )
}

pub async fn edit_route(req: Request, state: AppState) -> Response {
    views::render(
        &state.settings.template,
        edit(state.store.as_ref(), req.param("id"), &req.form).await,
    )
}
