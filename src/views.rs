//! Rendering layer: maps handler outcomes onto templates.
use crate::forms::{
    DATE_FORMAT, FIELD_ENROLLMENT_DATE, FIELD_FIRST_MID_NAME, FIELD_LAST_NAME, ValidationErrors,
};
use crate::handlers::{FormMode, FormView, Outcome, SelectOption};
use crate::models::{Enrollment, Student};
use crate::router::Response;
use crate::settings::TemplateSettings;
use crate::template::{Context, TemplateValue, render_template_in};

pub const INDEX_TEMPLATE: &str = "students/index.html";
pub const CREATE_TEMPLATE: &str = "students/create.html";
pub const EDIT_TEMPLATE: &str = "students/edit.html";

pub fn render(settings: &TemplateSettings, outcome: Outcome) -> Response {
    match outcome {
        Outcome::Index(students) => {
            render_template_in(&settings.dir, INDEX_TEMPLATE, &index_context(&students))
        }
        Outcome::Form(view) => {
            let template = match view.mode {
                FormMode::Create => CREATE_TEMPLATE,
                FormMode::Edit(_) => EDIT_TEMPLATE,
            };
            render_template_in(&settings.dir, template, &form_context(&view))
        }
        Outcome::Redirect(location) => Response::redirect(&location),
        Outcome::NotFound => Response::not_found(),
        Outcome::Failure(message) => Response::server_error(message),
    }
}

fn enrollment_value(enrollment: &Enrollment) -> TemplateValue {
    let title = enrollment
        .course
        .as_ref()
        .map(|c| c.title.clone())
        .unwrap_or_else(|| format!("Course {}", enrollment.course_id));
    TemplateValue::object([
        ("course_id", TemplateValue::from(enrollment.course_id)),
        ("title", TemplateValue::from(title)),
        (
            "grade",
            TemplateValue::from(enrollment.grade.map(|g| g.to_string()).unwrap_or_default()),
        ),
    ])
}

pub fn student_value(student: &Student) -> TemplateValue {
    let enrollments: Vec<TemplateValue> = student.enrollments.iter().map(enrollment_value).collect();
    TemplateValue::object([
        ("id", TemplateValue::from(student.id)),
        ("last_name", TemplateValue::from(student.last_name.clone())),
        ("first_mid_name", TemplateValue::from(student.first_mid_name.clone())),
        ("full_name", TemplateValue::from(student.full_name())),
        (
            "enrollment_date",
            TemplateValue::from(student.enrollment_date.format(DATE_FORMAT).to_string()),
        ),
        ("enrollments", TemplateValue::from(enrollments)),
    ])
}

pub fn index_context(students: &[Student]) -> Context {
    let mut ctx = Context::new();
    ctx.insert(
        "students".to_string(),
        students.iter().map(student_value).collect::<Vec<_>>().into(),
    );
    ctx
}

fn option_value(option: &SelectOption) -> TemplateValue {
    TemplateValue::object([
        ("value", TemplateValue::from(option.value)),
        ("label", TemplateValue::from(option.label.clone())),
        ("selected", TemplateValue::from(option.selected)),
    ])
}

fn messages(errors: &ValidationErrors, field: &str) -> TemplateValue {
    errors
        .for_field(field)
        .into_iter()
        .map(TemplateValue::from)
        .collect::<Vec<_>>()
        .into()
}

pub fn form_context(view: &FormView) -> Context {
    let mut ctx = Context::new();
    let action = match view.mode {
        FormMode::Create => "/students/create".to_string(),
        FormMode::Edit(id) => {
            ctx.insert("student_id".to_string(), id.into());
            format!("/students/edit/{id}")
        }
    };
    ctx.insert("action".to_string(), action.into());
    ctx.insert(
        "student".to_string(),
        TemplateValue::object([
            ("last_name", TemplateValue::from(view.form.last_name.clone())),
            ("first_mid_name", TemplateValue::from(view.form.first_mid_name.clone())),
            ("enrollment_date", TemplateValue::from(view.form.enrollment_date.clone())),
        ]),
    );
    ctx.insert(
        "courses".to_string(),
        view.options.iter().map(option_value).collect::<Vec<_>>().into(),
    );
    ctx.insert("form_errors".to_string(), messages(&view.errors, ""));
    ctx.insert(
        "last_name_errors".to_string(),
        messages(&view.errors, FIELD_LAST_NAME),
    );
    ctx.insert(
        "first_mid_name_errors".to_string(),
        messages(&view.errors, FIELD_FIRST_MID_NAME),
    );
    ctx.insert(
        "enrollment_date_errors".to_string(),
        messages(&view.errors, FIELD_ENROLLMENT_DATE),
    );
    ctx
}
