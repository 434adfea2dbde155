//! Form body parsing and student form binding.
//!
//! Submissions are `application/x-www-form-urlencoded`. The student form only
//! ever reads the keys listed in [`StudentForm`]; anything else in the body
//! (an `id`, say) is dropped at parse time.
use chrono::NaiveDate;
use log::debug;

use crate::models::{CourseId, StudentFields};

pub const MAX_NAME_LEN: usize = 50;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const FIELD_LAST_NAME: &str = "last_name";
pub const FIELD_FIRST_MID_NAME: &str = "first_mid_name";
pub const FIELD_ENROLLMENT_DATE: &str = "enrollment_date";
pub const FIELD_SELECTED_COURSES: &str = "selected_courses";

/// Decoded form body. Keys may repeat and keep their submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

impl FormData {
    pub fn parse(body: &[u8]) -> Self {
        FormData {
            pairs: url::form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        FormData {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// First value submitted for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }
}

/// Field-level messages collected while validating a form.
/// An empty field name marks a message that applies to the whole form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    entries: Vec<(String, String)>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.entries.push((field.to_string(), message.into()));
    }

    pub fn add_form_error(&mut self, message: impl Into<String>) {
        self.add("", message);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_field(&self, field: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(f, _)| f == field)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

/// Raw student form values as submitted, kept so the form can be redisplayed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentForm {
    pub last_name: String,
    pub first_mid_name: String,
    pub enrollment_date: String,
    /// `None` when the body carried no course selection at all.
    pub selected_courses: Option<Vec<CourseId>>,
}

impl StudentForm {
    pub fn bind(form: &FormData) -> Self {
        let selected_courses = if form.contains(FIELD_SELECTED_COURSES) {
            let ids = form
                .get_all(FIELD_SELECTED_COURSES)
                .into_iter()
                .filter(|raw| !raw.trim().is_empty())
                .filter_map(|raw| match raw.trim().parse::<CourseId>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        debug!("Dropping unparsable course id {:?}", raw);
                        None
                    }
                })
                .collect();
            Some(ids)
        } else {
            None
        };

        StudentForm {
            last_name: form.get(FIELD_LAST_NAME).unwrap_or_default().trim().to_string(),
            first_mid_name: form
                .get(FIELD_FIRST_MID_NAME)
                .unwrap_or_default()
                .trim()
                .to_string(),
            enrollment_date: form
                .get(FIELD_ENROLLMENT_DATE)
                .unwrap_or_default()
                .trim()
                .to_string(),
            selected_courses,
        }
    }

    pub fn from_fields(fields: &StudentFields, selected_courses: Vec<CourseId>) -> Self {
        StudentForm {
            last_name: fields.last_name.clone(),
            first_mid_name: fields.first_mid_name.clone(),
            enrollment_date: fields.enrollment_date.format(DATE_FORMAT).to_string(),
            selected_courses: Some(selected_courses),
        }
    }

    pub fn selected(&self) -> Option<&[CourseId]> {
        self.selected_courses.as_deref()
    }

    /// Check the submitted values and produce the allowed-fields DTO.
    pub fn validate(&self) -> Result<StudentFields, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_name(&mut errors, FIELD_LAST_NAME, "Last name", &self.last_name);
        check_name(&mut errors, FIELD_FIRST_MID_NAME, "First name", &self.first_mid_name);

        let enrollment_date = if self.enrollment_date.is_empty() {
            errors.add(FIELD_ENROLLMENT_DATE, "Enrollment date is required.");
            None
        } else {
            match NaiveDate::parse_from_str(&self.enrollment_date, DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add(
                        FIELD_ENROLLMENT_DATE,
                        "Enrollment date must be a date like 2024-09-01.",
                    );
                    None
                }
            }
        };

        match enrollment_date {
            Some(enrollment_date) if errors.is_empty() => Ok(StudentFields {
                last_name: self.last_name.clone(),
                first_mid_name: self.first_mid_name.clone(),
                enrollment_date,
            }),
            _ => Err(errors),
        }
    }
}

fn check_name(errors: &mut ValidationErrors, field: &str, label: &str, value: &str) {
    if value.is_empty() {
        errors.add(field, format!("{label} is required."));
    } else if value.chars().count() > MAX_NAME_LEN {
        errors.add(
            field,
            format!("{label} cannot be longer than {MAX_NAME_LEN} characters."),
        );
    }
}
