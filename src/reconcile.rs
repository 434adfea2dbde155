//! Enrollment reconciliation.
//!
//! Computes the smallest set of enrollment inserts and removals that makes a
//! student's stored enrollments match a requested list of course ids. The
//! computation is pure; applying the result is the caller's job, by staging it
//! on a [`UnitOfWork`] and committing that through the gateway.
use std::collections::BTreeSet;

use log::debug;

use crate::models::{CourseId, Enrollment, NewEnrollment, StudentId};
use crate::store::UnitOfWork;

/// Courses to enroll in and enrollments to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentDelta {
    pub to_add: BTreeSet<CourseId>,
    pub to_remove: Vec<Enrollment>,
}

impl EnrollmentDelta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Stage the delta for `student_id`: one new grade-less enrollment per
    /// added course and one removal per dropped enrollment.
    pub fn stage(&self, student_id: StudentId, work: &mut UnitOfWork) {
        for &course_id in &self.to_add {
            work.insert_enrollment(NewEnrollment {
                student_id,
                course_id,
            });
        }
        for enrollment in &self.to_remove {
            work.remove_enrollment(enrollment);
        }
    }
}

/// Diff `current` against the requested selection.
///
/// An absent selection means the same as an empty one: every current
/// enrollment is dropped. Selected ids outside `all_course_ids` are ignored.
/// Additions come out in course id order, removals in the order of `current`.
pub fn reconcile(
    selected: Option<&[CourseId]>,
    current: &[Enrollment],
    all_course_ids: &BTreeSet<CourseId>,
) -> EnrollmentDelta {
    let selected: BTreeSet<CourseId> = selected.unwrap_or_default().iter().copied().collect();
    let enrolled: BTreeSet<CourseId> = current.iter().map(|e| e.course_id).collect();

    let unknown: Vec<_> = selected.difference(all_course_ids).collect();
    if !unknown.is_empty() {
        debug!("Ignoring selected course ids with no matching course: {:?}", unknown);
    }

    let to_add = selected
        .intersection(all_course_ids)
        .filter(|id| !enrolled.contains(*id))
        .copied()
        .collect();

    // Every enrollment of a deselected course goes, so duplicates cannot survive.
    let to_remove = current
        .iter()
        .filter(|e| !selected.contains(&e.course_id))
        .cloned()
        .collect();

    EnrollmentDelta { to_add, to_remove }
}

/// Enrollments for a brand-new student: the selection in order, without
/// repeats. Ids outside `all_course_ids` are ignored as in [`reconcile`].
pub fn initial_course_ids(
    selected: Option<&[CourseId]>,
    all_course_ids: &BTreeSet<CourseId>,
) -> Vec<CourseId> {
    let mut seen = BTreeSet::new();
    selected
        .unwrap_or_default()
        .iter()
        .copied()
        .filter(|id| {
            let known = all_course_ids.contains(id);
            if !known {
                debug!("Ignoring selected course id {} with no matching course", id);
            }
            known
        })
        .filter(|id| seen.insert(*id))
        .collect()
}
