use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::course::Course;
use crate::model::section::CourseSection;

/// The whole persisted progress of one user, one section per course.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maogai: Option<CourseSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mayuan: Option<CourseSection>,
    /// Top-level keys this version does not model, carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressDocument {
    /// A fresh document with an empty section for every course.
    #[must_use]
    pub fn new() -> Self {
        let mut document = Self::default();
        document.ensure_all_sections();
        document
    }

    #[must_use]
    pub fn section(&self, course: Course) -> Option<&CourseSection> {
        self.slot(course).as_ref()
    }

    pub fn section_mut(&mut self, course: Course) -> Option<&mut CourseSection> {
        self.slot_mut(course).as_mut()
    }

    /// Returns the course section, creating a default one if missing.
    ///
    /// The flag reports whether the section was created by this call.
    pub fn section_or_default(&mut self, course: Course) -> (&mut CourseSection, bool) {
        let slot = self.slot_mut(course);
        let created = slot.is_none();
        (slot.get_or_insert_with(CourseSection::default), created)
    }

    /// Remove and return the course section, leaving it absent.
    pub fn take_section(&mut self, course: Course) -> Option<CourseSection> {
        self.slot_mut(course).take()
    }

    pub fn set_section(&mut self, course: Course, section: CourseSection) {
        *self.slot_mut(course) = Some(section);
    }

    /// Materialize every missing course section. Returns true if any was added.
    pub fn ensure_all_sections(&mut self) -> bool {
        let mut created = false;
        for course in Course::ALL {
            created |= self.section_or_default(course).1;
        }
        created
    }

    pub fn sections_mut(&mut self) -> impl Iterator<Item = (Course, &mut CourseSection)> {
        [
            (Course::Maogai, self.maogai.as_mut()),
            (Course::Mayuan, self.mayuan.as_mut()),
        ]
        .into_iter()
        .filter_map(|(course, section)| section.map(|s| (course, s)))
    }

    fn slot(&self, course: Course) -> &Option<CourseSection> {
        match course {
            Course::Maogai => &self.maogai,
            Course::Mayuan => &self.mayuan,
        }
    }

    fn slot_mut(&mut self, course: Course) -> &mut Option<CourseSection> {
        match course {
            Course::Maogai => &mut self.maogai,
            Course::Mayuan => &mut self.mayuan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_document_has_both_sections() {
        let document = ProgressDocument::new();
        for course in Course::ALL {
            assert_eq!(document.section(course), Some(&CourseSection::default()));
        }
    }

    #[test]
    fn missing_section_is_created_once() {
        let mut document = ProgressDocument::default();
        assert!(document.section(Course::Mayuan).is_none());
        assert!(document.section_or_default(Course::Mayuan).1);
        assert!(!document.section_or_default(Course::Mayuan).1);
        assert!(document.ensure_all_sections());
        assert!(!document.ensure_all_sections());
    }

    #[test]
    fn unknown_top_level_keys_survive_round_trip() {
        let raw = json!({
            "maogai": CourseSection::default(),
            "mayuan": CourseSection::default(),
            "profile": {"nickname": "x"}
        });
        let document: ProgressDocument = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(document.extra.get("profile"), Some(&json!({"nickname": "x"})));
        assert_eq!(serde_json::to_value(&document).unwrap(), raw);
    }
}
