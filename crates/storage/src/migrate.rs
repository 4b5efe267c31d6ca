//! Upgrades stored progress documents to the per-course sectioned schema.
//!
//! Three shapes have been written over time:
//!
//! - flat: `{"wrong": [...], "star": [...], "progress": {mode: {"list": [...]}}}`
//! - single-course: one course section stored at the top level
//! - sectioned: `{"maogai": {...}, "mayuan": {...}}` (current)
//!
//! Every function here is pure; persisting the result is up to the caller.

use quiz_core::model::{
    Course, CourseSection, ProgressDocument, ProgressKey, QuestionId,
};
use serde_json::{Map, Value};

use crate::mapping;
use crate::repository::StorageError;

/// Keys that only a course section carries; their presence rules out the flat shape.
const SECTION_MARKERS: [&str; 4] = ["by_unit", "last_choice", "global", "flags"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    Sectioned,
    LegacyFlat,
    LegacySingleCourse,
}

/// Outcome of [`upgrade`].
#[derive(Debug, Clone, PartialEq)]
pub struct Upgrade {
    pub document: ProgressDocument,
    pub shape: DocumentShape,
    /// True when the stored document differs from `document` and should be rewritten.
    pub changed: bool,
}

/// Classify a stored document by its top-level keys.
#[must_use]
pub fn detect_shape(raw: &Map<String, Value>) -> DocumentShape {
    if Course::ALL.iter().any(|c| raw.contains_key(c.as_str())) {
        return DocumentShape::Sectioned;
    }
    let has_section_markers = SECTION_MARKERS.iter().any(|k| raw.contains_key(*k));
    if raw.contains_key("wrong")
        || raw.contains_key("star")
        || (raw.contains_key("progress") && !has_section_markers)
    {
        return DocumentShape::LegacyFlat;
    }
    DocumentShape::LegacySingleCourse
}

/// Rebuild a course section from the flat shape.
///
/// Ids are filed under the unit named by their prefix (text before the first
/// `-`); ids without a prefix are skipped. Only the first stored progress mode
/// contributes to `studied`.
#[must_use]
pub fn migrate_legacy_flat(raw: &Map<String, Value>) -> CourseSection {
    let mut section = CourseSection::default();

    for id in prefixed_ids(raw.get("wrong")) {
        if let Some(unit) = id.unit_prefix() {
            section.unit_mut(unit).0.wrong.insert(&id);
            section.global.wrong.insert(&id);
        }
    }

    for id in prefixed_ids(raw.get("star")) {
        if let Some(unit) = id.unit_prefix() {
            section.unit_mut(unit).0.star.insert(&id);
            section.global.star.insert(&id);
        }
    }

    let first_mode = raw
        .get("progress")
        .and_then(Value::as_object)
        .and_then(|modes| modes.values().next());
    if let Some(mode) = first_mode {
        for id in prefixed_ids(mode.get("list")) {
            if let Some(unit) = id.unit_prefix() {
                section.unit_mut(unit).0.studied.insert(&id);
            }
        }
    }

    section
}

/// Shallow-merge a single-course document over a default section.
///
/// Stored keys replace default keys whole; nested values are not merged.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if a stored field has the wrong type.
pub fn migrate_single_course(raw: Map<String, Value>) -> Result<CourseSection, StorageError> {
    let Value::Object(mut merged) = mapping::section_to_value(&CourseSection::default())? else {
        return Err(StorageError::Serialization(
            "default course section is not an object".into(),
        ));
    };
    for (key, value) in raw {
        merged.insert(key, value);
    }
    mapping::section_from_value(Value::Object(merged))
}

/// Rewrite legacy progress keys in one section. Returns true if anything changed.
///
/// When the canonical key is already taken, the legacy entry is dropped and the
/// existing one kept.
pub fn normalize_section_keys(section: &mut CourseSection) -> bool {
    let mut changed = false;

    let legacy: Vec<(ProgressKey, ProgressKey)> = section
        .progress
        .keys()
        .filter_map(|key| key.canonical().map(|target| (key.clone(), target)))
        .collect();
    for (key, target) in legacy {
        let Some(entry) = section.progress.shift_remove(&key) else {
            continue;
        };
        if section.progress.contains_key(&target) {
            tracing::debug!(from = %key, to = %target, "dropping progress entry shadowed by canonical key");
        } else {
            section.progress.insert(target, entry);
        }
        changed = true;
    }

    if let Some(target) = section
        .current_progress_key
        .as_ref()
        .and_then(ProgressKey::without_retired_prefix)
    {
        section.current_progress_key = Some(target);
        changed = true;
    }

    changed
}

/// Normalize progress keys in every section present. Returns true if anything changed.
pub fn normalize_progress_keys(document: &mut ProgressDocument) -> bool {
    let mut changed = false;
    for (_, section) in document.sections_mut() {
        changed |= normalize_section_keys(section);
    }
    changed
}

/// Bring a stored document of any known shape to the current schema.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the document is not a JSON object
/// or its fields cannot be read as the current schema.
pub fn upgrade(raw: Value) -> Result<Upgrade, StorageError> {
    let Value::Object(map) = raw else {
        return Err(StorageError::Serialization(
            "progress document is not a JSON object".into(),
        ));
    };

    let shape = detect_shape(&map);
    let (mut document, mut changed) = match shape {
        DocumentShape::Sectioned => {
            let mut document = mapping::document_from_value(Value::Object(map))?;
            let created = document.ensure_all_sections();
            (document, created)
        }
        DocumentShape::LegacyFlat => {
            let mut document = ProgressDocument::new();
            document.set_section(Course::Maogai, migrate_legacy_flat(&map));
            (document, true)
        }
        DocumentShape::LegacySingleCourse => {
            let mut document = ProgressDocument::new();
            document.set_section(Course::Maogai, migrate_single_course(map)?);
            (document, true)
        }
    };

    changed |= normalize_progress_keys(&mut document);
    Ok(Upgrade {
        document,
        shape,
        changed,
    })
}

fn prefixed_ids(list: Option<&Value>) -> Vec<QuestionId> {
    list.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(QuestionId::new)
                .filter(|id| id.unit_prefix().is_some())
                .collect()
        })
        .unwrap_or_default()
}
