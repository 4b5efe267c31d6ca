use quiz_core::model::{CourseSection, ProgressDocument};
use serde_json::Value;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn document_from_value(value: Value) -> Result<ProgressDocument, StorageError> {
    serde_json::from_value(value).map_err(ser)
}

pub(crate) fn document_to_value(document: &ProgressDocument) -> Result<Value, StorageError> {
    serde_json::to_value(document).map_err(ser)
}

pub(crate) fn section_from_value(value: Value) -> Result<CourseSection, StorageError> {
    serde_json::from_value(value).map_err(ser)
}

pub(crate) fn section_to_value(section: &CourseSection) -> Result<Value, StorageError> {
    serde_json::to_value(section).map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrong_field_types_are_serialization_errors() {
        let err = document_from_value(json!({"maogai": {"by_unit": []}})).unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn section_round_trips() {
        let section = CourseSection::default();
        let value = section_to_value(&section).unwrap();
        assert_eq!(section_from_value(value).unwrap(), section);
    }
}
