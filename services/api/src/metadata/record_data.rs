//! Keeping `record_data` payloads in step with the column list

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::{DataType, MetadataError, MetadataResult, data_type::is_empty};

/// The slice of a column definition needed to check a payload
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub column_id: i32,
    pub name: String,
    pub data_type: DataType,
    pub is_required: bool,
    pub is_unique: bool,
}

/// Fill every column missing from `data` with its back-fill value and drop
/// keys that no longer belong to any column.
pub fn conform(mut data: Map<String, Value>, rules: &[FieldRule]) -> Map<String, Value> {
    data.retain(|key, _| rules.iter().any(|r| r.name == *key));
    for rule in rules {
        if !data.contains_key(&rule.name) {
            data.insert(rule.name.clone(), rule.data_type.backfill_value());
        }
    }
    data
}

/// Merge a partial update into a stored payload
pub fn merge(mut stored: Map<String, Value>, changes: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in changes {
        stored.insert(key, value);
    }
    stored
}

/// Check required fields and per-type values.
///
/// `options` maps a select column's id to its allowed values.
pub fn validate(
    data: &Map<String, Value>,
    rules: &[FieldRule],
    options: &HashMap<i32, Vec<String>>,
) -> MetadataResult<()> {
    let mut problems = Vec::new();

    for rule in rules {
        let value = data.get(&rule.name).unwrap_or(&Value::Null);

        if rule.is_required && is_empty(value) {
            problems.push(format!("'{}' is required", rule.name));
            continue;
        }

        let allowed = options
            .get(&rule.column_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        if let Err(reason) = rule.data_type.validate(value, allowed) {
            problems.push(format!("'{}': {}", rule.name, reason));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(MetadataError::invalid(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> Vec<FieldRule> {
        vec![
            FieldRule {
                column_id: 1,
                name: "nombre".to_string(),
                data_type: DataType::String,
                is_required: true,
                is_unique: false,
            },
            FieldRule {
                column_id: 2,
                name: "edad".to_string(),
                data_type: DataType::Integer,
                is_required: false,
                is_unique: false,
            },
            FieldRule {
                column_id: 3,
                name: "estado".to_string(),
                data_type: DataType::Select,
                is_required: false,
                is_unique: false,
            },
        ]
    }

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_conform_backfills_and_drops_stale_keys() {
        let data = as_map(json!({"nombre": "Ana", "obsoleto": 1}));
        let conformed = conform(data, &rules());
        assert_eq!(
            Value::Object(conformed),
            json!({"nombre": "Ana", "edad": "", "estado": ""})
        );
    }

    #[test]
    fn test_merge_overwrites_only_given_keys() {
        let stored = as_map(json!({"nombre": "Ana", "edad": 30}));
        let merged = merge(stored, as_map(json!({"edad": 31})));
        assert_eq!(Value::Object(merged), json!({"nombre": "Ana", "edad": 31}));
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let options = HashMap::from([(3, vec!["activo".to_string()])]);
        let data = as_map(json!({"nombre": "", "edad": "x", "estado": "borrado"}));

        let err = validate(&data, &rules(), &options).unwrap_err();
        let MetadataError::Invalid(msg) = err else {
            panic!("expected invalid");
        };
        assert!(msg.contains("'nombre' is required"));
        assert!(msg.contains("'edad'"));
        assert!(msg.contains("'estado'"));
    }

    #[test]
    fn test_validate_accepts_conforming_payload() {
        let options = HashMap::from([(3, vec!["activo".to_string()])]);
        let data = conform(as_map(json!({"nombre": "Ana", "estado": "activo"})), &rules());
        assert!(validate(&data, &rules(), &options).is_ok());
    }
}
