//! Column data types and per-type value validation

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::MetadataError;

/// Data type of a logical column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    #[serde(alias = "timestamp")]
    DateTime,
    Json,
    Text,
    Uuid,
    /// Closed list of values stored in `column_options`
    Select,
    /// Reference to a column of another table
    Foreign,
    /// Nested table created together with the column
    Tabla,
}

impl DataType {
    pub const ALL: [DataType; 12] = [
        DataType::String,
        DataType::Integer,
        DataType::Decimal,
        DataType::Boolean,
        DataType::Date,
        DataType::DateTime,
        DataType::Json,
        DataType::Text,
        DataType::Uuid,
        DataType::Select,
        DataType::Foreign,
        DataType::Tabla,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Decimal => "decimal",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::Json => "json",
            DataType::Text => "text",
            DataType::Uuid => "uuid",
            DataType::Select => "select",
            DataType::Foreign => "foreign",
            DataType::Tabla => "tabla",
        }
    }

    /// Whether the column points at another table
    pub fn is_relation(&self) -> bool {
        matches!(self, DataType::Foreign | DataType::Tabla)
    }

    /// Value written into existing records when a column is added
    pub fn backfill_value(&self) -> Value {
        Value::String(String::new())
    }

    /// Check a single value against this type.
    ///
    /// Empty values (`null` or `""`) always pass; required-ness is checked
    /// separately. `options` is only consulted for `select`.
    pub fn validate(&self, value: &Value, options: &[String]) -> Result<(), String> {
        if is_empty(value) {
            return Ok(());
        }

        let ok = match self {
            DataType::String | DataType::Text => value.is_string(),
            DataType::Integer => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            DataType::Decimal => match value {
                Value::Number(_) => true,
                Value::String(s) => s.trim().parse::<f64>().is_ok(),
                _ => false,
            },
            DataType::Boolean => match value {
                Value::Bool(_) => true,
                Value::String(s) => matches!(s.as_str(), "true" | "false"),
                _ => false,
            },
            DataType::Date => value
                .as_str()
                .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
            DataType::DateTime => value.as_str().is_some_and(parses_as_datetime),
            DataType::Uuid => value.as_str().is_some_and(|s| Uuid::parse_str(s).is_ok()),
            DataType::Select => match value_as_text(value) {
                Some(text) => options.is_empty() || options.iter().any(|o| *o == text),
                None => false,
            },
            DataType::Foreign => matches!(
                value,
                Value::String(_) | Value::Number(_) | Value::Array(_)
            ),
            DataType::Json | DataType::Tabla => true,
        };

        if ok {
            Ok(())
        } else {
            Err(format!("expected a value of type {}", self))
        }
    }
}

fn parses_as_datetime(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
}

/// `null` and `""` count as "no value"
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Text form used for uniqueness checks and select options
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        if lowered == "timestamp" {
            return Ok(DataType::DateTime);
        }
        DataType::ALL
            .into_iter()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| MetadataError::invalid(format!("Unknown data type: {}", s)))
    }
}

/// Cardinality of a relation column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::OneToOne => "one_to_one",
            RelationType::OneToMany => "one_to_many",
            RelationType::ManyToMany => "many_to_many",
        }
    }
}

impl FromStr for RelationType {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "one_to_one" | "1:1" => Ok(RelationType::OneToOne),
            "one_to_many" | "1:N" | "1:n" => Ok(RelationType::OneToMany),
            "many_to_many" | "N:N" | "n:n" => Ok(RelationType::ManyToMany),
            other => Err(MetadataError::invalid(format!(
                "Unknown relation type: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_type_round_trips_through_its_name() {
        for t in DataType::ALL {
            assert_eq!(t.as_str().parse::<DataType>().unwrap(), t);
            let encoded = serde_json::to_value(t).unwrap();
            assert_eq!(encoded, json!(t.as_str()));
        }
        assert_eq!("Timestamp".parse::<DataType>().unwrap(), DataType::DateTime);
        assert!("blob".parse::<DataType>().is_err());
    }

    #[test]
    fn test_empty_values_pass_for_every_type() {
        for t in DataType::ALL {
            assert!(t.validate(&json!(""), &[]).is_ok());
            assert!(t.validate(&Value::Null, &[]).is_ok());
        }
    }

    #[test]
    fn test_numeric_types() {
        assert!(DataType::Integer.validate(&json!(12), &[]).is_ok());
        assert!(DataType::Integer.validate(&json!(" 7 "), &[]).is_ok());
        assert!(DataType::Integer.validate(&json!(1.5), &[]).is_err());
        assert!(DataType::Integer.validate(&json!("abc"), &[]).is_err());
        assert!(DataType::Decimal.validate(&json!(1.5), &[]).is_ok());
        assert!(DataType::Decimal.validate(&json!("3.25"), &[]).is_ok());
        assert!(DataType::Decimal.validate(&json!(true), &[]).is_err());
    }

    #[test]
    fn test_temporal_types() {
        assert!(DataType::Date.validate(&json!("2024-02-29"), &[]).is_ok());
        assert!(DataType::Date.validate(&json!("2023-02-29"), &[]).is_err());
        assert!(DataType::DateTime
            .validate(&json!("2024-05-01T10:30:00Z"), &[])
            .is_ok());
        assert!(DataType::DateTime
            .validate(&json!("2024-05-01T10:30"), &[])
            .is_ok());
        assert!(DataType::DateTime.validate(&json!("yesterday"), &[]).is_err());
    }

    #[test]
    fn test_select_checks_options() {
        let options = vec!["open".to_string(), "closed".to_string()];
        assert!(DataType::Select.validate(&json!("open"), &options).is_ok());
        assert!(DataType::Select.validate(&json!("pending"), &options).is_err());
        assert!(DataType::Select.validate(&json!("anything"), &[]).is_ok());
    }

    #[test]
    fn test_misc_types() {
        assert!(DataType::Boolean.validate(&json!(false), &[]).is_ok());
        assert!(DataType::Boolean.validate(&json!("yes"), &[]).is_err());
        assert!(DataType::Uuid
            .validate(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8"), &[])
            .is_ok());
        assert!(DataType::Uuid.validate(&json!("nope"), &[]).is_err());
        assert!(DataType::String.validate(&json!(3), &[]).is_err());
        assert!(DataType::Json.validate(&json!({"a": [1]}), &[]).is_ok());
        assert!(DataType::Foreign.validate(&json!([1, 2]), &[]).is_ok());
        assert!(DataType::Foreign.validate(&json!({"id": 1}), &[]).is_err());
    }

    #[test]
    fn test_relation_type_aliases() {
        assert_eq!(
            "1:N".parse::<RelationType>().unwrap(),
            RelationType::OneToMany
        );
        assert_eq!(
            "many_to_many".parse::<RelationType>().unwrap(),
            RelationType::ManyToMany
        );
        assert!("sideways".parse::<RelationType>().is_err());
    }
}
