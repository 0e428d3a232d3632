//! Name validation and generated names

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use super::{MetadataError, MetadataResult};

const MAX_NAME_LEN: usize = 255;

/// Lowercase, strip diacritics, drop everything that is not `[a-z0-9]`.
pub fn normalize_table_name(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Deterministic name of the join table between two tables
pub fn join_table_name(original: &str, foreign: &str) -> String {
    format!(
        "{} - {}",
        normalize_table_name(original),
        normalize_table_name(foreign)
    )
}

/// Trim and check a user-supplied table, column or module name
pub fn validate_name(kind: &str, name: &str) -> MetadataResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(MetadataError::invalid(format!("{} name is required", kind)));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(MetadataError::invalid(format!(
            "{} name must be at most {} characters long",
            kind, MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize_table_name("Clientes"), "clientes");
        assert_eq!(normalize_table_name("Órdenes de Compra!"), "ordenesdecompra");
        assert_eq!(normalize_table_name("Año 2024"), "ano2024");
        assert_eq!(normalize_table_name("  "), "");
    }

    #[test]
    fn test_join_table_name() {
        assert_eq!(join_table_name("Clientes", "Pedidos"), "clientes - pedidos");
        assert_eq!(
            join_table_name("Categoría", "Artículos"),
            "categoria - articulos"
        );
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("Table", "  Ventas ").unwrap(), "Ventas");
        assert!(matches!(
            validate_name("Column", "   "),
            Err(MetadataError::Invalid(_))
        ));
        assert!(validate_name("Column", &"x".repeat(256)).is_err());
        assert!(validate_name("Column", &"é".repeat(255)).is_ok());
    }
}
