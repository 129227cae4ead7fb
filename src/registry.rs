//! Schema and transform registry.
//!
//! Lazily resolves and caches the artifacts an operation references: Avro
//! record schemas, compiled JSON-schema validators and JSONata expression
//! sources. Resolution tries three schemes in order: the `embedded:` prefix
//! reads from the compiled-in resource table, the `file:` prefix reads from
//! the filesystem, and anything else is taken as an inline literal.
//!
//! Parsed artifacts are cached for the process lifetime; the caches are
//! read-only after first use of each key.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, RwLock};

use apache_avro::Schema;
use jsonschema::Validator;

use crate::constants::{EMBEDDED_PREFIX, FILE_PREFIX};
use crate::error::{Error, Result};

/// Compiled-in schema resources, keyed by path relative to the crate root.
static EMBEDDED_RESOURCES: &[(&str, &str)] = &[
    (
        "schemas/RequestPayerCustomerOwnAccountRetrieve.avsc",
        include_str!("../schemas/RequestPayerCustomerOwnAccountRetrieve.avsc"),
    ),
    (
        "schemas/RequestOwnAccountInformationPayerBeS016.avsc",
        include_str!("../schemas/RequestOwnAccountInformationPayerBeS016.avsc"),
    ),
    (
        "schemas/RequestPayeeCustomerOwnAccountContractRetrieve.avsc",
        include_str!("../schemas/RequestPayeeCustomerOwnAccountContractRetrieve.avsc"),
    ),
    (
        "schemas/RequestOwnAccountContractBeS017.avsc",
        include_str!("../schemas/RequestOwnAccountContractBeS017.avsc"),
    ),
    (
        "schemas/ResponseOwnAccountInformationPayerBeS016.avsc",
        include_str!("../schemas/ResponseOwnAccountInformationPayerBeS016.avsc"),
    ),
    (
        "schemas/ResponsePayerCustomerOwnAccountRetrieve.avsc",
        include_str!("../schemas/ResponsePayerCustomerOwnAccountRetrieve.avsc"),
    ),
    (
        "schemas/requestPayerCustomerOwnAccountRetrieve.json",
        include_str!("../schemas/requestPayerCustomerOwnAccountRetrieve.json"),
    ),
    (
        "schemas/requestPayeeCustomerOwnAccountContractRetrieve.json",
        include_str!("../schemas/requestPayeeCustomerOwnAccountContractRetrieve.json"),
    ),
    (
        "schemas/responseOwnAccountInformationPayerBeS016.json",
        include_str!("../schemas/responseOwnAccountInformationPayerBeS016.json"),
    ),
    (
        "schemas/ataRequestPayerCustomerOwnAccountRetrieve.jsonata",
        include_str!("../schemas/ataRequestPayerCustomerOwnAccountRetrieve.jsonata"),
    ),
    (
        "schemas/ataRequestPayeeCustomerOwnAccountContractRetrieve.jsonata",
        include_str!("../schemas/ataRequestPayeeCustomerOwnAccountContractRetrieve.jsonata"),
    ),
    (
        "schemas/ataResponseOwnAccountInformationPayerBeS016.jsonata",
        include_str!("../schemas/ataResponseOwnAccountInformationPayerBeS016.jsonata"),
    ),
];

/// Process-lifetime cache of parsed schema artifacts.
pub struct SchemaRegistry {
    /// Scheme + directory prepended to bare resource names.
    location: String,
    avro: RwLock<HashMap<String, Arc<Schema>>>,
    json: RwLock<HashMap<String, Arc<Validator>>>,
    transforms: RwLock<HashMap<String, Arc<String>>>,
}

impl SchemaRegistry {
    /// Create a registry resolving bare names under `location`
    /// (e.g. `embedded:schemas/` or `file:./schemas/`).
    pub fn new(location: impl Into<String>) -> Self {
        SchemaRegistry {
            location: location.into(),
            avro: RwLock::new(HashMap::new()),
            json: RwLock::new(HashMap::new()),
            transforms: RwLock::new(HashMap::new()),
        }
    }

    /// Load and cache an Avro record schema.
    pub fn avro_schema(&self, name: &str) -> Result<Arc<Schema>> {
        if let Some(schema) = self.avro.read().unwrap().get(name) {
            return Ok(Arc::clone(schema));
        }

        let text = self.resolve(name)?;
        let schema = Schema::parse_str(&text)
            .map_err(|e| Error::SchemaInvalid(format!("{}: {}", name, e)))?;
        let schema = Arc::new(schema);
        self.avro
            .write()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&schema));
        Ok(schema)
    }

    /// Load and cache a compiled JSON-schema validator.
    pub fn json_validator(&self, name: &str) -> Result<Arc<Validator>> {
        if let Some(validator) = self.json.read().unwrap().get(name) {
            return Ok(Arc::clone(validator));
        }

        let text = self.resolve(name)?;
        let schema_value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| Error::SchemaInvalid(format!("{}: {}", name, e)))?;
        let validator = Validator::new(&schema_value)
            .map_err(|e| Error::SchemaInvalid(format!("{}: {}", name, e)))?;
        let validator = Arc::new(validator);
        self.json
            .write()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&validator));
        Ok(validator)
    }

    /// Load and cache a JSONata expression source.
    ///
    /// Only the source text is cached; the engine's compiled form borrows
    /// an arena and is rebuilt per evaluation.
    pub fn transform_expr(&self, name: &str) -> Result<Arc<String>> {
        if let Some(expr) = self.transforms.read().unwrap().get(name) {
            return Ok(Arc::clone(expr));
        }

        let text = Arc::new(self.resolve(name)?);
        self.transforms
            .write()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&text));
        Ok(text)
    }

    /// Resolve a resource reference to its text content.
    fn resolve(&self, name: &str) -> Result<String> {
        let reference = self.qualify(name);

        if let Some(path) = reference.strip_prefix(EMBEDDED_PREFIX) {
            return EMBEDDED_RESOURCES
                .iter()
                .find(|(key, _)| *key == path)
                .map(|(_, text)| text.to_string())
                .ok_or_else(|| Error::SchemaNotFound(path.to_string()));
        }

        if let Some(path) = reference.strip_prefix(FILE_PREFIX) {
            return fs::read_to_string(path)
                .map_err(|e| Error::SchemaNotFound(format!("{}: {}", path, e)));
        }

        // Inline schema literal
        Ok(reference)
    }

    /// Prepend the configured location to bare resource names.
    fn qualify(&self, name: &str) -> String {
        if name.starts_with(EMBEDDED_PREFIX)
            || name.starts_with(FILE_PREFIX)
            || name.trim_start().starts_with('{')
        {
            name.to_string()
        } else {
            format!("{}{}", self.location, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new("embedded:schemas/")
    }

    #[test]
    fn test_embedded_avro_schema_loads() {
        let registry = registry();
        let schema = registry
            .avro_schema("RequestPayerCustomerOwnAccountRetrieve.avsc")
            .unwrap();
        assert!(matches!(&*schema, Schema::Record(_)));
    }

    #[test]
    fn test_missing_resource_is_not_found() {
        let registry = registry();
        let err = registry.avro_schema("NoSuchSchema.avsc").unwrap_err();
        assert_eq!(err.kind(), "SchemaNotFound");
    }

    #[test]
    fn test_inline_schema_literal() {
        let registry = registry();
        let inline = r#"{"type": "record", "name": "Inline", "fields": [{"name": "id", "type": "string"}]}"#;
        let schema = registry.avro_schema(inline).unwrap();
        assert!(matches!(&*schema, Schema::Record(_)));
    }

    #[test]
    fn test_invalid_schema_is_schema_invalid() {
        let registry = registry();
        let err = registry
            .avro_schema(r#"{"type": "record", "name": "Broken"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), "SchemaInvalid");
    }

    #[test]
    fn test_json_validator_loads_and_caches() {
        let registry = registry();
        let first = registry
            .json_validator("requestPayerCustomerOwnAccountRetrieve.json")
            .unwrap();
        let second = registry
            .json_validator("requestPayerCustomerOwnAccountRetrieve.json")
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_transform_expr_loads() {
        let registry = registry();
        let expr = registry
            .transform_expr("ataRequestPayerCustomerOwnAccountRetrieve.jsonata")
            .unwrap();
        assert!(!expr.is_empty());
    }

    #[test]
    fn test_file_scheme_not_found() {
        let registry = SchemaRegistry::new("file:./no-such-dir/");
        let err = registry.avro_schema("missing.avsc").unwrap_err();
        assert_eq!(err.kind(), "SchemaNotFound");
    }
}
