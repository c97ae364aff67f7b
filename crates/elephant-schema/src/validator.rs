//! C5 — SchemaValidator.
//!
//! Structural validation (type, required, additionalProperties, enum,
//! minLength, pattern, nested objects/arrays) is delegated to the
//! `jsonschema` crate. On top of that, a schema may attach a `cidSchema`
//! keyword to a string-valued property node, meaning: the instance's
//! value at that path is a relative path to another JSON document, which
//! must itself validate against the schema identified by the CID named
//! in `cidSchema`, resolved through the same `SchemaCache` used for the
//! top-level schema. Recursion tracks visited file paths to terminate
//! cycles.

use crate::cache::{SchemaCache, SchemaCacheError, SchemaSource};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// One structural or referential validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub pointer: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("schema resolution failed: {0}")]
    SchemaUnavailable(#[from] SchemaCacheError),
    #[error("failed to read referenced document {path}: {cause}")]
    ReferenceRead { path: PathBuf, cause: String },
    #[error("referenced document {path} is not valid JSON: {cause}")]
    ReferenceParse { path: PathBuf, cause: String },
}

const CID_SCHEMA_KEYWORD: &str = "cidSchema";

pub struct SchemaValidator<S: SchemaSource> {
    cache: Arc<SchemaCache<S>>,
}

impl<S: SchemaSource> SchemaValidator<S> {
    #[must_use]
    pub fn new(cache: Arc<SchemaCache<S>>) -> Self {
        Self { cache }
    }

    /// Validate `value` against `schema`. `base_dir` is the directory
    /// relative paths named by `cidSchema`-tagged fields are resolved
    /// against (the directory containing the file being validated).
    pub async fn validate(
        &self,
        value: &Value,
        schema: &Value,
        base_dir: &Path,
    ) -> Result<Vec<ValidationError>, ValidatorError> {
        let mut errors = structural_errors(value, schema);

        let mut visited = HashSet::new();
        self.validate_cid_refs(value, schema, base_dir, &mut visited, &mut errors)
            .await?;

        Ok(errors)
    }

    fn validate_cid_refs<'a>(
        &'a self,
        value: &'a Value,
        schema: &'a Value,
        base_dir: &'a Path,
        visited: &'a mut HashSet<PathBuf>,
        errors: &'a mut Vec<ValidationError>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ValidatorError>> + 'a>>
    {
        Box::pin(async move {
            let Some(schema_obj) = schema.as_object() else {
                return Ok(());
            };
            let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) else {
                return Ok(());
            };
            let Some(instance_obj) = value.as_object() else {
                return Ok(());
            };

            for (prop_name, prop_schema) in properties {
                let Some(prop_obj) = prop_schema.as_object() else {
                    continue;
                };
                let Some(instance_field) = instance_obj.get(prop_name) else {
                    continue;
                };

                if let Some(schema_cid) = prop_obj.get(CID_SCHEMA_KEYWORD).and_then(Value::as_str)
                {
                    let Some(rel_path) = instance_field.as_str() else {
                        errors.push(ValidationError {
                            pointer: format!("/{prop_name}"),
                            message: "expected a string path to a referenced document".into(),
                        });
                        continue;
                    };

                    let resolved = base_dir.join(rel_path);
                    let canonical = resolved.clone();
                    if !visited.insert(canonical.clone()) {
                        // cycle: already validating this path higher up the
                        // recursion; treat as satisfied rather than looping
                        continue;
                    }

                    let bytes =
                        tokio::fs::read(&resolved)
                            .await
                            .map_err(|e| ValidatorError::ReferenceRead {
                                path: resolved.clone(),
                                cause: e.to_string(),
                            })?;
                    let child_value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                        ValidatorError::ReferenceParse {
                            path: resolved.clone(),
                            cause: e.to_string(),
                        }
                    })?;
                    let child_schema = self.cache.get(schema_cid).await?;
                    let child_base = resolved.parent().unwrap_or(base_dir).to_path_buf();

                    let mut child_errors = structural_errors(&child_value, &child_schema);
                    for err in &mut child_errors {
                        err.pointer = format!("/{prop_name}{}", err.pointer);
                    }
                    errors.append(&mut child_errors);

                    self.validate_cid_refs(
                        &child_value,
                        &child_schema,
                        &child_base,
                        visited,
                        errors,
                    )
                    .await?;
                } else if instance_field.is_object() {
                    self.validate_cid_refs(instance_field, prop_schema, base_dir, visited, errors)
                        .await?;
                }
            }
            Ok(())
        })
    }
}

fn structural_errors(value: &Value, schema: &Value) -> Vec<ValidationError> {
    match jsonschema::validator_for(schema) {
        Ok(validator) => validator
            .iter_errors(value)
            .map(|e| ValidationError {
                pointer: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect(),
        Err(e) => vec![ValidationError {
            pointer: String::new(),
            message: format!("invalid schema: {e}"),
        }],
    }
}
