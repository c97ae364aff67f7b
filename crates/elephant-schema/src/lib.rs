//! C4 (SchemaCache) and C5 (SchemaValidator): resolving and checking JSON
//! Schema documents identified by content address.

pub mod cache;
pub mod source;
pub mod validator;

pub use cache::{CacheStats, SchemaCache, SchemaCacheError, SchemaSource};
pub use source::HttpSchemaSource;
pub use validator::{SchemaValidator, ValidationError, ValidatorError};
