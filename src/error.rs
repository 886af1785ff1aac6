use thiserror::Error;

/// Convenience result type used across the crate.
pub type MapResult<T> = Result<T, MapError>;

/// Broad classification of a [`MapError`].
///
/// Data-quality findings from compliance checks are not errors and never show up here; see
/// [`crate::compliance::ValidationOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// Bad mapping/schema configuration. Raised while building, never while transforming.
    Configuration,
    /// A field could not be resolved for a particular record.
    Resolution,
    /// A value had an unexpected shape (e.g. non-string value handed to whitespace cleanup).
    MalformedValue,
    /// Reading or writing records failed (I/O, CSV, JSON framing).
    Input,
}

/// Error type shared by resolution, building, processing and ingestion.
#[derive(Debug, Error)]
pub enum MapError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text read/write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parse/serialise error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A mapping or datasource referenced a target field that was never declared.
    #[error("record transformer does not contain the target field '{field}'")]
    NoSuchTargetField { field: String },

    /// A lookup was requested for a field with no registered datasource.
    #[error("no datasource registered for target field '{field}'")]
    NoDatasourceForField { field: String },

    /// The datasource exists but has no operation for the requested field.
    #[error("registered datasource of type '{datasource_type}' has no lookup operation '{operation}'")]
    NoSuchLookupMethod {
        datasource_type: String,
        operation: String,
    },

    /// A lookup asked the value map for a field it does not hold.
    #[error("no value resolver registered for field '{field}'")]
    UnregisteredValue { field: String },

    /// A datasource operation itself failed.
    #[error("lookup of field '{field}' on datasource '{datasource_type}' failed: {message}")]
    Lookup {
        datasource_type: String,
        field: String,
        message: String,
    },

    /// A mapped field used a `source` other than `record`, `lookup` or `value`.
    #[error("field '{field}' has unrecognized mapping source '{source_kind}' (expected record, lookup or value)")]
    UnknownFieldSource { field: String, source_kind: String },

    /// A `record` or `value` field is missing its `value` parameter.
    #[error("field '{field}' with source '{source_kind}' requires a 'value' parameter")]
    MissingFieldParameter { field: String, source_kind: String },

    /// A required configuration section or key is absent.
    #[error("missing configuration section '{section}'")]
    MissingConfigSection { section: String },

    #[error("no transform map named '{name}' in mapping configuration")]
    UnknownMap { name: String },

    #[error("no datasource named '{name}' in mapping configuration")]
    UnknownSource { name: String },

    #[error("no database named '{name}' in mapping configuration")]
    UnknownDatabase { name: String },

    #[error("no record type named '{name}' in schema configuration")]
    UnknownRecordType { name: String },

    #[error("field '{field}' declares unknown data type '{type_name}'")]
    UnknownDataType { field: String, type_name: String },

    /// A source config named a datasource class missing from the factory registry.
    #[error("datasource class '{class}' is not registered")]
    UnregisteredDatasourceType { class: String },

    #[error("the environment variable {var} has not been set")]
    MissingEnvironmentVar { var: String },

    /// Whitespace cleanup (strict policy) received a value that is not a string.
    #[error("field '{field}' holds a non-string value and cannot be whitespace-normalized")]
    NonStringValue { field: String },

    /// The input does not have the expected shape.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// Parallel execution options out of range.
    #[error("invalid execution options: {message}")]
    InvalidExecutionOptions { message: String },

    /// Building the worker pool for parallel execution failed.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl MapError {
    /// Classify this error into the failure taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoSuchTargetField { .. }
            | Self::UnknownFieldSource { .. }
            | Self::MissingFieldParameter { .. }
            | Self::MissingConfigSection { .. }
            | Self::UnknownMap { .. }
            | Self::UnknownSource { .. }
            | Self::UnknownDatabase { .. }
            | Self::UnknownRecordType { .. }
            | Self::UnknownDataType { .. }
            | Self::UnregisteredDatasourceType { .. }
            | Self::MissingEnvironmentVar { .. }
            | Self::Yaml(_)
            | Self::InvalidExecutionOptions { .. }
            | Self::ThreadPool(_) => ErrorCategory::Configuration,
            Self::NoDatasourceForField { .. }
            | Self::NoSuchLookupMethod { .. }
            | Self::UnregisteredValue { .. }
            | Self::Lookup { .. } => ErrorCategory::Resolution,
            Self::NonStringValue { .. } => ErrorCategory::MalformedValue,
            Self::Io(_) | Self::Csv(_) | Self::Json(_) | Self::SchemaMismatch { .. } => ErrorCategory::Input,
        }
    }

    pub(crate) fn no_such_target_field(field: &str) -> Self {
        Self::NoSuchTargetField {
            field: field.to_string(),
        }
    }
}
