//! Uniform result envelope for outward operations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vaultlink_core::{DocPath, Error};

/// Why an operation failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// Stable machine-readable code, e.g. `validation_error`
    pub code: String,
    pub message: String,
    /// Individual problems, for errors that aggregate several
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl From<&Error> for OperationError {
    fn from(err: &Error) -> Self {
        let details = match err {
            Error::BatchValidation { errors } => errors.clone(),
            _ => Vec::new(),
        };
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            details,
        }
    }
}

/// Result envelope returned by every [`LinkService`](crate::LinkService)
/// operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome<T> {
    /// Operation name, e.g. `move_document`
    pub operation: String,
    pub success: bool,
    /// Documents the operation touched or reported on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_paths: Vec<DocPath>,
    /// Named counters, e.g. `links_updated`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counts: BTreeMap<String, usize>,
    /// Payload of a successful operation
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    /// How long the operation took in milliseconds
    pub duration_ms: u64,
}

impl<T> OperationOutcome<T> {
    /// Successful outcome carrying `data`
    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self {
            operation: operation.into(),
            success: true,
            affected_paths: Vec::new(),
            counts: BTreeMap::new(),
            data: Some(data),
            error: None,
            duration_ms: 0,
        }
    }

    /// Failed outcome describing `err`
    pub fn failure(operation: impl Into<String>, err: &Error) -> Self {
        Self {
            operation: operation.into(),
            success: false,
            affected_paths: Vec::new(),
            counts: BTreeMap::new(),
            data: None,
            error: Some(err.into()),
            duration_ms: 0,
        }
    }

    /// Record affected documents
    pub fn with_affected(mut self, paths: impl IntoIterator<Item = DocPath>) -> Self {
        for path in paths {
            if !self.affected_paths.contains(&path) {
                self.affected_paths.push(path);
            }
        }
        self
    }

    /// Set a named counter
    pub fn with_count(mut self, name: impl Into<String>, value: usize) -> Self {
        self.counts.insert(name.into(), value);
        self
    }

    /// Set operation time
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    /// Value of a named counter, zero when unset
    pub fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Payload or error, for callers that prefer `Result`
    pub fn into_result(self) -> std::result::Result<T, OperationError> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(OperationError {
                code: "other".to_string(),
                message: format!("{} produced no data", self.operation),
                details: Vec::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_batch_details() {
        let err = Error::batch_validation(vec!["a".into(), "b".into()]);
        let outcome: OperationOutcome<()> = OperationOutcome::failure("batch_move", &err);

        assert!(!outcome.success);
        let error = outcome.error.as_ref().unwrap();
        assert_eq!(error.code, "batch_validation_error");
        assert_eq!(error.details, vec!["a", "b"]);
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let outcome = OperationOutcome::success("get_backlinks", vec!["A.md"])
            .with_affected([DocPath::new("B.md").unwrap()])
            .with_count("backlinks", 1)
            .with_duration(3);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["operation"], "get_backlinks");
        assert_eq!(json["success"], true);
        assert_eq!(json["affected_paths"][0], "B.md");
        assert_eq!(json["counts"]["backlinks"], 1);
        assert_eq!(json["data"][0], "A.md");
        assert!(json.get("error").is_none());
        assert_eq!(json["duration_ms"], 3);
    }
}
