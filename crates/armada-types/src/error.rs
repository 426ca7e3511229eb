//! [`FleetError`] – the error taxonomy shared by every coordinator.
//!
//! The type is serialisable so that a failure raised on a remote coordinator
//! can be relayed verbatim to the caller of a forwarded request.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Global error type spanning configuration, lifecycle, routing and
/// transport failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FleetError {
    /// Missing or invalid feature configuration. Fatal to a load attempt,
    /// never to the coordinator.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// A launcher or resource-tracker call failed, or a resource never
    /// became ready.
    #[error("Resource Request Failed: {0}")]
    ResourceRequestFailed(String),

    /// Unknown robot, planning group, or loaded instance.
    #[error("Not Found: {0}")]
    NotFound(String),

    /// The planner returned no viable plan, or there is no plan to execute.
    #[error("Planning Failed: {0}")]
    PlanningFailed(String),

    /// A navigation goal or gripper command was rejected by its actuator.
    #[error("Actuation Failed: {0}")]
    ActuationFailed(String),

    /// A forwarded call to a remote coordinator could not be completed.
    #[error("Transport to '{namespace}' failed: {details}")]
    TransportFailed { namespace: String, details: String },

    /// A robot config with the same identity is already known. Benign.
    #[error("Duplicate Config: robot '{0}' is already known")]
    DuplicateConfig(String),

    /// A document or wire frame could not be encoded or decoded.
    #[error("Serialization Error: {0}")]
    Serialization(String),

    /// One link of a cause chain.
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        cause: Box<FleetError>,
    },
}

impl FleetError {
    /// Wrap `self` in a [`FleetError::Context`] link.
    pub fn context(self, context: impl Into<String>) -> Self {
        FleetError::Context {
            context: context.into(),
            cause: Box::new(self),
        }
    }

    /// The innermost error of the cause chain.
    pub fn root_cause(&self) -> &FleetError {
        let mut current = self;
        while let FleetError::Context { cause, .. } = current {
            current = cause;
        }
        current
    }

    /// Render the whole chain on one line, outermost first.
    pub fn report(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut current = self;
        while let FleetError::Context { cause, .. } = current {
            parts.push(cause.to_string());
            current = cause;
        }
        parts.join(": ")
    }
}

/// Attach context to a `Result<T, FleetError>` without unwrapping it.
pub trait FleetResultExt<T> {
    fn with_context<C, F>(self, f: F) -> Result<T, FleetError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> FleetResultExt<T> for Result<T, FleetError> {
    fn with_context<C, F>(self, f: F) -> Result<T, FleetError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.context(f()))
    }
}
