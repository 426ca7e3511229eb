//! [`SystemGraph`] – introspection of the runtime graph a robot's processes
//! publish into (parameters, topics, services).
//!
//! Feature loading uses the graph to decide when a launched process is
//! ready; robot teardown uses it to drop the robot's parameters.

use std::fmt;

use async_trait::async_trait;

/// A readiness signal that a launched process is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signal {
    /// A parameter exists on the parameter server.
    Param(String),
    /// A topic is being published.
    Topic(String),
    /// A service is being advertised.
    Service(String),
}

impl Signal {
    /// The fully-qualified name of the parameter, topic or service.
    pub fn name(&self) -> &str {
        match self {
            Signal::Param(name) | Signal::Topic(name) | Signal::Service(name) => name,
        }
    }

    /// The same kind of signal, with `namespace` prepended to its name.
    pub fn prefixed(&self, namespace: &str) -> Signal {
        let join = |name: &str| format!("{}/{}", namespace.trim_end_matches('/'), name.trim_start_matches('/'));
        match self {
            Signal::Param(name) => Signal::Param(join(name)),
            Signal::Topic(name) => Signal::Topic(join(name)),
            Signal::Service(name) => Signal::Service(join(name)),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Param(name) => write!(f, "parameter '{name}'"),
            Signal::Topic(name) => write!(f, "topic '{name}'"),
            Signal::Service(name) => write!(f, "service '{name}'"),
        }
    }
}

#[async_trait]
pub trait SystemGraph: Send + Sync {
    /// Whether `signal` is currently present in the graph.
    async fn is_available(&self, signal: &Signal) -> bool;

    /// Delete every parameter under `prefix`. Returns `false` when nothing
    /// was removed or the parameter server refused.
    async fn delete_params(&self, prefix: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_joins_with_single_slash() {
        let signal = Signal::Topic("/joint_states".into()).prefixed("/lab/robot_manager/robots/arm1/");
        assert_eq!(signal, Signal::Topic("/lab/robot_manager/robots/arm1/joint_states".into()));
    }

    #[test]
    fn display_names_the_kind() {
        assert_eq!(
            Signal::Service("/a/gripper_control".into()).to_string(),
            "service '/a/gripper_control'"
        );
    }
}
