//! External resource identifiers, status codes and launch specifications.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of an external process instance, issued by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Health of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Requested from the launcher, readiness not yet observed.
    Pending,
    /// Readiness signal observed.
    Active,
    /// The launcher reported the process as failed.
    Failed,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::Active => "active",
            ResourceStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ResourceStatus::Pending),
            "active" => Some(ResourceStatus::Active),
            "failed" => Some(ResourceStatus::Failed),
            _ => None,
        }
    }
}

/// Everything the launcher needs to start one driver or controller process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub package: String,
    pub executable: String,
    pub args: String,
    /// Namespace the process is started in (the robot's absolute namespace).
    pub namespace: String,
}

impl LaunchSpec {
    pub fn new(
        package: impl Into<String>,
        executable: impl Into<String>,
        args: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            executable: executable.into(),
            args: args.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.executable)?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args)?;
        }
        write!(f, " @ {}", self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_parse_back() {
        for status in [
            ResourceStatus::Pending,
            ResourceStatus::Active,
            ResourceStatus::Failed,
        ] {
            assert_eq!(ResourceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ResourceStatus::parse("exploded"), None);
    }

    #[test]
    fn resource_id_is_transparent_on_the_wire() {
        let json = serde_json::to_string(&ResourceId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn launch_spec_display_includes_namespace() {
        let spec = LaunchSpec::new("ur_driver", "driver.launch", "ip:=10.0.0.2", "/ns/robots/arm1");
        let shown = spec.to_string();
        assert!(shown.starts_with("ur_driver/driver.launch ip:=10.0.0.2"));
        assert!(shown.ends_with("/ns/robots/arm1"));
    }
}
