//! Aggregate results of group operations

use crate::error::CloudError;
use crate::node::Node;
use crate::resource::Instance;

/// One node that could not be created or destroyed
#[derive(Debug)]
pub struct NodeFailure {
    pub name: String,
    pub error: CloudError,
}

/// Fate of a group's shared network and firewalls after a teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedResources {
    /// Last node gone; firewalls then network deleted
    Reclaimed {
        network: String,
        firewalls: Vec<String>,
    },
    /// Other instances still reference the network
    InUse { network: String, remaining: usize },
    /// Nothing to do (network already gone, or never reclaimed)
    Retained { network: String },
    /// Reclamation stopped on an error; retry with
    /// [`GroupOrchestrator::reclaim_network`](crate::GroupOrchestrator::reclaim_network)
    Failed { network: String, message: String },
}

impl SharedResources {
    pub fn network(&self) -> &str {
        match self {
            SharedResources::Reclaimed { network, .. }
            | SharedResources::InUse { network, .. }
            | SharedResources::Retained { network }
            | SharedResources::Failed { network, .. } => network,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SharedResources::Failed { .. })
    }
}

/// Result of a launch
///
/// Partial success is a normal outcome: callers decide whether to tear down
/// the created subset.
#[derive(Debug, Default)]
pub struct LaunchReport {
    pub created: Vec<Instance>,
    pub failed: Vec<NodeFailure>,
    /// Shared resources released after a launch that created nothing
    pub shared: Vec<SharedResources>,
    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl LaunchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, instance: Instance) {
        self.created.push(instance);
    }

    pub fn add_failure(&mut self, name: impl Into<String>, error: CloudError) {
        self.failed.push(NodeFailure {
            name: name.into(),
            error,
        });
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.created.iter().map(Node::from).collect()
    }

    /// All-or-nothing view: the first failure, if any
    pub fn into_result(mut self) -> Result<Vec<Instance>, CloudError> {
        if self.failed.is_empty() {
            Ok(self.created)
        } else {
            Err(self.failed.swap_remove(0).error)
        }
    }
}

#[derive(Debug, Default)]
pub struct TeardownReport {
    pub destroyed: Vec<String>,
    pub failed: Vec<NodeFailure>,
    pub shared: Vec<SharedResources>,
    pub duration_ms: u64,
}

impl TeardownReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.shared.iter().any(SharedResources::is_failed)
    }

    pub fn add_failure(&mut self, name: impl Into<String>, error: CloudError) {
        self.failed.push(NodeFailure {
            name: name.into(),
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_launch_report() {
        let mut report = LaunchReport::new();
        assert!(report.is_success());

        report.add_failure("web-2", CloudError::Cancelled("web-2".into()));
        assert!(!report.is_success());
        assert!(report.nodes().is_empty());

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, CloudError::Cancelled(name) if name == "web-2"));
    }

    #[test]
    fn test_teardown_with_failed_reclaim_is_not_success() {
        let mut report = TeardownReport::new();
        report.destroyed.push("web-1".into());
        report.shared.push(SharedResources::InUse {
            network: "gceflow-web".into(),
            remaining: 1,
        });
        assert!(report.is_success());

        report.shared.push(SharedResources::Failed {
            network: "gceflow-db".into(),
            message: "boom".into(),
        });
        assert!(!report.is_success());
        assert_eq!(report.shared[1].network(), "gceflow-db");
    }
}
