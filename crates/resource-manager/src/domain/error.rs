use core::error::Error;

/// Failures of a flavor store.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum StoreError {
    #[display("Flavor {name} was modified since it was read")]
    Conflict { name: String },
    #[display("Flavor store failed to {operation}")]
    Backend { operation: &'static str },
}

impl Error for StoreError {}

/// Why a reconciliation pass failed.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ReconcileError {
    #[display("Failed to fetch node {node}")]
    NodeUnavailable { node: String },
    #[display("Failed to fetch the usage snapshot of node {node}")]
    UsageUnavailable { node: String },
    #[display("Usage snapshot does not belong to node {node}")]
    IdentityMismatch { node: String },
    #[display("Node {node} carries malformed resource data")]
    MalformedInput { node: String },
    #[display("Failed to resolve the provider identity")]
    IdentityLookup,
    #[display("Failed to list flavors owned by node {node}")]
    Lookup { node: String },
    #[display("Flavor {name} was modified concurrently")]
    Conflict { name: String },
    #[display("Failed to persist flavor {name}")]
    Persist { name: String },
    #[display("Failed to encode flavor {name}")]
    Encode { name: String },
    #[display("Flavor {name} owned by the node is not a K8Slice offer")]
    UnsupportedFlavorType { name: String },
}

impl Error for ReconcileError {}

impl ReconcileError {
    /// Whether running the whole pass again may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NodeUnavailable { .. }
            | Self::UsageUnavailable { .. }
            | Self::IdentityLookup
            | Self::Lookup { .. }
            | Self::Conflict { .. }
            | Self::Persist { .. } => true,
            Self::IdentityMismatch { .. }
            | Self::MalformedInput { .. }
            | Self::Encode { .. }
            | Self::UnsupportedFlavorType { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_failures() {
        assert!(ReconcileError::UsageUnavailable {
            node: "n".to_string()
        }
        .is_retryable());
        assert!(ReconcileError::Conflict {
            name: "f".to_string()
        }
        .is_retryable());
        assert!(ReconcileError::Persist {
            name: "f".to_string()
        }
        .is_retryable());
        assert!(ReconcileError::NodeUnavailable {
            node: "n".to_string()
        }
        .is_retryable());
        assert!(!ReconcileError::IdentityMismatch {
            node: "n".to_string()
        }
        .is_retryable());
        assert!(!ReconcileError::Encode {
            name: "f".to_string()
        }
        .is_retryable());
        assert!(!ReconcileError::UnsupportedFlavorType {
            name: "f".to_string()
        }
        .is_retryable());
    }
}
