use core::error::Error;

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, Clone, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[display("Failed to get {kind} {name}")]
    GetFailed { kind: &'static str, name: String },
}

impl Error for KubernetesError {}
