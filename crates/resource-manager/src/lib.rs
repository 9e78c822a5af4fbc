//! Local resource manager
//!
//! Watches cluster nodes enrolled with the resource label and keeps one
//! `Flavor` per node advertising its capacity and GPU characteristics.

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod k8s;

pub use infrastructure::kube_client;
pub use infrastructure::logging;
