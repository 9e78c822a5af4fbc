//! Application module
//!
//! Builds the Kubernetes-backed collaborators, wires them into the
//! reconciler and runs the controller until shutdown.

pub mod builder;
pub mod controller;
pub mod core;
pub mod services;
pub mod tasks;

pub use builder::ApplicationBuilder;
pub use self::core::Application;
pub use services::ApplicationServices;
