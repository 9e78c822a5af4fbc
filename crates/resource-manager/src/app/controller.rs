//! Drives the reconciler from node and flavor watch events.

use core::error::Error;
use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::runtime::controller::Action;
use kube::runtime::watcher;
use kube::runtime::Controller;
use kube::Api;
use kube::Client;
use kube::ResourceExt;
use nodecore_types::Flavor;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::domain::ReconcileError;
use crate::domain::ReconcileOutcome;
use crate::domain::Reconciler;
use crate::k8s::LABEL_ENABLED;

/// A failed pass, as handed to the controller runtime.
#[derive(Debug, derive_more::Display)]
#[display("{_0:?}")]
pub struct PassError(Report<ReconcileError>);

impl Error for PassError {}

impl PassError {
    pub fn is_retryable(&self) -> bool {
        self.0.current_context().is_retryable()
    }
}

struct Context {
    reconciler: Arc<Reconciler>,
    retry_interval: Duration,
}

async fn reconcile(node: Arc<Node>, ctx: Arc<Context>) -> Result<Action, PassError> {
    let outcome = ctx
        .reconciler
        .reconcile(&node.name_any())
        .await
        .map_err(PassError)?;
    Ok(next_action(&outcome, ctx.retry_interval))
}

fn error_policy(node: Arc<Node>, error: &PassError, ctx: Arc<Context>) -> Action {
    if error.is_retryable() {
        warn!(node = %node.name_any(), "Reconciliation failed, retrying: {error}");
        Action::requeue(ctx.retry_interval)
    } else {
        error!(node = %node.name_any(), "Reconciliation failed: {error}");
        Action::await_change()
    }
}

fn next_action(outcome: &ReconcileOutcome, retry_interval: Duration) -> Action {
    if outcome.needs_retry() {
        Action::requeue(retry_interval)
    } else {
        Action::await_change()
    }
}

/// Run the controller until `cancellation_token` fires.
///
/// Only nodes labelled `<resource_node_label>=true` are watched. Flavor
/// changes trigger a pass for their owning node.
pub async fn run(
    client: Client,
    reconciler: Arc<Reconciler>,
    retry_interval: Duration,
    cancellation_token: CancellationToken,
) {
    let selector = format!(
        "{}={LABEL_ENABLED}",
        reconciler.settings().resource_node_label
    );
    info!("Watching nodes matching {selector}");

    let nodes = Api::<Node>::all(client.clone());
    let flavors = Api::<Flavor>::all(client);
    let context = Arc::new(Context {
        reconciler,
        retry_interval,
    });

    Controller::new(nodes, watcher::Config::default().labels(&selector))
        .owns(flavors, watcher::Config::default())
        .graceful_shutdown_on(async move { cancellation_token.cancelled().await })
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((node, action)) => debug!(node = %node.name, "Reconciled, next action {action:?}"),
                Err(e) => warn!("Controller event failed: {e}"),
            }
        })
        .await;

    info!("Controller stopped");
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn only_not_ready_outcomes_are_requeued() {
        let retry = Duration::from_secs(5);
        assert_eq!(
            next_action(&ReconcileOutcome::NotReady, retry),
            Action::requeue(retry)
        );
        assert_eq!(
            next_action(
                &ReconcileOutcome::Created {
                    name: "f".to_string()
                },
                retry
            ),
            Action::await_change()
        );
        assert_eq!(
            next_action(&ReconcileOutcome::NodeNotFound, retry),
            Action::await_change()
        );
    }

    #[test]
    fn pass_errors_keep_the_classification() {
        let conflict = PassError(Report::new(ReconcileError::Conflict {
            name: "f".to_string(),
        }));
        assert!(conflict.is_retryable());

        let mismatch = PassError(Report::new(ReconcileError::IdentityMismatch {
            node: "n".to_string(),
        }));
        assert!(!mismatch.is_retryable());
    }
}
