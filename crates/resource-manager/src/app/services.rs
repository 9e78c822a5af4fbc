use std::sync::Arc;

use kube::Client;

use crate::domain::Reconciler;

/// Long-lived components shared by the application tasks
pub struct ApplicationServices {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
}
