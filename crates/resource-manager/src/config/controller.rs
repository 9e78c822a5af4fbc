use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use nodecore_types::Quantity;

#[derive(Parser, Clone, Debug)]
pub struct ControllerArgs {
    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "FLUIDOS_NAMESPACE",
        default_value = "fluidos",
        help = "Namespace flavors are created in"
    )]
    pub namespace: String,

    #[arg(
        long,
        env = "RESOURCE_NODE_LABEL",
        default_value = "node-role.fluidos.eu/resources",
        help = "Label enrolling a node when set to \"true\""
    )]
    pub resource_node_label: String,

    #[arg(
        long,
        env = "ENABLE_AUTO_DISCOVERY",
        help = "Create and refresh flavors from enrolled nodes",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enable_auto_discovery: bool,

    #[arg(
        long,
        env = "NODE_IDENTITY_CONFIG_MAP",
        default_value = "fluidos-network-manager-identity",
        help = "Config map holding the provider identity (domain, nodeID, ip)"
    )]
    pub identity_config_map: String,

    #[arg(
        long,
        env = "READINESS_SERVICE",
        help = "Service whose endpoints must be ready before flavors are published"
    )]
    pub readiness_service: Option<String>,

    #[arg(long, env = "CPU_MIN", default_value = "0", value_parser = parse_quantity)]
    pub cpu_min: Quantity,

    #[arg(long, env = "MEMORY_MIN", default_value = "0", value_parser = parse_quantity)]
    pub memory_min: Quantity,

    #[arg(long, env = "PODS_MIN", default_value = "0", value_parser = parse_quantity)]
    pub pods_min: Quantity,

    #[arg(long, env = "CPU_STEP", default_value = "1", value_parser = parse_quantity)]
    pub cpu_step: Quantity,

    #[arg(long, env = "MEMORY_STEP", default_value = "100Mi", value_parser = parse_quantity)]
    pub memory_step: Quantity,

    #[arg(long, env = "PODS_STEP", default_value = "0", value_parser = parse_quantity)]
    pub pods_step: Quantity,

    #[arg(long, env = "PRICE_AMOUNT", default_value = "", help = "Price of new flavors")]
    pub price_amount: String,

    #[arg(long, env = "PRICE_CURRENCY", default_value = "")]
    pub price_currency: String,

    #[arg(long, env = "PRICE_PERIOD", default_value = "")]
    pub price_period: String,

    #[arg(long, default_value = "networkProperty")]
    pub network_property_type: String,

    #[arg(long, default_value = "10")]
    pub location_latitude: String,

    #[arg(long, default_value = "58")]
    pub location_longitude: String,

    #[arg(long, default_value = "Italy")]
    pub location_country: String,

    #[arg(long, default_value = "Turin")]
    pub location_city: String,

    #[arg(long, default_value = "None")]
    pub location_notes: String,

    #[arg(
        long,
        default_value = "5",
        help = "Seconds to wait before retrying a failed reconciliation"
    )]
    pub retry_interval_secs: u64,

    #[arg(
        long,
        env = "LOG_PATH",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file, rotated daily"
    )]
    pub log_path: Option<PathBuf>,
}

impl ControllerArgs {
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

fn parse_quantity(s: &str) -> Result<Quantity, String> {
    Quantity::parse(s).map_err(|e| format!("Failed to parse quantity '{s}': {e}"))
}
