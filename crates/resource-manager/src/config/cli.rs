use clap::Parser;
use clap::Subcommand;

use crate::config::controller::ControllerArgs;

#[derive(Parser)]
#[command(about, long_about, version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the node to flavor controller
    Run(Box<ControllerArgs>),
    /// Print the Flavor custom resource definition as YAML
    Crd,
}
