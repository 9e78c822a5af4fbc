use anyhow::Result;
use clap::Parser;
use kube::CustomResourceExt;
use nodecore_types::Flavor;
use resource_manager::app::ApplicationBuilder;
use resource_manager::config::Cli;
use resource_manager::config::Commands;
use resource_manager::config::ControllerArgs;
use resource_manager::logging;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_controller(*args).await,
        Commands::Crd => print_crd(),
    }
}

async fn run_controller(args: ControllerArgs) -> Result<()> {
    let _guard =
        logging::init(args.log_path.as_ref()).map_err(|report| anyhow::anyhow!("{report:?}"))?;

    tracing::info!("Starting local resource manager {}", env!("CARGO_PKG_VERSION"));

    let app = ApplicationBuilder::new(args).build().await?;
    app.run().await?;

    Ok(())
}

fn print_crd() -> Result<()> {
    print!("{}", serde_yaml::to_string(&Flavor::crd())?);
    Ok(())
}
