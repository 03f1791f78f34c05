use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cpnode::cli::{
    append_hypervisor, append_node, config_init, config_view, effective_config,
    format_component_list, format_hypervisor_list, format_node_list, format_report,
    format_report_json, hypervisor_new, load_state, node_new, select_nodes, Cli, CommandError,
    CommandResult, Commands, ConfigAction, GetResource, HypervisorAction, NodeAction,
    ReportFormat,
};
use cpnode::config::default_config_path;
use cpnode::controller::{reconcile_all, ReconcileLoop};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified
    if let Some(ref env_file) = cli.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> CommandResult<()> {
    let config = effective_config(&cli)?;

    if let Commands::Config(args) = &cli.command {
        match &args.action {
            ConfigAction::Init { force } => {
                let path = cli.config.clone().unwrap_or_else(default_config_path);
                config_init(&config, &path, *force)?;
                println!("Wrote config to {}", path.display());
            }
            ConfigAction::View => print!("{}", config_view(&config)?),
        }
        return Ok(());
    }

    let state = load_state(config)?;

    match cli.command {
        Commands::Node(args) => match args.action {
            NodeAction::New {
                name,
                cluster,
                output,
                save,
            } => {
                let node = node_new(&state, &name, &cluster)?;
                info!("Placed node {} on {}", node.name(), node.hypervisor_name());
                if save {
                    append_node(&state.config.nodes, &node)?;
                    info!("Saved node {} to {}", node.name(), state.config.nodes.display());
                }
                print!("{}", node.specs_with(&output)?);
            }
        },

        Commands::Hypervisor(args) => match args.action {
            HypervisorAction::Add {
                name,
                ip,
                endpoint,
                public,
            } => {
                let manifest =
                    hypervisor_new(&state, &name, &ip, endpoint.as_deref(), public)?;
                append_hypervisor(&state.config.hypervisors, &manifest)?;
                info!(
                    "Added hypervisor {} to {}",
                    name,
                    state.config.hypervisors.display()
                );
                print!("{}", manifest.to_yaml()?);
            }
        },

        Commands::Config(_) => {}

        Commands::Get(args) => match args.resource {
            GetResource::Nodes => print!("{}", format_node_list(&state.nodes)),
            GetResource::Hypervisors => print!("{}", format_hypervisor_list(&state.hypervisors)),
            GetResource::Components => print!("{}", format_component_list()),
        },

        Commands::Specs(args) => print!("{}", state.nodes.specs_with(&args.output)?),

        Commands::Reconcile(args) => {
            let nodes = select_nodes(&state, args.node.as_deref())?;

            if args.watch {
                let interval = args
                    .interval
                    .unwrap_or(state.config.reconcile_interval_secs);
                info!(
                    "Reconciling {} nodes every {}s (Ctrl-C to stop)",
                    nodes.len(),
                    interval
                );
                let shutdown = async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                };
                ReconcileLoop::new(nodes)
                    .with_interval(Duration::from_secs(interval))
                    .run(shutdown)
                    .await?;
            } else {
                let report = tokio::task::spawn_blocking(move || reconcile_all(&nodes))
                    .await
                    .map_err(anyhow::Error::from)?;
                match args.output {
                    ReportFormat::Table => print!("{}", format_report(&report)),
                    ReportFormat::Json => print!("{}", format_report_json(&report)?),
                }
                if !report.is_success() {
                    return Err(CommandError::ReconcileFailed(report.failed.len()));
                }
            }
        }
    }

    Ok(())
}
