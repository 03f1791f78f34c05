//! CLI module for cpnode
//!
//! Provides kubectl-like subcommands:
//! - `cpnode node new` - Place a new control-plane node on a random hypervisor
//! - `cpnode hypervisor add` - Add a hypervisor to the pool
//! - `cpnode config` - Write or show the config file
//! - `cpnode get` - List nodes, hypervisors or components
//! - `cpnode specs` - Print the versioned manifests of all nodes
//! - `cpnode reconcile` - Reconcile nodes once or in a loop

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

pub use commands::*;
pub use display::*;

use crate::runtime::RuntimeKind;
use crate::versioned::Encoding;

#[derive(Parser, Debug)]
#[command(name = "cpnode")]
#[command(about = "Reconcile control-plane nodes onto hypervisors")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.cpnode/config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the hypervisor manifest file
    #[arg(long, global = true, value_name = "FILE")]
    pub hypervisors: Option<PathBuf>,

    /// Override the node manifest file
    #[arg(long, global = true, value_name = "FILE")]
    pub nodes: Option<PathBuf>,

    /// Override the host runtime (docker, dry-run)
    #[arg(long, global = true)]
    pub runtime: Option<RuntimeKind>,

    /// Path to a .env file (e.g. for DOCKER_HOST)
    #[arg(long, global = true, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage control-plane nodes
    Node(NodeArgs),

    /// Manage the hypervisor pool
    Hypervisor(HypervisorArgs),

    /// Manage the config file
    Config(ConfigArgs),

    /// Get/list resources
    Get(GetArgs),

    /// Print the versioned manifests of all nodes
    Specs(SpecsArgs),

    /// Reconcile node components on their hypervisors
    Reconcile(ReconcileArgs),
}

/// Arguments for the node command
#[derive(Parser, Debug)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub action: NodeAction,
}

#[derive(Subcommand, Debug)]
pub enum NodeAction {
    /// Create a node on a randomly chosen hypervisor
    New {
        /// Node name
        name: String,

        /// Cluster the node belongs to
        #[arg(long)]
        cluster: String,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        output: Encoding,

        /// Append the node to the node manifest file
        #[arg(long)]
        save: bool,
    },
}

/// Arguments for the hypervisor command
#[derive(Parser, Debug)]
pub struct HypervisorArgs {
    #[command(subcommand)]
    pub action: HypervisorAction,
}

#[derive(Subcommand, Debug)]
pub enum HypervisorAction {
    /// Append a hypervisor to the hypervisor manifest file
    Add {
        /// Hypervisor name
        name: String,

        /// Address the hypervisor is reachable at
        #[arg(long)]
        ip: String,

        /// Container runtime endpoint (e.g. tcp://10.0.0.1:2375)
        #[arg(long)]
        endpoint: Option<String>,

        /// Reachable from outside the private network
        #[arg(long)]
        public: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the effective config (defaults plus overrides) to the config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective config
    View,
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Resource type to list
    #[command(subcommand)]
    pub resource: GetResource,
}

#[derive(Subcommand, Debug)]
pub enum GetResource {
    /// List nodes
    #[command(name = "nodes", visible_alias = "node", visible_alias = "no")]
    Nodes,

    /// List hypervisors
    #[command(name = "hypervisors", visible_alias = "hypervisor", visible_alias = "hv")]
    Hypervisors,

    /// List control-plane components in reconciliation order
    #[command(name = "components", visible_alias = "component")]
    Components,
}

/// Arguments for the specs command
#[derive(Parser, Debug)]
pub struct SpecsArgs {
    /// Output format (yaml, json)
    #[arg(short, long, default_value = "yaml")]
    pub output: Encoding,
}

/// Arguments for the reconcile command
#[derive(Parser, Debug)]
pub struct ReconcileArgs {
    /// Only reconcile this node
    #[arg(long)]
    pub node: Option<String>,

    /// Keep reconciling until interrupted
    #[arg(short, long)]
    pub watch: bool,

    /// Seconds between passes in watch mode (default from config)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Report format (table, json)
    #[arg(short, long, default_value = "table")]
    pub output: ReportFormat,
}

/// How a reconcile report is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(ReportFormat::Table),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_new() {
        let cli = Cli::try_parse_from([
            "cpnode", "node", "new", "cp-1", "--cluster", "demo", "-o", "json", "--save",
        ])
        .unwrap();

        match cli.command {
            Commands::Node(NodeArgs {
                action:
                    NodeAction::New {
                        name,
                        cluster,
                        output,
                        save,
                    },
            }) => {
                assert_eq!(name, "cp-1");
                assert_eq!(cluster, "demo");
                assert_eq!(output, Encoding::Json);
                assert!(save);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "cpnode",
            "reconcile",
            "--watch",
            "--interval",
            "5",
            "--runtime",
            "dry-run",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.runtime, Some(RuntimeKind::DryRun));
        match cli.command {
            Commands::Reconcile(args) => {
                assert!(args.watch);
                assert_eq!(args.interval, Some(5));
                assert!(args.node.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_hypervisor_add() {
        let cli = Cli::try_parse_from([
            "cpnode",
            "hypervisor",
            "add",
            "hv-a",
            "--ip",
            "10.0.0.1",
            "--public",
        ])
        .unwrap();

        match cli.command {
            Commands::Hypervisor(HypervisorArgs {
                action:
                    HypervisorAction::Add {
                        name,
                        ip,
                        endpoint,
                        public,
                    },
            }) => {
                assert_eq!(name, "hv-a");
                assert_eq!(ip, "10.0.0.1");
                assert!(endpoint.is_none());
                assert!(public);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_init() {
        let cli = Cli::try_parse_from(["cpnode", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs {
                action: ConfigAction::Init { force: true }
            })
        ));
    }

    #[test]
    fn test_parse_reconcile_json() {
        let cli = Cli::try_parse_from(["cpnode", "reconcile", "-o", "json"]).unwrap();
        match cli.command {
            Commands::Reconcile(args) => assert_eq!(args.output, ReportFormat::Json),
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["cpnode", "reconcile", "-o", "yaml"]).is_err());
    }

    #[test]
    fn test_parse_get_alias() {
        let cli = Cli::try_parse_from(["cpnode", "get", "hv"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Get(GetArgs {
                resource: GetResource::Hypervisors
            })
        ));
    }

    #[test]
    fn test_parse_invalid_output() {
        assert!(Cli::try_parse_from(["cpnode", "specs", "-o", "toml"]).is_err());
    }
}
