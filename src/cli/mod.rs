//! CLI command handling module
//!
//! Argument parsing and dispatch for the `meshcfg` binary. Engine commands
//! print JSON on stdout; logs and errors go to stderr.

mod commands;
mod logging;
mod version;

pub use commands::{ConfigSubcommand, handle_config_command};
pub use logging::init_logging;
pub use version::display_version;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Aggregate, cross-reference and validate Istio and Gateway-API configuration
#[derive(Parser, Debug)]
#[command(name = "meshcfg")]
#[command(about = "Aggregates and validates Istio and Gateway-API configuration", long_about = None)]
pub struct Args {
    /// Write debug logs to a temporary file instead of stderr
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true)]
    pub context: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List config objects with their validations
    List {
        /// Namespace to list (defaults to the configured defaultNamespace)
        #[arg(long, short = 'n', conflicts_with = "all_namespaces")]
        namespace: Option<String>,

        /// List every namespace
        #[arg(long = "all-namespaces", short = 'A')]
        all_namespaces: bool,

        /// Only these kinds (object type, resource name or Kubernetes kind)
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<String>,

        /// Label selector passed to the API server
        #[arg(long, short = 'l')]
        selector: Option<String>,

        /// Skip reference resolution and validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Show one object with references, validation and permissions
    Get {
        namespace: String,
        /// Kind (e.g. virtualservices, k8shttproute, DestinationRule)
        kind: String,
        name: String,
    },

    /// Show allowed verbs per kind
    Permissions {
        #[arg(required = true)]
        namespaces: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version information
    Version,
}

/// Dispatch a parsed command line
pub async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::List {
            namespace,
            all_namespaces,
            kinds,
            selector,
            no_validate,
        } => {
            let request = commands::ListRequest {
                namespace,
                all_namespaces,
                kinds,
                selector,
                validate: !no_validate,
            };
            commands::handle_list(args.context.as_deref(), request).await
        }
        Command::Get {
            namespace,
            kind,
            name,
        } => commands::handle_get(args.context.as_deref(), &namespace, &kind, &name).await,
        Command::Permissions { namespaces } => {
            commands::handle_permissions(args.context.as_deref(), &namespaces).await
        }
        Command::Config { subcommand } => handle_config_command(subcommand),
        Command::Version => {
            display_version();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_flags() {
        let args = Args::try_parse_from([
            "meshcfg", "list", "-n", "bookinfo", "--kinds", "vs,gateways", "--no-validate",
        ])
        .unwrap();
        match args.command {
            Command::List {
                namespace,
                kinds,
                no_validate,
                all_namespaces,
                ..
            } => {
                assert_eq!(namespace.as_deref(), Some("bookinfo"));
                assert_eq!(kinds, vec!["vs", "gateways"]);
                assert!(no_validate);
                assert!(!all_namespaces);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_namespace_conflicts_with_all() {
        assert!(Args::try_parse_from(["meshcfg", "list", "-n", "a", "-A"]).is_err());
        assert!(Args::try_parse_from(["meshcfg", "permissions"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "meshcfg", "get", "bookinfo", "virtualservices", "reviews", "--debug", "--context", "kind",
        ])
        .unwrap();
        assert!(args.debug);
        assert_eq!(args.context.as_deref(), Some("kind"));
    }
}
