//! # tnode CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tnode_cli::query::{
    run_filter, run_keyword, run_search, run_tree, FilterArgs, KeywordArgs, SearchArgs, TreeArgs,
};
use tnode_cli::resolve::{run_rematch, run_resolve, RematchArgs, ResolveArgs};

/// Test node rule resolution.
///
/// Applies compiled test rules to a node against the entity catalog, stores
/// the resulting test resources and dependency trees, and queries them.
#[derive(Parser, Debug)]
#[command(name = "tnode", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Match a directive list for a node and store the snapshot.
    Resolve(ResolveArgs),

    /// Re-run a node's stored directives against the current catalog.
    Rematch(RematchArgs),

    /// Print a stored dependency tree.
    Tree(TreeArgs),

    /// Print the parts of a stored tree that lead to an entity.
    Filter(FilterArgs),

    /// List a node's test resources that depend on an entity.
    Search(SearchArgs),

    /// Search dependency names across a node's trees.
    Keyword(KeywordArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Resolve(args) => run_resolve(args).await,
        Commands::Rematch(args) => run_rematch(args).await,
        Commands::Tree(args) => run_tree(args).await,
        Commands::Filter(args) => run_filter(args).await,
        Commands::Search(args) => run_search(args).await,
        Commands::Keyword(args) => run_keyword(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_parse_resolve() {
        let cli = Cli::try_parse_from([
            "tnode",
            "resolve",
            "--node",
            "5",
            "--catalog",
            "catalog.json",
            "--strict",
            "rules.json",
        ])
        .unwrap();
        if let Commands::Resolve(args) = cli.command {
            assert_eq!(args.node, 5);
            assert_eq!(args.user, 0);
            assert_eq!(args.directives, PathBuf::from("rules.json"));
            assert_eq!(args.catalog, Some(PathBuf::from("catalog.json")));
            assert!(args.strict);
            assert!(!args.append);
        } else {
            panic!("expected resolve");
        }
    }

    #[test]
    fn cli_parse_resolve_requires_node() {
        assert!(Cli::try_parse_from(["tnode", "resolve", "rules.json"]).is_err());
    }

    #[test]
    fn cli_parse_tree_defaults() {
        let cli = Cli::try_parse_from(["tnode", "tree", "abc"]).unwrap();
        if let Commands::Tree(args) = cli.command {
            assert_eq!(args.test_resource_id, "abc");
            assert!(args.nid.is_none());
            assert!(args.max_deep.is_none());
            assert!(!args.exclude_root);
        } else {
            panic!("expected tree");
        }
    }

    #[test]
    fn cli_parse_filter_with_type_and_range() {
        let cli = Cli::try_parse_from([
            "tnode",
            "filter",
            "abc",
            "--entity-id",
            "o1",
            "--entity-type",
            "object",
            "--range",
            "^1",
        ])
        .unwrap();
        if let Commands::Filter(args) = cli.command {
            assert_eq!(args.entity_type, tnode_core::EntityType::Object);
            assert_eq!(args.range.unwrap().as_str(), "^1");
        } else {
            panic!("expected filter");
        }
    }

    #[test]
    fn cli_parse_rejects_bad_range() {
        let parsed = Cli::try_parse_from([
            "tnode",
            "search",
            "--node",
            "1",
            "--entity-id",
            "r",
            "--range",
            "nope nope",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn cli_parse_verbosity() {
        let cli = Cli::try_parse_from(["tnode", "-vv", "keyword", "--node", "1", "lib"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
