//! # tnode-cli — Test Node Command-Line Interface
//!
//! ## Subcommands
//!
//! - `resolve` — match a directive list for a node and store the snapshot
//! - `rematch` — re-run a node's stored directives
//! - `tree` — print a stored dependency tree
//! - `filter` — print the paths of a stored tree leading to an entity
//! - `search` — list test resources depending on an entity
//! - `keyword` — search dependency names across a node's trees
//!
//! Handlers only wire backends together and print JSON; all matching and
//! tree logic lives in the library crates.

pub mod backend;
pub mod query;
pub mod resolve;

use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
