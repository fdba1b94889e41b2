//! `tnode resolve` and `tnode rematch`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tnode_core::{Directive, NodeId, NodeTestRuleSnapshot, RuleSnapshotStatus, UserId};
use tnode_engine::{EngineConfig, TestRuleEngine};

use crate::backend::{load_catalog, open_store};
use crate::print_json;

/// Exit status when the run succeeded but some directives are invalid.
pub const EXIT_INVALID_DIRECTIVES: u8 = 2;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Node the test resources belong to.
    #[arg(long)]
    pub node: u64,

    /// User recorded as the snapshot owner.
    #[arg(long, default_value_t = 0)]
    pub user: u64,

    /// JSON array of compiled directive records.
    pub directives: PathBuf,

    /// Rule script the directives were compiled from, stored verbatim.
    #[arg(long)]
    pub rule_text: Option<PathBuf>,

    /// Catalog fixture JSON. Without it the HTTP catalog is used.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Append to the node's stored directives instead of replacing them.
    #[arg(long)]
    pub append: bool,

    /// Exit with status 2 when any directive is invalid.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct RematchArgs {
    #[arg(long)]
    pub node: u64,

    #[arg(long, default_value_t = 0)]
    pub user: u64,

    #[arg(long)]
    pub catalog: Option<PathBuf>,

    #[arg(long)]
    pub strict: bool,
}

pub fn read_directives(path: &std::path::Path) -> anyhow::Result<Vec<Directive>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading directives {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing directives {}", path.display()))
}

async fn engine(node_id: NodeId, catalog: Option<&std::path::Path>) -> anyhow::Result<TestRuleEngine> {
    let catalog = load_catalog(node_id, catalog)?;
    let store = open_store().await?;
    Ok(TestRuleEngine::new(catalog, store, EngineConfig::from_env()))
}

pub async fn run_resolve(args: &ResolveArgs) -> anyhow::Result<u8> {
    let node_id = NodeId(args.node);
    let user_id = UserId(args.user);
    let records = read_directives(&args.directives)?;
    let rule_text = match &args.rule_text {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading rule text {}", path.display()))?,
        None => String::new(),
    };

    let engine = engine(node_id, args.catalog.as_deref()).await?;
    let rule = if args.append {
        engine.append_rules(node_id, user_id, &rule_text, records).await?
    } else {
        engine.match_and_save(node_id, user_id, rule_text, records).await?
    };
    report(&rule, args.strict)
}

pub async fn run_rematch(args: &RematchArgs) -> anyhow::Result<u8> {
    let node_id = NodeId(args.node);
    let engine = engine(node_id, args.catalog.as_deref()).await?;
    let rule = engine.rematch(node_id, UserId(args.user)).await?;
    report(&rule, args.strict)
}

fn report(rule: &NodeTestRuleSnapshot, strict: bool) -> anyhow::Result<u8> {
    print_json(rule)?;
    for invalid in rule.invalid_rules() {
        tracing::warn!(
            directive_id = %invalid.id,
            text = %invalid.rule_info.text,
            errors = ?invalid.match_errors,
            "directive not applied"
        );
    }
    if strict && rule.status == RuleSnapshotStatus::CompletedWithErrors {
        return Ok(EXIT_INVALID_DIRECTIVES);
    }
    Ok(0)
}
