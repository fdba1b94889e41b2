//! Read commands over stored snapshots: `tree`, `filter`, `search`,
//! `keyword`.

use anyhow::anyhow;
use clap::Args;
use tnode_core::{EntityType, NodeId, VersionRange};
use tnode_engine::{EngineConfig, TestNodeQueries};

use crate::backend::require_persistent_store;
use crate::print_json;

pub fn parse_range(raw: &str) -> Result<VersionRange, String> {
    VersionRange::parse(raw).map_err(|e| format!("invalid version range '{raw}': {e}"))
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    pub test_resource_id: String,

    /// Start at this node instead of the root.
    #[arg(long)]
    pub nid: Option<String>,

    /// Number of levels to print.
    #[arg(long)]
    pub max_deep: Option<usize>,

    /// Print the start node's children rather than the node itself.
    #[arg(long)]
    pub exclude_root: bool,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    pub test_resource_id: String,

    /// Id of the dependency to look for.
    #[arg(long)]
    pub entity_id: String,

    #[arg(long, default_value = "resource")]
    pub entity_type: EntityType,

    #[arg(long, value_parser = parse_range)]
    pub range: Option<VersionRange>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[arg(long)]
    pub node: u64,

    #[arg(long)]
    pub entity_id: String,

    #[arg(long, value_parser = parse_range)]
    pub range: Option<VersionRange>,
}

#[derive(Args, Debug)]
pub struct KeywordArgs {
    #[arg(long)]
    pub node: u64,

    pub keyword: String,
}

async fn queries() -> anyhow::Result<TestNodeQueries> {
    Ok(TestNodeQueries::new(require_persistent_store().await?, EngineConfig::from_env()))
}

pub async fn run_tree(args: &TreeArgs) -> anyhow::Result<u8> {
    let tree = queries()
        .await?
        .get_dependency_tree(&args.test_resource_id, args.nid.as_deref(), args.max_deep, !args.exclude_root)
        .await?
        .ok_or_else(|| anyhow!("no dependency tree stored for test resource {}", args.test_resource_id))?;
    print_json(&tree)?;
    Ok(0)
}

pub async fn run_filter(args: &FilterArgs) -> anyhow::Result<u8> {
    let filtered = queries()
        .await?
        .filter_dependency_tree(&args.test_resource_id, &args.entity_id, args.entity_type, args.range.as_ref())
        .await?
        .ok_or_else(|| anyhow!("no dependency tree stored for test resource {}", args.test_resource_id))?;
    print_json(&filtered)?;
    Ok(0)
}

pub async fn run_search(args: &SearchArgs) -> anyhow::Result<u8> {
    let hits = queries()
        .await?
        .search_by_dependency(NodeId(args.node), &args.entity_id, args.range.as_ref())
        .await?;
    print_json(&hits)?;
    Ok(0)
}

pub async fn run_keyword(args: &KeywordArgs) -> anyhow::Result<u8> {
    let hits = queries().await?.search_by_keyword(NodeId(args.node), &args.keyword).await?;
    print_json(&hits)?;
    Ok(0)
}
