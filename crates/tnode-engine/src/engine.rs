//! # Snapshot Orchestrator
//!
//! [`TestRuleEngine`] owns one run per node at a time. A run compiles the
//! directive list, applies it to a fresh working set, flattens the result
//! and replaces the node's stored snapshot as a whole.

use std::sync::Arc;

use chrono::Utc;
use tracing::Instrument;

use tnode_catalog::EntityCatalog;
use tnode_core::{
    compile, Directive, DirectiveKind, NodeId, NodeTestRuleSnapshot, RuleSnapshotStatus, TestRuleMatchInfo,
    UserId,
};
use tnode_store::{NodeSnapshot, SnapshotStore};

use crate::cache::RunCatalog;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::lock::NodeLocks;
use crate::phase::{ResolutionRun, RunPhase};
use crate::resolve::{self, ResolveContext};
use crate::working_set::WorkingSet;

/// Result of applying a directive list, before anything is persisted.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub test_rules: Vec<TestRuleMatchInfo>,
    pub theme_id: Option<String>,
    pub working_set: WorkingSet,
}

impl RunOutcome {
    pub fn is_valid(&self) -> bool {
        self.test_rules.iter().all(|r| r.is_valid)
    }

    /// Flatten into the three record sets stored for the node.
    pub fn into_snapshot(self, user_id: UserId, rule_text: String) -> NodeSnapshot {
        let node_id = self.working_set.node_id();
        let status = if self.is_valid() {
            RuleSnapshotStatus::Completed
        } else {
            RuleSnapshotStatus::CompletedWithErrors
        };

        let (test_resources, trees) = self
            .working_set
            .into_records()
            .into_iter()
            .map(|record| record.into_records(node_id, user_id))
            .unzip();

        NodeSnapshot {
            rule: NodeTestRuleSnapshot {
                node_id,
                user_id,
                rule_text,
                theme_id: self.theme_id,
                test_rules: self.test_rules,
                status,
                matched_at: Utc::now(),
            },
            test_resources,
            trees,
        }
    }
}

#[derive(Clone)]
pub struct TestRuleEngine {
    catalog: Arc<dyn EntityCatalog>,
    store: Arc<dyn SnapshotStore>,
    locks: NodeLocks,
    config: EngineConfig,
}

impl TestRuleEngine {
    pub fn new(catalog: Arc<dyn EntityCatalog>, store: Arc<dyn SnapshotStore>, config: EngineConfig) -> Self {
        Self {
            catalog,
            store,
            locks: NodeLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn locks(&self) -> &NodeLocks {
        &self.locks
    }

    /// Compile `records`, resolve them for `node_id` and replace the node's
    /// snapshot.
    ///
    /// Fails only when compilation or persistence fails; in both cases the
    /// previously stored snapshot is left as it was. Invalid directives are
    /// reported on the returned snapshot.
    pub async fn match_and_save(
        &self,
        node_id: NodeId,
        user_id: UserId,
        rule_text: impl Into<String>,
        records: Vec<Directive>,
    ) -> Result<NodeTestRuleSnapshot, EngineError> {
        let rule_text = rule_text.into();
        let _guard = self.locks.acquire(node_id).await;
        self.run(node_id, user_id, rule_text, records)
            .instrument(tracing::info_span!("test_rule_run", node_id = %node_id))
            .await
    }

    /// Re-run the node's stored directive list against the current catalog.
    /// A node with nothing stored is matched against an empty list.
    pub async fn rematch(&self, node_id: NodeId, user_id: UserId) -> Result<NodeTestRuleSnapshot, EngineError> {
        let _guard = self.locks.acquire(node_id).await;
        let (rule_text, records) = match self.store.rule_snapshot(node_id).await? {
            Some(stored) => (stored.rule_text.clone(), stored.directives()),
            None => (String::new(), Vec::new()),
        };
        self.run(node_id, user_id, rule_text, records)
            .instrument(tracing::info_span!("test_rule_rematch", node_id = %node_id))
            .await
    }

    /// Append `records` to the node's stored directive list and re-run.
    pub async fn append_rules(
        &self,
        node_id: NodeId,
        user_id: UserId,
        rule_text: &str,
        records: Vec<Directive>,
    ) -> Result<NodeTestRuleSnapshot, EngineError> {
        let _guard = self.locks.acquire(node_id).await;
        let (mut text, mut all) = match self.store.rule_snapshot(node_id).await? {
            Some(stored) => (stored.rule_text.clone(), stored.directives()),
            None => (String::new(), Vec::new()),
        };
        if !rule_text.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(rule_text);
        }
        all.extend(records);
        self.run(node_id, user_id, text, all)
            .instrument(tracing::info_span!("test_rule_append", node_id = %node_id))
            .await
    }

    /// Apply already compiled `directives` for `node_id` without persisting.
    pub async fn resolve(&self, node_id: NodeId, directives: &[Directive]) -> RunOutcome {
        let catalog = RunCatalog::new(self.catalog.as_ref(), node_id);
        catalog
            .prefetch(directives.iter().filter_map(|d| match &d.kind {
                DirectiveKind::Add { candidate, .. } => Some(candidate),
                _ => None,
            }))
            .await;

        let mut ctx = ResolveContext::new(node_id, &catalog, &self.config);
        let mut test_rules = Vec::with_capacity(directives.len());
        for directive in directives {
            test_rules.push(resolve::apply_directive(&mut ctx, directive).await);
        }

        RunOutcome {
            test_rules,
            theme_id: ctx.theme_id,
            working_set: ctx.working_set,
        }
    }

    /// Must be called with the node's lock held.
    async fn run(
        &self,
        node_id: NodeId,
        user_id: UserId,
        rule_text: String,
        records: Vec<Directive>,
    ) -> Result<NodeTestRuleSnapshot, EngineError> {
        let mut run = ResolutionRun::new(node_id);
        let result = self.run_phases(&mut run, user_id, rule_text, records).await;
        if let Err(e) = &result {
            run.abort(&e.to_string());
        }
        result
    }

    async fn run_phases(
        &self,
        run: &mut ResolutionRun,
        user_id: UserId,
        rule_text: String,
        records: Vec<Directive>,
    ) -> Result<NodeTestRuleSnapshot, EngineError> {
        let node_id = run.node_id();

        run.advance(RunPhase::Compiling)?;
        let directives = compile(records)?;
        tracing::info!(directives = directives.len(), "directives compiled");

        run.advance(RunPhase::Resolving)?;
        let outcome = self.resolve(node_id, &directives).await;

        run.advance(RunPhase::Flattening)?;
        let snapshot = outcome.into_snapshot(user_id, rule_text);
        snapshot.validate()?;

        run.advance(RunPhase::Persisting)?;
        if let Err(e) = self.store.replace_snapshot(&snapshot).await {
            tracing::error!(error = %e, "snapshot persistence failed, previous snapshot kept");
            return Err(e.into());
        }
        run.advance(RunPhase::Idle)?;

        let invalid = snapshot.rule.invalid_rules().count();
        tracing::info!(
            directives = snapshot.rule.test_rules.len(),
            invalid,
            test_resources = snapshot.test_resources.len(),
            "test rules matched"
        );
        Ok(snapshot.rule)
    }
}
