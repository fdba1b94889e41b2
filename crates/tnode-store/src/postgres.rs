//! PostgreSQL snapshot store.
//!
//! Records are stored as JSONB payloads keyed by node. A replacement runs
//! delete + re-insert of all three tables inside one transaction, so a
//! failure part-way leaves the previous snapshot in place.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tnode_core::{NodeId, NodeTestRuleSnapshot, TestResourceRecord, TestResourceTreeRecord};

use crate::{NodeSnapshot, SnapshotStore, StoreError, TestResourceFilter};

/// Connect to `DATABASE_URL` and run migrations.
///
/// Returns `None` when `DATABASE_URL` is not set.
pub async fn init_pool() -> Result<Option<PgPool>, StoreError> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, snapshots will be kept in memory only");
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;
    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

fn db_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::IdOutOfRange(id))
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    test_rules: serde_json::Value,
    node_id: i64,
    user_id: i64,
    rule_text: String,
    theme_id: Option<String>,
    status: String,
    matched_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct PayloadRow {
    payload: serde_json::Value,
}

#[derive(sqlx::FromRow)]
struct TreeRow {
    test_resource_id: String,
    node_id: i64,
    test_resource_name: String,
    dependency_tree: serde_json::Value,
}

impl TryFrom<RuleRow> for NodeTestRuleSnapshot {
    type Error = StoreError;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            node_id: NodeId(row.node_id as u64),
            user_id: tnode_core::UserId(row.user_id as u64),
            rule_text: row.rule_text,
            theme_id: row.theme_id,
            test_rules: serde_json::from_value(row.test_rules)?,
            status: serde_json::from_value(serde_json::Value::String(row.status))?,
            matched_at: row.matched_at,
        })
    }
}

impl TryFrom<TreeRow> for TestResourceTreeRecord {
    type Error = StoreError;

    fn try_from(row: TreeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            test_resource_id: row.test_resource_id,
            node_id: NodeId(row.node_id as u64),
            test_resource_name: row.test_resource_name,
            dependency_tree: serde_json::from_value(row.dependency_tree)?,
        })
    }
}

/// [`SnapshotStore`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn delete_snapshot(tx: &mut Transaction<'_, Postgres>, node_id: i64) -> Result<(), StoreError> {
    for table in ["node_test_resource_trees", "node_test_resources", "node_test_rules"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE node_id = $1"))
            .bind(node_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn insert_rule_record(
    tx: &mut Transaction<'_, Postgres>,
    rule: &NodeTestRuleSnapshot,
) -> Result<(), StoreError> {
    let status = serde_json::to_value(rule.status)?;
    sqlx::query(
        "INSERT INTO node_test_rules (node_id, user_id, rule_text, theme_id, status, test_rules, matched_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(db_id(rule.node_id.0)?)
    .bind(db_id(rule.user_id.0)?)
    .bind(&rule.rule_text)
    .bind(&rule.theme_id)
    .bind(status.as_str().unwrap_or_default())
    .bind(serde_json::to_value(&rule.test_rules)?)
    .bind(rule.matched_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_test_resources(
    tx: &mut Transaction<'_, Postgres>,
    node_id: i64,
    records: &[TestResourceRecord],
) -> Result<(), StoreError> {
    for (position, record) in records.iter().enumerate() {
        sqlx::query(
            "INSERT INTO node_test_resources
                (test_resource_id, node_id, position, test_resource_name, resource_type, payload)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.test_resource_id)
        .bind(node_id)
        .bind(position as i32)
        .bind(&record.test_resource_name)
        .bind(&record.resource_type)
        .bind(serde_json::to_value(record)?)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_trees(
    tx: &mut Transaction<'_, Postgres>,
    node_id: i64,
    trees: &[TestResourceTreeRecord],
) -> Result<(), StoreError> {
    for (position, tree) in trees.iter().enumerate() {
        sqlx::query(
            "INSERT INTO node_test_resource_trees
                (test_resource_id, node_id, position, test_resource_name, dependency_tree)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&tree.test_resource_id)
        .bind(node_id)
        .bind(position as i32)
        .bind(&tree.test_resource_name)
        .bind(serde_json::to_value(&tree.dependency_tree)?)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn replace_snapshot(&self, snapshot: &NodeSnapshot) -> Result<(), StoreError> {
        snapshot.validate()?;
        let node_id = db_id(snapshot.node_id().0)?;

        let mut tx = self.pool.begin().await?;
        delete_snapshot(&mut tx, node_id).await?;
        insert_rule_record(&mut tx, &snapshot.rule).await?;
        insert_test_resources(&mut tx, node_id, &snapshot.test_resources).await?;
        insert_trees(&mut tx, node_id, &snapshot.trees).await?;
        tx.commit().await?;

        tracing::debug!(
            node_id = %snapshot.node_id(),
            test_resources = snapshot.test_resources.len(),
            "snapshot replaced in PostgreSQL"
        );
        Ok(())
    }

    async fn rule_snapshot(&self, node_id: NodeId) -> Result<Option<NodeTestRuleSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, RuleRow>(
            "SELECT node_id, user_id, rule_text, theme_id, status, test_rules, matched_at
             FROM node_test_rules WHERE node_id = $1",
        )
        .bind(db_id(node_id.0)?)
        .fetch_optional(&self.pool)
        .await?;
        row.map(NodeTestRuleSnapshot::try_from).transpose()
    }

    async fn test_resource(&self, test_resource_id: &str) -> Result<Option<TestResourceRecord>, StoreError> {
        let row = sqlx::query_as::<_, PayloadRow>(
            "SELECT payload FROM node_test_resources WHERE test_resource_id = $1",
        )
        .bind(test_resource_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| serde_json::from_value(r.payload)).transpose()?)
    }

    async fn test_resources(&self, filter: &TestResourceFilter) -> Result<Vec<TestResourceRecord>, StoreError> {
        let node_id = filter.node_id.ok_or(StoreError::MissingNode)?;
        let rows = sqlx::query_as::<_, PayloadRow>(
            "SELECT payload FROM node_test_resources WHERE node_id = $1 ORDER BY position",
        )
        .bind(db_id(node_id.0)?)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record: TestResourceRecord = serde_json::from_value(row.payload)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn dependency_tree(&self, test_resource_id: &str) -> Result<Option<TestResourceTreeRecord>, StoreError> {
        let row = sqlx::query_as::<_, TreeRow>(
            "SELECT test_resource_id, node_id, test_resource_name, dependency_tree
             FROM node_test_resource_trees WHERE test_resource_id = $1",
        )
        .bind(test_resource_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TestResourceTreeRecord::try_from).transpose()
    }

    async fn dependency_trees(&self, node_id: NodeId) -> Result<Vec<TestResourceTreeRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TreeRow>(
            "SELECT test_resource_id, node_id, test_resource_name, dependency_tree
             FROM node_test_resource_trees WHERE node_id = $1 ORDER BY position",
        )
        .bind(db_id(node_id.0)?)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TestResourceTreeRecord::try_from).collect()
    }
}
