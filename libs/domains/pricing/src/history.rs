use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entity::history::{ActiveModel, Column, Entity};
use crate::error::PricingResult;
use crate::models::{ComparisonRecord, TemplatePopularity};

/// Store of served comparisons, read back for analytics
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComparisonHistory: Send + Sync {
    /// Persist a record, returning its id
    async fn record(&self, record: ComparisonRecord) -> PricingResult<Uuid>;

    /// Newest records first
    async fn recent(&self, limit: u64) -> PricingResult<Vec<ComparisonRecord>>;

    /// Records created in `[start, end]`
    async fn count_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PricingResult<u64>;

    /// Templates by number of comparisons since `since`, most used first
    async fn popular_templates(
        &self,
        since: DateTime<Utc>,
    ) -> PricingResult<Vec<TemplatePopularity>>;
}

/// Most used first, ties by template id
fn rank_templates(counts: BTreeMap<i64, u64>) -> Vec<TemplatePopularity> {
    let mut ranked: Vec<TemplatePopularity> = counts
        .into_iter()
        .map(|(template_id, comparisons)| TemplatePopularity {
            template_id,
            comparisons,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.comparisons
            .cmp(&a.comparisons)
            .then(a.template_id.cmp(&b.template_id))
    });
    ranked
}

#[derive(Default)]
pub struct InMemoryComparisonHistory {
    records: RwLock<Vec<ComparisonRecord>>,
}

impl InMemoryComparisonHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ComparisonRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl ComparisonHistory for InMemoryComparisonHistory {
    async fn record(&self, record: ComparisonRecord) -> PricingResult<Uuid> {
        let id = record.id;
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn recent(&self, limit: u64) -> PricingResult<Vec<ComparisonRecord>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(records)
    }

    async fn count_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PricingResult<u64> {
        let records = self.records.read().await;
        let count = records
            .iter()
            .filter(|r| r.created_at >= start && r.created_at <= end)
            .count();
        Ok(count as u64)
    }

    async fn popular_templates(
        &self,
        since: DateTime<Utc>,
    ) -> PricingResult<Vec<TemplatePopularity>> {
        let mut counts = BTreeMap::new();
        for record in self.records.read().await.iter() {
            if record.created_at >= since {
                *counts.entry(record.template_id).or_insert(0) += 1;
            }
        }
        Ok(rank_templates(counts))
    }
}

/// PostgreSQL implementation of ComparisonHistory
#[derive(Clone)]
pub struct PgComparisonHistory {
    db: DatabaseConnection,
}

impl PgComparisonHistory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ComparisonHistory for PgComparisonHistory {
    async fn record(&self, record: ComparisonRecord) -> PricingResult<Uuid> {
        let id = record.id;
        let model: ActiveModel = record.into();
        Entity::insert(model).exec_without_returning(&self.db).await?;
        Ok(id)
    }

    async fn recent(&self, limit: u64) -> PricingResult<Vec<ComparisonRecord>> {
        let rows = Entity::find()
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PricingResult<u64> {
        let count = Entity::find()
            .filter(Column::CreatedAt.between(start, end))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn popular_templates(
        &self,
        since: DateTime<Utc>,
    ) -> PricingResult<Vec<TemplatePopularity>> {
        let rows = Entity::find()
            .filter(Column::CreatedAt.gte(since))
            .select_only()
            .column(Column::TemplateId)
            .column_as(Column::Id.count(), "uses")
            .group_by(Column::TemplateId)
            .into_tuple::<(i64, i64)>()
            .all(&self.db)
            .await?;

        let counts = rows
            .into_iter()
            .map(|(template_id, uses)| (template_id, uses.max(0) as u64))
            .collect();
        Ok(rank_templates(counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::history::Model;
    use crate::models::{ClientInfo, CloudProvider, ComparisonResult, Currency, Money};
    use chrono::{NaiveDate, TimeDelta};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use serde_json::Map;

    fn record() -> ComparisonRecord {
        let result = ComparisonResult {
            region: "us-east-1".to_string(),
            as_of: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            currency: Currency::Usd,
            estimates: vec![],
            cheapest_provider: Some(CloudProvider::Gcp),
            max_savings: Some(Money::new(410, Currency::Usd)),
        };
        let client = ClientInfo {
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: Some("curl/8.0".to_string()),
        };
        ComparisonRecord::new(1, &Map::new(), &result, true, &client)
    }

    fn at(template_id: i64, created_at: DateTime<Utc>) -> ComparisonRecord {
        ComparisonRecord {
            template_id,
            created_at,
            ..record()
        }
    }

    fn noon() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z")
            .unwrap()
            .to_utc()
    }

    async fn seeded() -> InMemoryComparisonHistory {
        let history = InMemoryComparisonHistory::new();
        for (template_id, hours_ago) in [(1, 0), (3, 1), (1, 2), (4, 48), (3, 3), (1, 72)] {
            history
                .record(at(template_id, noon() - TimeDelta::hours(hours_ago)))
                .await
                .unwrap();
        }
        history
    }

    #[tokio::test]
    async fn test_in_memory_history_keeps_records() {
        let history = InMemoryComparisonHistory::new();
        let record = record();
        let id = history.record(record.clone()).await.unwrap();

        assert_eq!(id, record.id);
        let stored = history.records().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_in_memory_recent_is_newest_first() {
        let history = seeded().await;

        let recent = history.recent(3).await.unwrap();
        let ages: Vec<_> = recent
            .iter()
            .map(|r| (noon() - r.created_at).num_hours())
            .collect();
        assert_eq!(ages, vec![0, 1, 2]);

        assert_eq!(history.recent(100).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_in_memory_count_between_is_inclusive() {
        let history = seeded().await;

        let start = noon() - TimeDelta::hours(3);
        assert_eq!(history.count_between(start, noon()).await.unwrap(), 4);
        assert_eq!(history.count_between(noon(), start).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_in_memory_popular_templates_since() {
        let history = seeded().await;

        let ranked = history
            .popular_templates(noon() - TimeDelta::days(1))
            .await
            .unwrap();
        assert_eq!(
            ranked,
            vec![
                TemplatePopularity {
                    template_id: 1,
                    comparisons: 2
                },
                TemplatePopularity {
                    template_id: 3,
                    comparisons: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_pg_history_inserts_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let history = PgComparisonHistory::new(db);

        let record = record();
        assert_eq!(history.record(record.clone()).await.unwrap(), record.id);
    }

    #[tokio::test]
    async fn test_pg_history_recent_maps_rows() {
        let row = Model {
            id: Uuid::now_v7(),
            template_id: 2,
            region: "eastus".to_string(),
            overrides: serde_json::json!({}),
            as_of: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            aws_total: Some(12000),
            azure_total: Some(11500),
            gcp_total: None,
            cheapest_provider: Some(CloudProvider::Azure),
            max_savings: Some(500),
            complete: true,
            ip_address: Some("10.0.0.2".to_string()),
            user_agent: None,
            created_at: noon().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row.clone()]])
            .into_connection();
        let history = PgComparisonHistory::new(db);

        let recent = history.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, row.id);
        assert_eq!(recent[0].created_at, noon());
        assert_eq!(
            recent[0].totals.get(&CloudProvider::Azure),
            Some(&Money::new(11500, Currency::Usd))
        );
    }

    #[tokio::test]
    async fn test_pg_history_count_between() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([(
                "num_items",
                Value::BigInt(Some(7)),
            )])]])
            .into_connection();
        let history = PgComparisonHistory::new(db);

        let count = history
            .count_between(noon() - TimeDelta::days(1), noon())
            .await
            .unwrap();
        assert_eq!(count, 7);
    }

    #[tokio::test]
    async fn test_pg_history_popular_templates_ranked() {
        let row = |template_id: i64, uses: i64| {
            BTreeMap::from([
                ("template_id", Value::BigInt(Some(template_id))),
                ("uses", Value::BigInt(Some(uses))),
            ])
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(1, 3), row(2, 9), row(4, 3)]])
            .into_connection();
        let history = PgComparisonHistory::new(db);

        let ranked = history
            .popular_templates(noon() - TimeDelta::days(30))
            .await
            .unwrap();
        let ids: Vec<_> = ranked.iter().map(|t| t.template_id).collect();
        assert_eq!(ids, vec![2, 1, 4]);
        assert_eq!(ranked[0].comparisons, 9);
    }
}
