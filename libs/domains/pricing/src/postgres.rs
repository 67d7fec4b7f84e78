use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Select,
    TransactionTrait,
};
use std::collections::HashSet;
use tracing::debug;

use crate::catalog::PricingCatalog;
use crate::entity::snapshot::{ActiveModel, Column, Entity};
use crate::error::{PricingError, PricingResult};
use crate::models::{IngestReport, PricingEntry, PricingKey, RejectedEntry, ServiceScope};

/// PostgreSQL implementation of PricingCatalog
#[derive(Clone)]
pub struct PgPricingCatalog {
    db: DatabaseConnection,
}

impl PgPricingCatalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn in_scope(scope: &ServiceScope) -> Select<Entity> {
    Entity::find()
        .filter(Column::Provider.eq(scope.provider))
        .filter(Column::ServiceType.eq(scope.service_type))
        .filter(Column::ServiceName.eq(scope.service_name.as_str()))
        .filter(Column::Region.eq(scope.region.as_str()))
}

/// Unique snapshot identity: one price per key and effective date
fn snapshot_conflict() -> OnConflict {
    OnConflict::columns([
        Column::Provider,
        Column::ServiceType,
        Column::ServiceName,
        Column::Region,
        Column::InstanceType,
        Column::EffectiveDate,
    ])
    .do_nothing()
    .to_owned()
}

fn for_key(key: &PricingKey) -> Select<Entity> {
    in_scope(&key.scope()).filter(Column::InstanceType.eq(key.instance_type.as_str()))
}

#[async_trait]
impl PricingCatalog for PgPricingCatalog {
    async fn lookup(&self, key: &PricingKey, as_of: NaiveDate) -> PricingResult<PricingEntry> {
        for_key(key)
            .filter(Column::EffectiveDate.lte(as_of))
            .order_by_desc(Column::EffectiveDate)
            .one(&self.db)
            .await?
            .map(Into::into)
            .ok_or_else(|| PricingError::price_not_found(key, as_of))
    }

    async fn candidates(
        &self,
        scope: &ServiceScope,
        as_of: NaiveDate,
    ) -> PricingResult<Vec<PricingEntry>> {
        let rows = in_scope(scope)
            .filter(Column::EffectiveDate.lte(as_of))
            .order_by_asc(Column::InstanceType)
            .order_by_desc(Column::EffectiveDate)
            .all(&self.db)
            .await?;

        // Rows arrive newest first within each instance type
        let mut seen = HashSet::new();
        let entries = rows
            .into_iter()
            .filter(|row| seen.insert(row.instance_type.clone()))
            .map(Into::into)
            .collect();

        Ok(entries)
    }

    async fn ingest(&self, batch: Vec<PricingEntry>) -> PricingResult<IngestReport> {
        let mut report = IngestReport::default();
        let mut seen = HashSet::new();
        let txn = self.db.begin().await?;

        for entry in batch {
            if !seen.insert((entry.key.clone(), entry.effective_date)) {
                report.rejected.push(RejectedEntry::duplicate(&entry));
                continue;
            }

            // A row already stored, or committed by a concurrent batch, leaves
            // this insert with nothing to do
            let rejected = RejectedEntry::duplicate(&entry);
            let model: ActiveModel = entry.into();
            let inserted = Entity::insert(model)
                .on_conflict(snapshot_conflict())
                .exec_without_returning(&txn)
                .await?;

            if inserted == 0 {
                report.rejected.push(rejected);
            } else {
                report.accepted += 1;
            }
        }

        txn.commit().await?;
        debug!(
            accepted = report.accepted,
            rejected = report.rejected.len(),
            "Snapshot batch committed"
        );

        Ok(report)
    }

    async fn ping(&self) -> PricingResult<()> {
        database::postgres::check_health(&self.db)
            .await
            .map_err(|e| PricingError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::snapshot::Model;
    use crate::models::{CloudProvider, Currency, Money, PricingUnit, ServiceType};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, prelude::Uuid};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn scope() -> ServiceScope {
        ServiceScope::new(CloudProvider::Gcp, ServiceType::Compute, "us-east1")
    }

    fn row(instance: &str, amount: i64, effective: NaiveDate) -> Model {
        Model {
            id: Uuid::now_v7(),
            provider: CloudProvider::Gcp,
            service_type: ServiceType::Compute,
            service_name: "Compute Engine".to_string(),
            region: "us-east1".to_string(),
            instance_type: instance.to_string(),
            unit: PricingUnit::Hour,
            currency: Currency::Usd,
            price_per_hour_amount: Some(amount),
            price_per_hour_scale: Some(4),
            price_per_month_amount: None,
            price_per_month_scale: None,
            vcpus: Some(2),
            memory_gb: Some(4.0),
            gpus: Some(0),
            effective_date: effective,
            created_at: chrono::Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_lookup_maps_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row("e2-medium", 335, date(3, 1))]])
            .into_connection();
        let catalog = PgPricingCatalog::new(db);

        let entry = catalog
            .lookup(&scope().key("e2-medium"), date(4, 1))
            .await
            .unwrap();
        assert_eq!(
            entry.price_per_hour,
            Some(Money::with_scale(335, 4, Currency::Usd))
        );
        assert_eq!(entry.effective_date, date(3, 1));
    }

    #[tokio::test]
    async fn test_lookup_empty_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Model>::new()])
            .into_connection();
        let catalog = PgPricingCatalog::new(db);

        let result = catalog.lookup(&scope().key("e2-medium"), date(4, 1)).await;
        assert!(matches!(result, Err(PricingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_candidates_keep_newest_per_instance() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                row("e2-medium", 335, date(3, 1)),
                row("e2-medium", 400, date(1, 1)),
                row("e2-small", 168, date(1, 1)),
            ]])
            .into_connection();
        let catalog = PgPricingCatalog::new(db);

        let found = catalog.candidates(&scope(), date(4, 1)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].effective_date, date(3, 1));
        assert_eq!(found[1].key.instance_type, "e2-small");
    }

    #[tokio::test]
    async fn test_ingest_rejects_stored_and_in_batch_duplicates() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // first entry: already stored, the insert is a no-op
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            // second entry: new
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let catalog = PgPricingCatalog::new(db);

        let fresh: PricingEntry = row("e2-small", 168, date(3, 1)).into();
        let batch = vec![
            row("e2-medium", 335, date(3, 1)).into(),
            fresh.clone(),
            fresh,
        ];

        let report = catalog.ingest(batch).await.unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].key.instance_type, "e2-medium");
        assert_eq!(report.rejected[1].key.instance_type, "e2-small");
    }

    #[tokio::test]
    async fn test_ingest_conflicting_insert_keeps_rest_of_batch() {
        // Another batch committed the same key first: the insert affects no
        // rows, and the remaining entries still commit
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let catalog = PgPricingCatalog::new(db.clone());

        let batch = vec![
            row("e2-micro", 84, date(3, 1)).into(),
            row("e2-medium", 335, date(3, 1)).into(),
            row("e2-small", 168, date(3, 1)).into(),
        ];

        let report = catalog.ingest(batch).await.unwrap();
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].key.instance_type, "e2-medium");

        let log = db.into_transaction_log();
        let sql = format!("{:?}", log);
        assert!(sql.contains("ON CONFLICT"), "{sql}");
        assert!(sql.contains("DO NOTHING"), "{sql}");
    }
}
