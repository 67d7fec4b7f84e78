//! Sea-ORM entities for the Postgres catalog and comparison history.

/// `pricing_snapshots`: one row per key per effective date, never updated
pub mod snapshot {
    use crate::models::{
        CloudProvider, Currency, InstanceCapacity, Money, PricingEntry, PricingKey, PricingUnit,
        ServiceType,
    };
    use sea_orm::ActiveValue::Set;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "pricing_snapshots")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub provider: CloudProvider,
        pub service_type: ServiceType,
        #[sea_orm(column_type = "String(StringLen::N(100))")]
        pub service_name: String,
        #[sea_orm(column_type = "String(StringLen::N(50))")]
        pub region: String,
        #[sea_orm(column_type = "String(StringLen::N(100))")]
        pub instance_type: String,
        pub unit: PricingUnit,
        pub currency: Currency,
        pub price_per_hour_amount: Option<i64>,
        pub price_per_hour_scale: Option<i16>,
        pub price_per_month_amount: Option<i64>,
        pub price_per_month_scale: Option<i16>,
        pub vcpus: Option<i32>,
        pub memory_gb: Option<f64>,
        pub gpus: Option<i32>,
        pub effective_date: Date,
        pub created_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    fn money(amount: Option<i64>, scale: Option<i16>, currency: Currency) -> Option<Money> {
        amount.map(|amount| {
            let scale = scale.map(|s| s.max(0) as u32).unwrap_or(2);
            Money::with_scale(amount, scale, currency)
        })
    }

    impl From<Model> for PricingEntry {
        fn from(model: Model) -> Self {
            let capacity = model.vcpus.map(|vcpus| InstanceCapacity {
                vcpus: vcpus.max(0) as u32,
                memory_gb: model.memory_gb.unwrap_or_default(),
                gpus: model.gpus.unwrap_or_default().max(0) as u32,
            });

            Self {
                key: PricingKey {
                    provider: model.provider,
                    service_type: model.service_type,
                    service_name: model.service_name,
                    region: model.region,
                    instance_type: model.instance_type,
                },
                unit: model.unit,
                price_per_hour: money(
                    model.price_per_hour_amount,
                    model.price_per_hour_scale,
                    model.currency,
                ),
                price_per_month: money(
                    model.price_per_month_amount,
                    model.price_per_month_scale,
                    model.currency,
                ),
                currency: model.currency,
                capacity,
                effective_date: model.effective_date,
            }
        }
    }

    impl From<PricingEntry> for ActiveModel {
        fn from(entry: PricingEntry) -> Self {
            let capacity = entry.capacity;
            ActiveModel {
                id: Set(Uuid::now_v7()),
                provider: Set(entry.key.provider),
                service_type: Set(entry.key.service_type),
                service_name: Set(entry.key.service_name),
                region: Set(entry.key.region),
                instance_type: Set(entry.key.instance_type),
                unit: Set(entry.unit),
                currency: Set(entry.currency),
                price_per_hour_amount: Set(entry.price_per_hour.map(|m| m.amount)),
                price_per_hour_scale: Set(entry.price_per_hour.map(|m| m.decimal_places as i16)),
                price_per_month_amount: Set(entry.price_per_month.map(|m| m.amount)),
                price_per_month_scale: Set(entry.price_per_month.map(|m| m.decimal_places as i16)),
                vcpus: Set(capacity.map(|c| c.vcpus as i32)),
                memory_gb: Set(capacity.map(|c| c.memory_gb)),
                gpus: Set(capacity.map(|c| c.gpus as i32)),
                effective_date: Set(entry.effective_date),
                created_at: Set(chrono::Utc::now().into()),
            }
        }
    }
}

/// `comparison_history`: one row per served comparison
pub mod history {
    use crate::models::{CloudProvider, ComparisonRecord, Currency, Money};
    use sea_orm::ActiveValue::Set;
    use sea_orm::entity::prelude::*;
    use std::collections::BTreeMap;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "comparison_history")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub template_id: i64,
        #[sea_orm(column_type = "String(StringLen::N(50))")]
        pub region: String,
        #[sea_orm(column_type = "JsonBinary")]
        pub overrides: Json,
        pub as_of: Date,
        /// Totals in cents
        pub aws_total: Option<i64>,
        pub azure_total: Option<i64>,
        pub gcp_total: Option<i64>,
        pub cheapest_provider: Option<CloudProvider>,
        pub max_savings: Option<i64>,
        pub complete: bool,
        #[sea_orm(column_type = "String(StringLen::N(45))", nullable)]
        pub ip_address: Option<String>,
        #[sea_orm(column_type = "Text", nullable)]
        pub user_agent: Option<String>,
        pub created_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<ComparisonRecord> for ActiveModel {
        fn from(record: ComparisonRecord) -> Self {
            let total = |provider| record.totals.get(&provider).map(|m| m.amount);
            ActiveModel {
                id: Set(record.id),
                template_id: Set(record.template_id),
                region: Set(record.region.clone()),
                overrides: Set(record.overrides.clone()),
                as_of: Set(record.as_of),
                aws_total: Set(total(CloudProvider::Aws)),
                azure_total: Set(total(CloudProvider::Azure)),
                gcp_total: Set(total(CloudProvider::Gcp)),
                cheapest_provider: Set(record.cheapest_provider),
                max_savings: Set(record.max_savings.map(|m| m.amount)),
                complete: Set(record.complete),
                ip_address: Set(record.ip_address.clone()),
                user_agent: Set(record.user_agent.clone()),
                created_at: Set(record.created_at.into()),
            }
        }
    }

    /// Totals are stored in USD cents
    impl From<Model> for ComparisonRecord {
        fn from(model: Model) -> Self {
            let cents = |amount| Money::new(amount, Currency::Usd);
            let totals: BTreeMap<_, _> = [
                (CloudProvider::Aws, model.aws_total),
                (CloudProvider::Azure, model.azure_total),
                (CloudProvider::Gcp, model.gcp_total),
            ]
            .into_iter()
            .filter_map(|(provider, total)| total.map(|amount| (provider, cents(amount))))
            .collect();

            ComparisonRecord {
                id: model.id,
                template_id: model.template_id,
                region: model.region,
                overrides: model.overrides,
                as_of: model.as_of,
                totals,
                cheapest_provider: model.cheapest_provider,
                max_savings: model.max_savings.map(cents),
                complete: model.complete,
                ip_address: model.ip_address,
                user_agent: model.user_agent,
                created_at: model.created_at.to_utc(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{history, snapshot};
    use crate::models::{
        CloudProvider, ComparisonRecord, Currency, Money, PricingEntry, PricingUnit, ServiceType,
    };
    use chrono::{NaiveDate, Utc};
    use sea_orm::prelude::Uuid;

    #[test]
    fn test_snapshot_model_into_entry() {
        let model = snapshot::Model {
            id: Uuid::now_v7(),
            provider: CloudProvider::Azure,
            service_type: ServiceType::Compute,
            service_name: "Virtual Machines".to_string(),
            region: "eastus".to_string(),
            instance_type: "Standard_B2s".to_string(),
            unit: PricingUnit::Hour,
            currency: Currency::Usd,
            price_per_hour_amount: Some(416),
            price_per_hour_scale: Some(4),
            price_per_month_amount: None,
            price_per_month_scale: None,
            vcpus: Some(2),
            memory_gb: Some(4.0),
            gpus: None,
            effective_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            created_at: Utc::now().into(),
        };

        let entry = PricingEntry::from(model);
        assert_eq!(
            entry.price_per_hour,
            Some(Money::with_scale(416, 4, Currency::Usd))
        );
        assert!(entry.price_per_month.is_none());
        let capacity = entry.capacity.unwrap();
        assert_eq!((capacity.vcpus, capacity.gpus), (2, 0));
    }

    #[test]
    fn test_history_model_skips_missing_totals() {
        let model = history::Model {
            id: Uuid::now_v7(),
            template_id: 4,
            region: "us-east-1".to_string(),
            overrides: serde_json::json!({"gpus": 2}),
            as_of: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            aws_total: Some(6651),
            azure_total: None,
            gcp_total: Some(6241),
            cheapest_provider: Some(CloudProvider::Gcp),
            max_savings: Some(410),
            complete: true,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now().into(),
        };

        let record = ComparisonRecord::from(model);
        assert_eq!(record.totals.len(), 2);
        assert!(!record.totals.contains_key(&CloudProvider::Azure));
        assert_eq!(record.max_savings, Some(Money::new(410, Currency::Usd)));
    }
}
