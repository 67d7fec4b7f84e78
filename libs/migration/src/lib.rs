pub use sea_orm_migration::prelude::*;

mod m20251220_000000_create_pricing_snapshots;
mod m20251220_000001_create_comparison_history;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251220_000000_create_pricing_snapshots::Migration),
            Box::new(m20251220_000001_create_comparison_history::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered_and_unique() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "m20251220_000000_create_pricing_snapshots",
                "m20251220_000001_create_comparison_history",
            ]
        );
    }
}
