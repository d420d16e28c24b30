pub use sea_orm_migration::prelude::*;

mod m20251001_000001_staff;
mod m20251001_000002_portfolio;
mod m20251001_000003_collections_activity;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251001_000001_staff::Migration),
            Box::new(m20251001_000002_portfolio::Migration),
            Box::new(m20251001_000003_collections_activity::Migration),
        ]
    }
}
