//! Schema migrations for the `SeaORM` user directory.

use sea_orm_migration::prelude as mig;

mod m20250601_000001_create_users;

pub struct Migrator;

#[async_trait::async_trait]
impl mig::MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn mig::MigrationTrait>> {
        vec![Box::new(m20250601_000001_create_users::Migration)]
    }
}
