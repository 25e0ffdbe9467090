use sqlx::migrate::Migrator;

use super::Database;
use super::DbPoolError;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_migrations(db: &Database) -> Result<(), DbPoolError> {
    MIGRATOR.run(db.pool()).await?;
    Ok(())
}
