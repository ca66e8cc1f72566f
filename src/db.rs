use sqlx::MySqlPool;

use crate::error::Result;
use crate::store::MySqlStore;

pub async fn init_db(database_url: &str) -> Result<MySqlPool> {
    let pool = MySqlPool::connect(database_url).await?;
    Ok(pool)
}

/// Connects and makes sure the ledger tables exist.
pub async fn init_store(database_url: &str) -> Result<MySqlStore> {
    let store = MySqlStore::new(init_db(database_url).await?);
    store.ensure_schema().await?;
    Ok(store)
}
