use crate::error::StoreError;
use crate::models::Tally;
use async_trait::async_trait;
use log::{debug, info};
use sqlx::{migrate::MigrateDatabase, sqlite::{SqlitePool, SqlitePoolOptions}, Sqlite, Row};

// Key the tally lives under in the key-value table
pub const TALLY_KEY: &str = "iceCreamVotes";

// Where the running tally is kept between sessions
#[async_trait]
pub trait TallyStore: Send + Sync {
    /// Loads the stored tally. A missing key is an empty tally.
    async fn load_tally(&self) -> Result<Tally, StoreError>;

    async fn save_tally(&self, tally: &Tally) -> Result<(), StoreError>;
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self, StoreError> {
        // In-memory databases are per connection, so keep a single one around
        let in_memory = db_url.contains(":memory:");

        // Create database if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TallyStore for Database {
    async fn load_tally(&self) -> Result<Tally, StoreError> {
        match self.get(TALLY_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => {
                debug!("No stored tally under '{}', starting empty", TALLY_KEY);
                Ok(Tally::new())
            }
        }
    }

    async fn save_tally(&self, tally: &Tally) -> Result<(), StoreError> {
        let json = serde_json::to_string(tally)?;
        self.set(TALLY_KEY, &json).await
    }
}
