use crate::db::models::{DbUser, NewUser};
use crate::db::schema::{SQLITE_DROP, SQLITE_INIT};
use crate::error::StockError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

const USER_COLUMNS: &str =
    "id, username, password, mobile, full_name, email, created_at, last_login";

/// Open (creating if missing) the database at `database_url` and ensure the schema exists.
pub async fn connect(database_url: &str) -> Result<UserStorage, StockError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
    let storage = UserStorage::new(pool);
    storage.init_schema().await?;
    info!(database_url, "users database ready");
    Ok(storage)
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[derive(Clone)]
pub struct UserStorage {
    pool: SqlitePool,
}

impl UserStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), StockError> {
        // sqlx::query runs a single statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<DbUser>, StockError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    /// Insert a new user and return its row id.
    ///
    /// The existence pre-check gives the common case a clean error; the UNIQUE
    /// constraint still decides races between concurrent signups.
    pub async fn create(&self, user: NewUser) -> Result<i64, StockError> {
        if self.find_by_username(&user.username).await?.is_some() {
            return Err(StockError::UsernameTaken);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password, mobile, full_name, email, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.mobile)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(encode_ts(Utc::now()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                if db_err.message().contains("users.email") {
                    Err(StockError::EmailTaken)
                } else {
                    Err(StockError::UsernameTaken)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), StockError> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(encode_ts(at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, StockError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    /// Drop the users table and recreate it empty.
    pub async fn reset(&self) -> Result<(), StockError> {
        sqlx::query(SQLITE_DROP).execute(&self.pool).await?;
        self.init_schema().await
    }

    /// Delete every user, keeping the table. Returns the number of rows removed.
    pub async fn wipe(&self) -> Result<u64, StockError> {
        let done = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    /// Delete users whose last activity is older than `cutoff`.
    pub async fn prune_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StockError> {
        let done = sqlx::query("DELETE FROM users WHERE COALESCE(last_login, created_at) < ?")
            .bind(encode_ts(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    fn row_to_model(row: SqliteRow) -> Result<DbUser, StockError> {
        let created_raw: String = row.try_get("created_at")?;
        let last_login_raw: Option<String> = row.try_get("last_login")?;

        Ok(DbUser {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password: row.try_get("password")?,
            mobile: row.try_get("mobile")?,
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            created_at: decode_ts(&created_raw)?,
            last_login: last_login_raw.as_deref().map(decode_ts).transpose()?,
        })
    }
}
