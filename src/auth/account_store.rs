//! Account Storage
//! Mission: Persist accounts and their single refresh token with SQLite

use crate::auth::models::{Account, DEFAULT_PROFILE_IMAGE};
use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

/// True when `err` is SQLite's UNIQUE constraint firing (a duplicate email
/// racing past the pre-check read), as opposed to any other store failure.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Hash a plaintext password for storage.
pub fn hash_password(password: &str) -> Result<String> {
    hash(password, DEFAULT_COST).context("Failed to hash password")
}

/// Verify a candidate password against a stored hash. A missing hash
/// (Google-only account) never verifies.
pub fn verify_password(password: &str, stored_hash: Option<&str>) -> Result<bool> {
    match stored_hash {
        Some(h) => verify(password, h).context("Failed to verify password"),
        None => Ok(false),
    }
}

/// Account storage with SQLite backend
pub struct AccountStore {
    db_path: String,
}

impl AccountStore {
    /// Create a new account store and initialize the schema.
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT,
                profile_image TEXT NOT NULL,
                google_id TEXT,
                refresh_token TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Insert a new account. `password_hash` is None for Google-only accounts.
    /// Fails on a duplicate email (UNIQUE constraint).
    pub fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<String>,
        profile_image: Option<String>,
        google_id: Option<String>,
    ) -> Result<Account> {
        let account = Account {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: normalize_email(email),
            password_hash,
            profile_image: profile_image.unwrap_or_else(|| DEFAULT_PROFILE_IMAGE.to_string()),
            google_id,
            refresh_token: None,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "INSERT INTO accounts (id, name, email, password_hash, profile_image, google_id, refresh_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                account.id.to_string(),
                account.name,
                account.email,
                account.password_hash,
                account.profile_image,
                account.google_id,
                account.refresh_token,
                account.created_at,
            ],
        )
        .context("Failed to insert account")?;

        info!("✅ Created account: {} ({})", account.email, account.id);

        Ok(account)
    }

    /// Lookup by email, case-insensitively (emails are stored lowercased).
    pub fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.find_by_column("email", &normalize_email(email))
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<Option<Account>> {
        self.find_by_column("id", &id.to_string())
    }

    /// Exact-match lookup on the stored refresh token. This is what makes
    /// refresh tokens revocable: a rotated-out or cleared token matches nothing.
    pub fn find_by_refresh_token(&self, token: &str) -> Result<Option<Account>> {
        self.find_by_column("refresh_token", token)
    }

    fn find_by_column(&self, column: &str, value: &str) -> Result<Option<Account>> {
        let conn = Connection::open(&self.db_path)?;

        let sql = format!(
            "SELECT id, name, email, password_hash, profile_image, google_id, refresh_token, created_at
             FROM accounts WHERE {column} = ?1"
        );
        let mut stmt = conn.prepare(&sql)?;

        let account = stmt
            .query_row(params![value], row_to_account)
            .optional()
            .context("Failed to query account")?;

        Ok(account)
    }

    /// Overwrite (or clear, with None) the account's refresh token.
    /// A single UPDATE-by-id; concurrent writers race and the last one wins.
    pub fn set_refresh_token(&self, id: &Uuid, token: Option<&str>) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "UPDATE accounts SET refresh_token = ?1 WHERE id = ?2",
            params![token, id.to_string()],
        )
        .context("Failed to update refresh token")?;
        Ok(())
    }

    pub fn set_password_hash(&self, id: &Uuid, password_hash: &str) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "UPDATE accounts SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id.to_string()],
        )
        .context("Failed to update password hash")?;
        Ok(())
    }

    pub fn set_google_id(&self, id: &Uuid, google_id: &str) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "UPDATE accounts SET google_id = ?1 WHERE id = ?2",
            params![google_id, id.to_string()],
        )
        .context("Failed to update google id")?;
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let id_str: String = row.get(0)?;
    Ok(Account {
        id: Uuid::parse_str(&id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        profile_image: row.get(4)?,
        google_id: row.get(5)?,
        refresh_token: row.get(6)?,
        created_at: row.get(7)?,
    })
}
