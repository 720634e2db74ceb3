//! CRUD operations for [`Account`] records.

use chrono::{DateTime, Utc};
use rusqlite::{params, ErrorCode};

use timeline_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Account;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new account.  Fails with [`StoreError::Conflict`] when the
    /// name is already registered.
    pub fn create_account(&self, account: &Account) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO accounts (user_id, name, password_hash, salt, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    account.user_id.as_str(),
                    account.name,
                    hex::encode(account.password_hash),
                    hex::encode(account.salt),
                    account.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict(format!("account {:?} already exists", account.name))
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_account_by_name(&self, name: &str) -> Result<Account> {
        self.conn()
            .query_row(
                "SELECT user_id, name, password_hash, salt, created_at
                 FROM accounts
                 WHERE name = ?1",
                params![name],
                row_to_account,
            )
            .map_err(not_found)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an account.  Returns `true` if a row was deleted.
    pub fn delete_account(&self, user_id: &UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM accounts WHERE user_id = ?1",
            params![user_id.as_str()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

fn conversion_error(
    col: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
}

fn decode_fixed<const N: usize>(col: usize, hex_str: &str) -> rusqlite::Result<[u8; N]> {
    let bytes = hex::decode(hex_str).map_err(|e| conversion_error(col, e))?;
    bytes
        .try_into()
        .map_err(|_| conversion_error(col, hex::FromHexError::InvalidStringLength))
}

/// Map a `rusqlite::Row` to an [`Account`].
fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let user_id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let hash_hex: String = row.get(2)?;
    let salt_hex: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(4, e))?;

    Ok(Account {
        user_id: UserId(user_id),
        name,
        password_hash: decode_fixed(2, &hash_hex)?,
        salt: decode_fixed(3, &salt_hex)?,
        created_at,
    })
}
