use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Budget, Cents, Transaction, TransactionId, TransactionKind, User, UserId,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_BUDGETS};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Per-category sum produced by the aggregation queries.
#[derive(Debug, Clone)]
pub struct CategoryAggregate {
    pub kind: TransactionKind,
    pub category: String,
    pub count: i64,
    pub total: Cents,
}

/// Repository for persisting and querying users, transactions and budgets.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the SQLite file at `path`.
    ///
    /// The rollback journal is used instead of WAL so that every committed
    /// write lives in the main file, which keeps file-level backups complete.
    pub async fn open(path: &Path, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Delete)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_BUDGETS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a database (open, creating it if needed, + migrate).
    pub async fn init(path: &Path) -> Result<Self> {
        let repo = Self::open(path, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Check that the file at `path` is an intact ledger database without
    /// writing to it: `PRAGMA quick_check` must pass and every ledger table
    /// must be readable.
    pub async fn verify(path: &Path) -> Result<()> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false)
            .journal_mode(SqliteJournalMode::Delete);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let checked = Self::check_tables(&pool).await;
        pool.close().await;
        checked
    }

    async fn check_tables(pool: &SqlitePool) -> Result<()> {
        let status: String = sqlx::query_scalar("PRAGMA quick_check")
            .fetch_one(pool)
            .await
            .context("Integrity check failed")?;
        if status != "ok" {
            anyhow::bail!("Integrity check failed: {}", status);
        }

        for table in ["users", "transactions", "budgets"] {
            let query = format!("SELECT COUNT(*) FROM {}", table);
            sqlx::query(&query)
                .fetch_one(pool)
                .await
                .with_context(|| format!("Missing or unreadable table '{}'", table))?;
        }
        Ok(())
    }

    /// Close every pooled connection so the file can be replaced.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // User operations
    // ========================

    /// Insert a user and return its assigned ID.
    pub async fn save_user(
        &self,
        username: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<UserId> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save user")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by username")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let created_at_str: String = row.get("created_at");

        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Insert a transaction and return its assigned ID.
    pub async fn save_transaction(
        &self,
        user_id: UserId,
        amount_cents: Cents,
        category: &str,
        kind: TransactionKind,
        date: NaiveDate,
    ) -> Result<TransactionId> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (user_id, amount_cents, category, kind, date)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(amount_cents)
        .bind(category)
        .bind(kind.as_str())
        .bind(date.format(DATE_FORMAT).to_string())
        .execute(&self.pool)
        .await
        .context("Failed to save transaction")?;

        Ok(result.last_insert_rowid())
    }

    /// Overwrite the mutable fields of a stored transaction.
    pub async fn update_transaction(&self, transaction: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET amount_cents = ?, category = ?, kind = ?, date = ?
            WHERE id = ?
            "#,
        )
        .bind(transaction.amount_cents)
        .bind(&transaction.category)
        .bind(transaction.kind.as_str())
        .bind(transaction.date.format(DATE_FORMAT).to_string())
        .bind(transaction.id)
        .execute(&self.pool)
        .await
        .context("Failed to update transaction")?;
        Ok(())
    }

    pub async fn delete_transaction(&self, id: TransactionId) -> Result<()> {
        sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete transaction")?;
        Ok(())
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, amount_cents, category, kind, date
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    /// List a user's transactions with optional filters, ordered by date.
    pub async fn list_transactions_filtered(
        &self,
        user_id: UserId,
        category: Option<&str>,
        kind: Option<TransactionKind>,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let mut query = String::from(
            "SELECT id, user_id, amount_cents, category, kind, date FROM transactions WHERE user_id = ?",
        );

        let from_date_str = from_date.map(|d| d.format(DATE_FORMAT).to_string());
        let to_date_str = to_date.map(|d| d.format(DATE_FORMAT).to_string());

        if category.is_some() {
            query.push_str(" AND category = ?");
        }
        if kind.is_some() {
            query.push_str(" AND kind = ?");
        }
        if from_date.is_some() {
            query.push_str(" AND date >= ?");
        }
        if to_date.is_some() {
            query.push_str(" AND date <= ?");
        }

        query.push_str(" ORDER BY date, id");

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query).bind(user_id);

        if let Some(cat) = category {
            sql_query = sql_query.bind(cat);
        }
        if let Some(k) = kind {
            sql_query = sql_query.bind(k.as_str());
        }
        if let Some(ref fd) = from_date_str {
            sql_query = sql_query.bind(fd);
        }
        if let Some(ref td) = to_date_str {
            sql_query = sql_query.bind(td);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Sum income and expenses for a user within `[from_date, to_date)`.
    pub async fn sum_by_kind(
        &self,
        user_id: UserId,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<(Cents, Cents)> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN kind = 'income' THEN amount_cents ELSE 0 END), 0) as income,
                COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount_cents ELSE 0 END), 0) as expense
            FROM transactions
            WHERE user_id = ? AND date >= ? AND date < ?
            "#,
        )
        .bind(user_id)
        .bind(from_date.format(DATE_FORMAT).to_string())
        .bind(to_date.format(DATE_FORMAT).to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum transactions by kind")?;

        Ok((row.get("income"), row.get("expense")))
    }

    /// Per (kind, category) totals for a user within `[from_date, to_date)`.
    pub async fn aggregate_by_category(
        &self,
        user_id: UserId,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<CategoryAggregate>> {
        let rows = sqlx::query(
            r#"
            SELECT kind, category, COUNT(*) as count, SUM(amount_cents) as total
            FROM transactions
            WHERE user_id = ? AND date >= ? AND date < ?
            GROUP BY kind, category
            ORDER BY kind, total DESC, category
            "#,
        )
        .bind(user_id)
        .bind(from_date.format(DATE_FORMAT).to_string())
        .bind(to_date.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate transactions by category")?;

        rows.iter()
            .map(|row| {
                let kind_str: String = row.get("kind");
                Ok(CategoryAggregate {
                    kind: TransactionKind::from_str(&kind_str)
                        .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
                    category: row.get("category"),
                    count: row.get("count"),
                    total: row.get("total"),
                })
            })
            .collect()
    }

    /// All-time expense total for one of the user's categories.
    pub async fn sum_expenses_for_category(&self, user_id: UserId, category: &str) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) as total
            FROM transactions
            WHERE user_id = ? AND category = ? AND kind = 'expense'
            "#,
        )
        .bind(user_id)
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum expenses for category")?;

        Ok(row.get("total"))
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let kind_str: String = row.get("kind");
        let date_str: String = row.get("date");

        Ok(Transaction {
            id: row.get("id"),
            user_id: row.get("user_id"),
            amount_cents: row.get("amount_cents"),
            category: row.get("category"),
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                .with_context(|| format!("Invalid transaction date: {}", date_str))?,
        })
    }

    // ========================
    // Budget operations
    // ========================

    /// Insert the budget for (user, category) or replace its limit.
    pub async fn upsert_budget(
        &self,
        user_id: UserId,
        category: &str,
        limit_cents: Cents,
    ) -> Result<Budget> {
        let row = sqlx::query(
            r#"
            INSERT INTO budgets (user_id, category, limit_cents)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id, category) DO UPDATE SET limit_cents = excluded.limit_cents
            RETURNING id, user_id, category, limit_cents
            "#,
        )
        .bind(user_id)
        .bind(category)
        .bind(limit_cents)
        .fetch_one(&self.pool)
        .await
        .context("Failed to save budget")?;

        Ok(Self::row_to_budget(&row))
    }

    pub async fn get_budget(&self, user_id: UserId, category: &str) -> Result<Option<Budget>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, category, limit_cents
            FROM budgets
            WHERE user_id = ? AND category = ?
            "#,
        )
        .bind(user_id)
        .bind(category)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch budget")?;

        Ok(row.as_ref().map(Self::row_to_budget))
    }

    /// List a user's budgets, ordered by category.
    pub async fn list_budgets(&self, user_id: UserId) -> Result<Vec<Budget>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, category, limit_cents
            FROM budgets
            WHERE user_id = ?
            ORDER BY category
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list budgets")?;

        Ok(rows.iter().map(Self::row_to_budget).collect())
    }

    /// Delete a budget. Returns false when there was nothing to delete.
    pub async fn delete_budget(&self, user_id: UserId, category: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM budgets WHERE user_id = ? AND category = ?")
            .bind(user_id)
            .bind(category)
            .execute(&self.pool)
            .await
            .context("Failed to delete budget")?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_budget(row: &SqliteRow) -> Budget {
        Budget {
            id: row.get("id"),
            user_id: row.get("user_id"),
            category: row.get("category"),
            limit_cents: row.get("limit_cents"),
        }
    }
}
