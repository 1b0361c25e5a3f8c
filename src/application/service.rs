use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    Budget, Cents, PeriodType, ReportPeriod, Session, Transaction, TransactionId,
    TransactionKind, UserId,
};
use crate::storage::{Repository, copy_database_file, same_file, sibling_path};

use super::credentials::{hash_password, verify_password};
use super::{AppError, BudgetStatus, CategoryTotal, FinancialReport};

const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";

/// Application service providing the ledger operations.
/// This is the primary interface for any client (CLI, interactive menu, tests).
pub struct LedgerService {
    repo: Repository,
    database_path: PathBuf,
}

/// Filter for querying a user's transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub category: Option<String>,
    pub kind: Option<TransactionKind>,
    /// Inclusive
    pub from_date: Option<NaiveDate>,
    /// Inclusive
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl LedgerService {
    /// Open (creating if needed) and migrate the data file at the given path.
    pub async fn init(database_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let database_path = database_path.as_ref().to_path_buf();
        let repo = Repository::init(&database_path).await?;
        debug!(path = %database_path.display(), "database ready");
        Ok(Self {
            repo,
            database_path,
        })
    }

    /// Connect to an existing data file.
    pub async fn connect(database_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let database_path = database_path.as_ref().to_path_buf();
        let repo = Repository::open(&database_path, false).await?;
        Ok(Self {
            repo,
            database_path,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    // ========================
    // User operations
    // ========================

    /// Register a new user and return its ID.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<UserId, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::InvalidUsername(
                "Username must not be empty".to_string(),
            ));
        }

        if self.repo.get_user_by_username(username).await?.is_some() {
            return Err(AppError::UsernameTaken(username.to_string()));
        }

        let password_hash = hash_password(password)?;
        let user_id = self
            .repo
            .save_user(username, &password_hash, Utc::now())
            .await?;

        info!(user_id, "registered user");
        Ok(user_id)
    }

    /// Check a username/password pair. Unknown users and wrong passwords
    /// both yield `None`.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Session>, AppError> {
        let Some(user) = self.repo.get_user_by_username(username.trim()).await? else {
            warn!("login for unknown user");
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            debug!(user_id = user.id, "authenticated");
            Ok(Some(Session::from(&user)))
        } else {
            warn!(user_id = user.id, "wrong password");
            Ok(None)
        }
    }

    /// Like [`authenticate`](Self::authenticate), but a failed login is an error.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AppError> {
        self.authenticate(username, password)
            .await?
            .ok_or(AppError::InvalidCredentials)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Record an income or expense for the session user.
    #[instrument(skip(self, session), fields(user_id = session.user_id))]
    pub async fn add_transaction(
        &self,
        session: &Session,
        amount_cents: Cents,
        category: &str,
        kind: &str,
        date: NaiveDate,
    ) -> Result<Transaction, AppError> {
        let kind = parse_kind(kind)?;
        validate_amount(amount_cents)?;
        let category = category.trim();

        let id = self
            .repo
            .save_transaction(session.user_id, amount_cents, category, kind, date)
            .await?;

        info!(transaction_id = id, "added transaction");
        Ok(Transaction {
            id,
            user_id: session.user_id,
            amount_cents,
            category: category.to_string(),
            kind,
            date,
        })
    }

    /// Replace amount, category, kind and date of one of the user's transactions.
    #[instrument(skip(self, session), fields(user_id = session.user_id))]
    pub async fn update_transaction(
        &self,
        session: &Session,
        id: TransactionId,
        amount_cents: Cents,
        category: &str,
        kind: &str,
        date: NaiveDate,
    ) -> Result<Transaction, AppError> {
        let kind = parse_kind(kind)?;
        validate_amount(amount_cents)?;

        let mut transaction = self.get_transaction(session, id).await?;
        transaction.amount_cents = amount_cents;
        transaction.category = category.trim().to_string();
        transaction.kind = kind;
        transaction.date = date;

        self.repo.update_transaction(&transaction).await?;

        info!(transaction_id = id, "updated transaction");
        Ok(transaction)
    }

    /// Delete one of the user's transactions and return what was removed.
    #[instrument(skip(self, session), fields(user_id = session.user_id))]
    pub async fn delete_transaction(
        &self,
        session: &Session,
        id: TransactionId,
    ) -> Result<Transaction, AppError> {
        let transaction = self.get_transaction(session, id).await?;
        self.repo.delete_transaction(id).await?;

        info!(transaction_id = id, "deleted transaction");
        Ok(transaction)
    }

    /// Fetch a transaction, enforcing that it belongs to the session user.
    pub async fn get_transaction(
        &self,
        session: &Session,
        id: TransactionId,
    ) -> Result<Transaction, AppError> {
        let transaction = self
            .repo
            .get_transaction(id)
            .await?
            .ok_or(AppError::TransactionNotFound(id))?;

        if transaction.user_id != session.user_id {
            warn!(
                transaction_id = id,
                user_id = session.user_id,
                owner_id = transaction.user_id,
                "access to foreign transaction denied"
            );
            return Err(AppError::Forbidden(id));
        }

        Ok(transaction)
    }

    /// List the user's transactions, ordered by date.
    pub async fn list_transactions(
        &self,
        session: &Session,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self
            .repo
            .list_transactions_filtered(
                session.user_id,
                filter.category.as_deref(),
                filter.kind,
                filter.from_date,
                filter.to_date,
                filter.limit,
            )
            .await?)
    }

    // ========================
    // Reports
    // ========================

    /// Total income, expenses and savings within the period.
    #[instrument(skip_all, fields(user_id = session.user_id, period = %period))]
    pub async fn report(
        &self,
        session: &Session,
        period: ReportPeriod,
    ) -> Result<FinancialReport, AppError> {
        let (from, to) = period.bounds();
        let (income, expense) = self.repo.sum_by_kind(session.user_id, from, to).await?;
        debug!(income, expense, "computed report");
        Ok(FinancialReport::new(period, income, expense))
    }

    /// Report for an explicit calendar month.
    pub async fn report_for_month(
        &self,
        session: &Session,
        year: i32,
        month: u32,
    ) -> Result<FinancialReport, AppError> {
        let period = ReportPeriod::month(year, month)
            .ok_or_else(|| AppError::InvalidPeriod(format!("{}-{:02}", year, month)))?;
        self.report(session, period).await
    }

    /// Report for a relative tag (`monthly` or `yearly`), resolved against `today`.
    pub async fn report_for_tag(
        &self,
        session: &Session,
        tag: &str,
        today: NaiveDate,
    ) -> Result<FinancialReport, AppError> {
        let period = resolve_period_tag(tag, today)?;
        self.report(session, period).await
    }

    /// Per-category totals within the period, largest first within each kind.
    pub async fn category_report(
        &self,
        session: &Session,
        period: ReportPeriod,
    ) -> Result<Vec<CategoryTotal>, AppError> {
        let (from, to) = period.bounds();
        let aggregates = self
            .repo
            .aggregate_by_category(session.user_id, from, to)
            .await?;

        let kind_total = |kind: TransactionKind| -> Cents {
            aggregates
                .iter()
                .filter(|a| a.kind == kind)
                .map(|a| a.total)
                .sum()
        };
        let income_total = kind_total(TransactionKind::Income);
        let expense_total = kind_total(TransactionKind::Expense);

        Ok(aggregates
            .into_iter()
            .map(|agg| {
                let denominator = match agg.kind {
                    TransactionKind::Income => income_total,
                    TransactionKind::Expense => expense_total,
                };
                let percentage = if denominator > 0 {
                    (agg.total as f64 / denominator as f64) * 100.0
                } else {
                    0.0
                };
                CategoryTotal {
                    kind: agg.kind,
                    category: agg.category,
                    count: agg.count,
                    total: agg.total,
                    percentage,
                }
            })
            .collect())
    }

    // ========================
    // Budget operations
    // ========================

    /// Set the spending limit for a category, replacing any previous limit.
    #[instrument(skip(self, session), fields(user_id = session.user_id))]
    pub async fn set_budget(
        &self,
        session: &Session,
        category: &str,
        limit_cents: Cents,
    ) -> Result<Budget, AppError> {
        validate_amount(limit_cents)?;
        let budget = self
            .repo
            .upsert_budget(session.user_id, category.trim(), limit_cents)
            .await?;

        info!(budget_id = budget.id, "budget set");
        Ok(budget)
    }

    /// Compare all-time expenses in the category with its limit.
    /// `None` when the user has no budget for the category.
    pub async fn check_budget(
        &self,
        session: &Session,
        category: &str,
    ) -> Result<Option<BudgetStatus>, AppError> {
        let category = category.trim();
        let Some(budget) = self.repo.get_budget(session.user_id, category).await? else {
            return Ok(None);
        };

        let spent = self
            .repo
            .sum_expenses_for_category(session.user_id, category)
            .await?;

        let status = BudgetStatus::new(budget, spent);
        if status.exceeded {
            warn!(user_id = session.user_id, category, spent, "budget exceeded");
        }
        Ok(Some(status))
    }

    pub async fn list_budgets(&self, session: &Session) -> Result<Vec<Budget>, AppError> {
        Ok(self.repo.list_budgets(session.user_id).await?)
    }

    /// Status of every budget the user has.
    pub async fn budget_statuses(&self, session: &Session) -> Result<Vec<BudgetStatus>, AppError> {
        let budgets = self.repo.list_budgets(session.user_id).await?;
        let mut statuses = Vec::with_capacity(budgets.len());

        for budget in budgets {
            let spent = self
                .repo
                .sum_expenses_for_category(session.user_id, &budget.category)
                .await?;
            statuses.push(BudgetStatus::new(budget, spent));
        }

        Ok(statuses)
    }

    pub async fn delete_budget(&self, session: &Session, category: &str) -> Result<(), AppError> {
        let category = category.trim();
        if !self.repo.delete_budget(session.user_id, category).await? {
            return Err(AppError::BudgetNotFound(category.to_string()));
        }
        info!(user_id = session.user_id, category, "budget deleted");
        Ok(())
    }

    // ========================
    // Backup / restore
    // ========================

    /// Copy the data file verbatim to `destination`.
    /// Returns the number of bytes written.
    #[instrument(skip_all, fields(destination = %destination.display()))]
    pub async fn backup(&self, destination: &Path) -> Result<u64, AppError> {
        if same_file(&self.database_path, destination).await {
            return Err(AppError::InvalidBackupPath(format!(
                "{} is the live database",
                destination.display()
            )));
        }

        let bytes = copy_database_file(&self.database_path, destination)
            .await
            .map_err(AppError::Backup)?;

        info!(bytes, "backup written");
        Ok(bytes)
    }

    /// Replace the live data file with the bytes of `source`.
    ///
    /// The live file is left untouched unless `source` is an intact ledger
    /// database. If reopening the restored file fails anyway, the previous
    /// file is put back and reopened.
    #[instrument(skip_all, fields(source = %source.display()))]
    pub async fn restore(&mut self, source: &Path) -> Result<u64, AppError> {
        let metadata = match tokio::fs::metadata(source).await {
            Ok(metadata) => metadata,
            Err(_) => {
                warn!("backup file not found");
                return Err(AppError::BackupNotFound(source.display().to_string()));
            }
        };
        if !metadata.is_file() {
            return Err(AppError::InvalidBackupPath(format!(
                "{} is not a file",
                source.display()
            )));
        }
        if same_file(&self.database_path, source).await {
            return Err(AppError::InvalidBackupPath(format!(
                "{} is the live database",
                source.display()
            )));
        }
        if !has_sqlite_header(source).await {
            return Err(AppError::InvalidBackupPath(format!(
                "{} is not a SQLite database",
                source.display()
            )));
        }
        if let Err(e) = Repository::verify(source).await {
            warn!(error = %format!("{:#}", e), "backup file rejected");
            return Err(AppError::InvalidBackupPath(format!(
                "{} is not a valid ledger database: {:#}",
                source.display(),
                e
            )));
        }

        let safety_copy = sibling_path(&self.database_path, ".pre-restore");
        copy_database_file(&self.database_path, &safety_copy)
            .await
            .map_err(AppError::Backup)?;

        self.repo.close().await;
        let restored = match copy_database_file(source, &self.database_path).await {
            Ok(bytes) => Repository::init(&self.database_path)
                .await
                .map(|repo| (repo, bytes)),
            Err(e) => Err(e),
        };

        let outcome = match restored {
            Ok((repo, bytes)) => {
                self.repo = repo;
                info!(bytes, "database restored");
                Ok(bytes)
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "restore failed, putting previous database back");
                let rolled_back = copy_database_file(&safety_copy, &self.database_path).await;
                self.repo = Repository::init(&self.database_path).await?;
                rolled_back.map_err(AppError::Backup)?;
                Err(AppError::Backup(e))
            }
        };

        if let Err(e) = tokio::fs::remove_file(&safety_copy).await {
            debug!(error = %e, "could not remove safety copy");
        }
        outcome
    }
}

/// Resolve a relative period tag against a caller-supplied date.
pub fn resolve_period_tag(tag: &str, today: NaiveDate) -> Result<ReportPeriod, AppError> {
    PeriodType::from_str(tag)
        .and_then(|period_type| ReportPeriod::current(period_type, today))
        .ok_or_else(|| {
            AppError::InvalidPeriod(format!("'{}'. Use 'monthly' or 'yearly'", tag))
        })
}

fn parse_kind(kind: &str) -> Result<TransactionKind, AppError> {
    TransactionKind::from_str(kind).ok_or_else(|| AppError::InvalidTransactionKind(kind.to_string()))
}

fn validate_amount(amount_cents: Cents) -> Result<(), AppError> {
    if amount_cents < 0 {
        return Err(AppError::InvalidAmount(amount_cents));
    }
    Ok(())
}

async fn has_sqlite_header(path: &Path) -> bool {
    use tokio::io::AsyncReadExt;

    let Ok(mut file) = tokio::fs::File::open(path).await else {
        return false;
    };
    let mut header = [0u8; 16];
    file.read_exact(&mut header).await.is_ok() && &header[..] == SQLITE_HEADER
}
