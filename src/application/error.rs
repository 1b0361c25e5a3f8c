use thiserror::Error;

use crate::domain::{Cents, TransactionId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid transaction type '{0}'. Use 'income' or 'expense'")]
    InvalidTransactionKind(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Cents),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Transaction {0} belongs to another user")]
    Forbidden(TransactionId),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("No budget set for category: {0}")]
    BudgetNotFound(String),

    #[error("Backup file not found: {0}")]
    BackupNotFound(String),

    #[error("Invalid backup path: {0}")]
    InvalidBackupPath(String),

    #[error("Backup failed: {0:#}")]
    Backup(#[source] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
