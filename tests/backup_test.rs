mod common;

use anyhow::Result;
use common::{StandardLedger, parse_date, test_service};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use thrifty::application::{AppError, TransactionFilter};

#[tokio::test]
async fn test_backup_creates_directories_and_copies_bytes() -> Result<()> {
    let (service, temp) = test_service().await?;
    StandardLedger::alice(&service).await?;

    let destination = temp.path().join("backup/nested/finance_backup.db");
    let bytes = service.backup(&destination).await?;

    let original = tokio::fs::read(service.database_path()).await?;
    let copy = tokio::fs::read(&destination).await?;
    assert_eq!(bytes as usize, copy.len());
    assert_eq!(original, copy);

    Ok(())
}

#[tokio::test]
async fn test_restore_rolls_back_later_changes() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    let alice = StandardLedger::alice(&service).await?;

    let backup_path = temp.path().join("backup/finance_backup.db");
    service.backup(&backup_path).await?;

    service
        .add_transaction(&alice, 9900, "Books", "expense", parse_date("2025-02-10"))
        .await?;
    service.register("carol", "pw").await?;
    assert_eq!(
        service
            .list_transactions(&alice, TransactionFilter::default())
            .await?
            .len(),
        3
    );

    service.restore(&backup_path).await?;

    let alice = service.login("alice", "pw1").await?;
    let transactions = service
        .list_transactions(&alice, TransactionFilter::default())
        .await?;
    assert_eq!(transactions.len(), 2);
    assert!(transactions.iter().all(|t| t.category != "Books"));
    assert!(matches!(
        service.login("carol", "pw").await,
        Err(AppError::InvalidCredentials)
    ));

    Ok(())
}

#[tokio::test]
async fn test_restore_missing_file_leaves_store_untouched() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    let alice = StandardLedger::alice(&service).await?;

    let result = service.restore(&temp.path().join("nope.db")).await;
    assert!(matches!(result, Err(AppError::BackupNotFound(_))));

    let report = service.report_for_month(&alice, 2025, 2).await?;
    assert_eq!(report.total_income, 500000);

    Ok(())
}

#[tokio::test]
async fn test_restore_rejects_non_database_file() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    let alice = StandardLedger::alice(&service).await?;

    let bogus = temp.path().join("notes.txt");
    tokio::fs::write(&bogus, b"definitely not sqlite").await?;

    let result = service.restore(&bogus).await;
    assert!(matches!(result, Err(AppError::InvalidBackupPath(_))));

    let result = service.restore(temp.path()).await;
    assert!(matches!(result, Err(AppError::InvalidBackupPath(_))));

    let report = service.report_for_month(&alice, 2025, 2).await?;
    assert_eq!(report.total_expense, 20000);

    Ok(())
}

#[tokio::test]
async fn test_backup_onto_live_database_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardLedger::alice(&service).await?;

    let live = service.database_path().to_path_buf();
    let result = service.backup(&live).await;
    assert!(matches!(result, Err(AppError::InvalidBackupPath(_))));

    Ok(())
}

#[tokio::test]
async fn test_restore_rejects_corrupt_file_with_valid_header() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    let alice = StandardLedger::alice(&service).await?;
    let live_before = tokio::fs::read(service.database_path()).await?;

    let corrupt = temp.path().join("corrupt.db");
    let mut bytes = b"SQLite format 3\0".to_vec();
    bytes.extend(std::iter::repeat_n(0xAB, 4096));
    tokio::fs::write(&corrupt, &bytes).await?;

    let result = service.restore(&corrupt).await;
    assert!(matches!(result, Err(AppError::InvalidBackupPath(_))));

    assert_eq!(tokio::fs::read(service.database_path()).await?, live_before);
    let report = service.report_for_month(&alice, 2025, 2).await?;
    assert_eq!(report.total_income, 500000);
    assert!(!temp.path().join("finance.db.pre-restore").exists());

    Ok(())
}

#[tokio::test]
async fn test_restore_rejects_database_without_ledger_tables() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    let alice = StandardLedger::alice(&service).await?;

    let foreign = temp.path().join("notes.db");
    let options = SqliteConnectOptions::new()
        .filename(&foreign)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let pool = SqlitePool::connect_with(options).await?;
    sqlx::query("CREATE TABLE notes (body TEXT)")
        .execute(&pool)
        .await?;
    pool.close().await;

    let result = service.restore(&foreign).await;
    assert!(matches!(result, Err(AppError::InvalidBackupPath(_))));

    let report = service.report_for_month(&alice, 2025, 2).await?;
    assert_eq!(report.total_expense, 20000);

    Ok(())
}

#[tokio::test]
async fn test_restore_cleans_up_safety_copy() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    StandardLedger::alice(&service).await?;

    let backup_path = temp.path().join("finance_backup.db");
    service.backup(&backup_path).await?;
    service.restore(&backup_path).await?;

    assert!(!temp.path().join("finance.db.pre-restore").exists());
    assert!(service.login("alice", "pw1").await.is_ok());

    Ok(())
}
