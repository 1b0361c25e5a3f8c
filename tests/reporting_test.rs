mod common;

use anyhow::Result;
use common::{StandardLedger, parse_date, register_and_login, test_service};
use thrifty::application::AppError;
use thrifty::domain::{ReportPeriod, TransactionKind};

#[tokio::test]
async fn test_report_sums_by_kind() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = register_and_login(&service, "alice", "pw1").await?;

    for (amount, category, kind, date) in [
        (500000, "Salary", "income", "2025-02-01"),
        (15000, "Freelance", "income", "2025-02-28"),
        (20000, "Food", "expense", "2025-02-04"),
        (8550, "Food", "expense", "2025-02-12"),
        (90000, "Rent", "expense", "2025-02-01"),
    ] {
        service
            .add_transaction(&alice, amount, category, kind, parse_date(date))
            .await?;
    }

    let report = service.report_for_month(&alice, 2025, 2).await?;
    assert_eq!(report.total_income, 515000);
    assert_eq!(report.total_expense, 118550);
    assert_eq!(report.savings, 515000 - 118550);

    Ok(())
}

#[tokio::test]
async fn test_empty_period_is_all_zero() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = StandardLedger::alice(&service).await?;

    let report = service.report_for_month(&alice, 2025, 3).await?;
    assert_eq!(
        (report.total_income, report.total_expense, report.savings),
        (0, 0, 0)
    );

    Ok(())
}

#[tokio::test]
async fn test_month_window_boundaries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = register_and_login(&service, "alice", "pw1").await?;

    service
        .add_transaction(&alice, 100, "Food", "expense", parse_date("2025-01-31"))
        .await?;
    service
        .add_transaction(&alice, 200, "Food", "expense", parse_date("2025-02-01"))
        .await?;
    service
        .add_transaction(&alice, 400, "Food", "expense", parse_date("2025-02-28"))
        .await?;
    service
        .add_transaction(&alice, 800, "Food", "expense", parse_date("2025-03-01"))
        .await?;

    let report = service.report_for_month(&alice, 2025, 2).await?;
    assert_eq!(report.total_expense, 600);

    let year = service
        .report(&alice, ReportPeriod::year(2025).unwrap())
        .await?;
    assert_eq!(year.total_expense, 1500);

    Ok(())
}

#[tokio::test]
async fn test_report_only_counts_own_transactions() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = StandardLedger::alice(&service).await?;
    let bob = register_and_login(&service, "bob", "pw").await?;
    service
        .add_transaction(&bob, 777700, "Salary", "income", parse_date("2025-02-10"))
        .await?;

    let report = service.report_for_month(&alice, 2025, 2).await?;
    assert_eq!(report.total_income, 500000);

    let bob_report = service.report_for_month(&bob, 2025, 2).await?;
    assert_eq!(bob_report.total_income, 777700);
    assert_eq!(bob_report.total_expense, 0);

    Ok(())
}

#[tokio::test]
async fn test_deleted_transaction_leaves_report() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = StandardLedger::alice(&service).await?;

    let extra = service
        .add_transaction(&alice, 30000, "Travel", "expense", parse_date("2025-02-20"))
        .await?;
    assert_eq!(
        service.report_for_month(&alice, 2025, 2).await?.total_expense,
        50000
    );

    service.delete_transaction(&alice, extra.id).await?;
    assert_eq!(
        service.report_for_month(&alice, 2025, 2).await?.total_expense,
        20000
    );

    Ok(())
}

#[tokio::test]
async fn test_relative_period_tags() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = StandardLedger::alice(&service).await?;
    service
        .add_transaction(&alice, 1000, "Gift", "income", parse_date("2025-07-01"))
        .await?;

    let today = parse_date("2025-02-20");
    let monthly = service.report_for_tag(&alice, "monthly", today).await?;
    assert_eq!(monthly.total_income, 500000);

    let yearly = service.report_for_tag(&alice, "yearly", today).await?;
    assert_eq!(yearly.total_income, 501000);

    let result = service.report_for_tag(&alice, "weekly", today).await;
    assert!(matches!(result, Err(AppError::InvalidPeriod(_))));

    Ok(())
}

#[tokio::test]
async fn test_invalid_month_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = register_and_login(&service, "alice", "pw1").await?;

    assert!(matches!(
        service.report_for_month(&alice, 2025, 13).await,
        Err(AppError::InvalidPeriod(_))
    ));
    assert!(matches!(
        service.report_for_month(&alice, 2025, 0).await,
        Err(AppError::InvalidPeriod(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_category_report() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = register_and_login(&service, "alice", "pw1").await?;

    for (amount, category, kind) in [
        (500000, "Salary", "income"),
        (15000, "Groceries", "expense"),
        (20000, "Groceries", "expense"),
        (5000, "Dining", "expense"),
        (7500, "Dining", "expense"),
    ] {
        service
            .add_transaction(&alice, amount, category, kind, parse_date("2024-01-10"))
            .await?;
    }

    let period = ReportPeriod::month(2024, 1).unwrap();
    let totals = service.category_report(&alice, period).await?;
    assert_eq!(totals.len(), 3);

    let salary = totals.iter().find(|t| t.category == "Salary").unwrap();
    assert_eq!(salary.kind, TransactionKind::Income);
    assert!((salary.percentage - 100.0).abs() < 0.01);

    let groceries = totals.iter().find(|t| t.category == "Groceries").unwrap();
    assert_eq!(groceries.total, 35000);
    assert_eq!(groceries.count, 2);
    assert!((groceries.percentage - 73.68).abs() < 0.1);

    let dining = totals.iter().find(|t| t.category == "Dining").unwrap();
    assert_eq!(dining.total, 12500);

    Ok(())
}
