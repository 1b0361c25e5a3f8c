// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use tempfile::TempDir;
use thrifty::application::LedgerService;
use thrifty::domain::Session;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("finance.db");
    let service = LedgerService::init(&db_path).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into a NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Register a user and log in, returning the session
pub async fn register_and_login(
    service: &LedgerService,
    username: &str,
    password: &str,
) -> Result<Session> {
    service.register(username, password).await?;
    Ok(service.login(username, password).await?)
}

/// Test fixture: one month with a salary and a food expense
pub struct StandardLedger;

impl StandardLedger {
    /// alice with 5000.00 salary and 200.00 food on 2025-02-04
    pub async fn alice(service: &LedgerService) -> Result<Session> {
        let alice = register_and_login(service, "alice", "pw1").await?;
        let date = parse_date("2025-02-04");
        service
            .add_transaction(&alice, 500000, "Salary", "income", date)
            .await?;
        service
            .add_transaction(&alice, 20000, "Food", "expense", date)
            .await?;
        Ok(alice)
    }
}
