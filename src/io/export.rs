use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::{LedgerService, TransactionFilter};
use crate::domain::{Budget, Session, Transaction, format_cents};

/// Everything one user owns, for a full JSON export
#[derive(Debug, Clone, Serialize)]
pub struct UserSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub username: String,
    pub transactions: Vec<Transaction>,
    pub budgets: Vec<Budget>,
}

/// Exporter for writing a user's ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export the user's transactions to CSV format
    pub async fn export_transactions_csv<W: Write>(
        &self,
        session: &Session,
        writer: W,
    ) -> Result<usize> {
        let transactions = self
            .service
            .list_transactions(session, TransactionFilter::default())
            .await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "date", "kind", "category", "amount"])?;

        for transaction in &transactions {
            csv_writer.write_record([
                transaction.id.to_string(),
                transaction.date.format("%Y-%m-%d").to_string(),
                transaction.kind.as_str().to_string(),
                transaction.category.clone(),
                format_cents(transaction.amount_cents),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }

    /// Export the user's budgets to CSV format
    pub async fn export_budgets_csv<W: Write>(&self, session: &Session, writer: W) -> Result<usize> {
        let statuses = self.service.budget_statuses(session).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["category", "limit", "spent", "remaining", "exceeded"])?;

        for status in &statuses {
            csv_writer.write_record([
                status.budget.category.clone(),
                format_cents(status.limit()),
                format_cents(status.spent),
                format_cents(status.remaining),
                status.exceeded.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(statuses.len())
    }

    /// Export all of the user's data as a JSON snapshot
    pub async fn export_full_json<W: Write>(
        &self,
        session: &Session,
        mut writer: W,
    ) -> Result<UserSnapshot> {
        let transactions = self
            .service
            .list_transactions(session, TransactionFilter::default())
            .await?;
        let budgets = self.service.list_budgets(session).await?;

        let snapshot = UserSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            username: session.username.clone(),
            transactions,
            budgets,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
