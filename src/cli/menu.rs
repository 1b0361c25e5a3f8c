//! Interactive menu loop.
//!
//! The logged-in user lives in a local `Option<Session>` that is handed to
//! each per-user operation. Failed operations print a message and return to
//! the menu; only I/O errors on the terminal end the loop.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use crate::application::{AppError, LedgerService, TransactionFilter, resolve_period_tag};
use crate::domain::{ReportPeriod, Session, format_cents, parse_cents};

use super::{DEFAULT_BACKUP_PATH, parse_date, prompt_line};

const MENU: &str = "
Personal Finance Manager
1. Register
2. Login
3. Add Transaction
4. Update Transaction
5. Delete Transaction
6. List Transactions
7. View Financial Report
8. Set Budget
9. Check Budget
10. Backup Data
11. Restore Data
12. Logout
0. Exit";

/// Run the menu until the user exits or input ends.
pub async fn run_menu<R: BufRead, W: Write>(
    service: &mut LedgerService,
    input: R,
    output: W,
) -> Result<()> {
    let mut menu = Menu {
        service,
        input,
        output,
        session: None,
        today: None,
    };
    menu.run().await
}

struct Menu<'a, R, W> {
    service: &'a mut LedgerService,
    input: R,
    output: W,
    session: Option<Session>,
    /// Fixed reference date; the current date is read on each use when unset
    today: Option<NaiveDate>,
}

impl<R: BufRead, W: Write> Menu<'_, R, W> {
    async fn run(&mut self) -> Result<()> {
        loop {
            writeln!(self.output, "{}", MENU)?;
            let Some(choice) = self.read_choice()? else {
                break;
            };

            let outcome = match choice.as_str() {
                "1" => self.register().await,
                "2" => self.login().await,
                "3" => self.add_transaction().await,
                "4" => self.update_transaction().await,
                "5" => self.delete_transaction().await,
                "6" => self.list_transactions().await,
                "7" => self.report().await,
                "8" => self.set_budget().await,
                "9" => self.check_budget().await,
                "10" => self.backup().await,
                "11" => self.restore().await,
                "12" => {
                    self.session = None;
                    writeln!(self.output, "Logged out.")?;
                    Ok(())
                }
                "0" => {
                    writeln!(self.output, "Exiting program. Goodbye!")?;
                    break;
                }
                _ => {
                    writeln!(self.output, "Invalid choice!")?;
                    Ok(())
                }
            };

            if let Err(e) = outcome {
                writeln!(self.output, "{}", describe(&e))?;
            }
        }
        Ok(())
    }

    /// `None` on end of input.
    fn read_choice(&mut self) -> Result<Option<String>> {
        write!(self.output, "Enter your choice: ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask(&mut self, label: &str) -> Result<String> {
        prompt_line(&mut self.input, &mut self.output, label)
    }

    fn ask_amount(&mut self, label: &str) -> Result<i64> {
        let raw = self.ask(label)?;
        parse_cents(&raw).with_context(|| format!("Invalid amount '{}'", raw))
    }

    fn ask_date(&mut self) -> Result<NaiveDate> {
        let raw = self.ask("Enter date (YYYY-MM-DD, empty for today): ")?;
        if raw.is_empty() {
            Ok(self.today())
        } else {
            parse_date(&raw)
        }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    fn session(&self) -> Result<Session> {
        self.session
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Login required!"))
    }

    async fn register(&mut self) -> Result<()> {
        let username = self.ask("Enter username: ")?;
        let password = self.ask("Enter password: ")?;
        self.service.register(&username, &password).await?;
        writeln!(self.output, "User registered successfully!")?;
        Ok(())
    }

    async fn login(&mut self) -> Result<()> {
        let username = self.ask("Enter username: ")?;
        let password = self.ask("Enter password: ")?;
        self.session = None;
        let session = self.service.login(&username, &password).await?;
        writeln!(self.output, "Login successful! Welcome, {}.", session.username)?;
        self.session = Some(session);
        Ok(())
    }

    async fn add_transaction(&mut self) -> Result<()> {
        let session = self.session()?;
        let amount = self.ask_amount("Enter amount: ")?;
        let category = self.ask("Enter category: ")?;
        let kind = self.ask("Enter type (income/expense): ")?;
        let date = self.ask_date()?;

        let transaction = self
            .service
            .add_transaction(&session, amount, &category, &kind, date)
            .await?;
        writeln!(
            self.output,
            "Transaction added successfully! (#{})",
            transaction.id
        )?;
        Ok(())
    }

    async fn update_transaction(&mut self) -> Result<()> {
        let session = self.session()?;
        let id = self.ask_id()?;
        let amount = self.ask_amount("Enter amount: ")?;
        let category = self.ask("Enter category: ")?;
        let kind = self.ask("Enter type (income/expense): ")?;
        let date = self.ask_date()?;

        self.service
            .update_transaction(&session, id, amount, &category, &kind, date)
            .await?;
        writeln!(self.output, "Transaction updated successfully!")?;
        Ok(())
    }

    async fn delete_transaction(&mut self) -> Result<()> {
        let session = self.session()?;
        let id = self.ask_id()?;
        self.service.delete_transaction(&session, id).await?;
        writeln!(self.output, "Transaction deleted successfully!")?;
        Ok(())
    }

    fn ask_id(&mut self) -> Result<i64> {
        let raw = self.ask("Enter transaction ID: ")?;
        raw.parse()
            .map_err(|_| anyhow::anyhow!("Invalid transaction ID '{}'", raw))
    }

    async fn list_transactions(&mut self) -> Result<()> {
        let session = self.session()?;
        let transactions = self
            .service
            .list_transactions(&session, TransactionFilter::default())
            .await?;

        if transactions.is_empty() {
            writeln!(self.output, "No transactions found.")?;
        }
        for t in &transactions {
            writeln!(
                self.output,
                "#{} {} {} {} {}",
                t.id,
                t.date,
                t.kind,
                t.category,
                format_cents(t.amount_cents)
            )?;
        }
        Ok(())
    }

    async fn report(&mut self) -> Result<()> {
        let session = self.session()?;
        let raw = self.ask("Enter period (monthly/yearly or YYYY-MM): ")?;
        let period = parse_menu_period(&raw, self.today())?;

        let report = self.service.report(&session, period).await?;
        writeln!(
            self.output,
            "Total Income: {}, Total Expenses: {}, Savings: {}",
            format_cents(report.total_income),
            format_cents(report.total_expense),
            format_cents(report.savings)
        )?;
        Ok(())
    }

    async fn set_budget(&mut self) -> Result<()> {
        let session = self.session()?;
        let category = self.ask("Enter category: ")?;
        let limit = self.ask_amount("Enter limit: ")?;
        self.service.set_budget(&session, &category, limit).await?;
        writeln!(self.output, "Budget set successfully!")?;
        Ok(())
    }

    async fn check_budget(&mut self) -> Result<()> {
        let session = self.session()?;
        let category = self.ask("Enter category: ")?;

        match self.service.check_budget(&session, &category).await? {
            Some(status) if status.exceeded => writeln!(
                self.output,
                "Warning: You have exceeded your budget limit for {}!",
                category
            )?,
            Some(status) => writeln!(
                self.output,
                "Remaining budget for {}: {}",
                category,
                format_cents(status.remaining)
            )?,
            None => writeln!(self.output, "No budget set for this category.")?,
        }
        Ok(())
    }

    async fn backup(&mut self) -> Result<()> {
        let raw = self.ask(&format!("Enter backup path [{}]: ", DEFAULT_BACKUP_PATH))?;
        let path = if raw.is_empty() { DEFAULT_BACKUP_PATH } else { raw.as_str() };
        self.service.backup(Path::new(path)).await?;
        writeln!(self.output, "Database backup created successfully!")?;
        Ok(())
    }

    async fn restore(&mut self) -> Result<()> {
        let raw = self.ask(&format!("Enter backup path [{}]: ", DEFAULT_BACKUP_PATH))?;
        let path = if raw.is_empty() { DEFAULT_BACKUP_PATH } else { raw.as_str() };
        self.service.restore(Path::new(path)).await?;
        // User IDs from the restored file may not match the current session
        self.session = None;
        writeln!(
            self.output,
            "Database restored successfully! Please log in again."
        )?;
        Ok(())
    }
}

/// `YYYY-MM` selects a month; anything else is a relative tag.
fn parse_menu_period(raw: &str, today: NaiveDate) -> Result<ReportPeriod, AppError> {
    if let Some((year, month)) = raw.split_once('-') {
        if let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) {
            return ReportPeriod::month(year, month)
                .ok_or_else(|| AppError::InvalidPeriod(raw.to_string()));
        }
    }
    resolve_period_tag(raw, today)
}

/// Human-readable outcome for a failed menu action.
fn describe(error: &anyhow::Error) -> String {
    match error.downcast_ref::<AppError>() {
        Some(AppError::UsernameTaken(_)) => "Username already exists!".to_string(),
        Some(AppError::InvalidCredentials) => "Invalid credentials!".to_string(),
        Some(AppError::BackupNotFound(_)) => "Backup file not found!".to_string(),
        Some(other) => other.to_string(),
        None => error.to_string(),
    }
}
