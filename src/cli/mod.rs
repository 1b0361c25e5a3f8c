mod menu;

pub use menu::run_menu;

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::{
    AppError, CategoryTotal, FinancialReport, LedgerService, TransactionFilter,
    resolve_period_tag,
};
use crate::domain::{ReportPeriod, Session, TransactionKind, format_cents, parse_cents};

/// Default location of `backup` when no path is given
pub const DEFAULT_BACKUP_PATH: &str = "backup/finance_backup.db";

/// Thrifty - Personal Finance Tracker
#[derive(Parser)]
#[command(name = "thrifty")]
#[command(about = "A local-first personal finance tracker: income, expenses, reports and budgets")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(
        short,
        long,
        env = "THRIFTY_DATABASE",
        default_value = "finance.db",
        global = true
    )]
    pub database: PathBuf,

    /// Username for commands that work on a user's data
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Password (prompted on stdin when omitted)
    #[arg(long, env = "THRIFTY_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Register a new user
    Register {
        /// Username (must be unique)
        username: String,
    },

    /// Record an income or expense
    Add {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Category (e.g., "Salary", "Food")
        #[arg(short, long)]
        category: String,

        /// Type: income or expense
        #[arg(short, long)]
        kind: String,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Replace an existing transaction
    Update {
        /// Transaction ID
        id: i64,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Category
        #[arg(short, long)]
        category: String,

        /// Type: income or expense
        #[arg(short, long)]
        kind: String,

        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },

    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: i64,
    },

    /// List transactions
    List {
        /// Filter by category
        #[arg(long)]
        category: Option<String>,

        /// Filter by type: income or expense
        #[arg(long)]
        kind: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Filter to date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Income, expenses and savings for a period
    Report {
        #[command(flatten)]
        period: PeriodArgs,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Totals per category for a period
    Categories {
        #[command(flatten)]
        period: PeriodArgs,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Budget management commands
    #[command(subcommand)]
    Budget(BudgetCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: transactions, budgets, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy the database file to a backup location
    Backup {
        /// Backup file path
        #[arg(default_value = DEFAULT_BACKUP_PATH)]
        path: PathBuf,
    },

    /// Replace the database with a backup copy
    Restore {
        /// Backup file path
        path: PathBuf,
    },

    /// Interactive menu
    Menu,
}

/// Period selection shared by the report commands.
/// An explicit month or year wins over the relative `--period` tag.
#[derive(clap::Args)]
pub struct PeriodArgs {
    /// Year (defaults to the current year when --month is given)
    #[arg(long)]
    pub year: Option<i32>,

    /// Month 1-12
    #[arg(long)]
    pub month: Option<u32>,

    /// Relative period: monthly, yearly
    #[arg(long, default_value = "monthly")]
    pub period: String,
}

impl PeriodArgs {
    fn resolve(&self, today: NaiveDate) -> Result<ReportPeriod, AppError> {
        match (self.year, self.month) {
            (year, Some(month)) => {
                let year = year.unwrap_or(today.year());
                ReportPeriod::month(year, month)
                    .ok_or_else(|| AppError::InvalidPeriod(format!("{}-{:02}", year, month)))
            }
            (Some(year), None) => {
                ReportPeriod::year(year).ok_or_else(|| AppError::InvalidPeriod(year.to_string()))
            }
            (None, None) => resolve_period_tag(&self.period, today),
        }
    }
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Set the limit for a category (replaces an existing limit)
    Set {
        /// Category to track
        category: String,

        /// Limit (e.g., "1000" or "1000.00")
        amount: String,
    },

    /// Show spending against the limit for a category
    Check {
        /// Category
        category: String,
    },

    /// List all budgets with their status
    List,

    /// Delete a budget
    Delete {
        /// Category
        category: String,
    },
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "thrifty=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match &self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database.display());
            }

            Commands::Register { username } => {
                let service = LedgerService::init(&self.database).await?;
                let password = self.password_or_prompt()?;
                let user_id = service.register(username, &password).await?;
                println!("User registered successfully! ({}, id {})", username, user_id);
            }

            Commands::Add {
                amount,
                category,
                kind,
                date,
            } => {
                let service = LedgerService::init(&self.database).await?;
                let session = self.login(&service).await?;
                let amount_cents =
                    parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let date = match date {
                    Some(date_str) => parse_date(date_str)?,
                    None => Utc::now().date_naive(),
                };

                let transaction = service
                    .add_transaction(&session, amount_cents, category, kind, date)
                    .await?;
                println!(
                    "Transaction added: #{} {} {} {} on {}",
                    transaction.id,
                    transaction.kind,
                    format_cents(transaction.amount_cents),
                    transaction.category,
                    transaction.date
                );
            }

            Commands::Update {
                id,
                amount,
                category,
                kind,
                date,
            } => {
                let service = LedgerService::init(&self.database).await?;
                let session = self.login(&service).await?;
                let amount_cents =
                    parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let date = parse_date(date)?;

                let transaction = service
                    .update_transaction(&session, *id, amount_cents, category, kind, date)
                    .await?;
                println!("Transaction #{} updated.", transaction.id);
            }

            Commands::Delete { id } => {
                let service = LedgerService::init(&self.database).await?;
                let session = self.login(&service).await?;
                let transaction = service.delete_transaction(&session, *id).await?;
                println!(
                    "Transaction #{} deleted ({} {}).",
                    transaction.id,
                    transaction.category,
                    format_cents(transaction.amount_cents)
                );
            }

            Commands::List {
                category,
                kind,
                from,
                to,
                limit,
            } => {
                let service = LedgerService::init(&self.database).await?;
                let session = self.login(&service).await?;
                let filter = TransactionFilter {
                    category: category.clone(),
                    kind: kind
                        .as_deref()
                        .map(|k| {
                            TransactionKind::from_str(k)
                                .ok_or_else(|| AppError::InvalidTransactionKind(k.to_string()))
                        })
                        .transpose()?,
                    from_date: from
                        .as_deref()
                        .map(parse_date)
                        .transpose()
                        .context("Invalid --from date")?,
                    to_date: to
                        .as_deref()
                        .map(parse_date)
                        .transpose()
                        .context("Invalid --to date")?,
                    limit: *limit,
                };
                run_list_command(&service, &session, filter).await?;
            }

            Commands::Report { period, format } => {
                let service = LedgerService::init(&self.database).await?;
                let session = self.login(&service).await?;
                let period = period.resolve(Utc::now().date_naive())?;
                let report = service.report(&session, period).await?;
                print_report(&report, format)?;
            }

            Commands::Categories { period, format } => {
                let service = LedgerService::init(&self.database).await?;
                let session = self.login(&service).await?;
                let period = period.resolve(Utc::now().date_naive())?;
                run_categories_command(&service, &session, period, format).await?;
            }

            Commands::Budget(budget_cmd) => {
                let service = LedgerService::init(&self.database).await?;
                let session = self.login(&service).await?;
                run_budget_command(&service, &session, budget_cmd).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = LedgerService::init(&self.database).await?;
                let session = self.login(&service).await?;
                run_export_command(&service, &session, export_type, output.as_ref()).await?;
            }

            Commands::Backup { path } => {
                let service = LedgerService::init(&self.database).await?;
                let bytes = service.backup(path).await?;
                println!(
                    "Database backup created successfully: {} ({} bytes)",
                    path.display(),
                    bytes
                );
            }

            Commands::Restore { path } => {
                let mut service = LedgerService::init(&self.database).await?;
                service.restore(path).await?;
                println!("Database restored successfully from {}", path.display());
            }

            Commands::Menu => {
                let mut service = LedgerService::init(&self.database).await?;
                let stdin = std::io::stdin();
                run_menu(&mut service, stdin.lock(), std::io::stdout()).await?;
            }
        }

        Ok(())
    }

    async fn login(&self, service: &LedgerService) -> Result<Session> {
        let username = self
            .user
            .as_deref()
            .context("This command needs a user. Pass --user <NAME>")?;
        let password = self.password_or_prompt()?;
        Ok(service.login(username, &password).await?)
    }

    fn password_or_prompt(&self) -> Result<String> {
        match &self.password {
            Some(password) => Ok(password.clone()),
            None => {
                let stdin = std::io::stdin();
                prompt_line(&mut stdin.lock(), &mut std::io::stderr(), "Password: ")
            }
        }
    }
}

async fn run_list_command(
    service: &LedgerService,
    session: &Session,
    filter: TransactionFilter,
) -> Result<()> {
    let transactions = service.list_transactions(session, filter).await?;

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:>6} {:<12} {:<8} {:<20} {:>12}",
        "ID", "DATE", "TYPE", "CATEGORY", "AMOUNT"
    );
    println!("{}", "-".repeat(62));
    for transaction in &transactions {
        println!(
            "{:>6} {:<12} {:<8} {:<20} {:>12}",
            transaction.id,
            transaction.date.format("%Y-%m-%d"),
            transaction.kind,
            truncate(&transaction.category, 20),
            format_cents(transaction.amount_cents)
        );
    }
    Ok(())
}

fn print_report(report: &FinancialReport, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        "csv" => write_report_csv(report, std::io::stdout())?,
        _ => {
            println!("Financial Report: {}", report.period);
            println!(
                "Total Income: {}, Total Expenses: {}, Savings: {}",
                format_cents(report.total_income),
                format_cents(report.total_expense),
                format_cents(report.savings)
            );
        }
    }
    Ok(())
}

fn write_report_csv<W: Write>(report: &FinancialReport, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["period", "total_income", "total_expense", "savings"])?;
    csv_writer.write_record([
        report.period.to_string(),
        format_cents(report.total_income),
        format_cents(report.total_expense),
        format_cents(report.savings),
    ])?;
    csv_writer.flush()?;
    Ok(())
}

fn write_categories_csv<W: Write>(totals: &[CategoryTotal], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["kind", "category", "count", "total", "percentage"])?;
    for t in totals {
        csv_writer.write_record([
            t.kind.as_str().to_string(),
            t.category.clone(),
            t.count.to_string(),
            format_cents(t.total),
            format!("{:.2}", t.percentage),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

async fn run_categories_command(
    service: &LedgerService,
    session: &Session,
    period: ReportPeriod,
    format: &str,
) -> Result<()> {
    let totals = service.category_report(session, period).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&totals)?);
        }
        "csv" => write_categories_csv(&totals, std::io::stdout())?,
        _ => {
            println!("Category Report: {}", period);
            println!();
            if totals.is_empty() {
                println!("No transactions in this period.");
                return Ok(());
            }
            println!(
                "{:<8} {:<20} {:>8} {:>12} {:>8}",
                "TYPE", "CATEGORY", "COUNT", "TOTAL", "PERCENT"
            );
            println!("{}", "-".repeat(60));
            for t in &totals {
                println!(
                    "{:<8} {:<20} {:>8} {:>12} {:>7.1}%",
                    t.kind,
                    truncate(&t.category, 20),
                    t.count,
                    format_cents(t.total),
                    t.percentage
                );
            }
        }
    }
    Ok(())
}

async fn run_budget_command(
    service: &LedgerService,
    session: &Session,
    cmd: &BudgetCommands,
) -> Result<()> {
    match cmd {
        BudgetCommands::Set { category, amount } => {
            let limit_cents =
                parse_cents(amount).context("Invalid amount format. Use '1000.00' or '1000'")?;
            let budget = service.set_budget(session, category, limit_cents).await?;
            println!(
                "Budget set successfully: {} ({})",
                budget.category,
                format_cents(budget.limit_cents)
            );
        }

        BudgetCommands::Check { category } => match service.check_budget(session, category).await? {
            Some(status) if status.exceeded => {
                println!(
                    "Warning: You have exceeded your budget limit for {}! (limit {}, spent {})",
                    category,
                    format_cents(status.limit()),
                    format_cents(status.spent)
                );
            }
            Some(status) => {
                println!(
                    "Remaining budget for {}: {} (limit {}, spent {})",
                    category,
                    format_cents(status.remaining),
                    format_cents(status.limit()),
                    format_cents(status.spent)
                );
            }
            None => println!("No budget set for this category."),
        },

        BudgetCommands::List => {
            let statuses = service.budget_statuses(session).await?;
            if statuses.is_empty() {
                println!("No budgets found.");
            } else {
                println!(
                    "{:<20} {:>12} {:>12} {:>12}",
                    "CATEGORY", "LIMIT", "SPENT", "REMAINING"
                );
                println!("{}", "-".repeat(60));
                for status in statuses {
                    println!(
                        "{:<20} {:>12} {:>12} {:>12}{}",
                        truncate(&status.budget.category, 20),
                        format_cents(status.limit()),
                        format_cents(status.spent),
                        format_cents(status.remaining),
                        if status.exceeded { "  EXCEEDED" } else { "" }
                    );
                }
            }
        }

        BudgetCommands::Delete { category } => {
            service.delete_budget(session, category).await?;
            println!("Deleted budget: {}", category);
        }
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    session: &Session,
    export_type: &str,
    output: Option<&PathBuf>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::stdout;

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "transactions" => {
            let count = exporter.export_transactions_csv(session, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "budgets" => {
            let count = exporter.export_budgets_csv(session, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} budgets", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(session, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported {} transactions and {} budgets",
                    snapshot.transactions.len(),
                    snapshot.budgets.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: transactions, budgets, full",
                export_type
            );
        }
    }

    Ok(())
}

/// Print `label` and read one trimmed line. EOF yields an empty string.
pub(crate) fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> Result<String> {
    write!(output, "{}", label)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub(crate) fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
