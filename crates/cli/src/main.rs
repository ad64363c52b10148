//! Lendmarket CLI - loan marketplace operations from the command line
//!
//! Usage:
//! ```bash
//! lendmarket init
//! lendmarket --user alice deposit 10000 --currency HTG
//! lendmarket --user bob loan request 5000 --rate 12 --term 12 --purpose "Shop stock"
//! lendmarket --user alice offer create LOAN_... 5000 --rate 9.5
//! lendmarket --user bob accept LOAN_... OFR_...
//! lendmarket --user bob pay LOAN_... 1 444.24
//! lendmarket schedule LOAN_...
//! lendmarket activity --user bob
//! ```

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use lendmarket_business::MarketError;
use lendmarket_core::LoanStatus;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod db;

use commands::{activity, loan, offer, repayment, wallet};
use config::MarketConfig;

/// Lendmarket - peer-to-peer loan marketplace with wallet settlement
#[derive(Parser)]
#[command(name = "lendmarket")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML config file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Database url, overrides the config file
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Acting user id
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    fn actor(&self) -> Result<&str> {
        match self.user.as_deref() {
            Some(user) if !user.trim().is_empty() => Ok(user),
            _ => bail!("this command needs an acting user: pass --user <id>"),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and run migrations
    Init,

    /// Show database status
    Status,

    /// Deposit external funds into your wallet
    Deposit {
        amount: Decimal,
        /// Currency code, defaults to the configured currency
        #[arg(long)]
        currency: Option<String>,
    },

    /// Withdraw available funds from your wallet
    Withdraw {
        amount: Decimal,
        #[arg(long)]
        currency: Option<String>,
    },

    /// Show your wallets
    Balance,

    /// Ledger entries of one of your wallets
    History {
        #[arg(long)]
        currency: Option<String>,
    },

    /// Check wallet balances against their ledger entries
    Reconcile {
        /// User to check, defaults to --user
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        currency: Option<String>,
    },

    /// Loan requests
    Loan {
        #[command(subcommand)]
        action: LoanAction,
    },

    /// Offers on loan requests
    Offer {
        #[command(subcommand)]
        action: OfferAction,
    },

    /// Accept an offer and fund the loan
    Accept {
        loan_id: String,
        offer_id: String,
        /// Loan start date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start: Option<NaiveDate>,
    },

    /// Pay toward one installment
    Pay {
        loan_id: String,
        installment: u32,
        amount: Decimal,
        /// Payment date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Flag an unpaid installment as late
    MarkLate {
        loan_id: String,
        installment: u32,
    },

    /// Repayment schedule of a loan
    Schedule {
        loan_id: String,
        /// Evaluate overdue state as of this date
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Query the activity log
    Activity {
        /// Only records for this user
        #[arg(long)]
        of: Option<String>,
        /// Only records about this loan or offer
        #[arg(long)]
        reference: Option<String>,
        /// Actions to include (comma-separated)
        #[arg(long, value_delimiter = ',')]
        actions: Option<Vec<String>>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
pub enum LoanAction {
    /// Request a loan as borrower
    Request {
        amount: Decimal,
        /// Annual interest rate in percent
        #[arg(long)]
        rate: Decimal,
        /// Term in months
        #[arg(long)]
        term: u32,
        #[arg(long)]
        purpose: String,
        #[arg(long)]
        currency: Option<String>,
    },
    /// Show one loan with its offers
    Show { loan_id: String },
    /// List loans
    List {
        /// Only loans you borrowed or funded
        #[arg(long)]
        mine: bool,
        #[arg(long)]
        status: Option<StatusArg>,
    },
    /// Cancel your open loan request
    Cancel { loan_id: String },
    /// Mark an active loan as defaulted
    Default { loan_id: String },
}

#[derive(Subcommand)]
pub enum OfferAction {
    /// Offer to fund a loan request
    Create {
        loan_id: String,
        amount: Decimal,
        /// Annual interest rate in percent
        #[arg(long)]
        rate: Decimal,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Change the terms of your pending offer
    Edit {
        offer_id: String,
        amount: Decimal,
        #[arg(long)]
        rate: Decimal,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Reject an offer on your loan request
    Reject {
        offer_id: String,
        #[arg(long, default_value = "Declined by borrower")]
        reason: String,
    },
    /// Withdraw your pending offer
    Withdraw { offer_id: String },
    /// Offers on a loan, or your own offers when no loan is given
    List { loan_id: Option<String> },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Requested,
    Active,
    Completed,
    Cancelled,
    Defaulted,
}

impl StatusArg {
    pub fn to_core(self) -> LoanStatus {
        match self {
            StatusArg::Requested => LoanStatus::Requested,
            StatusArg::Active => LoanStatus::Active,
            StatusArg::Completed => LoanStatus::Completed,
            StatusArg::Cancelled => LoanStatus::Cancelled,
            StatusArg::Defaulted => LoanStatus::Defaulted,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match MarketConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(2);
        }
    };
    if let Some(url) = &cli.db {
        config.database_url = url.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(database_url = %config.database_url, activity_dir = %config.activity_dir.display(), "configuration loaded");

    if let Err(err) = run(&cli, &config).await {
        report(&err);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, config: &MarketConfig) -> Result<()> {
    match &cli.command {
        Commands::Init => db::init(config).await?,
        Commands::Status => db::show_status(config).await?,
        Commands::Deposit { amount, currency } => {
            wallet::deposit(config, cli.actor()?, currency.as_deref(), *amount).await?
        }
        Commands::Withdraw { amount, currency } => {
            wallet::withdraw(config, cli.actor()?, currency.as_deref(), *amount).await?
        }
        Commands::Balance => wallet::balance(config, cli.actor()?, cli.json).await?,
        Commands::History { currency } => {
            wallet::history(config, cli.actor()?, currency.as_deref(), cli.json).await?
        }
        Commands::Reconcile { owner, currency } => {
            let owner = match owner {
                Some(owner) => owner.as_str(),
                None => cli.actor()?,
            };
            wallet::reconcile(config, owner, currency.as_deref()).await?
        }
        Commands::Loan { action } => loan::handle(config, cli, action).await?,
        Commands::Offer { action } => offer::handle(config, cli, action).await?,
        Commands::Accept { loan_id, offer_id, start } => {
            offer::accept(config, cli.actor()?, loan_id, offer_id, *start).await?
        }
        Commands::Pay { loan_id, installment, amount, date } => {
            repayment::pay(config, cli.actor()?, loan_id, *installment, *amount, *date).await?
        }
        Commands::MarkLate { loan_id, installment } => {
            repayment::mark_late(config, cli.actor()?, loan_id, *installment).await?
        }
        Commands::Schedule { loan_id, today } => {
            repayment::schedule(config, loan_id, *today, cli.json).await?
        }
        Commands::Activity { of, reference, actions, from, to } => {
            let query = activity::Query {
                user_id: of.clone(),
                reference_id: reference.clone(),
                actions: actions.clone(),
                from: *from,
                to: *to,
            };
            activity::show(config, query, cli.json)?
        }
    }
    Ok(())
}

/// Business errors print their user-facing message and code
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<MarketError>() {
        Some(market) => {
            eprintln!("❌ {} [{}]", market.user_message(), market.code());
            if market.is_retryable() {
                eprintln!("   The operation was rolled back and can be retried");
            }
        }
        None => eprintln!("❌ {:#}", err),
    }
}
