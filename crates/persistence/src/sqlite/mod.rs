//! SQLite persistence module
//!
//! One repository per entity, all composable inside a single transaction.

pub mod repos;
pub mod schema;

pub use repos::{
    create_pool, init_database, memory_pool, run_migrations, LoanFilter, LoanRepo, OfferRepo,
    PoolSettings, RepaymentRepo, TransactionRepo, WalletRepo,
};
pub use schema::{LoanRow, OfferRow, RepaymentRow, TransactionRow, WalletRow};
