//! Transaction management for the budgeting application.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and managing transactions
//! - View handlers for transaction-related web pages

mod core;
mod create_endpoint;
mod create_page;
mod delete_endpoint;
mod edit_endpoint;
mod edit_page;
mod form;
mod transactions_page;

pub use core::{
    Amount, Transaction, TransactionBuilder, TransactionKind, TransactionUpdate,
    count_transactions, create_transaction, create_transaction_table, delete_transaction,
    get_recent_transactions, get_user_transaction, update_transaction,
};
pub use create_endpoint::create_transaction_endpoint;
pub use create_page::get_create_transaction_page;
pub use delete_endpoint::delete_transaction_endpoint;
pub use edit_endpoint::edit_transaction_endpoint;
pub use edit_page::get_edit_transaction_page;
pub(crate) use form::{
    CategoryOptions, amount_input, category_select, end_date_input, frequency_select, name_input,
    notes_input,
};
pub use transactions_page::get_transactions_page;

#[cfg(test)]
pub use core::get_transaction;
