//! Monthly budgets with optional per-category spending limits.
//!
//! A user has at most one active budget. Its status compares the budget with
//! the expenses recorded since the start of the current month.

mod db;
mod delete;
mod models;
mod page;
mod save;
mod status;

pub use db::create_budget_tables;
pub use delete::delete_budget_endpoint;
pub use page::get_budget_page;
pub use save::save_budget_endpoint;
pub use status::{get_budget_json, get_budget_status_json};
