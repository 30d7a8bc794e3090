//! Categories for grouping income and expenses.

mod db;
mod domain;

pub use db::{create_category_table, get_categories, validate_category};
pub use domain::{Category, CategoryName};
