//! Recurring transactions and the engine that turns them into transactions.
//!
//! This module contains:
//! - The `RecurringTemplate` model and its database queries
//! - `next_occurrence` for projecting a schedule forward through the calendar
//! - The sweep that materializes due occurrences, at startup and on a timer
//! - View handlers for listing, editing, pausing and previewing recurring transactions

mod core;
mod delete;
mod edit;
mod frequency;
mod list_page;
mod materializer;
mod preview;
mod startup;
mod toggle;

pub use core::{
    KindFilter, RecurringSummary, RecurringTemplate, RecurringTemplateBuilder,
    RecurringTemplateId, RecurringTemplateUpdate, StatusFilter, create_recurring_template,
    create_recurring_transaction_table, delete_recurring_template, get_active_templates,
    get_due_template_ids, get_recurring_summary, get_recurring_template, get_template_for_sweep,
    list_recurring_templates, set_schedule, toggle_recurring_template, update_recurring_template,
};
pub use delete::delete_recurring_endpoint;
pub use edit::{edit_recurring_endpoint, get_edit_recurring_page};
pub use frequency::{Frequency, next_occurrence};
pub use list_page::get_recurring_page;
pub use materializer::{SweepFailure, SweepReport, materialize_template, run_sweep};
pub use preview::{get_preview_json, get_preview_page};
pub use startup::{StartupSweep, run_startup_sweep, run_sweep_periodically};
pub use toggle::toggle_recurring_endpoint;
