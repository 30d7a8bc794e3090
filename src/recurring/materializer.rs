//! Turns the due occurrences of recurring transactions into transactions.

use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    recurring::{
        RecurringTemplate, RecurringTemplateId,
        core::{get_due_template_ids, get_template_for_sweep, set_schedule},
        frequency::next_occurrence,
    },
    transaction::{Transaction, create_transaction},
};

/// The outcome of a sweep over the due recurring transactions.
#[derive(Debug, Default, PartialEq)]
pub struct SweepReport {
    /// The number of transactions created across all recurring transactions.
    pub materialized: usize,
    /// The recurring transactions that could not be fully processed.
    pub failures: Vec<SweepFailure>,
}

/// A recurring transaction that failed part way through a sweep.
///
/// Occurrences before the failure were committed. The failed occurrence is
/// left as the next occurrence so the next sweep retries it.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("recurring transaction {template_id} failed after creating {materialized} transactions: {error}")]
pub struct SweepFailure {
    pub template_id: RecurringTemplateId,
    /// The number of transactions created before the error.
    pub materialized: usize,
    pub error: Error,
}

/// Create a transaction for every due occurrence of every active recurring
/// transaction, for all users.
///
/// An error in one recurring transaction is recorded in the report and the
/// sweep moves on to the next one. Running the sweep again with the same
/// `today` creates nothing new.
///
/// # Errors
/// Returns an error if the due recurring transactions could not be queried.
pub fn run_sweep(today: Date, connection: &Connection) -> Result<SweepReport, Error> {
    let template_ids = get_due_template_ids(today, connection)?;
    let mut report = SweepReport::default();

    for template_id in template_ids {
        let result = get_template_for_sweep(template_id, connection)
            .map_err(|error| SweepFailure {
                template_id,
                materialized: 0,
                error,
            })
            .and_then(|template| materialize_template(&template, today, connection));

        match result {
            Ok(count) => report.materialized += count,
            Err(failure) => {
                report.materialized += failure.materialized;
                report.failures.push(failure);
            }
        }
    }

    Ok(report)
}

/// Create a transaction for each occurrence of `template` on or before `today`.
///
/// Each occurrence is inserted and the schedule advanced in one SQL
/// transaction, so an occurrence is never created twice or skipped. The
/// recurring transaction is deactivated in the same SQL transaction once its
/// next occurrence would fall after its end date. A recurring transaction
/// that is already past its end date is deactivated without creating
/// anything.
///
/// Returns the number of transactions created.
///
/// # Errors
/// Returns a [SweepFailure] with the number of transactions created before
/// the error.
pub fn materialize_template(
    template: &RecurringTemplate,
    today: Date,
    connection: &Connection,
) -> Result<usize, SweepFailure> {
    let mut materialized = 0;

    if !template.is_active {
        return Ok(materialized);
    }

    let fail = |materialized, error| SweepFailure {
        template_id: template.id,
        materialized,
        error,
    };

    let mut date = template.next_occurrence;

    if template.ends_before(date) {
        tracing::info!(
            "Recurring transaction {} ended on {:?}, deactivating it",
            template.id,
            template.end_date
        );
        set_schedule(template.id, date, false, connection)
            .map_err(|error| fail(materialized, error))?;

        return Ok(materialized);
    }

    while date <= today && !template.ends_before(date) {
        let following = next_occurrence(date, template.frequency);
        // At the last representable date the schedule cannot move forward.
        let is_active = following > date && !template.ends_before(following);

        materialize_occurrence(template, date, following, is_active, connection)
            .map_err(|error| fail(materialized, error))?;

        materialized += 1;
        tracing::debug!(
            "Created transaction for recurring transaction {} on {date}",
            template.id
        );

        if !is_active {
            tracing::info!(
                "Recurring transaction {} has no occurrences left, deactivating it",
                template.id
            );
            break;
        }

        date = following;
    }

    Ok(materialized)
}

fn materialize_occurrence(
    template: &RecurringTemplate,
    date: Date,
    following: Date,
    is_active: bool,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    create_transaction(
        Transaction::build(
            template.user_id,
            &template.name,
            template.amount,
            template.kind,
            &template.category,
            date,
        )
        .notes(template.notes.clone())
        .recurring_template_id(template.id),
        &sql_transaction,
    )?;
    set_schedule(template.id, following, is_active, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(())
}

/// Log the totals of a sweep and each failure.
pub fn log_sweep_report(report: &SweepReport) {
    tracing::info!(
        "Recurring transaction sweep created {} transactions",
        report.materialized
    );

    for failure in &report.failures {
        tracing::error!("{failure}");
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::{Date, macros::date};

    use crate::{
        Error,
        recurring::{
            Frequency, RecurringTemplateId, core::test_helpers::*, create_recurring_template,
            get_recurring_template, set_schedule, toggle_recurring_template,
        },
        transaction::{count_transactions, get_recent_transactions},
    };

    use super::{SweepFailure, materialize_template, run_sweep};

    fn get_occurrence_dates(template_id: RecurringTemplateId, conn: &Connection) -> Vec<Date> {
        conn.prepare(
            "SELECT date FROM \"transaction\" WHERE recurring_template_id = ?1 ORDER BY date",
        )
        .unwrap()
        .query_map((template_id,), |row| row.get(0))
        .unwrap()
        .map(|date| date.unwrap())
        .collect()
    }

    #[test]
    fn catches_up_on_missed_monthly_occurrences() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15)),
            &conn,
        )
        .unwrap();

        let report = run_sweep(date!(2024 - 03 - 20), &conn).unwrap();

        assert_eq!(report.materialized, 3);
        assert!(report.failures.is_empty());
        assert_eq!(
            get_occurrence_dates(template.id, &conn),
            vec![date!(2024 - 01 - 15), date!(2024 - 02 - 15), date!(2024 - 03 - 15)]
        );
        let template = get_recurring_template(template.id, user_id, &conn).unwrap();
        assert_eq!(template.next_occurrence, date!(2024 - 04 - 15));
        assert!(template.is_active);
    }

    #[test]
    fn occurrence_on_today_is_included() {
        let (conn, user_id) = get_test_connection();
        create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15)),
            &conn,
        )
        .unwrap();

        let report = run_sweep(date!(2024 - 03 - 15), &conn).unwrap();

        assert_eq!(report.materialized, 3);
    }

    #[test]
    fn occurrence_after_today_is_not_created() {
        let (conn, user_id) = get_test_connection();
        create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15)),
            &conn,
        )
        .unwrap();

        let report = run_sweep(date!(2024 - 03 - 14), &conn).unwrap();

        assert_eq!(report.materialized, 2);
    }

    #[test]
    fn second_sweep_on_same_day_creates_nothing() {
        let (conn, user_id) = get_test_connection();
        create_recurring_template(
            rent(user_id, Frequency::Weekly, date!(2024 - 01 - 01)),
            &conn,
        )
        .unwrap();
        let today = date!(2024 - 02 - 01);

        let first = run_sweep(today, &conn).unwrap();
        let second = run_sweep(today, &conn).unwrap();

        assert_eq!(first.materialized, 5);
        assert_eq!(second.materialized, 0);
        assert_eq!(count_transactions(user_id, &conn), Ok(5));
    }

    #[test]
    fn generated_transactions_copy_the_template() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            salary(user_id, Frequency::Monthly, date!(2024 - 01 - 15))
                .notes(Some("after tax".to_owned())),
            &conn,
        )
        .unwrap();

        materialize_template(&template, date!(2024 - 01 - 15), &conn).unwrap();

        let transactions = get_recent_transactions(user_id, 10, &conn).unwrap();
        assert_eq!(transactions.len(), 1);
        let transaction = &transactions[0];
        assert_eq!(transaction.name, "Salary");
        assert_eq!(transaction.amount, template.amount);
        assert_eq!(transaction.kind, template.kind);
        assert_eq!(transaction.category, "Salary");
        assert_eq!(transaction.notes, Some("after tax".to_owned()));
        assert_eq!(transaction.date, date!(2024 - 01 - 15));
        assert!(transaction.is_recurring);
        assert_eq!(transaction.recurring_template_id, Some(template.id));
    }

    #[test]
    fn month_end_schedule_follows_clamped_dates() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 31)),
            &conn,
        )
        .unwrap();

        run_sweep(date!(2024 - 03 - 30), &conn).unwrap();

        assert_eq!(
            get_occurrence_dates(template.id, &conn),
            vec![date!(2024 - 01 - 31), date!(2024 - 02 - 29), date!(2024 - 03 - 29)]
        );
    }

    #[test]
    fn nothing_is_created_after_the_end_date() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15))
                .end_date(Some(date!(2024 - 02 - 20))),
            &conn,
        )
        .unwrap();

        let report = run_sweep(date!(2024 - 06 - 01), &conn).unwrap();

        assert_eq!(report.materialized, 2);
        assert_eq!(
            get_occurrence_dates(template.id, &conn),
            vec![date!(2024 - 01 - 15), date!(2024 - 02 - 15)]
        );
        let template = get_recurring_template(template.id, user_id, &conn).unwrap();
        assert!(!template.is_active);
        assert_eq!(template.next_occurrence, date!(2024 - 03 - 15));
    }

    #[test]
    fn occurrence_on_the_end_date_is_created() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15))
                .end_date(Some(date!(2024 - 02 - 15))),
            &conn,
        )
        .unwrap();

        run_sweep(date!(2024 - 06 - 01), &conn).unwrap();

        assert_eq!(
            get_occurrence_dates(template.id, &conn),
            vec![date!(2024 - 01 - 15), date!(2024 - 02 - 15)]
        );
    }

    #[test]
    fn template_already_past_end_date_is_deactivated() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15))
                .end_date(Some(date!(2024 - 02 - 20))),
            &conn,
        )
        .unwrap();
        set_schedule(template.id, date!(2024 - 03 - 15), true, &conn).unwrap();

        let report = run_sweep(date!(2024 - 06 - 01), &conn).unwrap();

        assert_eq!(report, Default::default());
        let template = get_recurring_template(template.id, user_id, &conn).unwrap();
        assert!(!template.is_active);
    }

    #[test]
    fn future_start_date_creates_nothing() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 05 - 01)),
            &conn,
        )
        .unwrap();

        let created = materialize_template(&template, date!(2024 - 04 - 30), &conn);

        assert_eq!(created, Ok(0));
        assert_eq!(count_transactions(user_id, &conn), Ok(0));
    }

    #[test]
    fn paused_templates_are_skipped() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Daily, date!(2024 - 01 - 01)),
            &conn,
        )
        .unwrap();
        toggle_recurring_template(template.id, user_id, &conn).unwrap();

        let report = run_sweep(date!(2024 - 01 - 10), &conn).unwrap();

        assert_eq!(report.materialized, 0);
    }

    #[test]
    fn failing_template_does_not_stop_the_others() {
        let (conn, user_id) = get_test_connection();
        let failing = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15)),
            &conn,
        )
        .unwrap();
        let working = create_recurring_template(
            salary(user_id, Frequency::Monthly, date!(2024 - 01 - 20)),
            &conn,
        )
        .unwrap();
        conn.execute_batch(&format!(
            "CREATE TRIGGER fail_insert BEFORE INSERT ON \"transaction\"
             WHEN NEW.recurring_template_id = {}
             BEGIN SELECT RAISE(ABORT, 'insert failed'); END;",
            failing.id
        ))
        .unwrap();

        let report = run_sweep(date!(2024 - 03 - 20), &conn).unwrap();

        assert_eq!(report.materialized, 3);
        assert_eq!(report.failures.len(), 1);
        let SweepFailure {
            template_id,
            materialized,
            error,
        } = &report.failures[0];
        assert_eq!(*template_id, failing.id);
        assert_eq!(*materialized, 0);
        assert!(matches!(error, Error::SqlError(_)));
        assert_eq!(get_occurrence_dates(working.id, &conn).len(), 3);
        let failing = get_recurring_template(failing.id, user_id, &conn).unwrap();
        assert_eq!(failing.next_occurrence, date!(2024 - 01 - 15));
    }

    #[test]
    fn unreadable_template_does_not_stop_the_others() {
        let (conn, user_id) = get_test_connection();
        let unreadable = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15)),
            &conn,
        )
        .unwrap();
        let working = create_recurring_template(
            salary(user_id, Frequency::Monthly, date!(2024 - 01 - 20)),
            &conn,
        )
        .unwrap();
        conn.execute(
            "UPDATE recurring_transaction SET kind = 'TRANSFER' WHERE id = ?1",
            (unreadable.id,),
        )
        .unwrap();

        let report = run_sweep(date!(2024 - 03 - 20), &conn).unwrap();

        assert_eq!(report.materialized, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].template_id, unreadable.id);
        assert_eq!(report.failures[0].materialized, 0);
        assert!(matches!(report.failures[0].error, Error::SqlError(_)));
        assert_eq!(get_occurrence_dates(working.id, &conn).len(), 3);
        assert!(get_occurrence_dates(unreadable.id, &conn).is_empty());
    }

    #[test]
    fn failure_part_way_keeps_earlier_occurrences() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15)),
            &conn,
        )
        .unwrap();
        conn.execute_batch(
            "CREATE TRIGGER fail_insert BEFORE INSERT ON \"transaction\"
             WHEN NEW.date = '2024-02-15'
             BEGIN SELECT RAISE(ABORT, 'insert failed'); END;",
        )
        .unwrap();

        let result = materialize_template(&template, date!(2024 - 03 - 20), &conn);

        let failure = result.unwrap_err();
        assert_eq!(failure.materialized, 1);
        assert_eq!(
            get_occurrence_dates(template.id, &conn),
            vec![date!(2024 - 01 - 15)]
        );
        let template = get_recurring_template(template.id, user_id, &conn).unwrap();
        assert_eq!(template.next_occurrence, date!(2024 - 02 - 15));
    }

    #[test]
    fn failed_advance_rolls_back_the_insert() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2024 - 01 - 15)),
            &conn,
        )
        .unwrap();
        conn.execute_batch(
            "CREATE TRIGGER fail_advance BEFORE UPDATE ON recurring_transaction
             BEGIN SELECT RAISE(ABORT, 'update failed'); END;",
        )
        .unwrap();

        let result = materialize_template(&template, date!(2024 - 01 - 15), &conn);

        assert!(result.is_err());
        assert_eq!(count_transactions(user_id, &conn), Ok(0));
    }

    #[test]
    fn schedule_at_last_date_stops_and_deactivates() {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Daily, Date::MAX),
            &conn,
        )
        .unwrap();

        let created = materialize_template(&template, Date::MAX, &conn);

        assert_eq!(created, Ok(1));
        let template = get_recurring_template(template.id, user_id, &conn).unwrap();
        assert!(!template.is_active);
    }
}
