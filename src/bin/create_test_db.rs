use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use budgeteur_recurring::{
    Amount, Frequency, RecurringTemplate, TransactionKind, create_recurring_template, create_user,
    initialize_db,
};

/// A utility for creating a test database for the Budgeteur Recurring server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
///
/// The recurring transactions start in the past, so the server's startup
/// sweep has missed occurrences to catch up on.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user...");
    let user = create_user("test", &conn)?;

    println!("Creating recurring transactions...");
    let today = OffsetDateTime::now_utc().date();
    let templates = [
        (
            "Salary",
            3200.0,
            TransactionKind::Income,
            "Salary",
            Frequency::Biweekly,
            today - Duration::days(45),
        ),
        (
            "Rent",
            1800.0,
            TransactionKind::Expense,
            "Housing",
            Frequency::Monthly,
            today - Duration::days(70),
        ),
        (
            "Music streaming",
            12.99,
            TransactionKind::Expense,
            "Subscriptions",
            Frequency::Monthly,
            today - Duration::days(20),
        ),
        (
            "Bus pass",
            25.0,
            TransactionKind::Expense,
            "Transport",
            Frequency::Weekly,
            today - Duration::days(30),
        ),
        (
            "Car insurance",
            640.0,
            TransactionKind::Expense,
            "Insurance",
            Frequency::Yearly,
            today + Duration::days(5),
        ),
    ];

    for (name, amount, kind, category, frequency, start_date) in templates {
        create_recurring_template(
            RecurringTemplate::build(
                user.id,
                name,
                Amount::new(amount)?,
                kind,
                category,
                frequency,
                start_date,
            ),
            &conn,
        )?;
    }

    println!("Success!");

    Ok(())
}
