use chrono::{Local, Timelike};
use clap::Subcommand;
use habitrack_core::notify::ReminderBook;
use habitrack_core::storage::ReminderRecord;
use habitrack_core::{Database, ReminderTime};

use crate::context::CliResult;

#[derive(Subcommand)]
pub enum RemindersAction {
    /// List every scheduled reminder
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reminders that fire at a given time
    Due {
        /// HH:MM, defaults to the current local time
        #[arg(long)]
        at: Option<ReminderTime>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: RemindersAction) -> CliResult {
    let book = ReminderBook::new(Database::open()?);
    match action {
        RemindersAction::List { json } => print(&book.list()?, json),
        RemindersAction::Due { at, json } => {
            let at = match at {
                Some(at) => at,
                None => {
                    let now = Local::now();
                    ReminderTime::new(now.hour() as u8, now.minute() as u8)?
                }
            };
            print(&book.due_at(at)?, json)
        }
    }
}

fn print(reminders: &[ReminderRecord], json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(reminders)?);
        return Ok(());
    }
    if reminders.is_empty() {
        println!("no reminders");
    }
    for r in reminders {
        println!("{:02}:{:02}  {}  {}", r.hour, r.minute, r.title, r.body);
    }
    Ok(())
}
