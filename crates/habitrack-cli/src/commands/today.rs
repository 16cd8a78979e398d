use chrono::{Local, NaiveDate, Timelike};
use clap::{Args, Subcommand};
use habitrack_core::{greeting, Config};
use serde::Serialize;

use super::habit::resolve;
use crate::context::{keep_cached, AppContext, CliResult};

#[derive(Args)]
pub struct TodayArgs {
    #[command(subcommand)]
    action: Option<TodayAction>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
pub enum TodayAction {
    /// Mark a habit done (or undone)
    Toggle {
        /// Habit id or title
        habit: String,
        /// Day to toggle, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Serialize)]
struct TodayEntry<'a> {
    id: &'a str,
    emoji: &'a str,
    title: &'a str,
    completed: bool,
    streak: u32,
}

pub async fn run(args: TodayArgs, config: Config) -> CliResult {
    let mut ctx = AppContext::new(config)?;
    let user_id = ctx.require_user().await?;
    let mut registry = ctx.habits()?;
    let mut log = ctx.completion_log()?;
    let today = Local::now().date_naive();

    if let Some(TodayAction::Toggle { habit, date }) = args.action {
        registry.load(&user_id).await?;
        log.load(&user_id).await?;
        let habit = resolve(&registry, &habit)?;
        let record = log.toggle_completion(&habit.id, date.unwrap_or(today)).await?;
        let state = if record.completed { "done" } else { "not done" };
        println!("{} {} marked {state} for {}", habit.emoji, habit.title, record.date);
        return Ok(());
    }

    keep_cached("habits", registry.load(&user_id).await);
    keep_cached("completions", log.load(&user_id).await);

    let entries: Vec<TodayEntry> = registry
        .habits()
        .iter()
        .map(|h| TodayEntry {
            id: &h.id,
            emoji: &h.emoji,
            title: &h.title,
            completed: log.is_completed_on(&h.id, today),
            streak: log.streak_length_at(&h.id, today),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let mut profile = ctx.profile()?;
    if let Err(e) = profile.load(&user_id).await {
        tracing::warn!(user_id = %user_id, "greeting without profile: {e}");
    }
    println!("{}, {}!", greeting(Local::now().hour()), profile.display_name());
    println!(
        "{}/{} completed today",
        log.completed_count_on(registry.habits(), today),
        entries.len()
    );
    for e in &entries {
        let mark = if e.completed { "x" } else { " " };
        println!("[{mark}] {} {}  streak {}", e.emoji, e.title, e.streak);
    }
    Ok(())
}
