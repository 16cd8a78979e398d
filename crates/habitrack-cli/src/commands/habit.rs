use clap::Subcommand;
use habitrack_core::model::{DEFAULT_EMOJI, EMOJI_PALETTE};
use habitrack_core::{Config, Habit, HabitRegistry, HabitUpdate, NewHabit, ReminderTime};

use crate::context::{keep_cached, AppContext, CliResult};

#[derive(Subcommand)]
pub enum HabitAction {
    /// List habits, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a habit with a daily reminder
    Add {
        /// Habit title (max 50 characters)
        title: String,
        #[arg(long, default_value = DEFAULT_EMOJI)]
        emoji: String,
        /// Reminder time, HH:MM
        #[arg(long, default_value = "09:00")]
        time: ReminderTime,
    },
    /// Change a habit's title, emoji or reminder time
    Edit {
        /// Habit id or title
        habit: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long)]
        time: Option<ReminderTime>,
    },
    /// Delete a habit and its reminder
    Rm {
        /// Habit id or title
        habit: String,
    },
    /// Show the emoji palette
    Emojis,
}

pub async fn run(action: HabitAction, config: Config) -> CliResult {
    if let HabitAction::Emojis = action {
        println!("{}", EMOJI_PALETTE.join(" "));
        return Ok(());
    }

    let mut ctx = AppContext::new(config)?;
    let user_id = ctx.require_user().await?;
    let mut registry = ctx.habits()?;
    let loaded = registry.load(&user_id).await;
    if let HabitAction::List { .. } = action {
        keep_cached("habits", loaded);
    } else {
        loaded?;
    }

    match action {
        HabitAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(registry.habits())?);
            } else if registry.habits().is_empty() {
                println!("no habits yet; add one with `habitrack habit add <title>`");
            } else {
                for habit in registry.habits() {
                    print_habit(habit);
                }
            }
        }
        HabitAction::Add { title, emoji, time } => {
            let habit = registry
                .create(Some(&user_id), NewHabit::new(title, emoji, time))
                .await?;
            print!("created ");
            print_habit(&habit);
        }
        HabitAction::Edit {
            habit,
            title,
            emoji,
            time,
        } => {
            let id = resolve(&registry, &habit)?.id.clone();
            let update = HabitUpdate {
                title,
                emoji,
                reminder_time: time,
            };
            if update.is_empty() {
                return Err("nothing to change; pass --title, --emoji or --time".into());
            }
            let updated = registry.update(&id, update).await?;
            print!("updated ");
            print_habit(&updated);
        }
        HabitAction::Rm { habit } => {
            let habit = resolve(&registry, &habit)?.clone();
            registry.delete(&habit.id).await?;
            println!("deleted {} {}", habit.emoji, habit.title);
        }
        HabitAction::Emojis => {}
    }
    Ok(())
}

fn print_habit(habit: &Habit) {
    println!("{} {}  {}  [{}]", habit.emoji, habit.title, habit.reminder_time, habit.id);
}

/// Find a habit by id, then by case-insensitive title.
pub fn resolve<'a>(registry: &'a HabitRegistry, key: &str) -> CliResult<&'a Habit> {
    if let Some(habit) = registry.find(key) {
        return Ok(habit);
    }
    let mut matches = registry
        .habits()
        .iter()
        .filter(|h| h.title.eq_ignore_ascii_case(key.trim()));
    match (matches.next(), matches.next()) {
        (Some(habit), None) => Ok(habit),
        (Some(_), Some(_)) => Err(format!("several habits are titled '{key}'; use the id").into()),
        (None, _) => Err(format!("no habit matches '{key}'").into()),
    }
}
