use habitrack_core::{Config, Overview};

use crate::context::{keep_cached, AppContext, CliResult};

pub async fn run(json: bool, config: Config) -> CliResult {
    let mut ctx = AppContext::new(config)?;
    let user_id = ctx.require_user().await?;
    let mut registry = ctx.habits()?;
    let mut log = ctx.completion_log()?;
    keep_cached("habits", registry.load(&user_id).await);
    keep_cached("completions", log.load(&user_id).await);

    let overview = Overview::compute(registry.habits(), &log);
    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    println!("habits:          {}", overview.total_habits);
    println!(
        "this week:       {}/{} ({}%)",
        overview.weekly_completed, overview.weekly_possible, overview.weekly_percentage
    );
    println!("longest streak:  {}", overview.longest_streak);
    println!("active streaks:  {}", overview.active_streaks);
    for s in &overview.habits {
        println!(
            "  {} {}  streak {}  week {}/{} ({}%)",
            s.habit.emoji, s.habit.title, s.streak, s.weekly.completed, s.weekly.total, s.weekly.percentage
        );
    }
    Ok(())
}
