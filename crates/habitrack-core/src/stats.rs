//! Overview statistics across all habits.

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::completion::{percentage, CompletionLog, WeeklyStats, WEEK_DAYS};
use crate::model::Habit;

/// Per-habit line of the overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitSummary {
    pub habit: Habit,
    pub streak: u32,
    pub weekly: WeeklyStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_habits: usize,
    pub weekly_completed: u32,
    pub weekly_possible: u32,
    pub weekly_percentage: u32,
    pub longest_streak: u32,
    pub active_streaks: usize,
    pub habits: Vec<HabitSummary>,
}

impl Overview {
    pub fn compute(habits: &[Habit], log: &CompletionLog) -> Self {
        Self::compute_at(habits, log, Local::now().date_naive())
    }

    pub fn compute_at(habits: &[Habit], log: &CompletionLog, today: NaiveDate) -> Self {
        let summaries: Vec<HabitSummary> = habits
            .iter()
            .map(|habit| HabitSummary {
                streak: log.streak_length_at(&habit.id, today),
                weekly: log.weekly_stats_at(&habit.id, today),
                habit: habit.clone(),
            })
            .collect();

        let weekly_completed = summaries.iter().map(|s| s.weekly.completed).sum();
        let weekly_possible = summaries.len() as u32 * WEEK_DAYS;

        Self {
            total_habits: summaries.len(),
            weekly_completed,
            weekly_possible,
            weekly_percentage: percentage(weekly_completed, weekly_possible),
            longest_streak: summaries.iter().map(|s| s.streak).max().unwrap_or(0),
            active_streaks: summaries.iter().filter(|s| s.streak > 0).count(),
            habits: summaries,
        }
    }
}

/// Salutation for the local hour of day.
pub fn greeting(hour: u32) -> &'static str {
    match hour {
        0..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    }
}
