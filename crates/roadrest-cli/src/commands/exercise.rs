use chrono::Local;
use clap::Subcommand;

use roadrest_core::catalog::default_catalog;

use crate::common::{self, CliError};

#[derive(Subcommand)]
pub enum ExerciseAction {
    /// Show the exercise catalog
    List,
    /// Show the signed-in user's exercise history
    History {
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(action: ExerciseAction) -> Result<(), CliError> {
    match action {
        ExerciseAction::List => {
            for exercise in default_catalog() {
                println!(
                    "{:<18} {:>4}s {:?}/{:?} -- {}",
                    exercise.id,
                    exercise.duration_secs,
                    exercise.category,
                    exercise.difficulty,
                    exercise.description,
                );
            }
        }
        ExerciseAction::History { json } => {
            let ctx = common::context().await?;
            common::require_user(&ctx).await?;
            let history = ctx.session.exercises.load_history().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
                return Ok(());
            }
            if history.is_empty() {
                println!("no exercises recorded yet");
                return Ok(());
            }
            for result in history {
                println!(
                    "{} {:<18} {:>4}s {:>5.1}% ({:.0} kcal)",
                    result.ended_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    result.exercise_id,
                    result.duration_secs,
                    result.completion_pct,
                    result.calories_burned(),
                );
            }
        }
    }
    Ok(())
}
