//! habit CLI: run the tracker daemon or act on habits directly.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use habit_tracker::clock::{Clock, SystemClock};
use habit_tracker::config::Config;
use habit_tracker::db::Db;
use habit_tracker::engine::HabitEngine;
use habit_tracker::model::{Habit, HabitEdit, HabitId, NewHabit, UserId};
use habit_tracker::scheduler::Scheduler;
use habit_tracker::telemetry::{TelemetryConfig, init_telemetry};
use secrecy::ExposeSecret;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "habit", about = "Track habits, cycles and streaks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the cycle scheduler daemon
    Serve,
    /// Create a habit
    Create {
        /// Owning user id
        #[arg(long)]
        user: i64,
        /// Habit name
        name: String,
        /// "daily" or "weekly"
        periodicity: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Mark the current cycle of a habit as done
    Complete {
        /// Habit ID (full UUID or prefix)
        id: String,
    },
    /// Change a habit's name, description or periodicity
    Edit {
        /// Habit ID (full UUID or prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        periodicity: Option<String>,
    },
    /// Delete a habit
    Delete {
        /// Habit ID (full UUID or prefix)
        id: String,
    },
    /// Show a habit
    Show {
        /// Habit ID (full UUID or prefix)
        id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a user's habits
    List {
        #[arg(long)]
        user: i64,
        /// Only habits with this periodicity
        #[arg(long)]
        periodicity: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Longest streak of one habit, or the user's best habits
    Streak {
        #[arg(long)]
        user: i64,
        /// Habit ID (full UUID or prefix); omit for the user's top habits
        id: Option<String>,
    },
    /// Activity recorded on a habit
    Activity {
        #[arg(long)]
        user: i64,
        /// Habit ID (full UUID or prefix)
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    if let Command::Serve = cli.command {
        return cmd_serve(config).await;
    }

    let db = Arc::new(Db::connect(config.database_url.expose_secret()).await?);
    db.migrate().await?;
    let engine = engine_for(Arc::clone(&db));

    let result = run_command(&db, &engine, cli.command).await;
    engine.shutdown().await;
    result
}

fn engine_for(db: Arc<Db>) -> HabitEngine {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    HabitEngine::new(
        db.clone(),
        db,
        Arc::clone(&clock),
        Scheduler::new(clock),
    )
}

async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "habit-tracker".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let db = Arc::new(Db::connect(config.database_url.expose_secret()).await?);
    db.migrate().await?;
    db.health_check().await?;

    let engine = engine_for(db);
    let report = engine.reconcile().await?;
    info!(
        scheduled = report.scheduled,
        interval_secs = config.reconcile_interval.as_secs(),
        "habit daemon started"
    );

    let mut ticker = tokio::time::interval(config.reconcile_interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = engine.reconcile().await {
                    error!("reconcile failed: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}

async fn run_command(db: &Db, engine: &HabitEngine, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve => anyhow::bail!("serve is not a one-shot command"),
        Command::Create {
            user,
            name,
            periodicity,
            description,
        } => {
            let mut new = NewHabit::new(UserId(user), name, periodicity);
            if let Some(description) = description {
                new = new.description(description);
            }
            let habit = engine.create(new).await?;
            println!("Created: {} (due {})", habit.id.0, habit.next_cycle_start);
        }
        Command::Complete { id } => {
            let id = resolve_habit(db, &id).await?;
            let habit = engine.complete(id, None).await?;
            println!(
                "Completed: {} (streak {}, longest {})",
                habit.id, habit.current_streak, habit.longest_streak
            );
        }
        Command::Edit {
            id,
            name,
            description,
            periodicity,
        } => {
            let id = resolve_habit(db, &id).await?;
            let mut edit = HabitEdit::new();
            if let Some(name) = name {
                edit = edit.name(name);
            }
            if let Some(description) = description {
                edit = edit.description(description);
            }
            if let Some(periodicity) = periodicity {
                edit = edit.periodicity(periodicity);
            }

            let outcome = engine.edit(id, edit).await?;
            for rejection in &outcome.rejected {
                eprintln!("Rejected {}: {}", rejection.field, rejection.reason);
            }
            if outcome.changed.is_empty() {
                println!("No changes.");
            } else {
                let fields: Vec<String> = outcome.changed.iter().map(|f| f.to_string()).collect();
                println!("Updated {}: {}", outcome.habit.id, fields.join(", "));
            }
        }
        Command::Delete { id } => {
            let id = resolve_habit(db, &id).await?;
            engine.delete(id).await?;
            println!("Deleted: {id}");
        }
        Command::Show { id, json } => {
            let id = resolve_habit(db, &id).await?;
            let habit = engine.show(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&habit)?);
            } else {
                print_habit(&habit);
            }
        }
        Command::List {
            user,
            periodicity,
            json,
        } => {
            let habits = engine
                .list_habits(UserId(user), periodicity.as_deref())
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&habits)?);
            } else {
                print_table(&habits);
            }
        }
        Command::Streak { user, id: Some(id) } => {
            let id = resolve_habit(db, &id).await?;
            let longest = engine.longest_streak_of(UserId(user), id).await?;
            println!("Longest streak of {id}: {longest}");
        }
        Command::Streak { user, id: None } => {
            let habits = engine.habits_with_longest_streak(UserId(user)).await?;
            print_table(&habits);
        }
        Command::Activity { user, id } => {
            let id = resolve_habit(db, &id).await?;
            let records = engine.activity_on_habit(UserId(user), id).await?;
            if records.is_empty() {
                println!("No activity recorded.");
            }
            for record in records {
                println!("{:<44}  {}", record.category.as_str(), record.description);
            }
        }
    }
    Ok(())
}

/// Accept a full UUID or an unambiguous prefix.
async fn resolve_habit(db: &Db, id_str: &str) -> anyhow::Result<HabitId> {
    if id_str.len() >= 36 {
        return Ok(HabitId(uuid::Uuid::parse_str(id_str)?));
    }

    let matches = db.habit_ids_with_prefix(id_str).await?;
    match matches.as_slice() {
        [] => anyhow::bail!("no habit matching prefix '{id_str}'"),
        [id] => Ok(*id),
        _ => anyhow::bail!("several habits match prefix '{id_str}', be more specific"),
    }
}

fn print_habit(habit: &Habit) {
    println!("ID:          {}", habit.id.0);
    println!("User:        {}", habit.user_id);
    println!("Name:        {}", habit.name);
    println!("Description: {}", habit.description);
    println!("Periodicity: {}", habit.periodicity);
    println!("State:       {}", habit.phase());
    println!("Streak:      {} (longest {})", habit.current_streak, habit.longest_streak);
    println!("Next cycle:  {}", habit.next_cycle_start);
    println!(
        "Last done:   {}",
        habit
            .last_completion_time
            .map(|t| t.to_string())
            .unwrap_or("-".to_string())
    );
    println!("Created:     {}", habit.created_at);
}

fn print_table(habits: &[Habit]) {
    if habits.is_empty() {
        println!("No habits found.");
        return;
    }

    println!(
        "{:<8}  {:<24}  {:<7}  {:<9}  {:>6}  {:>7}  NEXT CYCLE",
        "ID", "NAME", "PERIOD", "STATE", "STREAK", "LONGEST"
    );
    println!("{}", "-".repeat(90));
    for habit in habits {
        let name: String = habit.name.chars().take(24).collect();
        println!(
            "{:<8}  {:<24}  {:<7}  {:<9}  {:>6}  {:>7}  {}",
            habit.id,
            name,
            habit.periodicity.to_string(),
            habit.phase().to_string(),
            habit.current_streak,
            habit.longest_streak,
            habit.next_cycle_start.format("%Y-%m-%d %H:%M")
        );
    }
    println!("\n{} habit(s)", habits.len());
}
