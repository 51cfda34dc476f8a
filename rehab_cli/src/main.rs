use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rehab_core::*;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rehab")]
#[command(about = "Guided rehabilitation exercise timer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Calendar day to work on (YYYY-MM-DD), defaults to today
    #[arg(long, global = true)]
    date: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the exercises assigned for the day
    Assign {
        #[arg(required = true)]
        exercises: Vec<String>,
    },

    /// Run an exercise session, resuming saved progress if any
    Run {
        exercise: String,

        /// Don't wait a real second between ticks
        #[arg(long)]
        fast: bool,

        /// Stop after this many ticks, keeping progress (simulates leaving)
        #[arg(long)]
        max_ticks: Option<u32>,

        /// Continue automatically after a scheme or walk-session break
        #[arg(long)]
        auto_continue: bool,
    },

    /// Show the day's exercises and any saved progress
    Status,

    /// Discard saved progress for an exercise
    Clear { exercise: String },

    /// List known exercises
    List,
}

/// System clock with an optional fixed calendar day
struct CliClock {
    date: Option<NaiveDate>,
}

impl Clock for CliClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }
}

type CliStore = ProgressStore<FileStore, CliClock>;

fn main() -> Result<()> {
    rehab_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let store = open_store(&data_dir, cli.date, &config);

    match cli.command {
        Commands::Assign { exercises } => cmd_assign(store, &exercises),
        Commands::Run {
            exercise,
            fast,
            max_ticks,
            auto_continue,
        } => cmd_run(store, &config, &exercise, fast, max_ticks, auto_continue),
        Commands::Status => cmd_status(store),
        Commands::Clear { exercise } => cmd_clear(store, &exercise),
        Commands::List => cmd_list(),
    }
}

fn open_store(data_dir: &Path, date: Option<NaiveDate>, config: &Config) -> CliStore {
    ProgressStore::new(FileStore::new(data_dir.join("records")), CliClock { date })
        .with_ttl(config.timing.progress_ttl())
}

fn cmd_assign(mut store: CliStore, exercises: &[String]) -> Result<()> {
    let catalog = get_default_catalog();
    for id in exercises {
        if !catalog.exercises.contains_key(id) {
            eprintln!("Unknown exercise: {} (treated as rep-based)", id);
        }
    }

    let date = store.clock().today();
    let entries = store.assign_daily(date, exercises)?;
    println!("✓ Assigned {} exercises for {}", entries.len(), date);
    Ok(())
}

fn cmd_run(
    store: CliStore,
    config: &Config,
    exercise_id: &str,
    fast: bool,
    max_ticks: Option<u32>,
    auto_continue: bool,
) -> Result<()> {
    let exercise = get_default_catalog().resolve(exercise_id);
    let settings = config.settings_for(exercise_id);
    let name = exercise.name.clone();

    let mut session = ExerciseSession::new(store, config);
    let events = session.start(exercise, settings);
    print_events(&session, &events);

    if let Some(instruction) = session.instruction() {
        println!("→ {}", instruction);
    }

    let mut ticks = 0u32;
    loop {
        let Some(state) = session.state() else {
            break;
        };

        if state.phase == Phase::Completed {
            break;
        }

        if !state.is_running {
            if auto_continue {
                println!("Continuing...");
            } else if !wait_for_enter()? {
                session.stop();
                println!("Session stopped; progress saved.");
                break;
            }
            let events = session.resume();
            print_events(&session, &events);
            continue;
        }

        if max_ticks.is_some_and(|max| ticks >= max) {
            session.stop();
            println!("Stopped after {} ticks; progress saved.", ticks);
            break;
        }

        if !fast {
            std::thread::sleep(Duration::from_secs(1));
        }
        let events = session.tick();
        ticks += 1;
        print_events(&session, &events);

        for event in &events {
            if let SessionEvent::Completed {
                suggested_delay, ..
            } = event
            {
                println!("✓ {} complete!", name);
                if !fast {
                    std::thread::sleep(*suggested_delay);
                }
            }
        }
    }

    let failures = session.persistence_failures();
    if !failures.is_empty() {
        eprintln!(
            "Warning: {} storage operations failed; progress may not resume.",
            failures.len()
        );
    }

    Ok(())
}

fn print_events<S: KvStore, C: Clock>(session: &ExerciseSession<S, C>, events: &[SessionEvent]) {
    for event in events {
        match event {
            SessionEvent::HoldCue { set, rep } => {
                println!("  ♪ hold (set {}, rep {})", set, rep);
            }
            SessionEvent::PhaseChanged { current_time, .. } => {
                if let Some(instruction) = session.instruction() {
                    if *current_time > 0 {
                        println!("→ {} [{}s]", instruction, current_time);
                    } else {
                        println!("→ {}", instruction);
                    }
                }
            }
            SessionEvent::SessionAdvanced { session: next, of } => {
                println!("Walk session done. Next: session {} of {}", next, of);
            }
            SessionEvent::Resumed {
                set,
                rep,
                session: walk_session,
                ..
            } => match session.plan() {
                Some(plan) if plan.exercise.is_walk() => {
                    println!(
                        "Resuming at walk session {} of {}",
                        walk_session,
                        plan.total_sets()
                    );
                }
                _ => println!("Resuming at set {} rep {}", set, rep),
            },
            SessionEvent::AlreadyCompleted { exercise_type } => {
                println!("{} is already completed today.", exercise_type);
            }
            SessionEvent::Completed { .. } => {}
        }
    }
}

/// Returns false when stdin is closed
fn wait_for_enter() -> Result<bool> {
    print!("Press Enter to continue > ");
    io::stdout().flush()?;

    let mut input = String::new();
    let read = io::stdin().lock().read_line(&mut input)?;
    Ok(read > 0)
}

fn cmd_status(mut store: CliStore) -> Result<()> {
    let date = store.clock().today();
    let entries = store.load_daily(date)?;

    if entries.is_empty() {
        println!("No exercises assigned for {}.", date);
        return Ok(());
    }

    println!("Exercises for {}:", date);
    let catalog = get_default_catalog();
    for entry in entries {
        let name = catalog.resolve(&entry.exercise_type).name;
        if entry.completed {
            println!("  [x] {}", name);
            continue;
        }

        let progress = match store.load(&entry.exercise_type, date) {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!(
                    "Unreadable progress for {}: {}. Showing as not started.",
                    entry.exercise_type,
                    e
                );
                None
            }
        };

        match progress {
            Some(p) if p.scheme_one_completed == Some(true) => println!(
                "  [ ] {} (in progress: second side, set {} rep {})",
                name, p.current_set, p.current_rep
            ),
            Some(p) => println!(
                "  [ ] {} (in progress: set {} rep {})",
                name, p.current_set, p.current_rep
            ),
            None => println!("  [ ] {}", name),
        }
    }

    Ok(())
}

fn cmd_clear(mut store: CliStore, exercise: &str) -> Result<()> {
    let date = store.clock().today();
    store.clear(exercise, date)?;
    println!("✓ Cleared progress for {} on {}", exercise, date);
    Ok(())
}

fn cmd_list() -> Result<()> {
    let catalog = get_default_catalog();
    for id in catalog.ids() {
        let def = catalog.resolve(id);
        let mode = match def.mode {
            ExerciseMode::Reps => "reps",
            ExerciseMode::Rolling => "rolling",
            ExerciseMode::Walk => "walk",
        };
        if def.is_dual_scheme() {
            println!("  {:<12} {} ({}, two sides)", id, def.name, mode);
        } else {
            println!("  {:<12} {} ({})", id, def.name, mode);
        }
    }
    Ok(())
}
