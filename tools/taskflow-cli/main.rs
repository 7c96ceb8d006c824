use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use taskflow::prelude::*;
use tracing_subscriber::EnvFilter;

/// Define a CLI-specific enum for clap to parse.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TrackingCli {
    StepId,
    Index,
}

/// Inspect and walk through conditional task definitions
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the task definition JSON file
    task_path: String,
    /// Optional path to a profile JSON object
    profile_path: Option<String>,
    /// Optional path to an answers JSON object
    answers_path: Option<String>,

    /// Show why each step is shown or hidden
    #[arg(short, long)]
    explain: bool,

    /// How the current position follows changes of the visible steps
    #[arg(short, long, value_enum)]
    tracking: Option<TrackingCli>,

    /// Walk through the task interactively
    #[arg(short = 'i', long, help = "Run in interactive 'human' mode")]
    human: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let load_start = Instant::now();
    let task_json = fs::read_to_string(&cli.task_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read task file '{}': {}",
            &cli.task_path, e
        ))
    });
    let task = TaskDefinition::from_json(&task_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load task: {}", e)));
    let profile: Profile = load_object(cli.profile_path.as_deref(), "profile");
    let answers: Answers = load_object(cli.answers_path.as_deref(), "answers");
    let load_duration = load_start.elapsed();

    println!(
        "Loaded task with {} authored steps in {:?}",
        task.step_count(),
        load_duration
    );

    if cli.human {
        let tracking = match cli.tracking.unwrap_or(TrackingCli::StepId) {
            TrackingCli::StepId => PositionTracking::ByStepId,
            TrackingCli::Index => PositionTracking::ByIndex,
        };
        run_interactive(task, profile, answers, tracking);
    } else {
        run_listing(&task, &profile, &answers, cli.explain);
    }
}

fn load_object(path: Option<&str>, what: &str) -> ahash::AHashMap<String, Value> {
    let Some(path) = path else {
        return ahash::AHashMap::new();
    };
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read {} file '{}': {}", what, path, e))
    });
    serde_json::from_str(&content)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse {} JSON: {}", what, e)))
}

/// Prints the visible steps for the given profile and answers.
fn run_listing(task: &TaskDefinition, profile: &Profile, answers: &Answers, explain: bool) {
    let walk_start = Instant::now();
    if explain {
        let report = explain_visibility(task.steps(), profile, answers);
        let walk_duration = walk_start.elapsed();
        println!("\nVisibility report:");
        for entry in &report {
            let marker = if entry.visible { "+" } else { "-" };
            println!(
                "  {}{} {} [{:?}]: {}",
                "  ".repeat(entry.depth),
                marker,
                entry.step.id,
                entry.step.kind,
                entry.reason()
            );
        }
        println!("\nWalk:                 {:?}", walk_duration);
        return;
    }

    let visible = build_visible_steps(task.steps(), profile, answers);
    let walk_duration = walk_start.elapsed();
    println!("\nVisible steps ({}):", visible.len());
    for (index, step) in visible.iter().enumerate() {
        println!(
            "  {:>3}. {} [{:?}] {}",
            index,
            step.id,
            step.kind,
            step.text.as_deref().unwrap_or("")
        );
    }
    println!("\nWalk:                 {:?}", walk_duration);
}

/// Runs a task session against an in-memory store, prompting for each step.
fn run_interactive(task: TaskDefinition, profile: Profile, answers: Answers, tracking: PositionTracking) {
    println!("--- taskflow Interactive Mode ---");
    println!("Commands: <answer> | n (next) | p (previous) | g <index> (jump) | q (quit)");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to start runtime: {}", e)));

    runtime.block_on(async move {
        const TASK_ID: &str = "cli-task";
        const USER_ID: &str = "cli-user";

        let gateway = Arc::new(InMemoryGateway::new());
        let seeded = gateway.insert_profile(USER_ID, profile).and_then(|()| {
            gateway.insert_progress(
                TASK_ID,
                USER_ID,
                ProgressRecord {
                    task_answers: Some(Value::Object(answers.into_iter().collect())),
                    ..ProgressRecord::default()
                },
            )
        });
        if let Err(e) = seeded {
            exit_with_error(&format!("Failed to seed store: {}", e));
        }

        let mut session = TaskSession::builder(task, gateway.clone())
            .with_profiles(gateway.clone())
            .with_config(SessionConfig::default().with_tracking(tracking))
            .start(TASK_ID, USER_ID)
            .await
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to start session: {}", e)));

        while !session.is_completed() {
            let total = session.visible_steps().len();
            let Some(step) = session.current_step().cloned() else {
                println!("No visible steps, completing the task.");
                if let Err(e) = session.next().await {
                    println!("Error: {}", e);
                    break;
                }
                continue;
            };
            let Position::AtStep(index) = session.position() else {
                break;
            };
            println!(
                "\n[{} of {}] {} ({:?})",
                index + 1,
                total,
                step.text.as_deref().unwrap_or(&step.id),
                step.kind
            );
            for option in &step.options {
                println!("    - {} ({})", option.label, option.value);
            }
            if let Some(current) = session.answers().get(&step.id) {
                println!("    current answer: {}", current);
            }

            let input = prompt_for_input("Answer or command", None);
            match input.as_str() {
                "q" => break,
                "n" => match session.next().await {
                    Ok(Transition::Blocked) => println!("This step needs an answer first."),
                    Ok(_) => {}
                    Err(e) => println!("Error: {}", e),
                },
                "p" => {
                    session.previous();
                }
                cmd if cmd.starts_with("g ") => match cmd[2..].trim().parse::<usize>() {
                    Ok(target) => {
                        if session.go_to(target) == Transition::Unchanged {
                            println!("No step at index {}.", target);
                        }
                    }
                    Err(_) => println!("Usage: g <index>"),
                },
                "" => {}
                raw => {
                    let value = parse_answer(&step, raw);
                    if let Err(e) = session.answer(&step.id, value).await {
                        println!("Error: {}", e);
                    }
                }
            }
        }

        if session.is_completed() {
            println!("\nTask completed!");
            if let Some(record) = gateway.progress(TASK_ID, USER_ID) {
                let stored = serde_json::to_string_pretty(&record).unwrap_or_default();
                println!("Stored progress:\n{}", stored);
            }
        }
    });
}

/// Turns typed input into an answer value for the step's input type.
fn parse_answer(step: &StepNode, raw: &str) -> Value {
    match step.input_type {
        Some(InputType::Multiselect) => Value::Array(
            raw.split(',')
                .map(|part| Value::String(part.trim().to_string()))
                .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                .collect(),
        ),
        Some(InputType::Boolean) => match raw {
            "yes" | "true" => Value::Bool(true),
            "no" | "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        _ if step.kind == StepKind::Upload => serde_json::json!({
            "fileId": raw,
            "fileName": raw,
        }),
        _ => Value::String(raw.to_string()),
    }
}

/// A helper function to prompt the user and read a line of input.
fn prompt_for_input(prompt_text: &str, default: Option<&str>) -> String {
    let mut line = String::new();
    let default_prompt = default.map_or("".to_string(), |d| format!(" [default: {}]", d));

    print!("> {}{}: ", prompt_text, default_prompt);
    io::stdout().flush().unwrap();

    io::stdin()
        .read_line(&mut line)
        .expect("Failed to read line");
    let trimmed = line.trim().to_string();

    if trimmed.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        trimmed
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
