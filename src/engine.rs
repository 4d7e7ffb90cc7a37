use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{ApplyArgs, StatusArgs};
use crate::codec;
use crate::events::Event;
use crate::exit_codes::{self, exit};
use crate::journal::{LockGuard, Operator, Step};
use crate::manifest;
use crate::reporter::Reporter;

pub fn apply(args: ApplyArgs) -> Result<i32> {
    let mut reporter = Reporter::new(args.json);
    let run_id = uuid::Uuid::new_v4();

    let manifest = manifest::load_manifest(&args.manifest).context("failed to load manifest")?;
    manifest.validate()?;
    let operations = manifest.resolved_operations();

    if args.break_lock {
        let lock_path = Operator::new(&manifest.state_dir, &manifest.id).lock_path();
        if LockGuard::break_lock(&lock_path)? {
            reporter.record(Event::LockBroken { path: lock_path });
        }
    }

    let mut operator = if args.dry_run {
        Operator::new(&manifest.state_dir, &manifest.id)
    } else {
        Operator::with_lock(&manifest.state_dir, &manifest.id)?
    };
    for op in operations {
        operator.add_operation(op)?;
    }

    let has_plan = operator.plan_path().exists();
    if has_plan {
        operator
            .load()
            .with_context(|| format!("failed to load journal {}", operator.id()))?;
    } else if !args.dry_run {
        operator.save().context("failed to write plan log")?;
    }

    reporter.record(Event::RunStarted {
        run_id,
        id: manifest.id.clone(),
        total: operator.planned().len(),
        completed: operator.completed().len(),
        resuming: operator.is_resuming(),
    });

    if !operator.is_resuming()
        && let Some((index, err)) = operator.verify_pending()
    {
        reporter.record(Event::PreflightFailed {
            index,
            error: err.to_string(),
        });
    }

    if args.dry_run {
        let offset = operator.completed().len();
        for (i, op) in operator.pending().iter().enumerate() {
            reporter.record(Event::StepPlanned {
                index: offset + i,
                line: codec::encode_line(op),
            });
        }
        return Ok(exit::SUCCESS);
    }

    let mut steps = 0;
    loop {
        if args.max_steps.is_some_and(|max| steps >= max) {
            break;
        }
        let index = operator.completed().len();
        if index < operator.planned().len() {
            reporter.record(Event::StepStarted {
                index,
                reexecute: operator.is_resuming(),
            });
        }
        match operator.next() {
            Ok(Step::Complete) => break,
            Ok(Step::Executed { index } | Step::Reexecuted { index }) => {
                steps += 1;
                reporter.record(Event::StepCompleted { index });
            }
            Err(e) => {
                reporter.record(Event::StepFailed {
                    index,
                    error: e.to_string(),
                });
                return Ok(exit_codes::for_error(&anyhow::Error::new(e)));
            }
        }
    }

    let completed = operator.completed().len();
    let total = operator.planned().len();
    if completed == total {
        info!(id = %manifest.id, steps, "run complete");
        reporter.record(Event::RunCompleted { run_id, steps });
    } else {
        reporter.record(Event::RunPaused {
            run_id,
            completed,
            total,
        });
    }
    Ok(exit::SUCCESS)
}

pub fn status(args: StatusArgs) -> Result<i32> {
    let mut operator = Operator::new(&args.state_dir, &args.id);
    operator
        .load()
        .with_context(|| format!("failed to load journal {}", args.id))?;

    let lock_path = operator.lock_path();
    let lock = std::fs::read_to_string(&lock_path)
        .ok()
        .map(|s| s.trim().to_string());
    let pending: Vec<String> = operator.pending().iter().map(codec::encode_line).collect();

    if args.json {
        let report = serde_json::json!({
            "id": args.id,
            "total": operator.planned().len(),
            "completed": operator.completed().len(),
            "resuming": operator.is_resuming(),
            "lock": lock,
            "pending": pending,
        });
        println!("{}", report);
    } else {
        println!(
            "{}: {}/{} done",
            args.id,
            operator.completed().len(),
            operator.planned().len()
        );
        if let Some(holder) = lock {
            println!("locked by {holder} ({})", lock_path.display());
        }
        for line in &pending {
            println!("  pending: {line}");
        }
    }
    Ok(exit::SUCCESS)
}
