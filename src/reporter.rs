use crate::events::Event;

/// Reporter collects events and prints them as NDJSON or human lines.
pub struct Reporter {
    events: Vec<Event>,
    json_mode: bool,
}

impl Reporter {
    pub fn new(json_mode: bool) -> Self {
        Self {
            events: Vec::new(),
            json_mode,
        }
    }

    pub fn record(&mut self, event: Event) {
        if self.json_mode {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
        } else if let Some(line) = human_line(&event) {
            println!("{}", line);
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

fn human_line(event: &Event) -> Option<String> {
    let line = match event {
        Event::RunStarted {
            id,
            total,
            completed,
            resuming,
            ..
        } => {
            if *resuming {
                format!("resuming {id}: {completed}/{total} done")
            } else {
                format!("starting {id}: {total} operations")
            }
        }
        Event::StepPlanned { index, line } => format!("  [{}] {}", index + 1, line),
        Event::PreflightFailed { index, error } => {
            format!("warning: step {} pre-flight: {}", index + 1, error)
        }
        Event::StepStarted { .. } => return None,
        Event::StepCompleted { index } => format!("done step {}", index + 1),
        Event::StepFailed { index, error } => format!("failed step {}: {}", index + 1, error),
        Event::LockBroken { path } => format!("removed stale lock {}", path.display()),
        Event::RunPaused {
            completed, total, ..
        } => format!("paused at {completed}/{total}"),
        Event::RunCompleted { steps, .. } => format!("complete ({steps} steps this run)"),
    };
    Some(line)
}
