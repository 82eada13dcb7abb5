//! Progress and result output on stdout
//!
//! Human mode prints one line per state change and every tenth of progress;
//! JSON mode prints every job event as one JSON object per line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use transq_lib::{JobEvent, JobId, QueueSummary, TranscodeError};

#[derive(Debug, Default)]
pub struct Reporter {
    json: bool,
    inputs: HashMap<JobId, PathBuf>,
    last_tenth: HashMap<JobId, u32>,
}

#[derive(Serialize)]
struct Rejected<'a> {
    event: &'static str,
    input: &'a Path,
    error: String,
}

#[derive(Serialize)]
struct Summary<'a> {
    event: &'static str,
    #[serde(flatten)]
    summary: &'a QueueSummary,
    rejected: usize,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            ..Default::default()
        }
    }

    pub fn track(&mut self, id: JobId, input: &Path) {
        self.inputs.insert(id, input.to_path_buf());
    }

    fn name(&self, id: JobId) -> String {
        self.inputs
            .get(&id)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// An input that never made it into the queue.
    pub fn rejected(&self, input: &Path, error: &TranscodeError) {
        if self.json {
            let line = Rejected {
                event: "rejected",
                input,
                error: error.to_string(),
            };
            if let Ok(s) = serde_json::to_string(&line) {
                println!("{}", s);
            }
        } else {
            println!("SKIP  {}: {}", input.display(), error);
        }
    }

    pub fn event(&mut self, event: &JobEvent) {
        if self.json {
            if let Ok(s) = serde_json::to_string(event) {
                println!("{}", s);
            }
            return;
        }

        let id = event.id();
        match event {
            JobEvent::Submitted { .. } | JobEvent::Removed { .. } | JobEvent::Reset { .. } => {}
            JobEvent::Started { attempt, .. } => {
                self.last_tenth.insert(id, 0);
                if *attempt > 1 {
                    println!("START {} (attempt {})", self.name(id), attempt);
                } else {
                    println!("START {}", self.name(id));
                }
            }
            JobEvent::Progress { fraction, .. } => {
                let tenth = (fraction * 10.0).floor() as u32;
                let last = self.last_tenth.entry(id).or_insert(0);
                if tenth > *last && tenth < 10 {
                    *last = tenth;
                    println!("{:>4}% {}", tenth * 10, self.name(id));
                }
            }
            JobEvent::Succeeded { .. } => println!("DONE  {}", self.name(id)),
            JobEvent::Failed { error, .. } => println!("FAIL  {}: {}", self.name(id), error),
            JobEvent::Cancelled { .. } => println!("STOP  {}", self.name(id)),
        }
    }

    pub fn summary(&self, summary: &QueueSummary, rejected: usize) {
        if self.json {
            let line = Summary {
                event: "summary",
                summary,
                rejected,
            };
            if let Ok(s) = serde_json::to_string(&line) {
                println!("{}", s);
            }
        } else if rejected > 0 {
            println!("{}, {} rejected", summary, rejected);
        } else {
            println!("{}", summary);
        }
    }
}
