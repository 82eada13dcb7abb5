use serde::{Deserialize, Serialize};

use super::job::{JobError, JobId};

/// Job lifecycle notification, published on the scheduler's broadcast channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Submitted { id: JobId },
    Started { id: JobId, attempt: u32 },
    Progress { id: JobId, fraction: f64 },
    Succeeded { id: JobId },
    Failed { id: JobId, error: JobError },
    Cancelled { id: JobId },
    /// A failed job was put back in the queue
    Reset { id: JobId },
    Removed { id: JobId },
}

impl JobEvent {
    pub fn id(&self) -> JobId {
        match self {
            JobEvent::Submitted { id }
            | JobEvent::Started { id, .. }
            | JobEvent::Progress { id, .. }
            | JobEvent::Succeeded { id }
            | JobEvent::Failed { id, .. }
            | JobEvent::Cancelled { id }
            | JobEvent::Reset { id }
            | JobEvent::Removed { id } => *id,
        }
    }

    /// Whether this event ends a run of the job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::Succeeded { .. } | JobEvent::Failed { .. } | JobEvent::Cancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_event_json_shape() {
        let id = JobId::new();
        let event = JobEvent::Failed {
            id,
            error: JobError::new(ErrorKind::Codec, "boom"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "failed");
        assert_eq!(json["error"]["kind"], "codec");
        assert_eq!(event.id(), id);
        assert!(event.is_terminal());
        assert!(!JobEvent::Progress { id, fraction: 0.5 }.is_terminal());
    }
}
