//! In-process event bus for pipeline lifecycle events.
//!
//! Broadcast-based with monotonic sequence numbering. Publishing is
//! fire-and-forget: services emit events whether or not anyone listens,
//! and a send with no subscribers is not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{EscalationSeverity, GateId, ProofType};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    pub fn zero() -> Self {
        Self(0)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Event category for filtering and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Project,
    Gate,
    Agent,
    Proof,
    Repair,
    Escalation,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Project => write!(f, "project"),
            Self::Gate => write!(f, "gate"),
            Self::Agent => write!(f, "agent"),
            Self::Proof => write!(f, "proof"),
            Self::Repair => write!(f, "repair"),
            Self::Escalation => write!(f, "escalation"),
        }
    }
}

/// Event envelope carrying routing metadata around the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub category: EventCategory,
    pub project_id: Option<Uuid>,
    pub gate_id: Option<GateId>,
    pub payload: EventPayload,
}

/// Everything the pipeline announces about itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    // Project lifecycle
    ProjectCreated {
        project_id: Uuid,
        name: String,
        category: String,
    },
    ProjectCompleted {
        project_id: Uuid,
    },
    TasksDecomposed {
        project_id: Uuid,
        task_count: usize,
    },

    // Gate lifecycle
    GateReady {
        project_id: Uuid,
        gate_id: GateId,
    },
    GateApproved {
        project_id: Uuid,
        gate_id: GateId,
        actor: String,
        next_gate: Option<GateId>,
    },
    GateRejected {
        project_id: Uuid,
        gate_id: GateId,
        actor: String,
        reason: String,
    },
    GateRoundCompleted {
        project_id: Uuid,
        gate_id: GateId,
        completed: usize,
        failed: usize,
    },
    GateRoundSkipped {
        project_id: Uuid,
        gate_id: GateId,
        reason: String,
    },
    StuckGateDetected {
        project_id: Uuid,
        gate_id: GateId,
    },

    // Agent lifecycle
    AgentStarted {
        project_id: Uuid,
        gate_id: GateId,
        role: String,
        attempt_id: Uuid,
    },
    AgentCompleted {
        project_id: Uuid,
        gate_id: GateId,
        role: String,
        attempt_id: Uuid,
        tokens_used: u64,
    },
    AgentFailed {
        project_id: Uuid,
        gate_id: GateId,
        role: String,
        attempt_id: Uuid,
        error: String,
    },
    HandoffRecorded {
        project_id: Uuid,
        from_role: String,
        to_role: String,
    },
    DeliverablesCompleted {
        project_id: Uuid,
        gate_id: GateId,
        role: String,
    },

    // Proof artifacts
    ProofRecorded {
        project_id: Uuid,
        gate_id: GateId,
        proof_type: ProofType,
        passed: bool,
        role: String,
    },

    // Self-healing
    RepairStarted {
        project_id: Uuid,
        role: String,
        error_count: usize,
    },
    RepairSucceeded {
        project_id: Uuid,
        role: String,
        attempt_number: u32,
        fixed: usize,
    },
    RepairFailed {
        project_id: Uuid,
        role: String,
        attempts: u32,
        remaining: usize,
    },

    // Escalations
    EscalationRaised {
        project_id: Uuid,
        escalation_id: Uuid,
        severity: EscalationSeverity,
        role: String,
    },
    EscalationResolved {
        project_id: Uuid,
        escalation_id: Uuid,
    },
}

impl From<EventPayload> for PipelineEvent {
    fn from(payload: EventPayload) -> Self {
        let (severity, category, project_id, gate_id) = match &payload {
            EventPayload::ProjectCreated { project_id, .. } => {
                (EventSeverity::Info, EventCategory::Project, Some(*project_id), None)
            }
            EventPayload::ProjectCompleted { project_id } => {
                (EventSeverity::Info, EventCategory::Project, Some(*project_id), None)
            }
            EventPayload::TasksDecomposed { project_id, .. } => {
                (EventSeverity::Info, EventCategory::Project, Some(*project_id), None)
            }
            EventPayload::GateReady { project_id, gate_id } => {
                (EventSeverity::Info, EventCategory::Gate, Some(*project_id), Some(*gate_id))
            }
            EventPayload::GateApproved { project_id, gate_id, .. } => {
                (EventSeverity::Info, EventCategory::Gate, Some(*project_id), Some(*gate_id))
            }
            EventPayload::GateRejected { project_id, gate_id, .. } => {
                (EventSeverity::Warning, EventCategory::Gate, Some(*project_id), Some(*gate_id))
            }
            EventPayload::GateRoundCompleted { project_id, gate_id, failed, .. } => {
                let severity =
                    if *failed > 0 { EventSeverity::Warning } else { EventSeverity::Info };
                (severity, EventCategory::Gate, Some(*project_id), Some(*gate_id))
            }
            EventPayload::GateRoundSkipped { project_id, gate_id, .. } => {
                (EventSeverity::Warning, EventCategory::Gate, Some(*project_id), Some(*gate_id))
            }
            EventPayload::StuckGateDetected { project_id, gate_id } => {
                (EventSeverity::Warning, EventCategory::Gate, Some(*project_id), Some(*gate_id))
            }
            EventPayload::AgentStarted { project_id, gate_id, .. } => {
                (EventSeverity::Info, EventCategory::Agent, Some(*project_id), Some(*gate_id))
            }
            EventPayload::AgentCompleted { project_id, gate_id, .. } => {
                (EventSeverity::Info, EventCategory::Agent, Some(*project_id), Some(*gate_id))
            }
            EventPayload::AgentFailed { project_id, gate_id, .. } => {
                (EventSeverity::Error, EventCategory::Agent, Some(*project_id), Some(*gate_id))
            }
            EventPayload::HandoffRecorded { project_id, .. } => {
                (EventSeverity::Info, EventCategory::Agent, Some(*project_id), None)
            }
            EventPayload::DeliverablesCompleted { project_id, gate_id, .. } => {
                (EventSeverity::Debug, EventCategory::Gate, Some(*project_id), Some(*gate_id))
            }
            EventPayload::ProofRecorded { project_id, gate_id, passed, .. } => {
                let severity =
                    if *passed { EventSeverity::Info } else { EventSeverity::Warning };
                (severity, EventCategory::Proof, Some(*project_id), Some(*gate_id))
            }
            EventPayload::RepairStarted { project_id, .. } => {
                (EventSeverity::Warning, EventCategory::Repair, Some(*project_id), None)
            }
            EventPayload::RepairSucceeded { project_id, .. } => {
                (EventSeverity::Info, EventCategory::Repair, Some(*project_id), None)
            }
            EventPayload::RepairFailed { project_id, .. } => {
                (EventSeverity::Error, EventCategory::Repair, Some(*project_id), None)
            }
            EventPayload::EscalationRaised { project_id, .. } => {
                (EventSeverity::Critical, EventCategory::Escalation, Some(*project_id), None)
            }
            EventPayload::EscalationResolved { project_id, .. } => {
                (EventSeverity::Info, EventCategory::Escalation, Some(*project_id), None)
            }
        };
        Self {
            id: EventId::new(),
            sequence: SequenceNumber::zero(),
            timestamp: Utc::now(),
            severity,
            category,
            project_id,
            gate_id,
            payload,
        }
    }
}

/// Configuration for the event bus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { channel_capacity: 1024 }
    }
}

/// Central event bus broadcasting pipeline events to subscribers.
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self { sender, sequence: AtomicU64::new(0) }
    }

    /// Publish an event. The bus owns sequence assignment.
    pub fn publish(&self, mut event: PipelineEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        event.sequence = SequenceNumber(seq);

        // Ignore send errors; there may be no subscribers.
        let _ = self.sender.send(event);
    }

    /// Build the envelope from a payload and publish it.
    pub fn emit(&self, payload: EventPayload) {
        self.publish(payload.into());
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Next sequence number the bus will assign.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}
