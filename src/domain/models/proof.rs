//! Proof artifacts: recorded evidence that a validation step ran for a gate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::gate::GateId;

/// Fixed vocabulary of validation evidence types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofType {
    Build,
    Lint,
    Test,
    SecurityScan,
    /// End-to-end signal: the produced artifact actually runs.
    Runtime,
}

impl ProofType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Lint => "lint",
            Self::Test => "test",
            Self::SecurityScan => "security_scan",
            Self::Runtime => "runtime",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "build" => Some(Self::Build),
            "lint" => Some(Self::Lint),
            "test" => Some(Self::Test),
            "security_scan" => Some(Self::SecurityScan),
            "runtime" => Some(Self::Runtime),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProofType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pass/fail evidence record. Append-only within a gate; a later
/// artifact of the same type supersedes earlier ones, so validation looks
/// only at the most recent artifact per type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofArtifact {
    pub id: Uuid,
    pub project_id: Uuid,
    pub gate_id: GateId,
    pub proof_type: ProofType,
    pub passed: bool,
    pub summary: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl ProofArtifact {
    pub fn new(
        project_id: Uuid,
        gate_id: GateId,
        proof_type: ProofType,
        passed: bool,
        summary: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            gate_id,
            proof_type,
            passed,
            summary: summary.into(),
            role: role.into(),
            created_at: Utc::now(),
        }
    }
}

/// Fold a gate's artifact history down to the most recent record per type.
///
/// Input order is creation order (repositories return it that way), so a
/// plain overwrite keeps the latest and an older failure never shadows a
/// later passing retry.
pub fn latest_per_type(artifacts: &[ProofArtifact]) -> HashMap<ProofType, &ProofArtifact> {
    let mut latest: HashMap<ProofType, &ProofArtifact> = HashMap::new();
    for artifact in artifacts {
        latest.insert(artifact.proof_type, artifact);
    }
    latest
}
