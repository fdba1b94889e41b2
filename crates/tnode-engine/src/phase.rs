//! # Run Phase State Machine
//!
//! ```text
//! Idle → Compiling → Resolving → Flattening → Persisting → Idle
//! ```
//!
//! Any other forward transition is rejected. [`ResolutionRun::abort`]
//! returns a failed run to `Idle` from any phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tnode_core::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Compiling,
    Resolving,
    Flattening,
    Persisting,
}

impl RunPhase {
    /// The phase that legally follows this one.
    pub fn next(self) -> RunPhase {
        match self {
            Self::Idle => Self::Compiling,
            Self::Compiling => Self::Resolving,
            Self::Resolving => Self::Flattening,
            Self::Flattening => Self::Persisting,
            Self::Persisting => Self::Idle,
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Compiling => "COMPILING",
            Self::Resolving => "RESOLVING",
            Self::Flattening => "FLATTENING",
            Self::Persisting => "PERSISTING",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid run phase transition for node {node_id}: {from} -> {to}")]
pub struct PhaseError {
    pub node_id: NodeId,
    pub from: RunPhase,
    pub to: RunPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: RunPhase,
    pub to: RunPhase,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Phase tracking for one run of one node.
#[derive(Debug, Clone)]
pub struct ResolutionRun {
    node_id: NodeId,
    phase: RunPhase,
    transitions: Vec<PhaseTransition>,
}

impl ResolutionRun {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            phase: RunPhase::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    /// Move to `to`, which must be the successor of the current phase.
    pub fn advance(&mut self, to: RunPhase) -> Result<(), PhaseError> {
        self.require_next(to)?;
        self.do_transition(to, None);
        Ok(())
    }

    /// Return to `Idle` after a failure.
    pub fn abort(&mut self, reason: &str) {
        if self.phase == RunPhase::Idle {
            return;
        }
        tracing::warn!(node_id = %self.node_id, phase = %self.phase, reason, "resolution run aborted");
        self.do_transition(RunPhase::Idle, Some(reason.to_string()));
    }

    fn require_next(&self, to: RunPhase) -> Result<(), PhaseError> {
        if self.phase.next() != to {
            return Err(PhaseError {
                node_id: self.node_id,
                from: self.phase,
                to,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: RunPhase, reason: Option<String>) {
        tracing::debug!(node_id = %self.node_id, from = %self.phase, to = %to, "run phase transition");
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            at: Utc::now(),
            reason,
        });
        self.phase = to;
    }
}
