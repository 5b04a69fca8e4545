//! Capture kinds and block-change classification.
//!
//! Every intercepted block write lands in exactly one [`CaptureKind`]
//! bucket. The derived ordering of the enum is the order in which buckets
//! are flushed: `Break`, `Decay`, `Fluid`, `Modify`, `Place`, then one
//! `Populate` bucket per world-generation procedure.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::block::BlockState;

// ---------------------------------------------------------------------------
// ProcedureId
// ---------------------------------------------------------------------------

/// Name of a world-generation procedure (ore placer, tree planter, lake
/// carver, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcedureId(pub String);

impl ProcedureId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// CaptureKind
// ---------------------------------------------------------------------------

/// The bucket a block change is batched into.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CaptureKind {
    Break,
    Decay,
    Fluid,
    Modify,
    Place,
    Populate(ProcedureId),
}

impl CaptureKind {
    /// Block buckets in flush order (everything except `Populate`).
    pub const BLOCK_ORDER: [CaptureKind; 5] = [
        CaptureKind::Break,
        CaptureKind::Decay,
        CaptureKind::Fluid,
        CaptureKind::Modify,
        CaptureKind::Place,
    ];

    /// Pick the bucket for a change from `old` to `new`.
    ///
    /// Priority: an active procedure wins, then fluids (either side), then
    /// the decay switch, then removal (`Break`), a type change (`Place`),
    /// and finally a same-type variant change (`Modify`).
    pub fn classify(
        procedure: Option<&ProcedureId>,
        capturing_decay: bool,
        old: &BlockState,
        new: &BlockState,
    ) -> CaptureKind {
        if let Some(id) = procedure {
            CaptureKind::Populate(id.clone())
        } else if new.is_fluid() || old.is_fluid() {
            CaptureKind::Fluid
        } else if capturing_decay {
            CaptureKind::Decay
        } else if new.is_empty() {
            CaptureKind::Break
        } else if new.block != old.block {
            CaptureKind::Place
        } else {
            CaptureKind::Modify
        }
    }

    pub fn is_populate(&self) -> bool {
        matches!(self, CaptureKind::Populate(_))
    }

    pub fn name(&self) -> &str {
        match self {
            CaptureKind::Break => "break",
            CaptureKind::Decay => "decay",
            CaptureKind::Fluid => "fluid",
            CaptureKind::Modify => "modify",
            CaptureKind::Place => "place",
            CaptureKind::Populate(id) => &id.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
