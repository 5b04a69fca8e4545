//! Property tests for classification and cause chains.
//!
//! These tests use `proptest` to generate random block transitions and cause
//! operations and check the invariants the capture engine relies on.

use proptest::prelude::*;
use strata_world::prelude::*;

const PALETTE: [BlockType; 9] = [
    BlockType::AIR,
    BlockType::STONE,
    BlockType::DIRT,
    BlockType::WATER,
    BlockType::LAVA,
    BlockType::LOG,
    BlockType::LEAVES,
    BlockType::TORCH,
    BlockType::CHEST,
];

fn state_strategy() -> impl Strategy<Value = BlockState> {
    (0..PALETTE.len(), 0u8..4).prop_map(|(i, meta)| BlockState::with_meta(PALETTE[i], meta))
}

#[derive(Debug, Clone)]
enum CauseOp {
    PushActor(u64),
    PushRegion(i32, i32),
    PushPlugin(u8),
    Prepend(u64),
}

fn cause_op_strategy() -> impl Strategy<Value = CauseOp> {
    prop_oneof![
        (0u64..4).prop_map(CauseOp::PushActor),
        (0i32..3, 0i32..3).prop_map(|(x, z)| CauseOp::PushRegion(x, z)),
        (0u8..3).prop_map(CauseOp::PushPlugin),
        (0u64..4).prop_map(CauseOp::Prepend),
    ]
}

fn actor(id: u64) -> Actor {
    Actor::new(ActorId(id), format!("actor{id}"))
}

proptest! {
    /// Every transition lands in exactly one bucket, and the bucket agrees
    /// with the priority rules.
    #[test]
    fn classification_is_total_and_prioritised(
        old in state_strategy(),
        new in state_strategy(),
        decay in any::<bool>(),
        in_procedure in any::<bool>(),
    ) {
        let procedure = ProcedureId::new("trees");
        let kind = CaptureKind::classify(in_procedure.then_some(&procedure), decay, &old, &new);

        if in_procedure {
            prop_assert_eq!(kind, CaptureKind::Populate(procedure));
        } else if old.is_fluid() || new.is_fluid() {
            prop_assert_eq!(kind, CaptureKind::Fluid);
        } else if decay {
            prop_assert_eq!(kind, CaptureKind::Decay);
        } else if new.is_empty() {
            prop_assert_eq!(kind, CaptureKind::Break);
        } else if new.block != old.block {
            prop_assert_eq!(kind, CaptureKind::Place);
        } else {
            prop_assert_eq!(kind, CaptureKind::Modify);
        }
    }

    /// No sequence of operations produces duplicate values in a cause.
    #[test]
    fn cause_values_stay_unique(ops in prop::collection::vec(cause_op_strategy(), 0..40)) {
        let mut cause = Cause::empty();
        for op in &ops {
            match op {
                CauseOp::PushActor(id) => {
                    cause.push(NamedCause::owner(actor(*id)));
                }
                CauseOp::PushRegion(x, z) => {
                    cause.push(NamedCause::source(RegionPos::new(*x, *z)));
                }
                CauseOp::PushPlugin(n) => {
                    cause.push(NamedCause::new("plugin", CauseValue::Plugin(format!("p{n}"))));
                }
                CauseOp::Prepend(id) => cause.prepend(NamedCause::notifier(actor(*id))),
            }
        }

        let values: Vec<&CauseValue> = cause.iter().map(|c| &c.value).collect();
        for (i, a) in values.iter().enumerate() {
            for b in &values[i + 1..] {
                prop_assert_ne!(*a, *b);
            }
        }
    }

    /// Re-adding everything a cause already holds leaves it unchanged.
    #[test]
    fn merging_a_cause_into_itself_is_identity(ops in prop::collection::vec(cause_op_strategy(), 0..20)) {
        let mut cause = Cause::empty();
        for op in &ops {
            if let CauseOp::PushActor(id) = op {
                cause.push(NamedCause::owner(actor(*id)));
            }
        }
        let merged = cause.clone().merge(&cause);
        prop_assert_eq!(merged, cause);
    }
}
