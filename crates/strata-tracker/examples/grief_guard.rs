//! Grief protection demo -- a listener guards a claimed area.
//!
//! Alex owns a small stone hut. Bob tries to dig through its wall and to
//! place blocks inside it; every change Bob makes inside the claim is
//! invalidated and rolled back, while Alex keeps building. The tick's action
//! journal is printed with its blake3 digest at the end.
//!
//! Run with:
//!   RUST_LOG=strata_tracker=debug cargo run --example grief_guard -p strata-tracker

use strata_tracker::prelude::*;

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

const OWNER: ActorId = ActorId(1);

#[derive(Debug, Clone, Copy)]
struct Claim {
    min: BlockPos,
    max: BlockPos,
}

impl Claim {
    fn contains(&self, pos: BlockPos) -> bool {
        (self.min.x..=self.max.x).contains(&pos.x)
            && (self.min.y..=self.max.y).contains(&pos.y)
            && (self.min.z..=self.max.z).contains(&pos.z)
    }
}

/// Invalidate every change inside `claim` not made by its owner.
fn guard(claim: Claim) -> Listener {
    Box::new(move |event| {
        let WorldEvent::ChangeBlock(change) = event else {
            return EventResult::Accepted;
        };
        let by_owner = change.cause.first::<Actor>().map(|a| a.id) == Some(OWNER);
        if by_owner {
            return EventResult::Accepted;
        }
        for tx in &mut change.transactions {
            if claim.contains(tx.original().pos) {
                tracing::warn!(
                    pos = %tx.original().pos,
                    kind = ?change.kind,
                    "change inside claim refused"
                );
                tx.invalidate();
            }
        }
        EventResult::Accepted
    })
}

/// Dirt placed in the open grows grass.
fn grow_grass(
    world: &mut TrackedWorld<MemoryStorage>,
    pos: BlockPos,
    state: BlockState,
) -> Result<(), TrackerError> {
    if state.block == BlockType::DIRT && world.storage().read(pos.up()).is_empty() {
        world.set_state(pos, BlockState::of(BlockType::GRASS), UpdateFlags::DEFAULT)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

fn build_hut(storage: &mut MemoryStorage, claim: Claim) {
    for x in claim.min.x..=claim.max.x {
        for y in claim.min.y..=claim.max.y {
            for z in claim.min.z..=claim.max.z {
                let edge =
                    x == claim.min.x || x == claim.max.x || z == claim.min.z || z == claim.max.z;
                if edge || y == claim.min.y {
                    storage.place(BlockPos::new(x, y, z), BlockState::of(BlockType::STONE));
                }
            }
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let claim = Claim {
        min: BlockPos::new(0, 64, 0),
        max: BlockPos::new(4, 67, 4),
    };
    let mut storage = MemoryStorage::new(WorldId(0));
    build_hut(&mut storage, claim);

    let mut bus = ListenerBus::new();
    bus.on(EventKind::ChangeBlock, guard(claim));

    let config = TrackerConfig {
        log_block_actions: true,
        ..TrackerConfig::default()
    };
    let mut world = TrackedWorld::with_config(storage, bus, config);
    world.set_placement_hook(grow_grass);

    let alex = Actor::new(OWNER, "alex");
    let bob = Actor::new(ActorId(2), "bob");
    let tick = world.begin_tick();

    // Bob digs through the wall and drops the stone on the floor.
    let wall = BlockPos::new(0, 65, 2);
    let dig = IntentContext::for_actor(bob.clone()).intent(Intent::StartDestroy);
    let report = world.process_intent(dig, |w| {
        w.set_state(wall, BlockState::AIR, UpdateFlags::DEFAULT)?;
        let drop = BasicEntity::item(w.allocate_entity_id(), wall).into_ref();
        w.spawn_entity(drop, Cause::source(bob.clone()))?;
        Ok(())
    })?;
    println!(
        "bob digs {wall}: restored {:?}, items dropped {}",
        report.restored, report.items_dropped
    );

    // Bob builds inside and outside the claim in one go.
    let inside = BlockPos::new(2, 65, 2);
    let outside = BlockPos::new(8, 64, 8);
    let place = IntentContext::for_actor(bob.clone()).intent(Intent::PlaceBlock);
    let report = world.process_intent(place, |w| {
        w.set_state(inside, BlockState::of(BlockType::TNT), UpdateFlags::DEFAULT)?;
        w.set_state(outside, BlockState::of(BlockType::DIRT), UpdateFlags::DEFAULT)?;
        Ok(())
    })?;
    println!(
        "bob builds: committed {}, restored {:?}, held item resync {}",
        report.committed, report.restored, report.held_item_resync
    );

    // Alex adds a door opening and a torch.
    let door = BlockPos::new(4, 65, 2);
    let torch = BlockPos::new(2, 65, 1);
    let renovate = IntentContext::for_actor(alex.clone()).intent(Intent::PlaceBlock);
    let report = world.process_intent(renovate, |w| {
        w.set_state(door, BlockState::AIR, UpdateFlags::DEFAULT)?;
        w.set_state(torch, BlockState::of(BlockType::TORCH), UpdateFlags::DEFAULT)?;
        Ok(())
    })?;
    println!("alex renovates: batches {:?}, committed {}", report.batches, report.committed);

    let leftover = world.end_tick()?;
    println!();
    println!(
        "tick {tick} journal ({} block actions, {leftover} rolled-back captures):",
        world.journal().block_actions().len()
    );
    for action in world.journal().block_actions() {
        let actor = action.actor.as_ref().map_or("-", |a| a.name.as_str());
        println!(
            "  {:<8} {:<14} {} -> {} by {actor}",
            action.kind.name(),
            action.pos.to_string(),
            action.old,
            action.new
        );
    }
    println!(
        "owner of {outside}: {:?}, owner of {torch}: {:?}",
        world.provenance().owner_at(outside).map(|a| a.name.as_str()),
        world.provenance().owner_at(torch).map(|a| a.name.as_str()),
    );

    let bytes = serde_json::to_vec(world.journal())?;
    println!("journal digest: {}", blake3::hash(&bytes).to_hex());
    Ok(())
}
