//! End-to-end scenarios for capture, batched events and rollback.
//!
//! Each test drives a [`TrackedWorld`] over a [`MemoryStorage`] through the
//! public scopes and inspects the events a recording listener saw, the final
//! storage contents and the flush report.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use strata_tracker::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Events = Rc<RefCell<Vec<WorldEvent>>>;

fn alex() -> Actor {
    Actor::new(ActorId(1), "alex")
}

fn stone() -> BlockState {
    BlockState::of(BlockType::STONE)
}

fn dirt() -> BlockState {
    BlockState::of(BlockType::DIRT)
}

/// A bus that records every event and lets `decide` mutate or cancel it.
fn bus_with(decide: impl FnMut(&mut WorldEvent) -> EventResult + 'static) -> (ListenerBus, Events) {
    let events: Events = Rc::new(RefCell::new(Vec::new()));
    let mut bus = ListenerBus::new();
    bus.on_any(Box::new(decide));
    let sink = events.clone();
    bus.on_any(Box::new(move |event| {
        sink.borrow_mut().push(event.clone());
        EventResult::Accepted
    }));
    (bus, events)
}

fn recording_bus() -> (ListenerBus, Events) {
    bus_with(|_| EventResult::Accepted)
}

fn new_entity(
    world: &mut TrackedWorld<MemoryStorage>,
    category: EntityCategory,
    pos: BlockPos,
) -> BasicEntity {
    BasicEntity::new(world.allocate_entity_id(), category, pos)
}

fn world_with(bus: ListenerBus) -> TrackedWorld<MemoryStorage> {
    TrackedWorld::new(MemoryStorage::new(WorldId(0)), bus)
}

fn count(events: &Events, kind: EventKind) -> usize {
    events.borrow().iter().filter(|e| e.kind() == kind).count()
}

fn change_events(events: &Events) -> Vec<ChangeBlockEvent> {
    events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            WorldEvent::ChangeBlock(change) => Some(change.clone()),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Cancellation
// ---------------------------------------------------------------------------

#[test]
fn cancelled_break_restores_stone_without_drop_event() {
    let (bus, events) = bus_with(|event| match event {
        WorldEvent::ChangeBlock(_) => EventResult::Cancelled,
        _ => EventResult::Accepted,
    });
    let mut world = world_with(bus);
    let pos = BlockPos::new(0, 64, 0);
    world.storage_mut().place(pos, stone());

    let drop_id = world.allocate_entity_id();
    let dig = IntentContext::for_actor(alex()).intent(Intent::StartDestroy);
    let report = world
        .process_intent(dig, |w| {
            w.set_state(pos, BlockState::AIR, UpdateFlags::DEFAULT)?;
            let drop = BasicEntity::item(drop_id, pos).into_ref();
            w.spawn_entity(drop, Cause::source(alex()))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(report.cancelled, Some(CaptureKind::Break));
    assert_eq!(report.restored, vec![pos]);
    assert_eq!(world.storage().read(pos), stone());
    assert_eq!(count(&events, EventKind::DropItem), 0);
    assert!(world.entities().is_empty());
    assert!(world.ledger().is_empty());
    // The digging player is told the block is back.
    assert!(world.storage().client_updates.contains(&pos));
    assert!(world.journal().block_actions().is_empty());
    // The drop never existed, so its id is reissued under a new generation.
    assert_eq!(world.allocate_entity_id(), EntityId::new(drop_id.index(), 1));
}

#[test]
fn cancelled_place_requests_held_item_resync() {
    let (bus, _events) = bus_with(|event| match event {
        WorldEvent::ChangeBlock(change) if change.kind == CaptureKind::Place => {
            EventResult::Cancelled
        }
        _ => EventResult::Accepted,
    });
    let mut world = world_with(bus);
    let pos = BlockPos::new(2, 64, 2);

    let place = IntentContext::for_actor(alex()).intent(Intent::PlaceBlock);
    let report = world
        .process_intent(place, |w| {
            w.set_state(pos, BlockState::of(BlockType::PLANKS), UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap();

    assert!(report.was_cancelled());
    assert!(report.held_item_resync);
    assert_eq!(world.storage().read(pos), BlockState::AIR);
    assert_eq!(world.provenance().owner_at(pos), None);
}

#[test]
fn cancelled_break_rolls_back_later_buckets() {
    let (bus, events) = bus_with(|event| match event {
        WorldEvent::ChangeBlock(change) if change.kind == CaptureKind::Break => {
            EventResult::Cancelled
        }
        _ => EventResult::Accepted,
    });
    let mut world = world_with(bus);
    let broken = BlockPos::new(0, 64, 0);
    let placed = BlockPos::new(5, 64, 0);
    world.storage_mut().place(broken, stone());

    world.begin_tick();
    let report = world
        .tick_block(broken, |w| {
            w.set_state(broken, BlockState::AIR, UpdateFlags::DEFAULT)?;
            w.set_state(placed, dirt(), UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(report.batches, vec![CaptureKind::Break]);
    assert_eq!(report.cancelled, Some(CaptureKind::Break));
    assert_eq!(report.restored, vec![placed, broken]);
    assert_eq!(world.storage().read(broken), stone());
    assert_eq!(world.storage().read(placed), BlockState::AIR);
    assert!(world.ledger().is_empty());
    assert_eq!(world.end_tick().unwrap(), 0);
    assert_eq!(world.storage().read(placed), BlockState::AIR);
    assert_eq!(change_events(&events).len(), 1);
    assert!(world.journal().block_actions().is_empty());
}

#[test]
fn cancelled_break_restores_position_rewritten_by_later_bucket() {
    let (bus, events) = bus_with(|event| match event {
        WorldEvent::ChangeBlock(change) if change.kind == CaptureKind::Break => {
            EventResult::Cancelled
        }
        _ => EventResult::Accepted,
    });
    let mut world = world_with(bus);
    let pos = BlockPos::new(3, 64, 0);
    world.storage_mut().place(pos, stone());

    world.begin_tick();
    let report = world
        .tick_block(BlockPos::new(-1, 64, 0), |w| {
            w.set_state(pos, BlockState::AIR, UpdateFlags::DEFAULT)?;
            w.set_state(pos, dirt(), UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap();

    assert!(report.was_cancelled());
    assert_eq!(world.storage().read(pos), stone());
    assert_eq!(world.end_tick().unwrap(), 0);
    assert_eq!(change_events(&events).len(), 1);
}

// ---------------------------------------------------------------------------
// 2. Partial invalidation and custom replacement
// ---------------------------------------------------------------------------

#[test]
fn invalidating_one_of_three_transactions_restores_only_it() {
    let positions = [
        BlockPos::new(0, 64, 0),
        BlockPos::new(1, 64, 0),
        BlockPos::new(2, 64, 0),
    ];
    let target = positions[1];
    let (bus, events) = bus_with(move |event| {
        if let WorldEvent::ChangeBlock(change) = event {
            for tx in &mut change.transactions {
                if tx.original().pos == target {
                    tx.invalidate();
                }
            }
        }
        EventResult::Accepted
    });
    let mut world = world_with(bus);

    let report = world
        .tick_block(BlockPos::new(0, 63, 0), |w| {
            for pos in positions {
                w.set_state(pos, dirt(), UpdateFlags::DEFAULT)?;
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(world.storage().read(positions[0]), dirt());
    assert_eq!(world.storage().read(positions[1]), BlockState::AIR);
    assert_eq!(world.storage().read(positions[2]), dirt());
    assert_eq!(report.restored, vec![target]);
    assert_eq!(report.committed, 2);
    assert_eq!(change_events(&events)[0].transactions.len(), 3);
    assert_eq!(world.journal().actions_at(target).count(), 0);
}

#[test]
fn custom_replacement_is_applied() {
    let (bus, _events) = bus_with(|event| {
        if let WorldEvent::ChangeBlock(change) = event {
            for tx in &mut change.transactions {
                let custom = tx.original().with_state(BlockState::of(BlockType::PLANKS));
                tx.set_custom(Arc::new(custom));
            }
        }
        EventResult::Accepted
    });
    let mut world = world_with(bus);
    let pos = BlockPos::new(3, 64, 3);

    world
        .tick_block(pos.down(), |w| {
            w.set_state(pos, dirt(), UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(world.storage().read(pos), BlockState::of(BlockType::PLANKS));
    let action = &world.journal().block_actions()[0];
    assert_eq!(action.old, BlockState::AIR);
    assert_eq!(action.new, BlockState::of(BlockType::PLANKS));
}

// ---------------------------------------------------------------------------
// 3. Attribution
// ---------------------------------------------------------------------------

#[test]
fn place_on_empty_records_actor_as_owner() {
    let (bus, _events) = recording_bus();
    let mut world = world_with(bus);
    let pos = BlockPos::new(8, 70, 8);

    world
        .process_intent(IntentContext::for_actor(alex()).intent(Intent::PlaceBlock), |w| {
            w.set_state(pos, stone(), UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(world.provenance().owner_at(pos), Some(&alex()));
    assert_eq!(world.journal().actions_by(ActorId(1)).count(), 1);
    // Neighbors were notified on the player's behalf.
    assert_eq!(world.provenance().notifier_at(pos.up()), Some(&alex()));
}

#[test]
fn nested_changes_are_attributed_to_the_ticking_entity() {
    let (bus, events) = recording_bus();
    let mut world = world_with(bus);
    let zombie = new_entity(&mut world, EntityCategory::Living, BlockPos::ORIGIN)
        .into_ref();
    let zombie_id = zombie.id();
    world.provenance_mut().track_creator(zombie_id, &alex());

    let door = BlockPos::new(1, 64, 0);
    let below = BlockPos::new(1, 63, 0);
    world.storage_mut().place(door, BlockState::of(BlockType::PLANKS));

    let report = world
        .tick_entity(zombie, |w| {
            w.set_state(door, BlockState::AIR, UpdateFlags::DEFAULT)?;
            w.tick_block(door, |w| {
                w.set_state(below, BlockState::of(BlockType::GRASS), UpdateFlags::DEFAULT)?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    assert_eq!(report.batches, vec![CaptureKind::Break, CaptureKind::Place]);
    for change in change_events(&events) {
        let root = change.cause.first::<EntityRef>().map(|e| e.id());
        assert_eq!(root, Some(zombie_id));
        assert_eq!(change.cause.get(NamedCause::OWNER), Some(&CauseValue::Actor(alex())));
    }
}

#[test]
fn spawned_entity_inherits_creator_of_ticking_entity() {
    let (bus, events) = recording_bus();
    let mut world = world_with(bus);
    let skeleton = new_entity(&mut world, EntityCategory::Living, BlockPos::ORIGIN)
        .into_ref();
    world.provenance_mut().track_creator(skeleton.id(), &alex());
    let arrow_id = world.allocate_entity_id();

    let report = world
        .tick_entity(skeleton.clone(), |w| {
            let arrow = BasicEntity::new(arrow_id, EntityCategory::Projectile, BlockPos::ORIGIN)
                .with_origin(CauseValue::Entity(skeleton.clone()))
                .into_ref();
            w.spawn_entity(arrow, Cause::source(skeleton.clone()))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(report.entities_spawned, 1);
    assert_eq!(world.provenance().tracked_creator(arrow_id), Some(&alex()));
    let spawn = events
        .borrow()
        .iter()
        .find_map(|e| match e {
            WorldEvent::SpawnEntity(spawn) => Some(spawn.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(spawn.kind, SpawnKind::Generic);
    assert_eq!(spawn.cause.first::<Actor>(), Some(&alex()));
}

// ---------------------------------------------------------------------------
// 4. Final snapshots and write outcomes
// ---------------------------------------------------------------------------

#[test]
fn two_writes_to_one_position_report_latest_final_state() {
    let (bus, events) = recording_bus();
    let mut world = world_with(bus);
    let pos = BlockPos::new(0, 64, 0);
    world.storage_mut().place(pos, stone());

    world
        .tick_block(pos, |w| {
            w.set_state(pos, BlockState::AIR, UpdateFlags::DEFAULT)?;
            w.set_state(pos, dirt(), UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap();

    let changes = change_events(&events);
    assert_eq!(changes.len(), 2);
    for change in &changes {
        assert_eq!(change.transactions[0].final_value().state, dirt());
    }
    assert_eq!(changes[0].transactions[0].original().state, stone());
    assert_eq!(changes[1].transactions[0].original().state, BlockState::AIR);
    assert_eq!(world.storage().read(pos), dirt());
}

#[test]
fn stale_write_is_dropped_without_event() {
    let (bus, events) = recording_bus();
    let mut world = world_with(bus);
    let pos = BlockPos::new(0, 64, 0);
    world.storage_mut().expire_next_write_at(pos);

    let report = world
        .tick_block(pos, |w| {
            assert!(!w.set_state(pos, dirt(), UpdateFlags::DEFAULT)?);
            Ok(())
        })
        .unwrap();

    assert!(report.skipped);
    assert!(events.borrow().is_empty());
    assert_eq!(world.storage().read(pos), BlockState::AIR);
}

#[test]
fn storage_failure_surfaces_world_and_position() -> anyhow::Result<()> {
    let (bus, events) = recording_bus();
    let mut world = TrackedWorld::new(MemoryStorage::new(WorldId(9)), bus);
    let pos = BlockPos::new(4, 5, 6);
    world.storage_mut().reject_writes_at(pos);

    let err = world
        .tick_block(pos, |w| {
            w.set_state(pos, dirt(), UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap_err();

    match &err {
        TrackerError::MutationFailed { world: id, pos: at, state, .. } => {
            assert_eq!(*id, WorldId(9));
            assert_eq!(*at, pos);
            assert_eq!(*state, dirt());
        }
        other => anyhow::bail!("unexpected error: {other}"),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert!(err.to_string().contains(&pos.to_string()));
    assert!(world.ledger().is_empty());
    assert!(events.borrow().is_empty());
    Ok(())
}

// ---------------------------------------------------------------------------
// 5. Classification scopes
// ---------------------------------------------------------------------------

#[test]
fn fluid_and_decay_get_their_own_batches() {
    let (bus, _events) = recording_bus();
    let mut world = world_with(bus);
    let leaves = BlockPos::new(0, 70, 0);
    let flow = BlockPos::new(3, 64, 0);
    world.storage_mut().place(leaves, BlockState::of(BlockType::LEAVES));

    let report = world
        .tick_block(leaves, |w| {
            w.with_decay(|w| {
                w.set_state(leaves, BlockState::AIR, UpdateFlags::DEFAULT)?;
                Ok(())
            })?;
            w.set_state(flow, BlockState::of(BlockType::WATER), UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(report.batches, vec![CaptureKind::Decay, CaptureKind::Fluid]);
}

#[test]
fn populate_waits_for_a_region_cause() {
    let (bus, events) = recording_bus();
    let mut world = world_with(bus);
    let ore = BlockPos::new(2, 12, 2);
    let ores = ProcedureId::new("ores");

    let report = world
        .tick_block(ore, |w| {
            w.with_procedure(ores.clone(), |w| {
                w.set_state(ore, BlockState::of(BlockType::SAND), UpdateFlags::DEFAULT)?;
                Ok(())
            })
        })
        .unwrap();
    assert_eq!(report.populated, 0);
    assert!(world.ledger().has_populate());
    assert_eq!(count(&events, EventKind::PopulateChunk), 0);

    let report = world.populate_region(ore.region(), |_| Ok(())).unwrap();
    assert_eq!(report.populated, 1);
    assert!(!world.ledger().has_populate());

    let events = events.borrow();
    let populate = events
        .iter()
        .find_map(|e| match e {
            WorldEvent::PopulateChunk(p) => Some(p),
            _ => None,
        })
        .unwrap();
    assert_eq!(populate.region, ore.region());
    assert_eq!(populate.transactions[&ores].len(), 1);
    assert_eq!(
        world.journal().actions_of_kind(&CaptureKind::Populate(ores)).count(),
        1
    );
}

#[test]
fn populate_honours_invalidation_but_not_cancellation() {
    let lakes = ProcedureId::new("lakes");
    let trees = ProcedureId::new("trees");
    let rejected = lakes.clone();
    let (bus, _events) = bus_with(move |event| {
        if let WorldEvent::PopulateChunk(populate) = event {
            if let Some(list) = populate.transactions.get_mut(&rejected) {
                list.iter_mut().for_each(|tx| tx.invalidate());
            }
            return EventResult::Cancelled;
        }
        EventResult::Accepted
    });
    let mut world = world_with(bus);
    let lake = BlockPos::new(1, 60, 1);
    let tree = BlockPos::new(5, 61, 5);

    let report = world
        .populate_region(RegionPos::new(0, 0), |w| {
            w.with_procedure(lakes.clone(), |w| {
                w.set_state(lake, BlockState::of(BlockType::WATER), UpdateFlags::DEFAULT)?;
                Ok(())
            })?;
            w.with_procedure(trees.clone(), |w| {
                w.set_state(tree, BlockState::of(BlockType::LOG), UpdateFlags::DEFAULT)?;
                Ok(())
            })
        })
        .unwrap();

    assert_eq!(report.populated, 1);
    assert_eq!(report.restored, vec![lake]);
    assert_eq!(world.storage().read(lake), BlockState::AIR);
    assert_eq!(world.storage().read(tree), BlockState::of(BlockType::LOG));
}

#[test]
fn spawner_cycle_publishes_spawner_batch() {
    let (bus, events) = recording_bus();
    let mut world = world_with(bus);

    let report = world
        .with_spawner(SpawnerKind::World, |w| {
            for _ in 0..3 {
                let mob = new_entity(w, EntityCategory::Living, BlockPos::ORIGIN)
                    .into_ref();
                w.spawn_entity(mob, Cause::source(w.world_id()))?;
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(report.entities_spawned, 3);
    assert_eq!(count(&events, EventKind::SpawnEntity), 1);
    assert!(matches!(
        &events.borrow()[0],
        WorldEvent::SpawnEntity(spawn)
            if spawn.kind == SpawnKind::Spawner
                && spawn.cause.first::<WorldId>() == Some(&WorldId(0))
    ));
}

// ---------------------------------------------------------------------------
// 6. Entities
// ---------------------------------------------------------------------------

#[test]
fn destruct_entity_event_fires_once_per_entity() {
    let (bus, events) = recording_bus();
    let mut world = world_with(bus);
    let painting = new_entity(&mut world, EntityCategory::Decoration, BlockPos::ORIGIN)
        .into_ref();
    let id = painting.id();
    assert!(world.spawn_entity(painting.clone(), Cause::source(alex())).unwrap());
    painting.kill();

    let attack = || IntentContext::for_actor(alex()).intent(Intent::AttackEntity(id));
    let first = world.process_intent(attack(), |_| Ok(())).unwrap();
    let second = world.process_intent(attack(), |_| Ok(())).unwrap();

    assert_eq!(first.destructed_entities, 1);
    assert_eq!(second.destructed_entities, 0);
    assert_eq!(count(&events, EventKind::DestructEntity), 1);
}

#[test]
fn attacking_living_entity_is_not_destruction() {
    let (bus, events) = recording_bus();
    let mut world = world_with(bus);
    let cow = new_entity(&mut world, EntityCategory::Living, BlockPos::ORIGIN)
        .into_ref();
    let id = cow.id();
    world.spawn_entity(cow.clone(), Cause::source(alex())).unwrap();
    cow.kill();

    let attack = IntentContext::for_actor(alex()).intent(Intent::AttackEntity(id));
    world.process_intent(attack, |_| Ok(())).unwrap();
    assert_eq!(count(&events, EventKind::DestructEntity), 0);
}

#[test]
fn breaking_support_block_detaches_decoration() {
    let (bus, events) = recording_bus();
    let mut world = world_with(bus);
    let wall = BlockPos::new(0, 64, 0);
    world.storage_mut().place(wall, stone());
    let frame = new_entity(&mut world, EntityCategory::Decoration, wall.offset(Direction::North))
        .attached(wall)
        .into_ref();
    let frame_id = frame.id();
    world.spawn_entity(frame.clone(), Cause::source(alex())).unwrap();
    events.borrow_mut().clear();

    let dig = IntentContext::for_actor(alex()).intent(Intent::StartDestroy);
    let report = world
        .process_intent(dig, |w| {
            w.set_state(wall, BlockState::AIR, UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap();

    assert!(frame.is_dead());
    assert!(!world.entities().contains(frame_id));
    assert_eq!(report.items_dropped, 1);
    let drop = events
        .borrow()
        .iter()
        .find_map(|e| match e {
            WorldEvent::DropItem(d) => Some(d.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(drop.kind, DropKind::Destruct);
    // The broken block leads the cause, the player follows.
    assert!(matches!(drop.cause.root(), Some(CauseValue::Block(b)) if b.pos == wall));
    assert_eq!(drop.cause.first::<Actor>(), Some(&alex()));
}

#[test]
fn drops_at_invalidated_positions_are_discarded() {
    let broken = BlockPos::new(0, 64, 0);
    let (bus, _events) = bus_with(move |event| {
        if let WorldEvent::ChangeBlock(change) = event {
            change.transactions.iter_mut().for_each(|tx| tx.invalidate());
        }
        EventResult::Accepted
    });
    let mut world = world_with(bus);
    world.storage_mut().place(broken, stone());

    let report = world
        .process_intent(IntentContext::for_actor(alex()).intent(Intent::StartDestroy), |w| {
            w.set_state(broken, BlockState::AIR, UpdateFlags::DEFAULT)?;
            let drop = BasicEntity::item(w.allocate_entity_id(), broken).into_ref();
            w.spawn_entity(drop, Cause::source(alex()))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(world.storage().read(broken), stone());
    assert_eq!(report.items_dropped, 0);
    assert_eq!(report.entities_discarded, 1);
    assert!(world.entities().is_empty());
}

#[test]
fn spawns_can_bypass_capture_by_configuration() {
    let (bus, events) = recording_bus();
    let config = TrackerConfig {
        capture_entity_spawns: false,
        ..TrackerConfig::default()
    };
    let mut world = TrackedWorld::with_config(MemoryStorage::new(WorldId(0)), bus, config);
    let pos = BlockPos::new(0, 64, 0);

    world
        .tick_block(pos, |w| {
            let item = BasicEntity::item(w.allocate_entity_id(), pos).into_ref();
            assert!(w.spawn_entity(item, Cause::source(alex()))?);
            assert_eq!(w.entities().len(), 1);
            Ok(())
        })
        .unwrap();

    assert!(matches!(&events.borrow()[0], WorldEvent::DropItem(d) if d.kind == DropKind::Custom));
}

// ---------------------------------------------------------------------------
// 7. Remote views
// ---------------------------------------------------------------------------

#[test]
fn remote_view_never_captures_or_publishes() {
    let (bus, events) = recording_bus();
    let mut world = TrackedWorld::new(MemoryStorage::remote(WorldId(0)), bus);
    let pos = BlockPos::new(0, 64, 0);

    let report = world
        .process_intent(IntentContext::for_actor(alex()).intent(Intent::PlaceBlock), |w| {
            w.set_state(pos, stone(), UpdateFlags::DEFAULT)?;
            let item = BasicEntity::item(w.allocate_entity_id(), pos).into_ref();
            w.spawn_entity(item, Cause::source(alex()))?;
            Ok(())
        })
        .unwrap();

    assert!(report.skipped);
    assert!(events.borrow().is_empty());
    assert_eq!(world.storage().read(pos), stone());
    assert_eq!(world.entities().len(), 1);
    assert_eq!(world.provenance().owner_at(pos), None);
}
