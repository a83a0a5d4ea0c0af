pub mod allied;
pub mod collision;
pub mod healing;
pub mod hostile;
pub mod movement;
pub mod spatial;

use crate::arena::Arena;
use crate::debug::timer::SystemPhase;
use crate::ecs::components::Health;

/// Run all simulation systems for one fixed tick.
pub fn tick(arena: &mut Arena) {
    // 1. Player integration (input was applied by the host before the tick)
    arena.player.update(&arena.bounds);

    // 2. Allied decisions, squad upkeep and movement
    arena.timers.begin();
    allied::update(arena);
    arena.timers.end(SystemPhase::Allied);

    // 3. Projectile flight and expiry
    arena.timers.begin();
    arena.projectiles.update(&arena.bounds);
    arena.timers.end(SystemPhase::Projectiles);

    // 4. Hostile decisions and movement
    arena.timers.begin();
    hostile::update(arena);
    arena.timers.end(SystemPhase::Hostile);

    // 5. Obstacle drift, then shield repulsion
    arena.timers.begin();
    arena.obstacles.update(&arena.bounds);
    collision::repel_obstacles(arena);
    arena.timers.end(SystemPhase::Obstacles);

    // 6. Overlap tests, damage and score
    arena.timers.begin();
    collision::update(arena);
    arena.timers.end(SystemPhase::Collisions);

    // 7. Contact healing
    arena.timers.begin();
    healing::update(arena);
    arena.timers.end(SystemPhase::Healing);

    // 8. Remove destroyed craft
    remove_destroyed(arena);
}

/// Despawn craft at zero health and drop them from the processing order.
pub fn remove_destroyed(arena: &mut Arena) {
    let Arena {
        world,
        allies,
        hostiles,
        squad,
        snapshots,
        ..
    } = arena;
    let before = allies.len() + hostiles.len();
    for list in [&mut *allies, &mut *hostiles] {
        list.retain(|&e| {
            let alive = world.get::<&Health>(e).is_ok_and(|h| h.current > 0.0);
            if !alive {
                let _ = world.despawn(e);
            }
            alive
        });
    }
    if allies.len() + hostiles.len() != before {
        squad.reconcile(world, allies);
        spatial::rebuild_snapshots(world, allies, hostiles, squad.alpha, snapshots);
    }
}
