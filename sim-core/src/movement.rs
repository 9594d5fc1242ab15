//! C7 — Movement: Manhattan step toward `target_pos` with canonical
//! tie-breaks and diagonal-deadlock resolution.

use std::collections::BTreeMap;

#[cfg(feature = "instrument")]
use tracing::info;

use crate::agent::Agent;
use crate::grid::Grid;
use crate::spatial::SpatialIndex;
use crate::types::{AgentId, Params, Pos, Tick};

/// One unit step from `pos` toward `target`, per the canonical tie-break
/// rule (spec §4.6): reduce the larger of `|dx|, |dy|` first; on a tie
/// reduce `|dx|`; when the direction itself is ambiguous prefer `-1`.
fn step_toward(pos: Pos, target: Pos) -> Pos {
    let dx = target.0 - pos.0;
    let dy = target.1 - pos.1;
    if dx == 0 && dy == 0 {
        return pos;
    }
    let reduce_x = dx.abs() >= dy.abs();
    if reduce_x {
        let step = if dx > 0 { 1 } else { -1 };
        (pos.0 + step, pos.1)
    } else {
        let step = if dy > 0 { 1 } else { -1 };
        (pos.0, pos.1 + step)
    }
}

fn is_diagonal_deadlock(agents: &BTreeMap<AgentId, Agent>, a: AgentId, b: AgentId) -> bool {
    let (agent_a, agent_b) = (&agents[&a], &agents[&b]);
    if agent_a.target_agent_id != Some(b) || agent_b.target_agent_id != Some(a) {
        return false;
    }
    let (ax, ay) = agent_a.pos;
    let (bx, by) = agent_b.pos;
    (ax - bx).abs() == 1 && (ay - by).abs() == 1
}

/// Run Movement (C7) for every agent with a live target, in ascending id
/// order, then update the spatial index for every agent whose position
/// changed.
pub fn run_movement_phase(
    agents: &mut BTreeMap<AgentId, Agent>,
    grid: &Grid,
    spatial_index: &mut SpatialIndex,
    params: &Params,
    tick: Tick,
) {
    let ids: Vec<AgentId> = agents.keys().copied().collect();
    let mut moved: Vec<(AgentId, Pos, Pos)> = Vec::new();

    for &id in &ids {
        let Some(target) = agents[&id].target_pos else { continue };
        let start_pos = agents[&id].pos;
        if start_pos == target {
            continue;
        }

        if let Some(peer) = agents[&id].target_agent_id {
            if is_diagonal_deadlock(agents, id, peer) && id < peer {
                continue;
            }
        }

        let mut pos = start_pos;
        for _ in 0..params.move_budget_per_tick {
            if pos == target {
                break;
            }
            let next = step_toward(pos, target);
            if !grid.in_bounds(next) {
                break;
            }
            pos = next;
        }

        if pos != start_pos {
            agents.get_mut(&id).unwrap().pos = pos;
            moved.push((id, start_pos, pos));
        }
    }

    for &(id, old_pos, new_pos) in &moved {
        spatial_index.move_agent(id, old_pos, new_pos);
        #[cfg(feature = "instrument")]
        info!(
            target: "movement",
            tick,
            agent_id = id.0,
            from_x = old_pos.0,
            from_y = old_pos.1,
            to_x = new_pos.0,
            to_y = new_pos.1,
        );
    }
}
