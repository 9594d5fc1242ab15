//! C5 — Perception.
//!
//! Builds each agent's view of the world at the start of a tick: which other
//! agents and which resource cells fall within `vision_radius` (Chebyshev),
//! self excluded. Perception is read-only and has no ordering side effects
//! of its own — Decision imposes order when it consumes the view.

use std::collections::BTreeMap;

use crate::agent::Agent;
use crate::grid::Grid;
use crate::spatial::SpatialIndex;
use crate::types::{AgentId, Pos};
use crate::utility::QuoteTable;

/// A by-value snapshot of a visible peer's position and quotes, taken at
/// Perception time (spec §3: `(peer_id, peer_pos, peer_quotes_snapshot)`).
/// Nothing downstream of Perception mutates an agent's `pos`/`quotes`
/// before Housekeeping, so this never goes stale within a tick, but the
/// view holds its own copy rather than re-reading the live `Agent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleAgent {
    pub id: AgentId,
    pub pos: Pos,
    pub quotes: QuoteTable,
}

/// A by-value snapshot of a visible resource cell (spec §3: `(cell_pos, amount)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleResource {
    pub pos: Pos,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct PerceptionView {
    pub self_id: AgentId,
    pub self_pos: Pos,
    /// Other agents within vision, ascending by id.
    pub visible_agents: Vec<VisibleAgent>,
    /// Resource cells within vision, ascending by `(y, x)`.
    pub visible_resource_cells: Vec<VisibleResource>,
}

/// Build the perception view for `agent_id`, given `vision_radius`.
pub fn perceive(
    agent_id: AgentId,
    agents: &BTreeMap<AgentId, Agent>,
    grid: &Grid,
    spatial_index: &SpatialIndex,
    vision_radius: i32,
) -> PerceptionView {
    let self_pos = agents[&agent_id].pos;

    let mut visible_agents: Vec<VisibleAgent> = spatial_index
        .query_radius(self_pos, vision_radius)
        .into_iter()
        .filter(|&id| id != agent_id)
        .map(|id| {
            let peer = &agents[&id];
            VisibleAgent { id, pos: peer.pos, quotes: peer.quotes }
        })
        .collect();
    visible_agents.sort_unstable_by_key(|v| v.id);

    let mut visible_resource_cells: Vec<VisibleResource> = grid
        .iter_cells_canonical()
        .filter(|&(pos, _)| chebyshev(self_pos, pos) <= vision_radius)
        .map(|(pos, cell)| VisibleResource { pos, amount: cell.amount })
        .collect();
    // `iter_cells_canonical` already yields `(y, x)` order; filtering
    // preserves it.
    visible_resource_cells.sort_unstable_by_key(|v| (v.pos.1, v.pos.0));

    PerceptionView {
        self_id: agent_id,
        self_pos,
        visible_agents,
        visible_resource_cells,
    }
}

fn chebyshev(a: Pos, b: Pos) -> i32 {
    (a.0 - b.0).abs().max((a.1 - b.1).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use crate::types::{Good, Inventory};
    use crate::utility::UtilityParams;

    fn setup() -> (BTreeMap<AgentId, Agent>, Grid, SpatialIndex) {
        let mut agents = BTreeMap::new();
        let params = UtilityParams::Linear { w_a: 1.0, w_b: 1.0 };
        agents.insert(
            AgentId(1),
            Agent::new(AgentId(1), (2, 2), Inventory::default(), params),
        );
        agents.insert(
            AgentId(2),
            Agent::new(AgentId(2), (2, 3), Inventory::default(), params),
        );
        agents.insert(
            AgentId(3),
            Agent::new(AgentId(3), (9, 9), Inventory::default(), params),
        );

        let mut grid = Grid::new(10, 10);
        grid.set_resource((2, 2), Cell::new(Good::A, 5, 5));
        grid.set_resource((9, 9), Cell::new(Good::B, 5, 5));

        let mut idx = SpatialIndex::new(10, 10);
        for (id, agent) in &agents {
            idx.insert(*id, agent.pos);
        }
        (agents, grid, idx)
    }

    #[test]
    fn perceive_excludes_self_and_is_sorted() {
        let (agents, grid, idx) = setup();
        let view = perceive(AgentId(1), &agents, &grid, &idx, 2);
        let ids: Vec<AgentId> = view.visible_agents.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![AgentId(2)]);
        assert_eq!(view.visible_agents[0].pos, (2, 3));
        assert!(!ids.contains(&AgentId(1)));
        assert!(!ids.contains(&AgentId(3)));
    }

    #[test]
    fn perceive_resource_cells_sorted_by_y_then_x() {
        let (agents, grid, idx) = setup();
        let view = perceive(AgentId(1), &agents, &grid, &idx, 20);
        let cells: Vec<Pos> = view.visible_resource_cells.iter().map(|v| v.pos).collect();
        assert_eq!(cells, vec![(2, 2), (9, 9)]);
    }
}
