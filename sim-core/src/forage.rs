//! C9 — Forage arbitration: single-harvester-per-cell rule.

use std::collections::{BTreeMap, HashSet};

#[cfg(feature = "instrument")]
use tracing::info;

use crate::agent::Agent;
use crate::grid::Grid;
use crate::types::{AgentId, Params, Tick};

/// Run Forage (C9) in ascending agent id order. Unpaired agents standing on
/// a resource cell with `amount > 0` harvest `min(amount, forage_rate)`,
/// first-come-first-served within the tick.
pub fn run_forage_phase(agents: &mut BTreeMap<AgentId, Agent>, grid: &mut Grid, params: &Params, tick: Tick) -> u64 {
    let mut harvested_cells: HashSet<(i32, i32)> = HashSet::new();
    let ids: Vec<AgentId> = agents.keys().copied().collect();
    let mut n_forages = 0u64;

    for id in ids {
        let agent = agents.get(&id).unwrap();
        if agent.is_paired() {
            continue;
        }
        let pos = agent.pos;
        if harvested_cells.contains(&pos) {
            continue;
        }
        let Some(cell) = grid.cell(pos) else { continue };
        if cell.amount <= 0 {
            continue;
        }
        let good = cell.good;
        let harvested = cell.amount.min(params.forage_rate);

        {
            let cell_mut = grid.cell_mut(pos).unwrap();
            cell_mut.amount -= harvested;
            cell_mut.last_harvest_tick = tick;
        }
        harvested_cells.insert(pos);

        let agent_mut = agents.get_mut(&id).unwrap();
        agent_mut.inventory.add(good, harvested);
        agent_mut.inventory_changed = true;
        n_forages += 1;

        #[cfg(feature = "instrument")]
        info!(
            target: "forage",
            tick,
            agent_id = id.0,
            pos_x = pos.0,
            pos_y = pos.1,
            good = %good,
            amount = harvested,
        );
    }

    n_forages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use crate::types::{ExchangeRegime, Good, Inventory};
    use crate::utility::UtilityParams;

    fn params() -> Params {
        Params {
            vision_radius: 8,
            interaction_radius: 1,
            move_budget_per_tick: 1,
            forage_rate: 2,
            resource_growth_rate: 1,
            resource_regen_cooldown: 1,
            trade_cooldown_ticks: 3,
            max_trade_block: 20,
            beta: 0.9,
            exchange_regime: ExchangeRegime::BarterOnly,
            money_scale: 1.0,
            search_protocol: crate::types::SearchProtocol::Default,
            matching_protocol: crate::types::MatchingProtocol::ThreePass,
            bargaining_protocol: crate::types::BargainingProtocol::CompensatingBlock,
        }
    }

    #[test]
    fn single_harvester_rule_favors_lower_id() {
        let mut agents = BTreeMap::new();
        for i in 0..2 {
            agents.insert(
                AgentId(i),
                Agent::new(
                    AgentId(i),
                    (0, 0),
                    Inventory::default(),
                    UtilityParams::Linear { w_a: 1.0, w_b: 1.0 },
                ),
            );
        }
        let mut grid = Grid::new(3, 3);
        grid.set_resource((0, 0), Cell::new(Good::A, 3, 3));

        let n = run_forage_phase(&mut agents, &mut grid, &params(), 0);
        assert_eq!(n, 1);
        assert_eq!(agents[&AgentId(0)].inventory.a, 2);
        assert_eq!(agents[&AgentId(1)].inventory.a, 0);
        assert_eq!(grid.cell((0, 0)).unwrap().amount, 1);
    }

    #[test]
    fn paired_agents_never_forage() {
        let mut agents = BTreeMap::new();
        let mut a = Agent::new(AgentId(0), (0, 0), Inventory::default(), UtilityParams::Linear { w_a: 1.0, w_b: 1.0 });
        a.paired_with_id = Some(AgentId(1));
        agents.insert(AgentId(0), a);
        let mut grid = Grid::new(3, 3);
        grid.set_resource((0, 0), Cell::new(Good::A, 3, 3));

        let n = run_forage_phase(&mut agents, &mut grid, &params(), 0);
        assert_eq!(n, 0);
        assert_eq!(grid.cell((0, 0)).unwrap().amount, 3);
    }
}
