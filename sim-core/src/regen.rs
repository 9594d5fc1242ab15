//! C10 — Resource regeneration: deterministic per-cell growth, no
//! randomness (spec §4.9).

use crate::grid::Grid;
use crate::types::{Params, Tick};

/// Run Regeneration (C10) in canonical `(y, x)` cell order.
pub fn run_regen_phase(grid: &mut Grid, params: &Params, tick: Tick) {
    for (_, cell) in grid.iter_cells_canonical_mut() {
        if tick >= cell.last_harvest_tick + params.resource_regen_cooldown && cell.amount < cell.max_amount {
            cell.amount = (cell.amount + params.resource_growth_rate).min(cell.max_amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use crate::types::{ExchangeRegime, Good};

    fn params() -> Params {
        Params {
            vision_radius: 8,
            interaction_radius: 1,
            move_budget_per_tick: 1,
            forage_rate: 1,
            resource_growth_rate: 2,
            resource_regen_cooldown: 3,
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
    fn growth_respects_cooldown() {
        let mut grid = Grid::new(2, 2);
        let mut cell = Cell::new(Good::A, 1, 10);
        cell.last_harvest_tick = 5;
        grid.set_resource((0, 0), cell);

        run_regen_phase(&mut grid, &params(), 6);
        assert_eq!(grid.cell((0, 0)).unwrap().amount, 1, "cooldown has not elapsed yet");

        run_regen_phase(&mut grid, &params(), 8);
        assert_eq!(grid.cell((0, 0)).unwrap().amount, 3);
    }

    #[test]
    fn growth_clamps_to_max_amount() {
        let mut grid = Grid::new(2, 2);
        grid.set_resource((0, 0), Cell::new(Good::A, 9, 10));
        run_regen_phase(&mut grid, &params(), 100);
        assert_eq!(grid.cell((0, 0)).unwrap().amount, 10);
    }
}
