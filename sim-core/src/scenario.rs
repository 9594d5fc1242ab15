//! External scenario contract (spec §6). Parsing the document itself is a
//! collaborator's job; this module only defines the shape and the
//! structural validation `Simulation::new` runs before trusting it.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::SimError;
use crate::grid::{Cell, Grid};
use crate::types::{ActiveGoods, AgentId, Good, Inventory, Params, Pos};
use crate::utility::UtilityParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSpec {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySpec {
    pub a: i64,
    pub b: i64,
    #[serde(default)]
    pub m: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: u32,
    pub pos: (i32, i32),
    pub inventory: InventorySpec,
    pub utility: UtilityParams,
    #[serde(default)]
    pub lambda_money: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub pos: (i32, i32),
    pub good: Good,
    pub amount: i64,
    pub max_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub grid: GridSpec,
    pub agents: Vec<AgentSpec>,
    pub resources: Vec<ResourceSpec>,
    pub params: Params,
    pub active_goods: ActiveGoods,
    pub seed: u64,
}

impl Scenario {
    /// Structural validation run once at construction (spec §7: "Scenario
    /// invalid" is fatal at construction, never mid-run).
    pub fn validate(&self) -> Result<(), SimError> {
        if self.grid.width <= 0 || self.grid.height <= 0 {
            return Err(SimError::ScenarioInvalid("grid dimensions must be positive".into()));
        }

        let in_bounds = |pos: Pos| {
            pos.0 >= 0 && pos.0 < self.grid.width && pos.1 >= 0 && pos.1 < self.grid.height
        };

        let mut seen_ids = HashSet::new();
        for agent in &self.agents {
            if !seen_ids.insert(agent.id) {
                return Err(SimError::ScenarioInvalid(format!("duplicate agent id {}", agent.id)));
            }
            if !in_bounds(agent.pos) {
                return Err(SimError::ScenarioInvalid(format!(
                    "agent {} position {:?} out of bounds",
                    agent.id, agent.pos
                )));
            }
            if agent.inventory.a < 0 || agent.inventory.b < 0 || agent.inventory.m.unwrap_or(0) < 0 {
                return Err(SimError::ScenarioInvalid(format!(
                    "agent {} has a negative inventory component",
                    agent.id
                )));
            }
            if agent.lambda_money.is_some() && !self.active_goods.money {
                return Err(SimError::ScenarioInvalid(format!(
                    "agent {} sets lambda_money but money is inactive",
                    agent.id
                )));
            }
        }

        let mut seen_cells = HashSet::new();
        for resource in &self.resources {
            if !in_bounds(resource.pos) {
                return Err(SimError::ScenarioInvalid(format!(
                    "resource cell {:?} out of bounds",
                    resource.pos
                )));
            }
            if !seen_cells.insert(resource.pos) {
                return Err(SimError::ScenarioInvalid(format!(
                    "duplicate resource cell at {:?}",
                    resource.pos
                )));
            }
            if resource.max_amount <= 0 || resource.amount < 0 || resource.amount > resource.max_amount {
                return Err(SimError::ScenarioInvalid(format!(
                    "resource cell {:?} has an invalid amount/max_amount pair",
                    resource.pos
                )));
            }
            if !matches!(resource.good, Good::A | Good::B) {
                return Err(SimError::ScenarioInvalid(format!(
                    "resource cell {:?} names a non-resource good",
                    resource.pos
                )));
            }
        }

        if !(self.params.beta > 0.0 && self.params.beta <= 1.0) {
            return Err(SimError::ScenarioInvalid("beta must lie in (0, 1]".into()));
        }
        if self.params.vision_radius < 0 || self.params.interaction_radius < 0 {
            return Err(SimError::ScenarioInvalid("radii must be non-negative".into()));
        }
        if self.params.move_budget_per_tick <= 0 {
            return Err(SimError::ScenarioInvalid("move_budget_per_tick must be positive".into()));
        }
        if self.params.max_trade_block <= 0 {
            return Err(SimError::ScenarioInvalid("max_trade_block must be positive".into()));
        }
        if self.params.forage_rate < 0 || self.params.resource_growth_rate < 0 {
            return Err(SimError::ScenarioInvalid("forage/growth rates must be non-negative".into()));
        }
        if self.active_goods.money && self.params.money_scale <= 0.0 {
            return Err(SimError::ScenarioInvalid("money_scale must be positive when money is active".into()));
        }

        Ok(())
    }

    pub fn build_grid(&self) -> Grid {
        let mut grid = Grid::new(self.grid.width, self.grid.height);
        for resource in &self.resources {
            grid.set_resource(resource.pos, Cell::new(resource.good, resource.amount, resource.max_amount));
        }
        grid
    }

    pub fn build_agents(&self) -> BTreeMap<AgentId, Agent> {
        let mut agents = BTreeMap::new();
        for spec in &self.agents {
            let inventory = Inventory { a: spec.inventory.a, b: spec.inventory.b, m: spec.inventory.m.unwrap_or(0) };
            let mut agent = Agent::new(AgentId(spec.id), spec.pos, inventory, spec.utility);
            if let Some(lambda) = spec.lambda_money {
                agent = agent.with_lambda_money(lambda);
            }
            agents.insert(AgentId(spec.id), agent);
        }
        agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExchangeRegime, SearchProtocol, MatchingProtocol, BargainingProtocol};

    fn base_scenario() -> Scenario {
        Scenario {
            grid: GridSpec { width: 5, height: 5 },
            agents: vec![
                AgentSpec {
                    id: 0,
                    pos: (0, 0),
                    inventory: InventorySpec { a: 10, b: 2, m: None },
                    utility: UtilityParams::Ces { rho: 0.5, w_a: 1.0, w_b: 1.0 },
                    lambda_money: None,
                },
                AgentSpec {
                    id: 1,
                    pos: (4, 4),
                    inventory: InventorySpec { a: 2, b: 10, m: None },
                    utility: UtilityParams::Ces { rho: 0.5, w_a: 1.0, w_b: 1.0 },
                    lambda_money: None,
                },
            ],
            resources: vec![],
            params: Params {
                vision_radius: 8,
                interaction_radius: 1,
                move_budget_per_tick: 1,
                forage_rate: 1,
                resource_growth_rate: 1,
                resource_regen_cooldown: 1,
                trade_cooldown_ticks: 3,
                max_trade_block: 20,
                beta: 0.9,
                exchange_regime: ExchangeRegime::BarterOnly,
                money_scale: 1.0,
                search_protocol: SearchProtocol::Default,
                matching_protocol: MatchingProtocol::ThreePass,
                bargaining_protocol: BargainingProtocol::CompensatingBlock,
            },
            active_goods: ActiveGoods { money: false },
            seed: 42,
        }
    }

    #[test]
    fn valid_scenario_passes() {
        assert!(base_scenario().validate().is_ok());
    }

    #[test]
    fn duplicate_agent_id_is_rejected() {
        let mut scenario = base_scenario();
        scenario.agents[1].id = 0;
        assert!(matches!(scenario.validate(), Err(SimError::ScenarioInvalid(_))));
    }

    #[test]
    fn out_of_bounds_agent_is_rejected() {
        let mut scenario = base_scenario();
        scenario.agents[0].pos = (99, 99);
        assert!(matches!(scenario.validate(), Err(SimError::ScenarioInvalid(_))));
    }

    #[test]
    fn beta_out_of_range_is_rejected() {
        let mut scenario = base_scenario();
        scenario.params.beta = 1.5;
        assert!(matches!(scenario.validate(), Err(SimError::ScenarioInvalid(_))));
    }
}
