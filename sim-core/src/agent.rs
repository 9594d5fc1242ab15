//! C3 — Agent state.

use std::collections::HashMap;

use crate::types::{AgentId, Good, Inventory, Pos, Tick};
use crate::utility::{self, QuoteTable, UtilityParams};

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub pos: Pos,
    pub inventory: Inventory,
    pub utility_params: UtilityParams,
    /// Shadow price of money, `None` when the scenario has money inactive.
    pub lambda_money: Option<f64>,
    pub quotes: QuoteTable,

    // --- pairing / movement state, cleared and rebuilt every tick ---
    pub paired_with_id: Option<AgentId>,
    pub target_pos: Option<Pos>,
    pub target_agent_id: Option<AgentId>,
    pub is_foraging_committed: bool,

    /// Agents this one refused or failed to trade with, keyed by the tick
    /// the cooldown expires (spec §4.7: mutual cooldown on trade failure).
    pub refusal_cooldowns: HashMap<AgentId, Tick>,

    /// Dirty flags consumed by Housekeeping to decide whether quotes need
    /// to be recomputed this tick.
    pub inventory_changed: bool,
    pub lambda_changed: bool,

    /// Scratch space built during Decision and consumed within the same
    /// tick; never read across ticks.
    pub preference_list: Vec<(AgentId, f64)>,
}

impl Agent {
    pub fn new(id: AgentId, pos: Pos, inventory: Inventory, utility_params: UtilityParams) -> Self {
        Self {
            id,
            pos,
            inventory,
            utility_params,
            lambda_money: None,
            quotes: utility::empty_quote_table(),
            paired_with_id: None,
            target_pos: None,
            target_agent_id: None,
            is_foraging_committed: false,
            refusal_cooldowns: HashMap::new(),
            inventory_changed: true,
            lambda_changed: true,
            preference_list: Vec::new(),
        }
    }

    pub fn with_lambda_money(mut self, lambda: f64) -> Self {
        self.lambda_money = Some(lambda);
        self
    }

    pub fn ask(&self, sell: Good, buy: Good) -> f64 {
        utility::ask(&self.quotes, sell, buy)
    }

    pub fn bid(&self, sell: Good, buy: Good) -> f64 {
        utility::bid(&self.quotes, sell, buy)
    }

    pub fn is_paired(&self) -> bool {
        self.paired_with_id.is_some()
    }

    pub fn is_on_cooldown_with(&self, other: AgentId, now: Tick) -> bool {
        self.refusal_cooldowns
            .get(&other)
            .is_some_and(|&expires_at| now < expires_at)
    }

    /// Drop every cooldown entry that has expired as of `now`.
    pub fn expire_cooldowns(&mut self, now: Tick) {
        self.refusal_cooldowns.retain(|_, &mut expires_at| expires_at > now);
    }

    /// Clear the per-tick scratch state at the start of Decision (Stage A).
    /// Pairing itself survives across ticks — Trade retains a successful
    /// pair until it fails (spec §4.7) — so only an unpaired agent's stale
    /// target is discarded here; an already-paired agent's target is
    /// refreshed to track its peer separately (see `decision::run_decision_phase`).
    pub fn clear_stale_state(&mut self) {
        self.preference_list.clear();
        if self.paired_with_id.is_none() {
            self.target_pos = None;
            self.target_agent_id = None;
            self.is_foraging_committed = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_agent(id: u32) -> Agent {
        Agent::new(
            AgentId(id),
            (0, 0),
            Inventory { a: 10, b: 10, m: 0 },
            UtilityParams::Linear { w_a: 1.0, w_b: 1.0 },
        )
    }

    #[test]
    fn new_agent_starts_dirty_and_unpaired() {
        let agent = test_agent(1);
        assert!(agent.inventory_changed);
        assert!(agent.lambda_changed);
        assert!(!agent.is_paired());
    }

    #[test]
    fn cooldown_expires_at_exact_tick() {
        let mut agent = test_agent(1);
        agent.refusal_cooldowns.insert(AgentId(2), 5);
        assert!(agent.is_on_cooldown_with(AgentId(2), 4));
        assert!(!agent.is_on_cooldown_with(AgentId(2), 5));
        agent.expire_cooldowns(5);
        assert!(agent.refusal_cooldowns.is_empty());
    }

    #[test]
    fn clear_stale_state_preserves_pairing_but_drops_unpaired_target() {
        let mut paired = test_agent(1);
        paired.paired_with_id = Some(AgentId(2));
        paired.clear_stale_state();
        assert!(paired.is_paired(), "a retained pair must survive Stage A");

        let mut unpaired = test_agent(3);
        unpaired.is_foraging_committed = true;
        unpaired.target_pos = Some((1, 1));
        unpaired.clear_stale_state();
        assert!(!unpaired.is_foraging_committed);
        assert!(unpaired.target_pos.is_none());
    }
}
