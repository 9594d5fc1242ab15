//! C12 — Housekeeping: quote refresh, pairing-integrity sweep, cooldown
//! expiry, tick telemetry.

use std::collections::BTreeMap;

#[cfg(feature = "instrument")]
use tracing::{info, warn};

use crate::agent::Agent;
use crate::types::{ActiveGoods, AgentId, Params, Tick};
use crate::utility::refresh_quotes;

pub struct TickCounts {
    pub n_pairs: u64,
    pub n_trades: u64,
    pub n_forages: u64,
}

/// Run Housekeeping (C12) in ascending agent id order.
pub fn run_housekeeping_phase(
    agents: &mut BTreeMap<AgentId, Agent>,
    active_goods: &ActiveGoods,
    params: &Params,
    tick: Tick,
    counts: TickCounts,
) {
    let ids: Vec<AgentId> = agents.keys().copied().collect();

    // 1. Quote refresh on dirty flags.
    for &id in &ids {
        let agent = agents.get_mut(&id).unwrap();
        if agent.inventory_changed || agent.lambda_changed {
            agent.quotes = refresh_quotes(
                &agent.utility_params,
                agent.inventory,
                agent.lambda_money,
                params.money_scale,
                active_goods,
            );
            agent.inventory_changed = false;
            agent.lambda_changed = false;
        }
    }

    // 2. Pairing integrity sweep.
    for &id in &ids {
        let Some(peer_id) = agents[&id].paired_with_id else { continue };
        let peer_points_back = agents.get(&peer_id).and_then(|p| p.paired_with_id) == Some(id);
        if !peer_points_back {
            agents.get_mut(&id).unwrap().paired_with_id = None;
            if let Some(peer) = agents.get_mut(&peer_id) {
                peer.paired_with_id = None;
            }
            #[cfg(feature = "instrument")]
            warn!(target: "housekeeping", tick, agent_id = id.0, peer_id = peer_id.0, "asymmetric pairing cleared");
        }
    }

    // 3. Expire refusal entries.
    for &id in &ids {
        agents.get_mut(&id).unwrap().expire_cooldowns(tick);
    }

    // 4. Tick telemetry.
    #[cfg(feature = "instrument")]
    info!(
        target: "tick",
        tick,
        n_pairs = counts.n_pairs,
        n_trades = counts.n_trades,
        n_forages = counts.n_forages,
    );
    #[cfg(not(feature = "instrument"))]
    let _ = counts;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Inventory;
    use crate::utility::UtilityParams;

    fn params() -> Params {
        Params {
            vision_radius: 8,
            interaction_radius: 1,
            move_budget_per_tick: 1,
            forage_rate: 1,
            resource_growth_rate: 1,
            resource_regen_cooldown: 1,
            trade_cooldown_ticks: 3,
            max_trade_block: 20,
            beta: 0.9,
            exchange_regime: crate::types::ExchangeRegime::BarterOnly,
            money_scale: 1.0,
            search_protocol: crate::types::SearchProtocol::Default,
            matching_protocol: crate::types::MatchingProtocol::ThreePass,
            bargaining_protocol: crate::types::BargainingProtocol::CompensatingBlock,
        }
    }

    fn counts() -> TickCounts {
        TickCounts { n_pairs: 0, n_trades: 0, n_forages: 0 }
    }

    #[test]
    fn dirty_inventory_triggers_quote_refresh() {
        let mut agents = BTreeMap::new();
        let agent = Agent::new(
            AgentId(0),
            (0, 0),
            Inventory { a: 5, b: 5, m: 0 },
            UtilityParams::Linear { w_a: 1.0, w_b: 1.0 },
        );
        agents.insert(AgentId(0), agent);
        run_housekeeping_phase(&mut agents, &ActiveGoods { money: false }, &params(), 0, counts());
        assert!(!agents[&AgentId(0)].inventory_changed);
        assert!(agents[&AgentId(0)].quotes[0][1].is_some());
    }

    #[test]
    fn asymmetric_pairing_is_cleared() {
        let mut agents = BTreeMap::new();
        let mut a = Agent::new(AgentId(0), (0, 0), Inventory::default(), UtilityParams::Linear { w_a: 1.0, w_b: 1.0 });
        a.paired_with_id = Some(AgentId(1));
        a.inventory_changed = false;
        let mut b = Agent::new(AgentId(1), (0, 0), Inventory::default(), UtilityParams::Linear { w_a: 1.0, w_b: 1.0 });
        b.inventory_changed = false;
        agents.insert(AgentId(0), a);
        agents.insert(AgentId(1), b);

        run_housekeeping_phase(&mut agents, &ActiveGoods { money: false }, &params(), 0, counts());
        assert!(agents[&AgentId(0)].paired_with_id.is_none());
        assert!(agents[&AgentId(1)].paired_with_id.is_none());
    }

    #[test]
    fn expired_cooldown_is_removed() {
        let mut agents = BTreeMap::new();
        let mut a = Agent::new(AgentId(0), (0, 0), Inventory::default(), UtilityParams::Linear { w_a: 1.0, w_b: 1.0 });
        a.inventory_changed = false;
        a.refusal_cooldowns.insert(AgentId(1), 5);
        agents.insert(AgentId(0), a);
        run_housekeeping_phase(&mut agents, &ActiveGoods { money: false }, &params(), 10, counts());
        assert!(agents[&AgentId(0)].refusal_cooldowns.is_empty());
    }
}
