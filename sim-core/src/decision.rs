//! C6 — Decision: three-pass matching and forage-target selection.

use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "instrument")]
use tracing::info;

use crate::agent::Agent;
use crate::grid::Grid;
use crate::perception::PerceptionView;
use crate::telemetry::{ChosenTarget, DecisionEvent};
use crate::trade;
use crate::types::{AgentId, Params, Pos, Tick};

fn manhattan(a: Pos, b: Pos) -> i32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}

/// Bilateral surplus `s(a,n)`, the joint ΔU of the best single-unit
/// compensating trade available between `a` and `n` (spec §4.5 Stage B).
/// Zero when no allowed exchange overlaps.
fn bilateral_surplus(a: &Agent, n: &Agent, params: &Params) -> f64 {
    trade::find_best_exchange(a, n, params.exchange_regime, params.money_scale, 1)
        .map(|c| (c.block.du_seller + c.block.du_buyer).max(0.0))
        .unwrap_or(0.0)
}

/// Best forage candidate for `agent`: the visible cell maximizing
/// `ΔU(harvest) · β^d`, ties by `(y, x)`. `None` if no candidate yields a
/// positive score.
fn best_forage_candidate(
    agent: &Agent,
    view: &PerceptionView,
    grid: &Grid,
    params: &Params,
    claimed: &HashMap<Pos, AgentId>,
) -> Option<Pos> {
    let mut best: Option<(Pos, f64)> = None;
    for vr in &view.visible_resource_cells {
        let pos = vr.pos;
        if vr.amount <= 0 {
            continue;
        }
        if let Some(&claimant) = claimed.get(&pos) {
            if claimant != agent.id {
                continue;
            }
        }
        // `good` is fixed at scenario load, so reading it live is safe even
        // though `amount` comes from the Perception-time snapshot.
        let good = match grid.cell(pos) {
            Some(c) => c.good,
            None => continue,
        };
        let harvested = vr.amount.min(params.forage_rate);
        let mut after = agent.inventory;
        after.add(good, harvested);
        let u_before = agent
            .utility_params
            .evaluate(agent.inventory, agent.lambda_money, params.money_scale);
        let u_after = agent.utility_params.evaluate(after, agent.lambda_money, params.money_scale);
        let delta_u = u_after - u_before;
        if delta_u <= 0.0 {
            continue;
        }
        let d = manhattan(agent.pos, pos);
        let score = delta_u * params.beta.powi(d);
        let better = match best {
            None => true,
            Some((best_pos, best_score)) => {
                score > best_score || (score == best_score && (pos.1, pos.0) < (best_pos.1, best_pos.0))
            }
        };
        if better {
            best = Some((pos, score));
        }
    }
    best.map(|(pos, _)| pos)
}

/// Run Decision (C6) for every agent, in the fixed stage order.
pub fn run_decision_phase(
    agents: &mut BTreeMap<AgentId, Agent>,
    views: &BTreeMap<AgentId, PerceptionView>,
    grid: &Grid,
    params: &Params,
    tick: Tick,
) -> Vec<DecisionEvent> {
    // Stage A: stale-state clear. A retained pair survives into this tick's
    // Decision (spec §4.7); only its target is refreshed to the peer's
    // current position so Movement keeps converging on it.
    let ids: Vec<AgentId> = agents.keys().copied().collect();
    for &id in &ids {
        agents.get_mut(&id).unwrap().clear_stale_state();
    }
    for &id in &ids {
        if let Some(peer_id) = agents[&id].paired_with_id {
            let peer_pos = agents[&peer_id].pos;
            let agent = agents.get_mut(&id).unwrap();
            agent.target_pos = Some(peer_pos);
            agent.target_agent_id = Some(peer_id);
        }
    }

    // Stage B: build preference lists, for unpaired agents only.
    for &id in &ids {
        if agents[&id].is_paired() {
            continue;
        }
        let view = &views[&id];
        let mut prefs: Vec<(AgentId, f64)> = Vec::new();
        for va in &view.visible_agents {
            let neighbor_id = va.id;
            // `bilateral_surplus` needs the neighbor's full inventory/utility
            // state, which a perception snapshot doesn't carry — looked up
            // live here, same as Trade does. Distance uses the snapshot's
            // `pos` directly since it's immutable within the tick.
            let (a, n) = (&agents[&id], &agents[&neighbor_id]);
            if a.is_on_cooldown_with(neighbor_id, tick) || n.is_on_cooldown_with(id, tick) {
                continue;
            }
            let s = bilateral_surplus(a, n, params);
            if s <= 0.0 {
                continue;
            }
            let d = manhattan(view.self_pos, va.pos);
            let score = s * params.beta.powi(d);
            prefs.push((neighbor_id, score));
        }
        prefs.sort_by(|(id_a, score_a), (id_b, score_b)| {
            score_b.partial_cmp(score_a).unwrap().then(id_a.cmp(id_b))
        });
        #[cfg(feature = "instrument")]
        info!(
            target: "decision",
            tick,
            agent_id = id.0,
            n_candidates = prefs.len(),
        );
        agents.get_mut(&id).unwrap().preference_list = prefs;
    }

    // Stage C: Pass 1 — mutual consent.
    for &id in &ids {
        if agents[&id].is_paired() {
            continue;
        }
        let top = agents[&id].preference_list.first().copied();
        let Some((peer_id, score)) = top else { continue };
        if score <= 0.0 {
            continue;
        }
        if agents[&peer_id].is_paired() {
            continue;
        }
        let peer_top = agents[&peer_id].preference_list.first().copied();
        if peer_top.map(|(pid, _)| pid) != Some(id) {
            continue;
        }
        pair(agents, id, peer_id);
    }

    // Stage D: Pass 2 — greedy-surplus fallback.
    let mut candidate_pairs: Vec<(f64, AgentId, AgentId)> = Vec::new();
    for (i, &id_i) in ids.iter().enumerate() {
        if agents[&id_i].is_paired() {
            continue;
        }
        for &id_j in &ids[i + 1..] {
            if agents[&id_j].is_paired() {
                continue;
            }
            let (a, b) = (&agents[&id_i], &agents[&id_j]);
            if a.is_on_cooldown_with(id_j, tick) || b.is_on_cooldown_with(id_i, tick) {
                continue;
            }
            let s = bilateral_surplus(a, b, params);
            if s > 0.0 {
                candidate_pairs.push((s, id_i, id_j));
            }
        }
    }
    candidate_pairs.sort_by(|(s_a, i_a, j_a), (s_b, i_b, j_b)| {
        s_b.partial_cmp(s_a).unwrap().then(i_a.cmp(i_b)).then(j_a.cmp(j_b))
    });
    for (_, i, j) in candidate_pairs {
        if agents[&i].is_paired() || agents[&j].is_paired() {
            continue;
        }
        pair(agents, i, j);
    }

    // Stage E: forage assignment.
    let mut claimed: HashMap<Pos, AgentId> = HashMap::new();
    for &id in &ids {
        if agents[&id].is_paired() {
            continue;
        }
        let view = &views[&id];
        if let Some(pos) = best_forage_candidate(&agents[&id], view, grid, params, &claimed) {
            claimed.insert(pos, id);
            let agent = agents.get_mut(&id).unwrap();
            agent.target_pos = Some(pos);
            agent.is_foraging_committed = true;
        }
    }

    ids.iter()
        .map(|&id| {
            let agent = &agents[&id];
            let chosen = if let Some(peer) = agent.target_agent_id {
                ChosenTarget::Peer(peer)
            } else if let Some(pos) = agent.target_pos {
                ChosenTarget::Cell(pos)
            } else {
                ChosenTarget::None
            };
            DecisionEvent {
                tick,
                agent_id: id,
                preference_list: agent.preference_list.clone(),
                chosen,
            }
        })
        .collect()
}

fn pair(agents: &mut BTreeMap<AgentId, Agent>, a: AgentId, b: AgentId) {
    let (pos_a, pos_b) = (agents[&a].pos, agents[&b].pos);
    {
        let agent_a = agents.get_mut(&a).unwrap();
        agent_a.paired_with_id = Some(b);
        agent_a.target_agent_id = Some(b);
        agent_a.target_pos = Some(pos_b);
        agent_a.is_foraging_committed = false;
    }
    {
        let agent_b = agents.get_mut(&b).unwrap();
        agent_b.paired_with_id = Some(a);
        agent_b.target_agent_id = Some(a);
        agent_b.target_pos = Some(pos_a);
        agent_b.is_foraging_committed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use crate::perception::perceive;
    use crate::spatial::SpatialIndex;
    use crate::types::{ActiveGoods, ExchangeRegime, Good, Inventory, MatchingProtocol, SearchProtocol, BargainingProtocol};
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
            search_protocol: SearchProtocol::Default,
            matching_protocol: MatchingProtocol::ThreePass,
            bargaining_protocol: BargainingProtocol::CompensatingBlock,
        }
    }

    fn with_quotes(mut a: Agent) -> Agent {
        a.quotes = crate::utility::refresh_quotes(
            &a.utility_params,
            a.inventory,
            a.lambda_money,
            1.0,
            &ActiveGoods { money: false },
        );
        a
    }

    #[test]
    fn mutual_consent_pairs_best_mutual_candidates() {
        let p = params();
        let mut agents = BTreeMap::new();
        agents.insert(
            AgentId(0),
            with_quotes(Agent::new(
                AgentId(0),
                (0, 0),
                Inventory { a: 10, b: 2, m: 0 },
                UtilityParams::Ces { rho: 0.5, w_a: 1.0, w_b: 1.0 },
            )),
        );
        agents.insert(
            AgentId(1),
            with_quotes(Agent::new(
                AgentId(1),
                (1, 0),
                Inventory { a: 2, b: 10, m: 0 },
                UtilityParams::Ces { rho: 0.5, w_a: 1.0, w_b: 1.0 },
            )),
        );

        let mut idx = SpatialIndex::new(10, 10);
        for (id, a) in &agents {
            idx.insert(*id, a.pos);
        }
        let grid = Grid::new(10, 10);
        let mut views = BTreeMap::new();
        for id in agents.keys().copied().collect::<Vec<_>>() {
            views.insert(id, perceive(id, &agents, &grid, &idx, p.vision_radius));
        }

        run_decision_phase(&mut agents, &views, &grid, &p, 0);
        assert!(agents[&AgentId(0)].is_paired());
        assert_eq!(agents[&AgentId(0)].paired_with_id, Some(AgentId(1)));
        assert_eq!(agents[&AgentId(1)].paired_with_id, Some(AgentId(0)));
    }

    #[test]
    fn identical_agents_never_pair_and_fall_to_forage() {
        let p = params();
        let mut agents = BTreeMap::new();
        for i in 0..2 {
            agents.insert(
                AgentId(i),
                with_quotes(Agent::new(
                    AgentId(i),
                    (i as i32, 0),
                    Inventory { a: 5, b: 5, m: 0 },
                    UtilityParams::Linear { w_a: 1.0, w_b: 1.0 },
                )),
            );
        }
        let mut grid = Grid::new(10, 10);
        grid.set_resource((0, 0), Cell::new(Good::A, 5, 5));
        let mut idx = SpatialIndex::new(10, 10);
        for (id, a) in &agents {
            idx.insert(*id, a.pos);
        }
        let mut views = BTreeMap::new();
        for id in agents.keys().copied().collect::<Vec<_>>() {
            views.insert(id, perceive(id, &agents, &grid, &idx, p.vision_radius));
        }

        run_decision_phase(&mut agents, &views, &grid, &p, 0);
        assert!(!agents[&AgentId(0)].is_paired());
        assert!(!agents[&AgentId(1)].is_paired());
        assert!(agents[&AgentId(0)].is_foraging_committed);
    }

    #[test]
    fn second_agent_does_not_claim_cell_taken_by_first() {
        let p = params();
        let mut agents = BTreeMap::new();
        for i in 0..2 {
            agents.insert(
                AgentId(i),
                with_quotes(Agent::new(
                    AgentId(i),
                    (0, 0),
                    Inventory { a: 0, b: 5, m: 0 },
                    UtilityParams::Linear { w_a: 1.0, w_b: 1.0 },
                )),
            );
        }
        let mut grid = Grid::new(10, 10);
        grid.set_resource((0, 0), Cell::new(Good::A, 5, 5));
        grid.set_resource((5, 5), Cell::new(Good::A, 5, 5));
        let mut idx = SpatialIndex::new(10, 10);
        for (id, a) in &agents {
            idx.insert(*id, a.pos);
        }
        let mut views = BTreeMap::new();
        for id in agents.keys().copied().collect::<Vec<_>>() {
            views.insert(id, perceive(id, &agents, &grid, &idx, p.vision_radius));
        }

        run_decision_phase(&mut agents, &views, &grid, &p, 0);
        let t0 = agents[&AgentId(0)].target_pos;
        let t1 = agents[&AgentId(1)].target_pos;
        assert_ne!(t0, t1, "two agents must not both claim the same cell");
    }
}
