//! C8 — Trade: compensating-block price/quantity search.
//!
//! Also hosts `find_best_exchange`, the shared exchange-candidate function
//! used both here (selecting sides) and by Decision (Stage B surplus
//! scoring) — the two call sites differ only in `max_block` (1 for a
//! scoring probe, `params.max_trade_block` for an actual trade attempt).

use std::collections::BTreeMap;

#[cfg(feature = "instrument")]
use tracing::info;

use crate::agent::Agent;
use crate::telemetry::{TradeAttemptEvent, TradeEvent};
use crate::types::{AgentId, ExchangeRegime, Good, Inventory, Params, Tick};

/// `round_half_up`: the sole rule converting a float price times an integer
/// quantity into an integer quantity (spec §5).
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompensatingBlock {
    pub sell: Good,
    pub buy: Good,
    pub delta_sell: i64,
    pub delta_buy: i64,
    pub price: f64,
    pub du_seller: f64,
    pub du_buyer: f64,
}

/// Search ascending `ΔA` (quantity of `sell`), then ascending `ΔB`
/// (quantity of `buy`) within the discrete price grid `[p_lo, p_hi]`; the
/// first trade that is strictly Pareto-improving for both sides wins.
#[allow(clippy::too_many_arguments)]
fn search_compensating_block(
    seller_inv: Inventory,
    seller: &Agent,
    buyer_inv: Inventory,
    buyer: &Agent,
    money_scale: f64,
    sell: Good,
    buy: Good,
    p_lo: f64,
    p_hi: f64,
    max_block: i64,
) -> Option<CompensatingBlock> {
    if !p_lo.is_finite() || !(p_hi > 0.0) || p_lo > p_hi {
        return None;
    }
    let delta_a_max = seller_inv.get(sell).min(max_block);
    let u_seller_before = seller.utility_params.evaluate(seller_inv, seller.lambda_money, money_scale);
    let u_buyer_before = buyer.utility_params.evaluate(buyer_inv, buyer.lambda_money, money_scale);

    for delta_a in 1..=delta_a_max {
        let lo_b = (p_lo * delta_a as f64).ceil() as i64;
        let hi_b = (p_hi * delta_a as f64).floor() as i64;
        if lo_b > hi_b {
            continue;
        }
        for delta_b in lo_b.max(1)..=hi_b {
            if delta_b > buyer_inv.get(buy) {
                continue;
            }
            debug_assert_eq!(delta_b, round_half_up(delta_b as f64 / delta_a as f64 * delta_a as f64));
            let mut new_seller_inv = seller_inv;
            new_seller_inv.remove(sell, delta_a);
            new_seller_inv.add(buy, delta_b);
            let mut new_buyer_inv = buyer_inv;
            new_buyer_inv.remove(buy, delta_b);
            new_buyer_inv.add(sell, delta_a);

            let u_seller_after =
                seller.utility_params.evaluate(new_seller_inv, seller.lambda_money, money_scale);
            let u_buyer_after =
                buyer.utility_params.evaluate(new_buyer_inv, buyer.lambda_money, money_scale);

            if u_seller_after > u_seller_before && u_buyer_after > u_buyer_before {
                return Some(CompensatingBlock {
                    sell,
                    buy,
                    delta_sell: delta_a,
                    delta_buy: delta_b,
                    price: delta_b as f64 / delta_a as f64,
                    du_seller: u_seller_after - u_seller_before,
                    du_buyer: u_buyer_after - u_buyer_before,
                });
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy)]
pub struct ExchangeCandidate {
    pub seller_id: AgentId,
    pub buyer_id: AgentId,
    pub block: CompensatingBlock,
}

impl ExchangeCandidate {
    fn joint_du(&self) -> f64 {
        self.block.du_seller + self.block.du_buyer
    }

    fn tie_key(&self) -> (usize, usize, u32) {
        (self.block.sell.index(), self.block.buy.index(), self.seller_id.0)
    }
}

fn prefer(current: Option<ExchangeCandidate>, candidate: ExchangeCandidate) -> Option<ExchangeCandidate> {
    match current {
        None => Some(candidate),
        Some(cur) => {
            let cur_du = cur.joint_du();
            let cand_du = candidate.joint_du();
            if cand_du > cur_du || (cand_du == cur_du && candidate.tie_key() < cur.tie_key()) {
                Some(candidate)
            } else {
                Some(cur)
            }
        }
    }
}

/// Find the best exchange between `a` and `b` under `regime`, if any.
/// `max_block` bounds how many units of the sell good the search considers;
/// pass `1` for a scoring probe (Decision Stage B), or
/// `params.max_trade_block` for the real Trade phase.
pub fn find_best_exchange(
    a: &Agent,
    b: &Agent,
    regime: ExchangeRegime,
    money_scale: f64,
    max_block: i64,
) -> Option<ExchangeCandidate> {
    let mut best: Option<ExchangeCandidate> = None;
    for (sell, buy) in regime.ordered_pairs() {
        let ask_a = a.ask(sell, buy);
        let bid_b = b.bid(sell, buy);
        if ask_a <= bid_b {
            if let Some(block) = search_compensating_block(
                a.inventory, a, b.inventory, b, money_scale, sell, buy, ask_a, bid_b, max_block,
            ) {
                best = prefer(best, ExchangeCandidate { seller_id: a.id, buyer_id: b.id, block });
            }
        }
        let ask_b = b.ask(sell, buy);
        let bid_a = a.bid(sell, buy);
        if ask_b <= bid_a {
            if let Some(block) = search_compensating_block(
                b.inventory, b, a.inventory, a, money_scale, sell, buy, ask_b, bid_a, max_block,
            ) {
                best = prefer(best, ExchangeCandidate { seller_id: b.id, buyer_id: a.id, block });
            }
        }
    }
    best
}

#[derive(Debug, Default)]
pub struct TradePhaseResult {
    pub n_trades: u64,
    pub n_failures: u64,
    pub trade_events: Vec<TradeEvent>,
    pub attempt_events: Vec<TradeAttemptEvent>,
}

/// Run Trade (C8) for every currently-paired agent. Pairs are iterated by
/// `(min(id), max(id))`; only pairs within `interaction_radius` (Chebyshev)
/// attempt a trade this tick.
pub fn run_trade_phase(
    agents: &mut BTreeMap<AgentId, Agent>,
    params: &Params,
    tick: Tick,
) -> TradePhaseResult {
    let mut pairs: Vec<(AgentId, AgentId)> = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for (&id, agent) in agents.iter() {
        if let Some(peer) = agent.paired_with_id {
            let key = (id.min(peer), id.max(peer));
            if seen.insert(key) {
                pairs.push(key);
            }
        }
    }
    pairs.sort_unstable();

    let mut result = TradePhaseResult::default();

    for (lo, hi) in pairs {
        let (pos_lo, pos_hi) = (agents[&lo].pos, agents[&hi].pos);
        if chebyshev(pos_lo, pos_hi) > params.interaction_radius {
            continue;
        }

        let candidate = {
            let a = &agents[&lo];
            let b = &agents[&hi];
            find_best_exchange(a, b, params.exchange_regime, params.money_scale, params.max_trade_block)
        };

        match candidate {
            Some(exchange) => {
                result.n_trades += 1;
                {
                    let seller = agents.get_mut(&exchange.seller_id).expect("seller exists");
                    seller.inventory.remove(exchange.block.sell, exchange.block.delta_sell);
                    seller.inventory.add(exchange.block.buy, exchange.block.delta_buy);
                    seller.inventory_changed = true;
                }
                {
                    let buyer = agents.get_mut(&exchange.buyer_id).expect("buyer exists");
                    buyer.inventory.remove(exchange.block.buy, exchange.block.delta_buy);
                    buyer.inventory.add(exchange.block.sell, exchange.block.delta_sell);
                    buyer.inventory_changed = true;
                }
                #[cfg(feature = "instrument")]
                info!(
                    target: "trade",
                    tick,
                    buyer_id = exchange.buyer_id.0,
                    seller_id = exchange.seller_id.0,
                    sell_good = %exchange.block.sell,
                    buy_good = %exchange.block.buy,
                    delta_sell = exchange.block.delta_sell,
                    delta_buy = exchange.block.delta_buy,
                    price = exchange.block.price,
                    du_buyer = exchange.block.du_buyer,
                    du_seller = exchange.block.du_seller,
                );
                result.trade_events.push(TradeEvent {
                    tick,
                    buyer_id: exchange.buyer_id,
                    seller_id: exchange.seller_id,
                    sell_good: exchange.block.sell,
                    buy_good: exchange.block.buy,
                    delta_sell: exchange.block.delta_sell,
                    delta_buy: exchange.block.delta_buy,
                    price: exchange.block.price,
                    du_buyer: exchange.block.du_buyer,
                    du_seller: exchange.block.du_seller,
                });
            }
            None => {
                result.n_failures += 1;
                let expires_at = tick + params.trade_cooldown_ticks;
                if let Some(agent_lo) = agents.get_mut(&lo) {
                    agent_lo.paired_with_id = None;
                    agent_lo.target_agent_id = None;
                    agent_lo.target_pos = None;
                    agent_lo.refusal_cooldowns.insert(hi, expires_at);
                }
                if let Some(agent_hi) = agents.get_mut(&hi) {
                    agent_hi.paired_with_id = None;
                    agent_hi.target_agent_id = None;
                    agent_hi.target_pos = None;
                    agent_hi.refusal_cooldowns.insert(lo, expires_at);
                }
                #[cfg(feature = "instrument")]
                info!(target: "trade_attempt", tick, agent_a = lo.0, agent_b = hi.0, accepted = false);
                result.attempt_events.push(TradeAttemptEvent { tick, agent_a: lo, agent_b: hi, accepted: false });
            }
        }
    }

    result
}

fn chebyshev(a: (i32, i32), b: (i32, i32)) -> i32 {
    (a.0 - b.0).abs().max((a.1 - b.1).abs())
}
