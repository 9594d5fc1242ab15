//! C4 — Utility families and quote computation.
//!
//! Re-architecture note (spec §9): the five utility families are a tagged
//! variant, not polymorphic trait objects — the quote computation dispatches
//! on the tag, exactly as `spec.md` §9 prescribes.

use serde::{Deserialize, Serialize};

use crate::types::{ActiveGoods, Good, Inventory};

/// A small floor so power/log terms near zero inventory stay finite.
const MIN_BASE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UtilityParams {
    /// `U = (wA*A^rho + wB*B^rho)^(1/rho)`, `rho in (-inf, 1) \ {0}`.
    Ces { rho: f64, w_a: f64, w_b: f64 },
    /// `U = wA*A + wB*B`.
    Linear { w_a: f64, w_b: f64 },
    /// `U = -((A - a_star)^2 + (B - b_star)^2)`.
    Quadratic { a_star: f64, b_star: f64 },
    /// Log-quadratic translog over `ln(A), ln(B)`.
    Translog {
        alpha_a: f64,
        alpha_b: f64,
        beta_aa: f64,
        beta_bb: f64,
        beta_ab: f64,
    },
    /// `U = (A - gamma_a)^wA * (B - gamma_b)^wB`, subsistence floors `gamma_*`.
    StoneGeary {
        gamma_a: f64,
        gamma_b: f64,
        w_a: f64,
        w_b: f64,
    },
}

impl UtilityParams {
    /// Evaluate `U(A, B)`, not including the money term.
    pub fn evaluate_goods(&self, a: f64, b: f64) -> f64 {
        let a = a.max(0.0);
        let b = b.max(0.0);
        match *self {
            UtilityParams::Ces { rho, w_a, w_b } => {
                let base = w_a * a.max(MIN_BASE).powf(rho) + w_b * b.max(MIN_BASE).powf(rho);
                base.max(MIN_BASE).powf(1.0 / rho)
            }
            UtilityParams::Linear { w_a, w_b } => w_a * a + w_b * b,
            UtilityParams::Quadratic { a_star, b_star } => {
                -((a - a_star).powi(2) + (b - b_star).powi(2))
            }
            UtilityParams::Translog {
                alpha_a,
                alpha_b,
                beta_aa,
                beta_bb,
                beta_ab,
            } => {
                let la = a.max(MIN_BASE).ln();
                let lb = b.max(MIN_BASE).ln();
                let exponent = alpha_a * la
                    + alpha_b * lb
                    + 0.5 * beta_aa * la * la
                    + 0.5 * beta_bb * lb * lb
                    + beta_ab * la * lb;
                exponent.exp()
            }
            UtilityParams::StoneGeary {
                gamma_a,
                gamma_b,
                w_a,
                w_b,
            } => {
                let surplus_a = (a - gamma_a).max(MIN_BASE);
                let surplus_b = (b - gamma_b).max(MIN_BASE);
                surplus_a.powf(w_a) * surplus_b.powf(w_b)
            }
        }
    }

    /// Analytic marginal utility of good `A` or `B` at `(a, b)`, evaluated
    /// before trade (spec §4.4's "one-step linearization").
    fn marginal_good(&self, a: f64, b: f64, good: Good) -> f64 {
        let a = a.max(0.0);
        let b = b.max(0.0);
        match *self {
            UtilityParams::Ces { rho, w_a, w_b } => {
                let u = self.evaluate_goods(a, b).max(MIN_BASE);
                let (w, x) = match good {
                    Good::A => (w_a, a),
                    Good::B => (w_b, b),
                    Good::M => unreachable!("money handled separately"),
                };
                w * x.max(MIN_BASE).powf(rho - 1.0) * u.powf(1.0 - rho)
            }
            UtilityParams::Linear { w_a, w_b } => match good {
                Good::A => w_a,
                Good::B => w_b,
                Good::M => unreachable!("money handled separately"),
            },
            UtilityParams::Quadratic { a_star, b_star } => match good {
                Good::A => -2.0 * (a - a_star),
                Good::B => -2.0 * (b - b_star),
                Good::M => unreachable!("money handled separately"),
            },
            UtilityParams::Translog {
                alpha_a,
                alpha_b,
                beta_aa,
                beta_bb,
                beta_ab,
            } => {
                let la = a.max(MIN_BASE).ln();
                let lb = b.max(MIN_BASE).ln();
                let u = self.evaluate_goods(a, b);
                match good {
                    Good::A => u * (alpha_a + beta_aa * la + beta_ab * lb) / a.max(MIN_BASE),
                    Good::B => u * (alpha_b + beta_bb * lb + beta_ab * la) / b.max(MIN_BASE),
                    Good::M => unreachable!("money handled separately"),
                }
            }
            UtilityParams::StoneGeary {
                gamma_a,
                gamma_b,
                w_a,
                w_b,
            } => {
                let surplus_a = (a - gamma_a).max(MIN_BASE);
                let surplus_b = (b - gamma_b).max(MIN_BASE);
                match good {
                    Good::A => w_a * surplus_a.powf(w_a - 1.0) * surplus_b.powf(w_b),
                    Good::B => w_b * surplus_b.powf(w_b - 1.0) * surplus_a.powf(w_a),
                    Good::M => unreachable!("money handled separately"),
                }
            }
        }
    }

    /// Marginal utility of `good`, including the quasilinear money term
    /// `lambda * (M / money_scale)` when `good == M`.
    pub fn marginal(
        &self,
        inv: Inventory,
        good: Good,
        lambda_money: Option<f64>,
        money_scale: f64,
    ) -> f64 {
        match good {
            Good::A | Good::B => self.marginal_good(inv.a as f64, inv.b as f64, good),
            Good::M => lambda_money.unwrap_or(0.0) / money_scale.max(MIN_BASE),
        }
    }

    /// Full utility including the quasilinear money term, for the strict
    /// `U_after > U_before` check in Trade.
    pub fn evaluate(&self, inv: Inventory, lambda_money: Option<f64>, money_scale: f64) -> f64 {
        let goods_u = self.evaluate_goods(inv.a as f64, inv.b as f64);
        match lambda_money {
            Some(lambda) => goods_u + lambda * (inv.m as f64 / money_scale.max(MIN_BASE)),
            None => goods_u,
        }
    }
}

/// `[[Option<(ask, bid)>; 3]; 3]` indexed by `(sell, buy)` good index, per
/// the re-architecture note in spec.md §9 — a fixed-size table rather than
/// a string-keyed dictionary.
pub type QuoteTable = [[Option<(f64, f64)>; 3]; 3];

pub fn empty_quote_table() -> QuoteTable {
    [[None; 3]; 3]
}

/// Recompute the full quote table for an agent at `inv`.
///
/// Reservation ask and reservation bid both reduce, under one-step
/// linearization, to the marginal rate of substitution `MU(sell)/MU(buy)`
/// (see `SPEC_FULL.md` §4). The engine posts quotes exactly at that bound.
/// Zero-inventory guard: a seller holding zero of the sell good posts
/// `ask = +inf` (spec §4.4).
pub fn refresh_quotes(
    params: &UtilityParams,
    inv: Inventory,
    lambda_money: Option<f64>,
    money_scale: f64,
    active: &ActiveGoods,
) -> QuoteTable {
    let mut table = empty_quote_table();
    let goods = active.goods();
    for &sell in &goods {
        for &buy in &goods {
            if sell == buy {
                continue;
            }
            let mu_sell = params.marginal(inv, sell, lambda_money, money_scale);
            let mu_buy = params.marginal(inv, buy, lambda_money, money_scale);
            let rate = if mu_buy <= 0.0 {
                f64::INFINITY
            } else {
                (mu_sell / mu_buy).max(0.0)
            };
            let ask = if inv.get(sell) <= 0 { f64::INFINITY } else { rate };
            let bid = rate;
            table[sell.index()][buy.index()] = Some((ask, bid));
        }
    }
    table
}

pub fn ask(table: &QuoteTable, sell: Good, buy: Good) -> f64 {
    table[sell.index()][buy.index()].map(|(a, _)| a).unwrap_or(f64::INFINITY)
}

pub fn bid(table: &QuoteTable, sell: Good, buy: Good) -> f64 {
    table[sell.index()][buy.index()].map(|(_, b)| b).unwrap_or(0.0)
}
