//! Core scalar types shared across every phase.

use serde::{Deserialize, Serialize};

// === IDS ===

/// Stable, non-negative agent identifier. Assigned at scenario load and
/// never reused — agents are never destroyed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grid coordinate. `(x, y)`, `x` is column, `y` is row. Both non-negative.
pub type Pos = (i32, i32);

/// Integer tick index.
pub type Tick = u64;

// === GOODS ===

/// A tradeable good. `A` and `B` are always active; `M` (money) is active
/// only when the scenario configures it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Good {
    A,
    B,
    M,
}

impl Good {
    pub const ALL: [Good; 3] = [Good::A, Good::B, Good::M];

    pub fn index(self) -> usize {
        match self {
            Good::A => 0,
            Good::B => 1,
            Good::M => 2,
        }
    }

    pub fn from_index(i: usize) -> Good {
        match i {
            0 => Good::A,
            1 => Good::B,
            2 => Good::M,
            _ => panic!("good index out of range: {i}"),
        }
    }
}

impl std::fmt::Display for Good {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Good::A => "A",
            Good::B => "B",
            Good::M => "M",
        };
        write!(f, "{s}")
    }
}

/// Which goods a scenario activates. `A` and `B` are always on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveGoods {
    pub money: bool,
}

impl ActiveGoods {
    pub fn goods(&self) -> Vec<Good> {
        if self.money {
            vec![Good::A, Good::B, Good::M]
        } else {
            vec![Good::A, Good::B]
        }
    }

    pub fn is_active(&self, good: Good) -> bool {
        match good {
            Good::A | Good::B => true,
            Good::M => self.money,
        }
    }
}

/// Exchange regime: which good-pairs may legally be traded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeRegime {
    BarterOnly,
    MoneyOnly,
    Mixed,
}

impl ExchangeRegime {
    /// Ordered `(sell, buy)` good pairs this regime permits. Both orderings
    /// of each allowed unordered pair are included, since direction matters
    /// for who is the seller.
    pub fn ordered_pairs(&self) -> Vec<(Good, Good)> {
        match self {
            ExchangeRegime::BarterOnly => vec![(Good::A, Good::B), (Good::B, Good::A)],
            ExchangeRegime::MoneyOnly => vec![
                (Good::A, Good::M),
                (Good::M, Good::A),
                (Good::B, Good::M),
                (Good::M, Good::B),
            ],
            ExchangeRegime::Mixed => vec![
                (Good::A, Good::B),
                (Good::B, Good::A),
                (Good::A, Good::M),
                (Good::M, Good::A),
                (Good::B, Good::M),
                (Good::M, Good::B),
            ],
        }
    }
}

// === INVENTORY ===

/// Non-negative integer holdings of the three goods. Total goods are
/// conserved by trade and increased only by forage (A or B).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub a: i64,
    pub b: i64,
    pub m: i64,
}

impl Inventory {
    pub fn get(&self, good: Good) -> i64 {
        match good {
            Good::A => self.a,
            Good::B => self.b,
            Good::M => self.m,
        }
    }

    pub fn get_mut(&mut self, good: Good) -> &mut i64 {
        match good {
            Good::A => &mut self.a,
            Good::B => &mut self.b,
            Good::M => &mut self.m,
        }
    }

    /// Credit `qty` units of `good`. Never negative.
    pub fn add(&mut self, good: Good, qty: i64) {
        debug_assert!(qty >= 0);
        *self.get_mut(good) += qty;
    }

    /// Debit `qty` units of `good`. Caller must have checked availability.
    pub fn remove(&mut self, good: Good, qty: i64) {
        debug_assert!(qty >= 0);
        debug_assert!(self.get(good) >= qty);
        *self.get_mut(good) -= qty;
    }

    pub fn is_non_negative(&self) -> bool {
        self.a >= 0 && self.b >= 0 && self.m >= 0
    }
}

// === PARAMS ===

/// The scheduling/economic constants a scenario fixes at construction.
/// Distances: `vision_radius` and `interaction_radius` are Chebyshev;
/// movement cost and the `beta` discount are Manhattan (spec §9 Open
/// Question, pinned in `SPEC_FULL.md` §4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub vision_radius: i32,
    pub interaction_radius: i32,
    pub move_budget_per_tick: i32,

    pub forage_rate: i64,
    pub resource_growth_rate: i64,
    pub resource_regen_cooldown: u64,

    pub trade_cooldown_ticks: u64,
    pub max_trade_block: i64,

    pub beta: f64,

    pub exchange_regime: ExchangeRegime,
    pub money_scale: f64,

    pub search_protocol: SearchProtocol,
    pub matching_protocol: MatchingProtocol,
    pub bargaining_protocol: BargainingProtocol,
}

/// Forage-target search strategy. Only `Default` (best-ΔU-times-discount,
/// §4.5 Stage B) has a specified algorithm; other protocol names named in
/// the scenario schema are forward-compatible placeholders only — this
/// enum has no variant for them, so deserializing one fails before a
/// `Scenario` ever exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchProtocol {
    #[serde(rename = "default")]
    Default,
}

/// Pairing strategy. Only `ThreePass` (§4.5) is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchingProtocol {
    #[serde(rename = "three_pass")]
    ThreePass,
}

/// Price/quantity negotiation strategy. Only `CompensatingBlock` (§4.7) is
/// implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BargainingProtocol {
    #[serde(rename = "compensating_block")]
    CompensatingBlock,
}
