//! External telemetry contract (spec §6). The engine emits these events; a
//! sink (outside this crate's scope) is responsible for persisting them.
//! `tracing` call sites scattered through the phases (gated by the
//! `instrument` feature) cover ad hoc diagnostics; this module is the
//! structured, serializable event contract collaborators depend on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AgentId, Good, Inventory, Pos, Tick};
use crate::utility::QuoteTable;

/// A sink-side failure from `emit`/`flush` (spec §6). Distinct from
/// `SimError`: this crate doesn't know how a collaborator's sink fails
/// (disk full, connection dropped, ...), only that it did — `step()`
/// wraps this into `SimError::SinkFailure` for the caller.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub tick: Tick,
    pub agent_id: AgentId,
    pub pos: Pos,
    pub inventory: Inventory,
    pub quotes: QuoteTable,
    pub target_agent_id: Option<AgentId>,
    pub target_pos: Option<Pos>,
    pub paired_with_id: Option<AgentId>,
    pub is_foraging_committed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub tick: Tick,
    pub buyer_id: AgentId,
    pub seller_id: AgentId,
    pub sell_good: Good,
    pub buy_good: Good,
    pub delta_sell: i64,
    pub delta_buy: i64,
    pub price: f64,
    pub du_buyer: f64,
    pub du_seller: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeAttemptEvent {
    pub tick: Tick,
    pub agent_a: AgentId,
    pub agent_b: AgentId,
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChosenTarget {
    Peer(AgentId),
    Cell(Pos),
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub tick: Tick,
    pub agent_id: AgentId,
    pub preference_list: Vec<(AgentId, f64)>,
    pub chosen: ChosenTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSnapshotEvent {
    pub tick: Tick,
    pub cell_pos: Pos,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickStateEvent {
    pub tick: Tick,
    pub n_pairs: u64,
    pub n_trades: u64,
    pub n_forages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    AgentSnapshot(AgentSnapshot),
    Trade(TradeEvent),
    TradeAttempt(TradeAttemptEvent),
    Decision(DecisionEvent),
    ResourceSnapshot(ResourceSnapshotEvent),
    TickState(TickStateEvent),
}

/// Emission is batched per tick; `flush` is guaranteed at the tick boundary
/// (spec §6). A sink failure is surfaced to the `step()` caller but never
/// corrupts engine state.
pub trait TelemetrySink {
    fn emit(&mut self, event: TelemetryEvent) -> Result<(), SinkError>;
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// An in-memory sink, useful for tests and for embedding collaborators that
/// want the full event stream without a persistence layer.
#[derive(Debug, Default)]
pub struct VecSink {
    pub events: Vec<TelemetryEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelemetrySink for VecSink {
    fn emit(&mut self, event: TelemetryEvent) -> Result<(), SinkError> {
        self.events.push(event);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Discards every event. The default when a caller has no telemetry
/// collaborator wired up.
#[derive(Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn emit(&mut self, _event: TelemetryEvent) -> Result<(), SinkError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_retains_emitted_events_in_order() {
        let mut sink = VecSink::new();
        sink.emit(TelemetryEvent::TickState(TickStateEvent {
            tick: 0,
            n_pairs: 1,
            n_trades: 0,
            n_forages: 2,
        }))
        .unwrap();
        sink.emit(TelemetryEvent::TickState(TickStateEvent {
            tick: 1,
            n_pairs: 0,
            n_trades: 1,
            n_forages: 0,
        }))
        .unwrap();
        assert_eq!(sink.events.len(), 2);
        sink.flush().unwrap();
    }

    #[test]
    fn null_sink_drops_everything() {
        let mut sink = NullSink;
        sink.emit(TelemetryEvent::TickState(TickStateEvent {
            tick: 0,
            n_pairs: 0,
            n_trades: 0,
            n_forages: 0,
        }))
        .unwrap();
        sink.flush().unwrap();
    }
}
