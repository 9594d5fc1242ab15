//! A deterministic, discrete-time, spatial microeconomic simulator: a
//! fixed-size grid of agents that perceive neighbors, pair up, move,
//! trade integer quantities at discrete prices, forage, and regenerate
//! resources — one tick at a time, byte-identically across runs given the
//! same scenario and seed.

pub mod agent;
pub mod decision;
pub mod error;
pub mod forage;
pub mod grid;
pub mod housekeeping;
pub mod movement;
pub mod perception;
pub mod regen;
pub mod rng;
pub mod scenario;
pub mod spatial;
pub mod telemetry;
pub mod tick;
pub mod trade;
pub mod types;
pub mod utility;

pub use agent::Agent;
pub use error::SimError;
pub use grid::{Cell, Grid};
pub use perception::{PerceptionView, VisibleAgent, VisibleResource};
pub use rng::SimRng;
pub use scenario::{AgentSpec, GridSpec, InventorySpec, ResourceSpec, Scenario};
pub use spatial::SpatialIndex;
pub use telemetry::{NullSink, SinkError, TelemetryEvent, TelemetrySink, VecSink};
pub use tick::Simulation;
pub use types::{
    ActiveGoods, AgentId, BargainingProtocol, ExchangeRegime, Good, Inventory, MatchingProtocol,
    Params, Pos, SearchProtocol, Tick,
};
pub use utility::UtilityParams;
