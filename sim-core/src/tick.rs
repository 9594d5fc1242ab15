//! C11 — Tick orchestrator: fixed seven-phase driver.

use std::collections::BTreeMap;

use crate::agent::Agent;
use crate::decision::run_decision_phase;
use crate::error::SimError;
use crate::forage::run_forage_phase;
use crate::grid::Grid;
use crate::housekeeping::{run_housekeeping_phase, TickCounts};
use crate::movement::run_movement_phase;
use crate::perception::{perceive, PerceptionView};
use crate::regen::run_regen_phase;
use crate::rng::SimRng;
use crate::scenario::Scenario;
use crate::spatial::SpatialIndex;
use crate::telemetry::{
    AgentSnapshot, NullSink, ResourceSnapshotEvent, TelemetryEvent, TelemetrySink, TickStateEvent,
};
use crate::trade::run_trade_phase;
use crate::types::{ActiveGoods, AgentId, Params, Tick};

/// The whole simulation's private state. Nothing here is shared outside the
/// object; collaborators only ever see read-only snapshots emitted through
/// the telemetry sink (spec §5).
pub struct Simulation {
    grid: Grid,
    spatial_index: SpatialIndex,
    agents: BTreeMap<AgentId, Agent>,
    params: Params,
    active_goods: ActiveGoods,
    rng: SimRng,
    tick: Tick,
    sink: Box<dyn TelemetrySink>,
}

impl Simulation {
    /// Build a `Simulation` from a validated `Scenario`. Fails with
    /// `SimError::ScenarioInvalid` if the scenario does not pass structural
    /// validation (spec §7).
    pub fn new(scenario: Scenario, seed: u64) -> Result<Self, SimError> {
        scenario.validate()?;

        let grid = scenario.build_grid();
        let agents = scenario.build_agents();

        let mut spatial_index = SpatialIndex::new(grid.width, grid.height);
        for (&id, agent) in &agents {
            spatial_index.insert(id, agent.pos);
        }

        Ok(Self {
            grid,
            spatial_index,
            agents,
            params: scenario.params,
            active_goods: scenario.active_goods,
            rng: SimRng::from_seed(seed),
            tick: 0,
            sink: Box::new(NullSink),
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn agents(&self) -> &BTreeMap<AgentId, Agent> {
        &self.agents
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Reserved for stochastic protocol variants (spec §9 Open Question);
    /// the default deterministic protocols never draw from it.
    pub fn rng_mut(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Execute one tick: Perception → Decision → Movement → Trade → Forage
    /// → Regeneration → Housekeeping, in that fixed order.
    pub fn step(&mut self) -> Result<(), SimError> {
        let views: BTreeMap<AgentId, PerceptionView> = self
            .agents
            .keys()
            .copied()
            .collect::<Vec<_>>()
            .into_iter()
            .map(|id| {
                let view = perceive(id, &self.agents, &self.grid, &self.spatial_index, self.params.vision_radius);
                (id, view)
            })
            .collect();

        let decision_events = run_decision_phase(&mut self.agents, &views, &self.grid, &self.params, self.tick);

        let n_pairs = self
            .agents
            .values()
            .filter(|a| a.is_paired())
            .count() as u64
            / 2;

        run_movement_phase(&mut self.agents, &self.grid, &mut self.spatial_index, &self.params, self.tick);

        let trade_result = run_trade_phase(&mut self.agents, &self.params, self.tick);
        let n_trades = trade_result.n_trades;

        let n_forages = run_forage_phase(&mut self.agents, &mut self.grid, &self.params, self.tick);

        run_regen_phase(&mut self.grid, &self.params, self.tick);

        run_housekeeping_phase(
            &mut self.agents,
            &self.active_goods,
            &self.params,
            self.tick,
            TickCounts { n_pairs, n_trades, n_forages },
        );

        for (&id, agent) in &self.agents {
            if !agent.inventory.is_non_negative() {
                return Err(SimError::InvariantViolation(format!(
                    "agent {id} holds a negative inventory component after tick {}",
                    self.tick
                )));
            }
        }

        let tick = self.tick;
        let emit = |sink: &mut dyn TelemetrySink, event: TelemetryEvent| -> Result<(), SimError> {
            sink.emit(event)
                .map_err(|e| SimError::SinkFailure(format!("tick {tick}: {e}")))
        };

        for event in decision_events {
            emit(&mut *self.sink, TelemetryEvent::Decision(event))?;
        }
        for event in trade_result.trade_events {
            emit(&mut *self.sink, TelemetryEvent::Trade(event))?;
        }
        for event in trade_result.attempt_events {
            emit(&mut *self.sink, TelemetryEvent::TradeAttempt(event))?;
        }
        for (&id, agent) in &self.agents {
            emit(
                &mut *self.sink,
                TelemetryEvent::AgentSnapshot(AgentSnapshot {
                    tick: self.tick,
                    agent_id: id,
                    pos: agent.pos,
                    inventory: agent.inventory,
                    quotes: agent.quotes,
                    target_agent_id: agent.target_agent_id,
                    target_pos: agent.target_pos,
                    paired_with_id: agent.paired_with_id,
                    is_foraging_committed: agent.is_foraging_committed,
                }),
            )?;
        }
        for (pos, cell) in self.grid.iter_cells_canonical() {
            emit(
                &mut *self.sink,
                TelemetryEvent::ResourceSnapshot(ResourceSnapshotEvent {
                    tick: self.tick,
                    cell_pos: pos,
                    amount: cell.amount,
                }),
            )?;
        }
        emit(
            &mut *self.sink,
            TelemetryEvent::TickState(TickStateEvent { tick: self.tick, n_pairs, n_trades, n_forages }),
        )?;
        self.sink
            .flush()
            .map_err(|e| SimError::SinkFailure(format!("flush failed at tick {}: {e}", self.tick)))?;

        self.tick += 1;
        Ok(())
    }

    /// Run up to `max_ticks` steps, or until `stop` returns `true` after a
    /// step completes. `stop: None` runs all `max_ticks` unconditionally.
    /// Returns the number of ticks actually executed.
    pub fn run(
        &mut self,
        max_ticks: u64,
        mut stop: Option<&mut dyn FnMut(&Simulation) -> bool>,
    ) -> Result<u64, SimError> {
        let mut executed = 0;
        for _ in 0..max_ticks {
            self.step()?;
            executed += 1;
            if let Some(stop) = stop.as_deref_mut() {
                if stop(self) {
                    break;
                }
            }
        }
        Ok(executed)
    }
}
