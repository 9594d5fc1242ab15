//! C2 — Spatial index.
//!
//! A dense per-cell bucket list, sized to the grid. Radius queries use
//! Chebyshev distance (spec §9 Open Question, pinned in `SPEC_FULL.md`:
//! Chebyshev for visibility/adjacency, Manhattan for movement cost).

use crate::types::{AgentId, Pos};

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    width: i32,
    height: i32,
    buckets: Vec<Vec<AgentId>>,
}

fn chebyshev(a: Pos, b: Pos) -> i32 {
    (a.0 - b.0).abs().max((a.1 - b.1).abs())
}

impl SpatialIndex {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            buckets: vec![Vec::new(); (width * height) as usize],
        }
    }

    fn index(&self, pos: Pos) -> usize {
        (pos.1 * self.width + pos.0) as usize
    }

    fn in_bounds(&self, pos: Pos) -> bool {
        pos.0 >= 0 && pos.0 < self.width && pos.1 >= 0 && pos.1 < self.height
    }

    pub fn insert(&mut self, id: AgentId, pos: Pos) {
        debug_assert!(self.in_bounds(pos));
        let idx = self.index(pos);
        self.buckets[idx].push(id);
    }

    /// Move an agent's bucket membership. Contract: the orchestrator calls
    /// this for every agent whose position changed, in id order, after
    /// Movement completes.
    pub fn move_agent(&mut self, id: AgentId, old_pos: Pos, new_pos: Pos) {
        if old_pos == new_pos {
            return;
        }
        let old_idx = self.index(old_pos);
        if let Some(pos_in_bucket) = self.buckets[old_idx].iter().position(|&a| a == id) {
            self.buckets[old_idx].swap_remove(pos_in_bucket);
        }
        let new_idx = self.index(new_pos);
        self.buckets[new_idx].push(id);
    }

    /// Ids within Chebyshev distance `r` of `pos`, sorted ascending by id.
    /// Deterministic for identical inputs regardless of insertion history.
    pub fn query_radius(&self, pos: Pos, r: i32) -> Vec<AgentId> {
        let min_x = (pos.0 - r).max(0);
        let max_x = (pos.0 + r).min(self.width - 1);
        let min_y = (pos.1 - r).max(0);
        let max_y = (pos.1 + r).min(self.height - 1);

        let mut found = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let candidate = (x, y);
                if chebyshev(pos, candidate) <= r {
                    found.extend_from_slice(&self.buckets[self.index(candidate)]);
                }
            }
        }
        found.sort_unstable();
        found
    }
}
