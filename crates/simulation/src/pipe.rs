//! Momentum-carrying conduits between two columns.
//!
//! Each pipe remembers the velocity it actually carried on the previous step
//! and uses it, damped by friction, as the starting velocity for the next one.
//! Pipes are resolved sequentially: a pipe sees the volumes left behind by
//! every pipe resolved before it in the same step, so the processing order held
//! by [`PipeRegistry`] is part of the numerical result.

use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnArena, ColumnId};
use crate::config::FlowParams;

/// Stable handle into the [`PipeRegistry`]. Never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PipeId(pub u32);

impl PipeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipe {
    pub a: ColumnId,
    pub b: ColumnId,
    /// Signed velocity carried into the next step. Positive moves water A -> B.
    pub previous_flow_velocity: f32,
    /// Insertion order, used to break elevation ties in the processing order.
    pub serial: u64,
}

impl Pipe {
    pub fn new(a: ColumnId, b: ColumnId, serial: u64) -> Self {
        Self {
            a,
            b,
            previous_flow_velocity: 0.0,
            serial,
        }
    }

    #[inline]
    pub fn other(&self, id: ColumnId) -> ColumnId {
        if self.a == id {
            self.b
        } else {
            self.a
        }
    }

    /// Move water between `a` and `b` for one step of `dt` hours.
    ///
    /// `a` and `b` must be this pipe's endpoints in the same order. Returns the
    /// signed volume moved from `a` to `b` after the conservation clamp.
    pub fn flow(&mut self, a: &mut Column, b: &mut Column, dt: f32, params: &FlowParams) -> f32 {
        if dt <= 0.0 {
            return 0.0;
        }

        let surface_a = a.water_surface_height();
        let surface_b = b.water_surface_height();

        let cross_section_height =
            (surface_a.max(surface_b) - a.ground_height().max(b.ground_height())).max(0.0);
        let cross_section_area = a.width.min(b.width) * cross_section_height;

        let pipe_length = a.grid_coord().distance(b.grid_coord());
        let acceleration = if pipe_length > 0.0 {
            params.gravity * (surface_a - surface_b) / pipe_length
        } else {
            0.0
        };

        let velocity =
            self.previous_flow_velocity * params.friction_factor(dt) + dt * acceleration;

        let mut flow_volume = dt * cross_section_area * velocity;
        if flow_volume < 0.0 {
            flow_volume = flow_volume.max(-b.water_volume);
        } else {
            flow_volume = flow_volume.min(a.water_volume);
        }

        self.previous_flow_velocity = if cross_section_area > 0.0 {
            flow_volume / (dt * cross_section_area)
        } else {
            0.0
        };

        a.apply_delta(-flow_volume);
        b.apply_delta(flow_volume);
        flow_volume
    }
}

// =============================================================================
// PipeRegistry
// =============================================================================

/// Owns every pipe and the fixed order in which the flow pass visits them.
/// Like `ColumnArena`, removed slots stay empty and are never reused.
#[derive(Debug, Clone, Default)]
pub struct PipeRegistry {
    slots: Vec<Option<Pipe>>,
    order: Vec<PipeId>,
    next_serial: u64,
    live: usize,
}

impl PipeRegistry {
    /// Create a pipe from `a` to `b` and append it to the processing order.
    /// The caller records the id on both endpoints.
    pub fn insert(&mut self, a: ColumnId, b: ColumnId) -> PipeId {
        let id = PipeId(self.slots.len() as u32);
        self.slots.push(Some(Pipe::new(a, b, self.next_serial)));
        self.next_serial += 1;
        self.order.push(id);
        self.live += 1;
        id
    }

    /// Remove a pipe. Its id is dropped from the processing order on the next
    /// [`sort_by_elevation`](Self::sort_by_elevation).
    pub fn remove(&mut self, id: PipeId) -> Option<Pipe> {
        let removed = self.slots.get_mut(id.index()).and_then(Option::take);
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    #[inline]
    pub fn get(&self, id: PipeId) -> Option<&Pipe> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (PipeId, &Pipe)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|p| (PipeId(i as u32), p)))
    }

    /// Live pipes in processing order.
    pub fn ordered(&self) -> impl Iterator<Item = (PipeId, &Pipe)> {
        self.order
            .iter()
            .filter_map(|&id| self.get(id).map(|p| (id, p)))
    }

    /// Rebuild the processing order: descending by the higher endpoint ground
    /// elevation, ties by insertion serial.
    pub fn sort_by_elevation(&mut self, columns: &ColumnArena) {
        let mut keyed: Vec<(PipeId, f32, u64)> = self
            .iter()
            .map(|(id, pipe)| {
                let ground = |c: ColumnId| {
                    columns
                        .get(c)
                        .map(Column::ground_height)
                        .unwrap_or(f32::NEG_INFINITY)
                };
                (id, ground(pipe.a).max(ground(pipe.b)), pipe.serial)
            })
            .collect();
        keyed.sort_by(|x, y| y.1.total_cmp(&x.1).then(x.2.cmp(&y.2)));
        self.order = keyed.into_iter().map(|(id, _, _)| id).collect();
    }

    /// Resolve every pipe once, in processing order. Returns the total absolute
    /// volume moved.
    pub fn resolve_flow(&mut self, columns: &mut ColumnArena, dt: f32, params: &FlowParams) -> f64 {
        let Self { slots, order, .. } = self;
        let mut moved = 0.0_f64;
        for id in order.iter() {
            let Some(pipe) = slots.get_mut(id.index()).and_then(Option::as_mut) else {
                continue;
            };
            let Some((a, b)) = columns.pair_mut(pipe.a, pipe.b) else {
                continue;
            };
            moved += pipe.flow(a, b, dt, params).abs() as f64;
        }
        moved
    }
}
