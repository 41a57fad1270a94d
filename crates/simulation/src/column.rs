//! Grid cells ("columns") of the overland flow network and the arena that owns them.
//!
//! A column is a square patch of terrain holding a volume of surface water
//! plus the remaining soil and engineered-drain capacity for that patch.
//! Columns never reference pipes directly; they hold `PipeId` back-references
//! that the network uses for cleanup when a region is refined.

use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::{DrainageParams, COORD_SCALE};
use crate::pipe::PipeId;

// =============================================================================
// Identifiers
// =============================================================================

/// Stable handle into the [`ColumnArena`]. Never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(pub u32);

impl ColumnId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Integer lattice coordinate of a column's anchor corner.
///
/// World coordinates are quantized to steps of `COORD_QUANTUM`, so columns of any
/// resolution share one key space. The derived ordering is x first, then z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LatticeKey {
    pub x: i64,
    pub z: i64,
}

impl LatticeKey {
    pub fn from_world(coord: Vec2) -> Self {
        Self {
            x: (coord.x * COORD_SCALE).round() as i64,
            z: (coord.y * COORD_SCALE).round() as i64,
        }
    }

    pub fn to_world(self) -> Vec2 {
        Vec2::new(self.x as f32 / COORD_SCALE, self.z as f32 / COORD_SCALE)
    }

    #[inline]
    pub fn offset(self, dx: i64, dz: i64) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }
}

// =============================================================================
// Column
// =============================================================================

/// Static per-cell attributes aggregated from the site feature dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellAttributes {
    /// Greenery coverage normalised by the soil reference patch.
    pub soil_percentage: f32,
    /// Number of manholes, inlets and catch basins in the cell.
    pub drain_count: f32,
    /// Accumulated `water` feature weight.
    pub water_weight: f32,
}

impl CellAttributes {
    /// A column is a water body once any `water` feature lands in it.
    #[inline]
    pub fn is_water_body(&self) -> bool {
        self.water_weight >= 1.0
    }
}

/// One square cell of the flow network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Anchor corner `x`, terrain height, anchor corner `z`.
    pub position: Vec3,
    /// Side length of the square cell.
    pub width: f32,
    pub water_volume: f32,
    /// Extra rainfall (mm/h) injected on top of the weather series.
    pub injected_rainfall: f32,
    pub soil_percentage: f32,
    pub initial_soil_capacity: f32,
    pub soil_capacity_remaining: f32,
    pub drain_count: f32,
    pub max_drain_capacity: f32,
    pub drain_capacity_remaining: f32,
    pub is_water_body: bool,
    pub(crate) pipes: Vec<PipeId>,
}

impl Column {
    /// A bare column with no soil, drains or water-body flag.
    pub fn new(anchor: Vec2, ground_height: f32, width: f32, water_volume: f32) -> Self {
        Self {
            position: Vec3::new(anchor.x, ground_height, anchor.y),
            width,
            water_volume: water_volume.max(0.0),
            injected_rainfall: 0.0,
            soil_percentage: 0.0,
            initial_soil_capacity: 0.0,
            soil_capacity_remaining: 0.0,
            drain_count: 0.0,
            max_drain_capacity: 0.0,
            drain_capacity_remaining: 0.0,
            is_water_body: false,
            pipes: Vec::new(),
        }
    }

    /// Derive capacities from aggregated attributes. Both capacities start full.
    pub fn with_attributes(mut self, attrs: &CellAttributes, params: &DrainageParams) -> Self {
        self.soil_percentage = attrs.soil_percentage;
        self.initial_soil_capacity = attrs.soil_percentage * params.soil_capacity_per_unit;
        self.soil_capacity_remaining = self.initial_soil_capacity;
        self.drain_count = attrs.drain_count;
        self.max_drain_capacity = attrs.drain_count * params.drain_capacity_per_drain;
        self.drain_capacity_remaining = self.max_drain_capacity;
        self.is_water_body = attrs.is_water_body();
        self
    }

    /// Add `delta` to the water volume, clamping the result at zero.
    ///
    /// Returns the change that was actually applied, which differs from
    /// `delta` only when the column would have gone negative.
    pub fn apply_delta(&mut self, delta: f32) -> f32 {
        let before = self.water_volume;
        self.water_volume = (before + delta).max(0.0);
        self.water_volume - before
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.width
    }

    /// Water depth in metres.
    #[inline]
    pub fn water_depth(&self) -> f32 {
        self.water_volume / self.area()
    }

    #[inline]
    pub fn ground_height(&self) -> f32 {
        self.position.y
    }

    /// Height of the water surface above the scene origin.
    #[inline]
    pub fn water_surface_height(&self) -> f32 {
        self.water_depth() + self.position.y
    }

    /// Planar anchor corner `(x, z)`.
    #[inline]
    pub fn grid_coord(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }

    /// Planar far corner `(x + width, z + width)`.
    #[inline]
    pub fn end(&self) -> Vec2 {
        self.grid_coord() + Vec2::splat(self.width)
    }

    #[inline]
    pub fn key(&self) -> LatticeKey {
        LatticeKey::from_world(self.grid_coord())
    }

    pub fn pipes(&self) -> &[PipeId] {
        &self.pipes
    }
}

// =============================================================================
// ColumnArena
// =============================================================================

/// Owns every column. Removal leaves a hole so ids held elsewhere stay valid
/// (they simply resolve to `None`).
/// Slots are never reclaimed, so repeated refinement grows the slot vector.
#[derive(Debug, Clone, Default)]
pub struct ColumnArena {
    slots: Vec<Option<Column>>,
    live: usize,
}

impl ColumnArena {
    pub fn insert(&mut self, column: Column) -> ColumnId {
        let id = ColumnId(self.slots.len() as u32);
        self.slots.push(Some(column));
        self.live += 1;
        id
    }

    pub fn remove(&mut self, id: ColumnId) -> Option<Column> {
        let removed = self.slots.get_mut(id.index()).and_then(Option::take);
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    #[inline]
    pub fn get(&self, id: ColumnId) -> Option<&Column> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Mutable access to two distinct live columns at once.
    pub fn pair_mut(&mut self, a: ColumnId, b: ColumnId) -> Option<(&mut Column, &mut Column)> {
        let (ia, ib) = (a.index(), b.index());
        if ia == ib || ia >= self.slots.len() || ib >= self.slots.len() {
            return None;
        }
        let (first, second) = if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            (&mut hi[0], &mut lo[ib])
        };
        match (first.as_mut(), second.as_mut()) {
            (Some(ca), Some(cb)) => Some((ca, cb)),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, id: ColumnId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColumnId, &Column)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|c| (ColumnId(i as u32), c)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ColumnId, &mut Column)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|c| (ColumnId(i as u32), c)))
    }

    /// Sum of water volume over live columns, accumulated in f64.
    pub fn total_volume(&self) -> f64 {
        self.iter().map(|(_, c)| c.water_volume as f64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(volume: f32) -> Column {
        Column::new(Vec2::new(10.0, 20.0), 3.0, 10.0, volume)
    }

    #[test]
    fn test_apply_delta_adds_volume() {
        let mut c = column(5.0);
        let applied = c.apply_delta(2.5);
        assert_eq!(c.water_volume, 7.5);
        assert_eq!(applied, 2.5);
    }

    #[test]
    fn test_apply_delta_clamps_at_zero() {
        let mut c = column(5.0);
        let applied = c.apply_delta(-100.0);
        assert_eq!(c.water_volume, 0.0);
        assert_eq!(applied, -5.0, "only the available volume is removed");
    }

    #[test]
    fn test_new_clamps_negative_initial_volume() {
        let c = column(-1.0);
        assert_eq!(c.water_volume, 0.0);
    }

    #[test]
    fn test_depth_and_surface_height() {
        let c = column(50.0);
        assert!((c.water_depth() - 0.5).abs() < f32::EPSILON);
        assert!((c.water_surface_height() - 3.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_corners() {
        let c = column(0.0);
        assert_eq!(c.grid_coord(), Vec2::new(10.0, 20.0));
        assert_eq!(c.end(), Vec2::new(20.0, 30.0));
    }

    #[test]
    fn test_with_attributes_fills_capacities() {
        let params = DrainageParams::default();
        let attrs = CellAttributes {
            soil_percentage: 0.5,
            drain_count: 2.0,
            water_weight: 0.0,
        };
        let c = column(0.0).with_attributes(&attrs, &params);
        assert_eq!(c.initial_soil_capacity, 0.5 * params.soil_capacity_per_unit);
        assert_eq!(c.soil_capacity_remaining, c.initial_soil_capacity);
        assert_eq!(c.max_drain_capacity, 2.0 * params.drain_capacity_per_drain);
        assert_eq!(c.drain_capacity_remaining, c.max_drain_capacity);
        assert!(!c.is_water_body);
    }

    #[test]
    fn test_water_weight_marks_water_body() {
        let attrs = CellAttributes {
            water_weight: 1000.0,
            ..Default::default()
        };
        assert!(attrs.is_water_body());
        assert!(!CellAttributes::default().is_water_body());
    }

    #[test]
    fn test_lattice_key_quantizes_float_noise() {
        let a = LatticeKey::from_world(Vec2::new(2.5 * 3.0, 0.1 + 0.2));
        let b = LatticeKey::from_world(Vec2::new(7.5, 0.3));
        assert_eq!(a, b);
        assert_eq!(b.to_world(), Vec2::new(7.5, 0.3));
    }

    #[test]
    fn test_lattice_key_orders_x_then_z() {
        let a = LatticeKey { x: 0, z: 50 };
        let b = LatticeKey { x: 1, z: 0 };
        let c = LatticeKey { x: 1, z: 2 };
        assert!(a < b && b < c);
    }

    #[test]
    fn test_arena_ids_are_stable_after_removal() {
        let mut arena = ColumnArena::default();
        let a = arena.insert(column(1.0));
        let b = arena.insert(column(2.0));
        assert_eq!(arena.len(), 2);

        let removed = arena.remove(a).expect("a was live");
        assert_eq!(removed.water_volume, 1.0);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b).map(|c| c.water_volume), Some(2.0));
        assert_eq!(arena.len(), 1);

        let c = arena.insert(column(3.0));
        assert_ne!(c, a, "ids are never reused");
        assert!(arena.remove(a).is_none());
    }

    #[test]
    fn test_arena_pair_mut() {
        let mut arena = ColumnArena::default();
        let a = arena.insert(column(1.0));
        let b = arena.insert(column(2.0));

        let (ca, cb) = arena.pair_mut(b, a).expect("both live");
        assert_eq!(ca.water_volume, 2.0);
        assert_eq!(cb.water_volume, 1.0);
        ca.apply_delta(1.0);

        assert_eq!(arena.get(b).map(|c| c.water_volume), Some(3.0));
        assert!(arena.pair_mut(a, a).is_none());
        arena.remove(a);
        assert!(arena.pair_mut(a, b).is_none());
    }

    #[test]
    fn test_arena_total_volume() {
        let mut arena = ColumnArena::default();
        arena.insert(column(1.5));
        let b = arena.insert(column(2.5));
        arena.insert(column(4.0));
        assert!((arena.total_volume() - 8.0).abs() < 1e-9);
        arena.remove(b);
        assert!((arena.total_volume() - 5.5).abs() < 1e-9);
    }
}
