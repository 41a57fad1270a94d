//! Static site features: typed survey points that set per-cell soil and
//! drainage attributes when a lattice is built.
//!
//! The on-disk format is `{"terrainData": [{"X": .., "Y": .., "value": .., "type": ..}]}`
//! where `X`/`Y` are planar scene coordinates (world x / z).

use std::path::Path;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    #[serde(rename = "water")]
    Water,
    /// Vegetated ground; `value` is the coverage weight.
    #[serde(rename = "greenery")]
    Greenery,
    #[serde(rename = "manhole")]
    Manhole,
    #[serde(rename = "inout")]
    Inlet,
    #[serde(rename = "catch")]
    CatchBasin,
    /// Any other survey type (e.g. `grass`). Carried but not aggregated.
    #[serde(other, rename = "other")]
    Other,
}

impl FeatureKind {
    /// Engineered drain features count towards a cell's drain count.
    #[inline]
    pub fn is_drain(self) -> bool {
        matches!(
            self,
            FeatureKind::Manhole | FeatureKind::Inlet | FeatureKind::CatchBasin
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    #[serde(rename = "X")]
    pub x: f32,
    #[serde(rename = "Y")]
    pub z: f32,
    #[serde(default)]
    pub value: f32,
    #[serde(rename = "type")]
    pub kind: FeatureKind,
}

impl FeaturePoint {
    pub fn new(kind: FeatureKind, x: f32, z: f32, value: f32) -> Self {
        Self { x, z, value, kind }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.z)
    }
}

#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteFeatures {
    #[serde(rename = "terrainData", default)]
    pub points: Vec<FeaturePoint>,
}

impl SiteFeatures {
    pub fn new(points: Vec<FeaturePoint>) -> Self {
        Self { points }
    }

    pub fn from_json_str(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let features = Self::from_json_str(&json)?;
        info!(
            "Loaded {} site feature points from {}",
            features.points.len(),
            path.as_ref().display()
        );
        Ok(features)
    }

    /// Reproducible survey for scenarios without data: scattered drains and
    /// greenery over `[start, end)` plus one pond near the lowest corner.
    pub fn synthetic(seed: u64, start: Vec2, end: Vec2) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let span = (end - start).max(Vec2::ZERO);
        let random_point = |rng: &mut ChaCha8Rng| {
            start + Vec2::new(rng.gen::<f32>() * span.x, rng.gen::<f32>() * span.y)
        };

        // Roughly one drain per 2500 square units and one greenery patch per 400.
        let area = span.x * span.y;
        let drains = (area / 2500.0) as usize;
        let patches = (area / 400.0) as usize;

        let mut points = Vec::with_capacity(drains + patches + 1);
        for _ in 0..drains {
            let kind = match rng.gen_range(0..3) {
                0 => FeatureKind::Manhole,
                1 => FeatureKind::Inlet,
                _ => FeatureKind::CatchBasin,
            };
            let p = random_point(&mut rng);
            points.push(FeaturePoint::new(kind, p.x, p.y, 0.0));
        }
        for _ in 0..patches {
            let p = random_point(&mut rng);
            points.push(FeaturePoint::new(
                FeatureKind::Greenery,
                p.x,
                p.y,
                rng.gen_range(0.1..1.0),
            ));
        }
        let pond = start + span * 0.05;
        points.push(FeaturePoint::new(FeatureKind::Water, pond.x, pond.y, 0.0));

        Self::new(points)
    }

    pub fn push(&mut self, point: FeaturePoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn count_of(&self, kind: FeatureKind) -> usize {
        self.points.iter().filter(|p| p.kind == kind).count()
    }
}
