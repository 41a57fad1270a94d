use bevy::prelude::*;
use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

/// Ground height at a planar world coordinate.
pub trait TerrainSampler: Send + Sync {
    fn height_at(&self, x: f32, z: f32) -> f32;
}

impl<F> TerrainSampler for F
where
    F: Fn(f32, f32) -> f32 + Send + Sync,
{
    fn height_at(&self, x: f32, z: f32) -> f32 {
        self(x, z)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain(pub f32);

impl TerrainSampler for FlatTerrain {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.0
    }
}

/// Linear slope: `base + slope.x * x + slope.y * z`.
#[derive(Debug, Clone, Copy)]
pub struct PlaneTerrain {
    pub base: f32,
    pub slope: Vec2,
}

impl TerrainSampler for PlaneTerrain {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        self.base + self.slope.x * x + self.slope.y * z
    }
}

/// Rolling OpenSimplex2 terrain scaled into `[min_height, max_height]`.
pub struct NoiseTerrain {
    noise: FastNoiseLite,
    pub min_height: f32,
    pub max_height: f32,
}

impl NoiseTerrain {
    pub fn new(seed: i32, min_height: f32, max_height: f32) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(3));
        noise.set_frequency(Some(0.008));
        Self {
            noise,
            min_height,
            max_height,
        }
    }
}

impl TerrainSampler for NoiseTerrain {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        let raw = self.noise.get_noise_2d(x, z);
        let t = ((raw + 1.0) * 0.5).clamp(0.0, 1.0); // normalize to 0..1
        self.min_height + t * (self.max_height - self.min_height)
    }
}

/// The height sampler used when building lattices.
#[derive(Resource)]
pub struct Terrain(pub Box<dyn TerrainSampler>);

impl Terrain {
    pub fn new(sampler: impl TerrainSampler + 'static) -> Self {
        Self(Box::new(sampler))
    }

    #[inline]
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.0.height_at(x, z)
    }
}

impl Default for Terrain {
    fn default() -> Self {
        Self::new(FlatTerrain(0.0))
    }
}
