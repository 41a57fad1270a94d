//! Unit tests for lattice construction, aggregation and refinement.

#[cfg(test)]
mod tests {
    use bevy::math::Vec2;

    use crate::column::{CellAttributes, ColumnId, LatticeKey};
    use crate::config::{DrainageParams, HydroConfig};
    use crate::error::FlowError;
    use crate::grid_builder::{
        aggregate_features, boxes_touch, LatticeGrid, LatticeInputs, RefineOutcome,
    };
    use crate::network::FlowNetwork;
    use crate::site_data::{FeatureKind, FeaturePoint, SiteFeatures};
    use crate::terrain::{FlatTerrain, PlaneTerrain, TerrainSampler};

    fn inputs<'a>(
        terrain: &'a dyn TerrainSampler,
        features: &'a SiteFeatures,
        drainage: &'a DrainageParams,
        base: f32,
    ) -> LatticeInputs<'a> {
        LatticeInputs {
            terrain,
            features,
            drainage,
            base_side_length: base,
        }
    }

    /// 4x4 lattice of 10 m columns over [0, 40), each holding `volume`.
    fn base_network(volume: f32) -> FlowNetwork {
        let terrain = FlatTerrain(0.0);
        let features = SiteFeatures::default();
        let drainage = DrainageParams::default();
        let mut net = FlowNetwork::new();
        net.build_lattice(
            10.0,
            Vec2::ZERO,
            Vec2::splat(40.0),
            volume,
            &[],
            &inputs(&terrain, &features, &drainage, 10.0),
        )
        .expect("valid lattice");
        net
    }

    fn assert_pipes_link_live_columns(net: &FlowNetwork) {
        for (pid, pipe) in net.pipes().iter() {
            let a = net.column(pipe.a).expect("endpoint a is live");
            let b = net.column(pipe.b).expect("endpoint b is live");
            assert!(a.pipes().contains(&pid), "a is missing back-reference");
            assert!(b.pipes().contains(&pid), "b is missing back-reference");
        }
    }

    // -------------------------------------------------------------------------
    // LatticeGrid
    // -------------------------------------------------------------------------

    #[test]
    fn test_grid_dimensions() {
        let grid = LatticeGrid::new(25.0, Vec2::ZERO, Vec2::new(500.0, 250.0)).expect("valid");
        assert_eq!((grid.nx, grid.nz), (20, 10));
        assert_eq!(grid.cell_count(), 200);
        assert_eq!(grid.end(), Vec2::new(500.0, 250.0));
    }

    #[test]
    fn test_grid_accepts_float_noise() {
        let grid = LatticeGrid::new(2.5, Vec2::splat(25.0), Vec2::splat(100.0)).expect("valid");
        assert_eq!((grid.nx, grid.nz), (30, 30));
    }

    #[test]
    fn test_grid_rejects_bad_resolution() {
        for r in [0.0, -2.5, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                LatticeGrid::new(r, Vec2::ZERO, Vec2::splat(10.0)),
                Err(FlowError::InvalidResolution(_))
            ));
        }
    }

    #[test]
    fn test_grid_rejects_fractional_end_on_large_lattice() {
        for end_x in [1000.9, 1000.5, 1000.1, 999.99] {
            assert!(
                matches!(
                    LatticeGrid::new(1.0, Vec2::ZERO, Vec2::new(end_x, 10.0)),
                    Err(FlowError::MalformedRegion { .. })
                ),
                "end x {end_x} is not a whole number of cells"
            );
        }
        let grid = LatticeGrid::new(1.0, Vec2::ZERO, Vec2::new(1000.0, 10.0)).expect("valid");
        assert_eq!((grid.nx, grid.nz), (1000, 10));
    }

    #[test]
    fn test_grid_rejects_malformed_region() {
        let cases = [
            (Vec2::ZERO, Vec2::new(30.0, 50.0)),
            (Vec2::splat(50.0), Vec2::ZERO),
            (Vec2::ZERO, Vec2::new(50.0, 0.0)),
            (Vec2::ZERO, Vec2::new(10.0, 50.0)),
        ];
        for (start, end) in cases {
            assert!(
                matches!(
                    LatticeGrid::new(25.0, start, end),
                    Err(FlowError::MalformedRegion { .. })
                ),
                "{start:?}..{end:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_cell_of_is_half_open() {
        let grid = LatticeGrid::new(10.0, Vec2::ZERO, Vec2::splat(30.0)).expect("valid");
        assert_eq!(grid.cell_of(Vec2::new(0.0, 0.0)), Some((0, 0)));
        assert_eq!(grid.cell_of(Vec2::new(9.99, 10.0)), Some((0, 1)));
        assert_eq!(grid.cell_of(Vec2::new(29.9, 29.9)), Some((2, 2)));
        assert_eq!(grid.cell_of(Vec2::new(30.0, 5.0)), None);
        assert_eq!(grid.cell_of(Vec2::new(-0.1, 5.0)), None);
    }

    #[test]
    fn test_boxes_touch() {
        let k = |x: i64, z: i64| LatticeKey { x, z };
        let cell = (k(0, 0), k(10, 10));
        assert!(boxes_touch(cell, (k(10, 0), k(20, 10))), "shared edge");
        assert!(boxes_touch(cell, (k(10, 10), k(20, 20))), "shared corner");
        assert!(boxes_touch(cell, (k(10, -5), k(30, 5))), "partial edge");
        assert!(!boxes_touch(cell, (k(11, 0), k(20, 10))), "gap");
        assert!(!boxes_touch(cell, (k(5, 5), k(15, 15))), "overlap");
    }

    // -------------------------------------------------------------------------
    // Aggregation
    // -------------------------------------------------------------------------

    #[test]
    fn test_aggregate_features() {
        let grid = LatticeGrid::new(25.0, Vec2::ZERO, Vec2::splat(50.0)).expect("valid");
        let features = SiteFeatures::new(vec![
            FeaturePoint::new(FeatureKind::Greenery, 5.0, 5.0, 3.125),
            FeaturePoint::new(FeatureKind::Greenery, 6.0, 6.0, 3.125),
            FeaturePoint::new(FeatureKind::Manhole, 30.0, 5.0, 0.0),
            FeaturePoint::new(FeatureKind::Inlet, 30.0, 6.0, 0.0),
            FeaturePoint::new(FeatureKind::CatchBasin, 31.0, 6.0, 0.0),
            FeaturePoint::new(FeatureKind::Water, 5.0, 30.0, 0.0),
            FeaturePoint::new(FeatureKind::Other, 30.0, 30.0, 9.0),
            FeaturePoint::new(FeatureKind::Manhole, 50.0, 10.0, 0.0),
            FeaturePoint::new(FeatureKind::Manhole, -1.0, 10.0, 0.0),
        ]);
        let params = DrainageParams::default();
        let (cells, ignored) = aggregate_features(&grid, &features, &params, 25.0);

        assert_eq!(ignored, 2);
        let cell = |i, j| cells[grid.flat_index(i, j)];
        // 6.25 greenery over (25 / 10)^2 reference patches.
        assert!((cell(0, 0).soil_percentage - 1.0).abs() < 1e-6);
        assert_eq!(cell(1, 0).drain_count, 3.0);
        assert!(cell(0, 1).is_water_body());
        assert_eq!(cell(1, 1), CellAttributes::default(), "unknown kinds are ignored");
    }

    #[test]
    fn test_detailed_cells_normalise_by_base_side() {
        let grid = LatticeGrid::new(2.5, Vec2::ZERO, Vec2::splat(5.0)).expect("valid");
        let features = SiteFeatures::new(vec![FeaturePoint::new(
            FeatureKind::Greenery,
            1.0,
            1.0,
            6.25,
        )]);
        let (cells, _) = aggregate_features(&grid, &features, &DrainageParams::default(), 25.0);
        assert!((cells[0].soil_percentage - 1.0).abs() < 1e-6);
    }

    // -------------------------------------------------------------------------
    // build_lattice
    // -------------------------------------------------------------------------

    #[test]
    fn test_build_lattice_counts() {
        let net = base_network(0.0);
        assert_eq!(net.column_count(), 16);
        // 4x4 Moore lattice: 2*4*3 orthogonal + 2*3*3 diagonal.
        assert_eq!(net.pipe_count(), 42);
        assert_eq!(net.resolutions(), vec![10.0]);
        assert_pipes_link_live_columns(&net);
    }

    #[test]
    fn test_interior_column_has_eight_neighbors() {
        let net = base_network(0.0);
        let (id, _) = net.query_column(Vec2::new(10.0, 10.0)).expect("exists");
        assert_eq!(net.neighbors(id).len(), 8);
        let (corner, _) = net.query_column(Vec2::ZERO).expect("exists");
        assert_eq!(net.neighbors(corner).len(), 3);
    }

    #[test]
    fn test_new_column_is_endpoint_a() {
        let net = base_network(0.0);
        let (first, _) = net.query_column(Vec2::ZERO).expect("exists");
        for (_, pipe) in net.pipes().iter() {
            assert_ne!(pipe.a, first, "the first column never creates a pipe");
            assert!(pipe.a.0 > pipe.b.0, "later column is endpoint a");
        }
    }

    #[test]
    fn test_build_lattice_is_idempotent() {
        let mut net = base_network(1.0);
        let terrain = FlatTerrain(0.0);
        let features = SiteFeatures::default();
        let drainage = DrainageParams::default();
        let build = net
            .build_lattice(
                10.0,
                Vec2::ZERO,
                Vec2::splat(40.0),
                5.0,
                &[],
                &inputs(&terrain, &features, &drainage, 10.0),
            )
            .expect("valid");
        assert_eq!(build.columns_created, 0);
        assert_eq!(build.skipped_occupied, 16);
        assert_eq!(net.column_count(), 16);
        assert!((net.total_volume() - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_adjacent_lattices_of_same_resolution_join() {
        let mut net = base_network(0.0);
        let terrain = FlatTerrain(0.0);
        let features = SiteFeatures::default();
        let drainage = DrainageParams::default();
        let build = net
            .build_lattice(
                10.0,
                Vec2::new(40.0, 0.0),
                Vec2::new(50.0, 40.0),
                0.0,
                &[],
                &inputs(&terrain, &features, &drainage, 10.0),
            )
            .expect("valid");
        assert_eq!(build.columns_created, 4);
        // 3 pipes inside the strip + 2 + 3 + 3 + 2 to the old lattice.
        assert_eq!(build.pipes_created, 3 + 10);
    }

    #[test]
    fn test_build_rejects_invalid_without_mutation() {
        let mut net = base_network(1.0);
        let terrain = FlatTerrain(0.0);
        let features = SiteFeatures::default();
        let drainage = DrainageParams::default();
        let ctx = inputs(&terrain, &features, &drainage, 10.0);

        let err = net.build_lattice(-1.0, Vec2::ZERO, Vec2::splat(10.0), 0.0, &[], &ctx);
        assert!(matches!(err, Err(FlowError::InvalidResolution(_))));
        let err = net.build_lattice(10.0, Vec2::new(40.0, 0.0), Vec2::new(55.0, 10.0), 0.0, &[], &ctx);
        assert!(matches!(err, Err(FlowError::MalformedRegion { .. })));

        assert_eq!(net.column_count(), 16);
        assert_eq!(net.pipe_count(), 42);
    }

    #[test]
    fn test_build_samples_terrain_and_applies_features() {
        let terrain = PlaneTerrain {
            base: 0.0,
            slope: Vec2::new(0.1, 0.0),
        };
        let features = SiteFeatures::new(vec![
            FeaturePoint::new(FeatureKind::Manhole, 15.0, 5.0, 0.0),
            FeaturePoint::new(FeatureKind::Water, 25.0, 5.0, 0.0),
        ]);
        let drainage = DrainageParams::default();
        let mut net = FlowNetwork::new();
        let build = net
            .build_lattice(
                10.0,
                Vec2::ZERO,
                Vec2::new(30.0, 10.0),
                0.0,
                &[],
                &inputs(&terrain, &features, &drainage, 10.0),
            )
            .expect("valid");
        assert_eq!(build.points_ignored, 0);

        let (_, middle) = net.query_column(Vec2::new(10.0, 0.0)).expect("exists");
        assert!((middle.ground_height() - 1.0).abs() < 1e-6);
        assert_eq!(middle.drain_count, 1.0);
        assert_eq!(middle.max_drain_capacity, drainage.drain_capacity_per_drain);
        assert_eq!(middle.drain_capacity_remaining, middle.max_drain_capacity);

        let (_, last) = net.query_column(Vec2::new(20.0, 0.0)).expect("exists");
        assert!(last.is_water_body);
    }

    #[test]
    fn test_pipe_order_descends_by_elevation() {
        let terrain = PlaneTerrain {
            base: 0.0,
            slope: Vec2::new(0.1, 0.0),
        };
        let features = SiteFeatures::default();
        let drainage = DrainageParams::default();
        let mut net = FlowNetwork::new();
        net.build_lattice(
            10.0,
            Vec2::ZERO,
            Vec2::new(40.0, 10.0),
            0.0,
            &[],
            &inputs(&terrain, &features, &drainage, 10.0),
        )
        .expect("valid");

        let tops: Vec<f32> = net
            .pipes()
            .ordered()
            .map(|(_, pipe)| {
                let a = net.column(pipe.a).map(|c| c.ground_height()).unwrap_or(0.0);
                let b = net.column(pipe.b).map(|c| c.ground_height()).unwrap_or(0.0);
                a.max(b)
            })
            .collect();
        assert_eq!(tops.len(), 3);
        assert!(tops.windows(2).all(|w| w[0] >= w[1]), "order {tops:?}");
    }

    #[test]
    fn test_equal_elevation_keeps_insertion_order() {
        let net = base_network(0.0);
        let serials: Vec<u64> = net.pipes().ordered().map(|(_, p)| p.serial).collect();
        assert!(serials.windows(2).all(|w| w[0] < w[1]));
    }

    // -------------------------------------------------------------------------
    // refine_region
    // -------------------------------------------------------------------------

    fn refine(net: &mut FlowNetwork, resolution: f32, a: Vec2, b: Vec2) -> Result<RefineOutcome, FlowError> {
        let terrain = FlatTerrain(0.0);
        let features = SiteFeatures::default();
        let drainage = DrainageParams::default();
        net.refine_region(resolution, a, b, &inputs(&terrain, &features, &drainage, 10.0))
    }

    #[test]
    fn test_refine_conserves_volume() {
        let mut net = base_network(10.0);
        let before = net.total_volume();

        let outcome = refine(&mut net, 5.0, Vec2::ZERO, Vec2::splat(20.0)).expect("valid");
        let RefineOutcome::Refined {
            replaced,
            volume,
            build,
            ..
        } = outcome
        else {
            panic!("expected a refinement");
        };

        assert_eq!(replaced, 4);
        assert!((volume - 40.0).abs() < 1e-6);
        assert_eq!(build.columns_created, 16);
        assert_eq!(net.column_count(), 12 + 16);
        assert!((net.total_volume() - before).abs() < 1e-3);

        let fine: f64 = net
            .columns_in_range(Vec2::ZERO, Vec2::splat(20.0))
            .iter()
            .filter_map(|&id| net.column(id))
            .map(|c| {
                assert!((c.water_volume - 2.5).abs() < 1e-6);
                c.water_volume as f64
            })
            .sum();
        assert!((fine - 40.0).abs() < 1e-4);
        assert_eq!(net.resolutions(), vec![5.0, 10.0]);
    }

    #[test]
    fn test_refine_stitches_boundary() {
        let mut net = base_network(0.0);
        let outcome = refine(&mut net, 5.0, Vec2::ZERO, Vec2::splat(20.0)).expect("valid");
        let RefineOutcome::Refined { build, .. } = outcome else {
            panic!("expected a refinement");
        };

        // 42 internal fine pipes plus 3 + 3 + 3 + 3 + 1 stitched to the five
        // surviving coarse neighbours.
        assert_eq!(build.stitched_pipes, 13);
        assert_eq!(build.pipes_created, 42 + 13);
        assert_eq!(net.pipe_count(), 42 - 15 + 55);
        assert_pipes_link_live_columns(&net);

        let (coarse, _) = net.query_column(Vec2::new(20.0, 0.0)).expect("survives");
        let fine_neighbors: Vec<ColumnId> = net
            .neighbors(coarse)
            .into_iter()
            .filter(|&id| net.column(id).is_some_and(|c| c.width == 5.0))
            .collect();
        assert_eq!(fine_neighbors.len(), 3);

        let (corner, _) = net.query_column(Vec2::new(20.0, 20.0)).expect("survives");
        let corner_fine: Vec<ColumnId> = net
            .neighbors(corner)
            .into_iter()
            .filter(|&id| net.column(id).is_some_and(|c| c.width == 5.0))
            .collect();
        assert_eq!(corner_fine.len(), 1);
        let (diag, _) = net.query_column(Vec2::new(15.0, 15.0)).expect("fine corner");
        assert_eq!(corner_fine[0], diag);
    }

    #[test]
    fn test_stitched_pipes_start_at_fine_column() {
        let mut net = base_network(0.0);
        refine(&mut net, 5.0, Vec2::ZERO, Vec2::splat(20.0)).expect("valid");
        for (_, pipe) in net.pipes().iter() {
            let (Some(a), Some(b)) = (net.column(pipe.a), net.column(pipe.b)) else {
                panic!("dangling pipe");
            };
            if a.width != b.width {
                assert_eq!(a.width, 5.0, "the new fine column is endpoint a");
            }
        }
    }

    #[test]
    fn test_refine_snaps_to_contained_columns() {
        let mut net = base_network(0.0);
        let outcome = refine(&mut net, 5.0, Vec2::new(3.0, 3.0), Vec2::new(31.0, 27.0)).expect("valid");
        let RefineOutcome::Refined {
            start,
            end,
            replaced,
            ..
        } = outcome
        else {
            panic!("expected a refinement");
        };
        assert_eq!(start, Vec2::new(10.0, 10.0));
        assert_eq!(end, Vec2::new(30.0, 20.0));
        assert_eq!(replaced, 2);
    }

    #[test]
    fn test_refine_empty_region_is_noop() {
        let mut net = base_network(1.0);
        let outcome = refine(&mut net, 5.0, Vec2::new(12.0, 12.0), Vec2::new(18.0, 18.0)).expect("no-op");
        assert!(outcome.is_empty());
        assert_eq!(net.column_count(), 16);
        assert_eq!(net.pipe_count(), 42);
    }

    #[test]
    fn test_refine_rejects_before_mutation() {
        let mut net = base_network(1.0);
        let err = refine(&mut net, 3.0, Vec2::ZERO, Vec2::splat(20.0));
        assert!(matches!(err, Err(FlowError::MalformedRegion { .. })));
        let err = refine(&mut net, 0.0, Vec2::ZERO, Vec2::splat(20.0));
        assert!(matches!(err, Err(FlowError::InvalidResolution(_))));
        assert_eq!(net.column_count(), 16);
        assert_eq!(net.pipe_count(), 42);
        assert!((net.total_volume() - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_refine_twice_nested() {
        let mut net = base_network(8.0);
        refine(&mut net, 5.0, Vec2::ZERO, Vec2::splat(20.0)).expect("valid");
        refine(&mut net, 2.5, Vec2::ZERO, Vec2::splat(10.0)).expect("valid");
        assert!((net.total_volume() - 128.0).abs() < 1e-3);
        assert_eq!(net.resolutions(), vec![2.5, 5.0, 10.0]);
        assert_pipes_link_live_columns(&net);
    }

    #[test]
    fn test_flow_after_refine_conserves() {
        let mut net = base_network(0.0);
        if let Some(column) = net.column_mut(ColumnId(0)) {
            column.water_volume = 500.0;
        }
        refine(&mut net, 5.0, Vec2::new(20.0, 20.0), Vec2::splat(40.0)).expect("valid");
        let config = HydroConfig::default();
        for _ in 0..300 {
            net.flow_pass(0.02, &config.flow);
        }
        assert!((net.total_volume() - 500.0).abs() < 1e-2);
        assert!(net.columns().iter().all(|(_, c)| c.water_volume >= 0.0));
    }
}
