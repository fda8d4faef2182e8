use mesh_agglom::mesh_generation::{flat_wing, symmetric_wing, wedge_wing};
use mesh_agglom::prelude::*;
use mesh_agglom::spatial::mirror_map;

fn surface_only() -> PreprocessConfig {
    let mut config = PreprocessConfig::default();
    config.wake.merge_into_mesh = false;
    config
}

#[test]
fn flat_wing_keeps_one_loop_per_station() {
    let n = 6;
    let model = preprocess(&flat_wing(n), &ComponentTable::new(), &surface_only()).unwrap();
    assert_eq!(model.num_kutta_nodes(), n + 1);

    let level1 = model.hierarchy.level(1).expect("one coarse level");
    assert_eq!(level1.num_loops(), n);
    let mut stations: Vec<u32> = level1.loops().iter().map(|l| l.tags.span_station).collect();
    stations.sort_unstable();
    assert_eq!(stations, (0..n as u32).collect::<Vec<_>>());
    for level in model.hierarchy.levels() {
        assert_eq!(level.kutta_nodes().len(), n + 1);
    }
}

#[test]
fn detected_and_explicit_trailing_edges_agree() {
    let explicit = preprocess(&wedge_wing(4), &ComponentTable::new(), &surface_only()).unwrap();
    let mut input = wedge_wing(4);
    input.trailing_edge_chains.clear();
    let detected = preprocess(&input, &ComponentTable::new(), &surface_only()).unwrap();
    assert_eq!(explicit.kutta.kutta_nodes(), detected.kutta.kutta_nodes());
    assert_eq!(detected.num_kutta_nodes(), 5);
}

#[test]
fn non_lifting_component_sheds_no_wake() {
    let mut components = ComponentTable::new();
    components.insert(0, ComponentRecord::new("plate", SurfaceKind::Wing, false));
    let mut input = flat_wing(3);
    input.trailing_edge_chains.clear();
    let model = preprocess(&input, &components, &PreprocessConfig::default()).unwrap();
    assert!(model.sheets.is_empty());
    assert!(model.diagnostics.is_empty());
}

#[test]
fn wake_loops_are_tagged_and_sized() {
    let config = PreprocessConfig::default();
    let n = 3;
    let model = preprocess(&flat_wing(n), &ComponentTable::new(), &config).unwrap();
    let sheet = &model.sheets[0];
    let finest = model.hierarchy.finest();
    assert_eq!(sheet.wake_loops.len(), n * (config.wake.nodes_per_vortex - 1));
    for l in sheet.wake_loops.clone() {
        let lp = finest.get_loop(LoopId::new(l));
        assert_eq!(lp.tags.kind, SurfaceKind::Wake);
        assert_eq!(lp.tags.surface_id, sheet.surface_id);
        assert!(lp.tags.span_station < n as u32);
    }
    assert_eq!(sheet.vortices[0].span_fraction, 0.0);
    assert_eq!(sheet.vortices[n].span_fraction, 1.0);
}

#[test]
fn symmetric_coarsening_mirrors_every_level() {
    let plane = SymmetryPlane::default();
    let config = PreprocessConfig {
        symmetry: Some(plane),
        ..Default::default()
    };
    let model = preprocess(&symmetric_wing(3), &ComponentTable::new(), &config).unwrap();
    assert!(model.hierarchy.num_levels() >= 2);
    let centroids = |level: &MeshLevel| -> Vec<[f64; 3]> {
        level.loops().iter().map(|l| l.geometry.centroid).collect()
    };
    for pair in model.hierarchy.levels().windows(2) {
        let (fine, coarse) = (&pair[0], &pair[1]);
        let fine_mirror = mirror_map(&centroids(fine), &plane, plane.tolerance)
            .unwrap_or_else(|e| panic!("level {}: {e}", fine.level()));
        let coarse_mirror = mirror_map(&centroids(coarse), &plane, plane.tolerance)
            .unwrap_or_else(|e| panic!("level {}: {e}", coarse.level()));
        for (l, lp) in fine.loops().iter().enumerate() {
            let c = lp.coarse_loop.expect("every fine loop has a coarse loop");
            let mirrored = fine.get_loop(LoopId::new(fine_mirror[l])).coarse_loop;
            assert_eq!(
                mirrored,
                Some(LoopId::new(coarse_mirror[c.idx()])),
                "level {}: loop {l} and its mirror land in unmirrored coarse loops",
                fine.level()
            );
        }
    }
}

#[test]
fn attachments_tag_control_surfaces() {
    let mut input = flat_wing(2);
    input.attachments = vec![
        Attachment::Geom {
            component_id: 0,
            name: "wing".into(),
            kind: SurfaceKind::Wing,
            lifting: true,
        },
        Attachment::SubSurface {
            control_surface: 3,
            loops: vec![1, 3],
        },
        Attachment::Free,
    ];
    let model = preprocess(&input, &ComponentTable::new(), &surface_only()).unwrap();
    assert_eq!(model.attachments.components_declared, 1);
    assert_eq!(model.attachments.loops_tagged, 2);
    assert_eq!(model.components.get(0).map(|r| r.name.as_str()), Some("wing"));
    let finest = model.hierarchy.finest();
    assert_eq!(finest.get_loop(LoopId::new(1)).tags.control_surface, Some(3));
    assert_eq!(finest.get_loop(LoopId::new(0)).tags.control_surface, None);
    for level in model.hierarchy.levels().iter().skip(1) {
        for lp in level.loops() {
            let fine = model.hierarchy.level(level.level() - 1).unwrap();
            for f in &lp.fine_loops {
                assert_eq!(fine.get_loop(*f).tags.control_surface, lp.tags.control_surface);
            }
        }
    }
}

#[test]
fn subsurface_out_of_range_is_fatal() {
    let mut input = flat_wing(2);
    input.attachments = vec![Attachment::SubSurface {
        control_surface: 1,
        loops: vec![99],
    }];
    let err = preprocess(&input, &ComponentTable::new(), &PreprocessConfig::default()).unwrap_err();
    assert_eq!(
        err,
        MeshAgglomError::LoopOutOfBounds {
            loop_index: 99,
            len: 4
        }
    );
}

#[test]
fn config_round_trips_through_json() {
    let config = PreprocessConfig::from_json_str(
        r#"{"wake": {"nodes_per_vortex": 4}, "hierarchy": {"max_levels": 3}}"#,
    )
    .unwrap();
    assert_eq!(config.wake.nodes_per_vortex, 4);
    assert_eq!(config.hierarchy.max_levels, 3);
    assert_eq!(config.agglomeration, AgglomerationConfig::default());

    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(PreprocessConfig::from_json_str(&json).unwrap(), config);

    let bad = PreprocessConfig::from_json_str(r#"{"wake": {"nodes_per_vortex": 1}}"#);
    assert!(matches!(bad, Err(MeshAgglomError::InvalidConfig(_))));
}
