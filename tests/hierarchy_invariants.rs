use mesh_agglom::mesh_generation::{body_of_revolution, flat_wing, wedge_wing};
use mesh_agglom::prelude::*;

fn build(input: &SurfaceMeshInput) -> PreprocessedModel {
    preprocess(input, &ComponentTable::new(), &PreprocessConfig::default())
        .expect("preprocessing must succeed")
}

fn assert_level_pair(fine: &MeshLevel, coarse: &MeshLevel) {
    let mut seen = vec![false; fine.num_loops()];
    for (c, lp) in coarse.loops().iter().enumerate() {
        assert!(lp.len() >= 3, "coarse loop {c} has {} nodes", lp.len());
        assert!(!lp.fine_loops.is_empty());
        let mut area = 0.0;
        for &f in &lp.fine_loops {
            assert!(!seen[f.idx()], "fine loop {f} is in two coarse loops");
            seen[f.idx()] = true;
            let fine_loop = fine.get_loop(f);
            assert_eq!(fine_loop.tags, lp.tags);
            assert_eq!(fine_loop.coarse_loop, Some(LoopId::new(c)));
            area += fine_loop.geometry.area;
        }
        assert!((lp.geometry.area - area).abs() <= 1e-9 * area.max(1.0));
    }
    assert!(seen.iter().all(|s| *s));
}

fn assert_hierarchy(model: &PreprocessedModel) {
    let levels = model.hierarchy.levels();
    for pair in levels.windows(2) {
        assert_level_pair(&pair[0], &pair[1]);
        assert!(pair[1].num_loops() < pair[0].num_loops());
        assert_eq!(pair[1].kutta_nodes().len(), pair[0].kutta_nodes().len());
    }
    let total = levels[0].total_area();
    for level in levels {
        assert!((level.total_area() - total).abs() <= 1e-9 * total);
        model.hierarchy.validate_invariants().unwrap();
    }
}

#[test]
fn flat_wing_hierarchy_is_consistent() {
    let model = build(&flat_wing(8));
    assert!(model.hierarchy.num_levels() >= 2);
    assert_hierarchy(&model);
}

#[test]
fn wedge_wing_hierarchy_is_consistent() {
    let model = build(&wedge_wing(6));
    assert_eq!(model.sheets.len(), 1);
    assert_hierarchy(&model);
}

#[test]
fn closed_body_hierarchy_is_consistent() {
    let model = build(&body_of_revolution(16, 10));
    assert!(model.sheets.is_empty());
    assert!(model.hierarchy.num_levels() >= 2);
    assert_hierarchy(&model);
}

#[test]
fn trailing_edges_survive_every_level() {
    let model = build(&flat_wing(6));
    for level in model.hierarchy.levels() {
        let te = level
            .edges()
            .iter()
            .filter(|e| e.flags.trailing_edge)
            .count();
        assert!(te >= 1, "level {} lost its trailing edge", level.level());
        for k in level.kutta_nodes() {
            assert!(level.node(k.node).flags.trailing_edge);
        }
    }
}

#[test]
fn preprocessing_is_deterministic() {
    let input = wedge_wing(5);
    let a = build(&input);
    let b = build(&input);
    assert_eq!(a.hierarchy, b.hierarchy);
    assert_eq!(a.sheets, b.sheets);
}
