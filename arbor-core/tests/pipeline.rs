use arbor_core::{
    GrowthConfig, TreeConfig, build,
    foliage::{same_tip, unique_tips},
    growth,
    isosurface::SurfaceNets,
    mesh::{BufferBackend, MeshKind},
    segments::{self, Segment},
    tree::Tree,
    tube,
};
use glam::Vec3;
use rand::{SeedableRng, rngs::StdRng};

fn grow(levels: u32, child_count: u32, seed: u64) -> Tree {
    let cfg = GrowthConfig {
        levels,
        child_count,
        ..GrowthConfig::default()
    };
    growth::grow(&cfg, 1.0, &mut StdRng::seed_from_u64(seed))
}

#[test]
fn generated_trees_hold_structural_invariants() {
    for seed in 0..8 {
        for (levels, child_count) in [(0, 3), (1, 2), (2, 3), (3, 4), (4, 2)] {
            let tree = grow(levels, child_count, seed);

            for node in &tree.nodes {
                assert!((node.direction.length() - 1.0).abs() < 1e-4);
                assert!(node.radius >= 0.0 && node.length >= 0.0);
                if let Some(p) = node.parent {
                    let parent = tree.node(p);
                    assert!(node.origin.distance(parent.distal_end()) < 1e-4);
                    assert_eq!(node.level, parent.level + 1);
                }
            }

            assert!(tree.depth() <= levels);
            let mut bound = 0;
            for d in 0..=levels {
                let at_depth = child_count.pow(d) as usize;
                assert!(tree.count_at_depth(d) <= at_depth);
                bound += at_depth;
            }
            assert!(tree.len() <= bound);
            assert_eq!(segments::extract(&tree).len(), tree.len() - 1);
        }
    }
}

#[test]
fn scenario_shapes_match_config() {
    assert!(grow(0, 3, 1).root().children.is_empty());

    let two = grow(1, 2, 1);
    assert_eq!(two.root().children.len(), 2);
    assert!(two.root().children.iter().all(|&c| two.node(c).is_leaf()));

    let thirteen = grow(2, 3, 1);
    assert_eq!(thirteen.len(), 13);
    assert_eq!(thirteen.count_at_depth(2), 9);
}

#[test]
fn tube_buffer_sizes_follow_ring_and_step_counts() {
    let tree = grow(2, 2, 4);
    let segs = segments::extract(&tree);
    for (s, p) in [(8, 4), (3, 1), (12, 7)] {
        let mesh = tube::synthesize(&segs[0], 0.3, 0.1, s, p, &mut BufferBackend).unwrap();
        assert_eq!(mesh.vertex_count() as u32, s * (p + 1));
        assert_eq!(mesh.triangle_count() as u32, 2 * s * p);
    }
}

#[test]
fn leaf_sites_never_violate_tolerance() {
    let tree = grow(4, 3, 9);
    let segs: Vec<Segment> = segments::extract(&tree);
    let tips = unique_tips(&segs);

    assert!(!tips.is_empty());
    for (i, a) in tips.iter().enumerate() {
        for b in &tips[i + 1..] {
            assert!(!same_tip(*a, *b));
        }
    }
}

#[test]
fn toml_config_drives_a_full_build() {
    let cfg = TreeConfig::from_toml_str(
        r#"
        randomness = 0.5
        seed = 2024

        [growth]
        levels = 2
        child_count = 3

        [mesh]
        ring_segments = 6
        path_steps = 3
        junction_resolution = 12
        "#,
    )
    .unwrap();

    let mut nets = SurfaceNets::new(cfg.mesh.junction_resolution, cfg.mesh.isolation);
    let out = build(&cfg, &mut BufferBackend, &mut nets);

    assert_eq!(out.tree.len(), 13);
    assert_eq!(out.meshes.count(MeshKind::Tube), 13);
    for tube in out.meshes.iter_kind(MeshKind::Tube) {
        assert_eq!(tube.vertex_count(), 6 * 4);
        assert_eq!(tube.triangle_count(), 2 * 6 * 3);
    }

    let merged = out.meshes.merged();
    assert_eq!(merged.vertex_count(), out.meshes.vertex_count());
    assert!(merged.indices.iter().all(|&i| (i as usize) < merged.vertex_count()));
    assert!(merged.normals.iter().all(|n| {
        let len = Vec3::from(*n).length();
        (len - 1.0).abs() < 1e-3
    }));
}
