//! Interactive 3-D tree viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the build configuration and
//! the last generated tree, and implements [`eframe::App`] to render the
//! meshes through a small software orbit camera and to edit every build
//! parameter through an egui UI.

use std::ops::RangeInclusive;

use arbor_core::{
    BuildReport, Generated, TreeConfig,
    isosurface::SurfaceNets,
    mesh::{BufferBackend, MeshKind},
    pipeline,
};
use eframe::App;
use glam::{Quat, Vec3};
use rand::Rng;

/// Slider limits for the tree shape; the largest tree stays within
/// [`arbor_core::config::MAX_NODES`].
const LEVELS_LIMIT: u32 = 5;
const CHILD_COUNT_LIMIT: u32 = 6;

/// World-space triangle ready for painting.
#[derive(Clone, Copy, Debug)]
struct Triangle {
    points: [Vec3; 3],
    color: [f32; 3],
}

/// Main application state for the interactive viewer.
///
/// [`Viewer`] glues together:
/// - The build pipeline: [`TreeConfig`] in, [`Generated`] out.
/// - A cached triangle soup of the generated meshes.
/// - Orbit camera state (yaw/pitch/zoom/pan).
///
/// The typical per-frame update is:
/// 1. Handle UI interactions; any config change triggers [`Viewer::regenerate`].
/// 2. Project, depth-sort and shade the cached triangles.
/// 3. Optionally overlay the branch skeleton.
pub struct Viewer {
    cfg: TreeConfig,
    seed: u64,
    generated: Generated,
    triangles: Vec<Triangle>,
    target: Vec3,
    last_error: Option<String>,

    yaw: f32,
    pitch: f32,
    zoom: f32,
    pan: egui::Vec2,

    show_mesh: bool,
    show_skeleton: bool,
}

impl Viewer {
    /// Creates a viewer and builds the first tree from `cfg`.
    ///
    /// If `cfg` has no seed, a random one is picked so the result can be
    /// regenerated identically after parameter tweaks.
    pub fn new(cfg: TreeConfig) -> Self {
        let seed = cfg.seed.unwrap_or_else(|| rand::rng().random());
        let generated = Self::run(&cfg, seed);

        let mut viewer = Self {
            cfg,
            seed,
            generated,
            triangles: Vec::new(),
            target: Vec3::ZERO,
            last_error: None,
            yaw: 0.6,
            pitch: 0.25,
            zoom: 25.0,
            pan: egui::vec2(0.0, 0.0),
            show_mesh: true,
            show_skeleton: false,
        };
        viewer.cache_triangles();
        viewer
    }

    fn run(cfg: &TreeConfig, seed: u64) -> Generated {
        let mut cfg = cfg.clone();
        cfg.seed = Some(seed);
        let mut nets = SurfaceNets::new(cfg.mesh.junction_resolution, cfg.mesh.isolation);
        pipeline::build(&cfg, &mut BufferBackend, &mut nets)
    }

    /// Rebuilds the tree with the current config and seed.
    ///
    /// An invalid config keeps the previous tree and records the error for
    /// the status bar.
    fn regenerate(&mut self) {
        if let Err(err) = self.cfg.validate() {
            tracing::warn!("not regenerating: {err}");
            self.last_error = Some(err.to_string());
            return;
        }
        self.last_error = None;
        self.generated = Self::run(&self.cfg, self.seed);
        self.cache_triangles();
        tracing::info!(
            seed = self.seed,
            nodes = self.generated.tree.len(),
            triangles = self.generated.meshes.triangle_count(),
            "regenerated tree"
        );
    }

    /// Picks a fresh random seed and rebuilds.
    fn new_seed(&mut self) {
        self.seed = rand::rng().random();
        self.regenerate();
    }

    /// Flattens every sub-mesh into colored world-space triangles and
    /// recenters the camera target on the tree.
    fn cache_triangles(&mut self) {
        let mesh_cfg = &self.cfg.mesh;
        self.triangles.clear();
        for sub in &self.generated.meshes.meshes {
            let color = match sub.kind {
                MeshKind::Tube | MeshKind::Junction => mesh_cfg.bark_color,
                MeshKind::Leaf => mesh_cfg.leaf_color,
            };
            let m = &sub.mesh;
            self.triangles.extend(m.indices.chunks_exact(3).map(|tri| Triangle {
                points: [
                    m.position(tri[0] as usize),
                    m.position(tri[1] as usize),
                    m.position(tri[2] as usize),
                ],
                color,
            }));
        }

        self.target = match self.generated.meshes.merged().bounds() {
            Some((lo, hi)) => (lo + hi) * 0.5,
            None => self.generated.tree.root().origin,
        };
    }

    fn view_rotation(&self) -> Quat {
        Quat::from_rotation_x(self.pitch) * Quat::from_rotation_y(self.yaw)
    }

    /// Moves a world-space point into camera space (camera looks down -Z).
    fn to_view(&self, p: Vec3) -> Vec3 {
        self.view_rotation() * (p - self.target)
    }

    /// Orthographic projection of a view-space point onto the screen.
    ///
    /// The y-axis is flipped so that +Y points up on screen.
    fn view_to_screen(&self, v: Vec3, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + v.x * self.zoom + self.pan.x,
            center.y - v.y * self.zoom + self.pan.y,
        )
    }

    fn world_to_screen(&self, p: Vec3, rect: egui::Rect) -> egui::Pos2 {
        self.view_to_screen(self.to_view(p), rect)
    }

    /// Builds a depth-sorted, Lambert-shaded egui mesh of the cached triangles.
    fn shaded_mesh(&self, rect: egui::Rect) -> egui::Mesh {
        let light = Vec3::new(0.4, 0.7, 0.6).normalize();

        let mut view: Vec<(f32, [Vec3; 3], [f32; 3])> = self
            .triangles
            .iter()
            .map(|t| {
                let v = t.points.map(|p| self.to_view(p));
                let depth = (v[0].z + v[1].z + v[2].z) / 3.0;
                (depth, v, t.color)
            })
            .collect();
        // Painter's algorithm: farthest (most negative z) first.
        view.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut mesh = egui::Mesh::default();
        for (_, v, color) in view {
            let normal = (v[1] - v[0]).cross(v[2] - v[0]).normalize_or_zero();
            let shade = 0.25 + 0.75 * normal.dot(light).abs();
            let c = egui::Color32::from_rgb(
                channel(color[0] * shade),
                channel(color[1] * shade),
                channel(color[2] * shade),
            );
            let base = mesh.vertices.len() as u32;
            for p in v {
                mesh.colored_vertex(self.view_to_screen(p, rect), c);
            }
            mesh.add_triangle(base, base + 1, base + 2);
        }
        mesh
    }

    /// Helper to draw a labeled numeric [`egui::DragValue`].
    ///
    /// Returns `true` if the value changed.
    fn labeled_drag<N: egui::emath::Numeric>(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut N,
        range: RangeInclusive<N>,
        speed: f64,
    ) -> bool {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed))
                .changed()
        })
        .inner
    }

    /// Builds the top panel UI (regenerate, seed, zoom, overlays).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("⟳ Regenerate").clicked() {
                    self.regenerate();
                }
                if ui.button("🎲 New seed").clicked() {
                    self.new_seed();
                }

                let seed_changed = ui
                    .add(egui::DragValue::new(&mut self.seed).prefix("seed = "))
                    .changed();
                if seed_changed {
                    self.regenerate();
                }

                ui.separator();
                ui.checkbox(&mut self.show_mesh, "Mesh");
                ui.checkbox(&mut self.show_skeleton, "Skeleton");

                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 1.0..=200.0).text("Zoom"));
            });
        });
    }

    /// Builds the bottom status bar (tree and mesh statistics).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let g = &self.generated;
                if let Some(skipped) = skipped_summary(&g.report) {
                    ui.colored_label(egui::Color32::YELLOW, skipped);
                    ui.separator();
                }
                ui.label(format!("triangles = {}", g.meshes.triangle_count()));
                ui.label(format!("sub-meshes = {}", g.meshes.len()));
                ui.label(format!(
                    "tubes = {}, junctions = {}, leaves = {}",
                    g.report.tubes, g.report.junctions, g.report.leaves
                ));
                ui.separator();
                ui.label(format!("segments = {}", g.segments.len()));
                ui.label(format!("nodes = {}", g.tree.len()));
                if let Some(err) = &self.last_error {
                    ui.separator();
                    ui.colored_label(egui::Color32::LIGHT_RED, err);
                }
            });
        });
    }

    /// Builds the right-hand configuration panel for build parameters.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Config");
                let mut changed = false;

                ui.separator();
                ui.label("Growth");
                let g = &mut self.cfg.growth;
                changed |= Self::labeled_drag(ui, "levels:", &mut g.levels, 0..=LEVELS_LIMIT, 0.05);
                changed |= Self::labeled_drag(ui, "child_count:", &mut g.child_count, 0..=CHILD_COUNT_LIMIT, 0.05);
                changed |= Self::labeled_drag(
                    ui,
                    "branch_angle_deg:",
                    &mut g.branch_angle_deg,
                    0.0..=90.0,
                    0.5,
                );
                changed |= Self::labeled_drag(ui, "base_length:", &mut g.base_length, 0.1..=20.0, 0.05);
                changed |= Self::labeled_drag(ui, "base_radius:", &mut g.base_radius, 0.01..=3.0, 0.01);
                changed |= Self::labeled_drag(ui, "randomness:", &mut self.cfg.randomness, 0.0..=2.0, 0.01);

                ui.separator();
                ui.label("Mesh");
                let m = &mut self.cfg.mesh;
                changed |= Self::labeled_drag(ui, "ring_segments:", &mut m.ring_segments, 3..=32, 0.1);
                changed |= Self::labeled_drag(ui, "path_steps:", &mut m.path_steps, 1..=32, 0.1);
                changed |= Self::labeled_drag(
                    ui,
                    "tip_radius_ratio:",
                    &mut m.tip_radius_ratio,
                    0.0..=1.0,
                    0.01,
                );
                changed |= Self::labeled_drag(ui, "leaf_size:", &mut m.leaf_size, 0.0..=5.0, 0.01);
                changed |= ui.checkbox(&mut m.smooth_normals, "smooth normals").changed();

                ui.separator();
                ui.label("Junctions");
                changed |= ui.checkbox(&mut m.junctions, "blend junctions").changed();
                changed |= Self::labeled_drag(
                    ui,
                    "resolution:",
                    &mut m.junction_resolution,
                    2..=64,
                    0.1,
                );
                changed |= Self::labeled_drag(ui, "isolation:", &mut m.isolation, 0.01..=0.99, 0.005);

                ui.separator();
                ui.label("Foliage");
                changed |= ui.checkbox(&mut m.foliage, "leaves").changed();

                ui.separator();
                ui.label("Colors");
                ui.horizontal(|ui| {
                    ui.label("bark:");
                    changed |= ui.color_edit_button_rgb(&mut m.bark_color).changed();
                    ui.label("leaf:");
                    changed |= ui.color_edit_button_rgb(&mut m.leaf_color).changed();
                });

                ui.separator();
                if ui.button("Reset cfg to default").clicked() {
                    self.cfg = TreeConfig::default();
                    changed = true;
                }

                if changed {
                    self.regenerate();
                }
            });
    }

    /// Builds the central panel where the tree is drawn and orbited.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            // Orbit with primary drag, pan with secondary drag.
            if response.dragged_by(egui::PointerButton::Primary) {
                let delta = response.drag_delta();
                self.yaw += delta.x * 0.01;
                self.pitch = (self.pitch + delta.y * 0.01).clamp(-1.5, 1.5);
            }
            if response.dragged_by(egui::PointerButton::Secondary) {
                self.pan += response.drag_delta();
            }

            let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 && response.hovered() {
                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(1.0, 200.0);
            }

            if self.show_mesh {
                painter.add(egui::Shape::mesh(self.shaded_mesh(rect)));
            }

            if self.show_skeleton {
                let tree = &self.generated.tree;
                for node in &tree.nodes {
                    let a = self.world_to_screen(node.origin, rect);
                    let b = self.world_to_screen(node.distal_end(), rect);
                    painter.line_segment([a, b], egui::Stroke::new(1.0, egui::Color32::LIGHT_GREEN));
                    painter.circle_filled(b, 2.0, egui::Color32::LIGHT_BLUE);
                }
            }
        });
    }
}

/// Soft-failure counts for the status bar, or `None` when nothing was skipped.
fn skipped_summary(report: &BuildReport) -> Option<String> {
    report.degraded().then(|| {
        format!(
            "skipped: tubes = {}, junctions = {}, leaves = {}",
            report.tubes_skipped, report.junctions_skipped, report.leaves_skipped
        )
    })
}

fn channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
    }
}
