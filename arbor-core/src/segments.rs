use glam::Vec3;

use crate::tree::{NodeId, Tree};

/// Straight stem of one child branch, plus the tangents of its neighbours.
///
/// `start` is the parent's distal end (which equals the child's origin) and
/// `end` is the child's distal end.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub start: Vec3,
    pub end: Vec3,
    /// Level of the child branch.
    pub level: u32,
    /// Parent direction, used as the leaving tangent.
    pub start_dir: Vec3,
    /// Child direction, used as the arriving tangent.
    pub end_dir: Vec3,
    pub start_radius: f32,
    /// Mean radius of the child's own children, or its radius if it has none.
    pub end_radius: f32,
    pub parent: NodeId,
    pub child: NodeId,
    /// `true` when the child is a branch tip.
    pub terminal: bool,
}

impl Segment {
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Flattens the tree into one segment per parent→child edge.
///
/// Segments come out in pre-order, so `extract(tree).len() == tree.len() - 1`
/// and the i-th segment belongs to the (i+1)-th node of [`Tree::preorder`].
pub fn extract(tree: &Tree) -> Vec<Segment> {
    let mut out = Vec::with_capacity(tree.len().saturating_sub(1));
    for id in tree.preorder() {
        let node = tree.node(id);
        let Some(parent) = node.parent else {
            continue;
        };
        out.push(Segment {
            start: node.origin,
            end: node.distal_end(),
            level: node.level,
            start_dir: tree.node(parent).direction,
            end_dir: node.direction,
            start_radius: node.radius,
            end_radius: mean_child_radius(tree, id).unwrap_or(node.radius),
            parent,
            child: id,
            terminal: node.is_leaf(),
        });
    }
    out
}

fn mean_child_radius(tree: &Tree, id: NodeId) -> Option<f32> {
    let children = &tree.node(id).children;
    if children.is_empty() {
        return None;
    }
    let sum: f32 = children.iter().map(|&c| tree.node(c).radius).sum();
    Some(sum / children.len() as f32)
}
