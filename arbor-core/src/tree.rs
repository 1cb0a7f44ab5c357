use glam::Vec3;

/// Identifier for a branch in a [`Tree`].
///
/// This is an index into `Tree::nodes`, and is only meaningful within
/// the lifetime of a given `Tree` instance.
pub type NodeId = usize;

/// One branch of the tree: a straight stem starting at `origin`.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchNode {
    pub origin: Vec3,
    /// Unit growth direction.
    pub direction: Vec3,
    pub length: f32,
    pub radius: f32,
    /// Recursion depth, `0` for the trunk.
    pub level: u32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena of branches; index `0` is always the trunk.
///
/// Children are only ever appended, so a node's id is stable for the
/// lifetime of the tree and every child id is larger than its parent's.
#[derive(Clone, Debug)]
pub struct Tree {
    pub nodes: Vec<BranchNode>,
}

impl BranchNode {
    pub fn new_root(origin: Vec3, direction: Vec3, length: f32, radius: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or(Vec3::Y),
            length: length.max(0.0),
            radius: radius.max(0.0),
            level: 0,
            parent: None,
            children: Vec::with_capacity(4),
        }
    }

    /// Point where this branch ends and its children begin.
    #[inline]
    pub fn distal_end(&self) -> Vec3 {
        self.origin + self.direction * self.length
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl Tree {
    /// Creates a tree holding only a trunk.
    pub fn new(origin: Vec3, direction: Vec3, length: f32, radius: f32) -> Self {
        Self {
            nodes: vec![BranchNode::new_root(origin, direction, length, radius)],
        }
    }

    pub const ROOT: NodeId = 0;

    pub fn root(&self) -> &BranchNode {
        &self.nodes[Self::ROOT]
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &BranchNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a child to `parent`, anchored at the parent's distal end.
    ///
    /// The child's origin is always the parent's distal end.
    ///
    /// ### Panics
    /// Panics if `parent` is not a valid id.
    pub fn add_child(&mut self, parent: NodeId, direction: Vec3, length: f32, radius: f32) -> NodeId {
        let id = self.nodes.len();
        let p = &self.nodes[parent];
        let child = BranchNode {
            origin: p.distal_end(),
            direction: direction.normalize_or(p.direction),
            length: length.max(0.0),
            radius: radius.max(0.0),
            level: p.level + 1,
            parent: Some(parent),
            children: Vec::with_capacity(4),
        };
        self.nodes.push(child);
        self.nodes[parent].children.push(id);
        id
    }

    #[inline]
    pub fn distal_end(&self, id: NodeId) -> Vec3 {
        self.nodes[id].distal_end()
    }

    /// Largest `level` found in the tree.
    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.level).max().unwrap_or(0)
    }

    pub fn count_at_depth(&self, level: u32) -> usize {
        self.nodes.iter().filter(|n| n.level == level).count()
    }

    /// Ids of every branch without children.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, n)| n.is_leaf().then_some(id))
    }

    /// Depth-first, parent-before-children traversal from the trunk.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return out;
        }
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            out.push(id);
            // Reverse so the first child is visited first.
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trunk() -> Tree {
        Tree::new(Vec3::ZERO, Vec3::Y, 2.0, 0.5)
    }

    #[test]
    fn new_tree_has_single_root() {
        let tree = trunk();
        assert_eq!(tree.len(), 1);
        assert!(tree.root().parent.is_none());
        assert_eq!(tree.root().level, 0);
        assert_eq!(tree.distal_end(Tree::ROOT), Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn add_child_anchors_at_parent_tip_and_links_both_ways() {
        let mut tree = trunk();
        let c = tree.add_child(Tree::ROOT, Vec3::new(3.0, 0.0, 0.0), 1.0, 0.2);

        assert_eq!(c, 1);
        let child = tree.node(c);
        assert_eq!(child.origin, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(child.direction, Vec3::X);
        assert_eq!(child.level, 1);
        assert_eq!(child.parent, Some(Tree::ROOT));
        assert_eq!(tree.root().children, vec![c]);
    }

    #[test]
    fn zero_direction_falls_back_to_parent_direction() {
        let mut tree = trunk();
        let c = tree.add_child(Tree::ROOT, Vec3::ZERO, 1.0, 0.2);
        assert_eq!(tree.node(c).direction, Vec3::Y);
    }

    #[test]
    fn negative_length_and_radius_are_clamped() {
        let mut tree = trunk();
        let c = tree.add_child(Tree::ROOT, Vec3::Y, -1.0, -0.5);
        assert_eq!(tree.node(c).length, 0.0);
        assert_eq!(tree.node(c).radius, 0.0);
    }

    #[test]
    fn preorder_visits_subtrees_in_child_order() {
        let mut tree = trunk();
        let a = tree.add_child(Tree::ROOT, Vec3::X, 1.0, 0.1);
        let b = tree.add_child(Tree::ROOT, Vec3::Z, 1.0, 0.1);
        let a1 = tree.add_child(a, Vec3::Y, 1.0, 0.1);

        assert_eq!(tree.preorder(), vec![Tree::ROOT, a, a1, b]);
        assert_eq!(tree.leaves().collect::<Vec<_>>(), vec![b, a1]);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.count_at_depth(1), 2);
    }
}
