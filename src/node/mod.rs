//! The scene graph.
//!
//! Every node is a [`NodeRef`], a shared handle to a node of one of four kinds: plain nodes
//! that only carry a transform, containers that own an ordered list of children, sprites and
//! texts. Children hold a weak back-reference to their container.
//!
//! Geometric setters only touch the node when the value actually changes. A change bumps the
//! node's revision and marks cached sprite/text vertices dirty; vertices are recomputed lazily
//! the next time they are needed.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::TransformError;
use crate::geometry::{Point, Rect};
use crate::matrix::Matrix3;
use crate::trig;

mod container;
mod sprite;
mod text;

pub(crate) use container::ContainerData;
pub(crate) use sprite::SpriteData;
pub(crate) use text::TextData;

/// What a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Plain,
    Container,
    Sprite,
    Text,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Plain,
    Container(ContainerData),
    Sprite(SpriteData),
    Text(TextData),
}

impl NodeKind {
    fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Plain => NodeType::Plain,
            NodeKind::Container(_) => NodeType::Container,
            NodeKind::Sprite(_) => NodeType::Sprite,
            NodeKind::Text(_) => NodeType::Text,
        }
    }

    fn mark_dirty(&mut self) {
        match self {
            NodeKind::Sprite(sprite) => sprite.texture_dirty = true,
            NodeKind::Text(text) => text.dirty = true,
            NodeKind::Plain | NodeKind::Container(_) => {}
        }
    }
}

pub(crate) struct Node {
    position: Point<f32>,
    scale: Point<f32>,
    pivot: Point<i32>,
    skew: Point<i32>,
    rotation: f32,
    alpha: f32,
    visible: bool,
    renderable: bool,
    local_transform: Matrix3,
    pub(crate) world_transform: Matrix3,
    pub(crate) world_alpha: f32,
    parent: Weak<RefCell<Node>>,
    revision: u64,
    pub(crate) kind: NodeKind,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            position: Point::default(),
            scale: Point::new(1.0, 1.0),
            pivot: Point::default(),
            skew: Point::default(),
            rotation: 0.0,
            alpha: 1.0,
            visible: true,
            renderable: true,
            local_transform: Matrix3::IDENTITY,
            world_transform: Matrix3::IDENTITY,
            world_alpha: 1.0,
            parent: Weak::new(),
            revision: 0,
            kind,
        }
    }

    fn state_changed(&mut self) {
        self.revision += 1;
        self.kind.mark_dirty();
    }

    /// Writes `value` through `field`, running the state-changed hook first, but only when the
    /// value differs from the current one.
    fn update_property<T: PartialEq>(&mut self, field: fn(&mut Node) -> &mut T, value: T) {
        if *field(self) == value {
            return;
        }
        self.state_changed();
        *field(self) = value;
    }

    fn compute_local_transform(&self) -> Matrix3 {
        let skew = Matrix3::skew(trig::tan(self.skew.x as f32), trig::tan(self.skew.y as f32));
        let pivot = Point::new(self.pivot.x as f32, self.pivot.y as f32);

        skew * Matrix3::translation(self.position.x, self.position.y)
            * Matrix3::translation(pivot.x, pivot.y)
            * Matrix3::rotation(self.rotation)
            * Matrix3::scaling(self.scale.x, self.scale.y)
            * Matrix3::translation(-pivot.x, -pivot.y)
    }

    /// Recomputes the local and world transforms of this node only.
    ///
    /// The world transform composes against the parent's *local* transform. Containers update
    /// themselves before their children, so one level of nesting is always accounted for.
    fn update_own_transform(&mut self, use_identity_parent: bool) {
        let local = self.compute_local_transform();
        self.local_transform = local;

        let parent = if use_identity_parent {
            None
        } else {
            self.parent.upgrade()
        };
        let (world, world_alpha) = match parent {
            Some(parent) => {
                let parent = parent.borrow();
                (local * parent.local_transform, self.alpha * parent.alpha)
            }
            None => (local, self.alpha),
        };

        if world != self.world_transform {
            self.kind.mark_dirty();
        }
        self.world_transform = world;
        self.world_alpha = world_alpha;
    }

    /// Whether the render walk should draw this node (and, for containers, its subtree).
    pub(crate) fn is_renderable(&self) -> bool {
        self.visible && self.alpha > 0.0 && self.renderable
    }

    pub(crate) fn container(&self) -> Option<&ContainerData> {
        match &self.kind {
            NodeKind::Container(container) => Some(container),
            _ => None,
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if let NodeKind::Container(container) = &self.kind {
            for child in &container.children {
                if let Ok(mut child) = child.0.try_borrow_mut() {
                    child.parent = Weak::new();
                }
            }
        }
    }
}

/// Shared handle to a scene node.
///
/// Cloning the handle shares the node. Two handles compare equal when they point at the same
/// node.
#[derive(Clone)]
pub struct NodeRef(Rc<RefCell<Node>>);

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(node) => f
                .debug_struct("NodeRef")
                .field("type", &node.kind.node_type())
                .field("position", &node.position)
                .field("visible", &node.visible)
                .field("revision", &node.revision)
                .finish(),
            Err(_) => f.write_str("NodeRef(<borrowed>)"),
        }
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRef {
    /// A plain node: a transform without children or visuals.
    pub fn new() -> Self {
        Self::from_kind(NodeKind::Plain)
    }

    pub(crate) fn from_kind(kind: NodeKind) -> Self {
        Self(Rc::new(RefCell::new(Node::new(kind))))
    }

    pub(crate) fn borrow(&self) -> Ref<'_, Node> {
        self.0.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, Node> {
        self.0.borrow_mut()
    }

    pub fn node_type(&self) -> NodeType {
        self.0.borrow().kind.node_type()
    }

    pub fn position(&self) -> Point<f32> {
        self.0.borrow().position
    }

    pub fn set_position(&self, position: Point<f32>) {
        self.0
            .borrow_mut()
            .update_property(|node| &mut node.position, position);
    }

    pub fn scale(&self) -> Point<f32> {
        self.0.borrow().scale
    }

    pub fn set_scale(&self, scale: Point<f32>) {
        self.0
            .borrow_mut()
            .update_property(|node| &mut node.scale, scale);
    }

    pub fn pivot(&self) -> Point<i32> {
        self.0.borrow().pivot
    }

    pub fn set_pivot(&self, pivot: Point<i32>) {
        self.0
            .borrow_mut()
            .update_property(|node| &mut node.pivot, pivot);
    }

    /// Skew angles in radians.
    pub fn skew(&self) -> Point<i32> {
        self.0.borrow().skew
    }

    pub fn set_skew(&self, skew: Point<i32>) {
        self.0
            .borrow_mut()
            .update_property(|node| &mut node.skew, skew);
    }

    /// Rotation in radians.
    pub fn rotation(&self) -> f32 {
        self.0.borrow().rotation
    }

    pub fn set_rotation(&self, rotation: f32) {
        self.0
            .borrow_mut()
            .update_property(|node| &mut node.rotation, rotation);
    }

    pub fn alpha(&self) -> f32 {
        self.0.borrow().alpha
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.0
            .borrow_mut()
            .update_property(|node| &mut node.alpha, alpha);
    }

    pub fn visible(&self) -> bool {
        self.0.borrow().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.0
            .borrow_mut()
            .update_property(|node| &mut node.visible, visible);
    }

    pub fn renderable(&self) -> bool {
        self.0.borrow().renderable
    }

    /// Excludes the node (and its subtree) from rendering without hiding it from bounds.
    pub fn set_renderable(&self, renderable: bool) {
        self.0.borrow_mut().renderable = renderable;
    }

    /// Incremented every time a geometric property actually changes.
    pub fn revision(&self) -> u64 {
        self.0.borrow().revision
    }

    pub fn local_transform(&self) -> Matrix3 {
        self.0.borrow().local_transform
    }

    pub fn world_transform(&self) -> Matrix3 {
        self.0.borrow().world_transform
    }

    pub fn world_alpha(&self) -> f32 {
        self.0.borrow().world_alpha
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.0.borrow().parent.upgrade().map(NodeRef)
    }

    pub(crate) fn set_parent(&self, parent: Option<&NodeRef>) {
        self.0.borrow_mut().parent = parent.map_or_else(Weak::new, |parent| Rc::downgrade(&parent.0));
    }

    /// Whether `ancestor` is this node's parent, grandparent, and so on.
    pub fn has_ancestor(&self, ancestor: &NodeRef) -> bool {
        let mut current = self.parent();
        while let Some(node) = current {
            if node == *ancestor {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Recomputes local and world transforms.
    ///
    /// With `use_identity_parent` the node is treated as a root. Containers return immediately
    /// when invisible; otherwise they update themselves and then each child against them.
    pub fn update_transform(&self, use_identity_parent: bool) {
        let child_count = {
            let mut node = self.0.borrow_mut();
            if let NodeKind::Container(_) = node.kind {
                if !node.visible {
                    return;
                }
            }
            node.update_own_transform(use_identity_parent);
            node.container().map_or(0, |container| container.children.len())
        };

        for index in 0..child_count {
            if let Some(child) = self.child_at(index) {
                child.update_transform(false);
            }
        }
    }

    /// False when this node or any of its ancestors is invisible.
    pub fn is_visible(&self) -> bool {
        if !self.visible() {
            return false;
        }

        let mut current = self.parent();
        while let Some(node) = current {
            if !node.visible() {
                return false;
            }
            current = node.parent();
        }
        true
    }

    /// Integer bounding box of what the node draws, in world space.
    ///
    /// Containers report the union of their visible children's non-null bounds, sprites the box
    /// around their quad, texts the box around their laid-out glyphs. Plain nodes and empty
    /// containers report the zero rectangle.
    pub fn bounds(&self) -> Rect<i32> {
        match self.node_type() {
            NodeType::Plain => Rect::default(),
            NodeType::Container => self.container_bounds(),
            NodeType::Sprite => self.sprite_bounds(),
            NodeType::Text => self.text_bounds(),
        }
    }

    /// Like [`NodeRef::bounds`], but containers first re-derive each child's transforms as if
    /// the child were a root.
    pub fn local_bounds(&self) -> Rect<i32> {
        if self.node_type() == NodeType::Container {
            for child in self.children() {
                child.update_transform(true);
            }
        }
        self.bounds()
    }

    /// Maps a point from this node's space to world space.
    pub fn to_global_position(&self, position: Point<f32>) -> Point<f32> {
        self.update_transform(false);
        self.world_transform().transform_point(position)
    }

    /// Maps a world-space point into this node's space. When `from` is given, `position` is
    /// first taken from `from`'s space into world space.
    pub fn to_local_position(
        &self,
        position: Point<f32>,
        from: Option<&NodeRef>,
    ) -> Result<Point<f32>, TransformError> {
        let global = match from {
            Some(from) => from.to_global_position(position),
            None => position,
        };

        self.update_transform(false);
        let inverse = self.world_transform().inverse()?;
        Ok(inverse.transform_point(global))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approximately_equal(a: Point<f32>, b: Point<f32>) {
        assert!(
            (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn redundant_writes_do_not_bump_revision() {
        let node = NodeRef::new();
        node.set_position(Point::new(0.0, 0.0));
        node.set_scale(Point::new(1.0, 1.0));
        node.set_alpha(1.0);
        node.set_visible(true);
        node.set_rotation(0.0);
        assert_eq!(node.revision(), 0);

        node.set_position(Point::new(5.0, 0.0));
        node.set_position(Point::new(5.0, 0.0));
        assert_eq!(node.revision(), 1);
    }

    #[test]
    fn local_transform_rotates_around_pivot() {
        let node = NodeRef::new();
        node.set_pivot(Point::new(10, 0));
        node.set_rotation(std::f32::consts::FRAC_PI_2);
        node.update_transform(true);

        // The pivot itself stays put.
        assert_approximately_equal(
            node.world_transform().transform_point(Point::new(10.0, 0.0)),
            Point::new(10.0, 0.0),
        );
        assert_approximately_equal(
            node.world_transform().transform_point(Point::new(0.0, 0.0)),
            Point::new(10.0, -10.0),
        );
    }

    #[test]
    fn identity_parent_ignores_parent_transform() {
        let parent = NodeRef::container();
        parent.set_position(Point::new(100.0, 0.0));
        parent.set_alpha(0.5);
        let child = NodeRef::new();
        child.set_position(Point::new(1.0, 2.0));
        parent.add_child(&child);

        parent.update_transform(true);
        assert_approximately_equal(
            child.world_transform().translation_part(),
            Point::new(101.0, 2.0),
        );
        assert_eq!(child.world_alpha(), 0.5);

        child.update_transform(true);
        assert_approximately_equal(
            child.world_transform().translation_part(),
            Point::new(1.0, 2.0),
        );
        assert_eq!(child.world_alpha(), 1.0);
    }

    #[test]
    fn invisible_container_skips_transform_update() {
        let parent = NodeRef::container();
        let child = NodeRef::new();
        parent.add_child(&child);
        parent.set_visible(false);
        child.set_position(Point::new(3.0, 3.0));

        parent.update_transform(true);
        assert_eq!(child.world_transform(), Matrix3::IDENTITY);
    }

    #[test]
    fn visibility_follows_the_ancestor_chain() {
        let root = NodeRef::container();
        let middle = NodeRef::container();
        let leaf = NodeRef::new();
        root.add_child(&middle);
        middle.add_child(&leaf);

        assert!(leaf.is_visible());
        root.set_visible(false);
        assert!(!leaf.is_visible());
        root.set_visible(true);
        leaf.set_visible(false);
        assert!(!leaf.is_visible());
    }

    #[test]
    fn global_and_local_positions_invert_each_other() {
        let node = NodeRef::new();
        node.set_position(Point::new(20.0, -5.0));
        node.set_scale(Point::new(2.0, 4.0));
        node.set_rotation(0.3);

        let global = node.to_global_position(Point::new(3.0, 7.0));
        let local = node.to_local_position(global, None).unwrap();
        assert_approximately_equal(local, Point::new(3.0, 7.0));
    }

    #[test]
    fn local_position_from_another_node() {
        let a = NodeRef::new();
        a.set_position(Point::new(10.0, 0.0));
        let b = NodeRef::new();
        b.set_position(Point::new(0.0, 10.0));

        let point = b.to_local_position(Point::new(1.0, 1.0), Some(&a)).unwrap();
        assert_approximately_equal(point, Point::new(11.0, -9.0));
    }

    #[test]
    fn zero_scale_makes_local_position_fail() {
        let node = NodeRef::new();
        node.set_scale(Point::new(0.0, 1.0));
        assert!(matches!(
            node.to_local_position(Point::new(1.0, 1.0), None),
            Err(TransformError::Singular { .. })
        ));
    }

    #[test]
    fn plain_nodes_have_zero_bounds() {
        assert!(NodeRef::new().bounds().is_null());
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = NodeRef::new();
        let b = NodeRef::new();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
