use super::*;

#[derive(Debug, Default)]
pub(crate) struct ContainerData {
    pub(crate) children: Vec<NodeRef>,
}

impl NodeRef {
    /// A node that owns an ordered list of children. Children paint in insertion order.
    pub fn container() -> Self {
        Self::from_kind(NodeKind::Container(ContainerData::default()))
    }

    fn with_container<R>(&self, f: impl FnOnce(&ContainerData) -> R) -> Option<R> {
        self.0.borrow().container().map(f)
    }

    fn with_container_mut<R>(&self, f: impl FnOnce(&mut ContainerData) -> R) -> R {
        let mut node = self.0.borrow_mut();
        match &mut node.kind {
            NodeKind::Container(container) => f(container),
            kind => panic!("{:?} nodes cannot hold children", kind.node_type()),
        }
    }

    /// Appends `child`, detaching it from its current parent first.
    ///
    /// # Panics
    ///
    /// If this node is not a container, or `child` is this node or one of its ancestors.
    pub fn add_child(&self, child: &NodeRef) {
        self.detach_for_insert(child);
        self.with_container_mut(|container| container.children.push(child.clone()));
        child.set_parent(Some(self));
    }

    /// Inserts `child` at `index`, detaching it from its current parent first. `index` is
    /// interpreted after the detach.
    ///
    /// # Panics
    ///
    /// If `index` is greater than the number of children, plus the conditions of
    /// [`NodeRef::add_child`].
    pub fn add_child_at(&self, child: &NodeRef, index: usize) {
        self.detach_for_insert(child);
        self.with_container_mut(|container| {
            assert!(
                index <= container.children.len(),
                "child index {index} out of range for {} children",
                container.children.len()
            );
            container.children.insert(index, child.clone());
        });
        child.set_parent(Some(self));
    }

    fn detach_for_insert(&self, child: &NodeRef) {
        assert!(
            child != self && !self.has_ancestor(child),
            "a node cannot be added to itself or to one of its descendants"
        );
        let node_type = self.node_type();
        assert!(
            node_type == NodeType::Container,
            "{node_type:?} nodes cannot hold children"
        );
        child.remove_from_parent();
    }

    /// Removes `child` if it is a direct child. Returns whether it was.
    pub fn remove_child(&self, child: &NodeRef) -> bool {
        let removed = self.with_container_mut(|container| {
            let index = container.children.iter().position(|c| c == child)?;
            Some(container.children.remove(index))
        });

        match removed {
            Some(child) => {
                child.set_parent(None);
                true
            }
            None => false,
        }
    }

    /// Removes and returns the child at `index`.
    ///
    /// # Panics
    ///
    /// If `index` is out of range or this node is not a container.
    pub fn remove_child_at(&self, index: usize) -> NodeRef {
        let child = self.with_container_mut(|container| {
            assert!(
                index < container.children.len(),
                "child index {index} out of range for {} children",
                container.children.len()
            );
            container.children.remove(index)
        });
        child.set_parent(None);
        child
    }

    /// Detaches this node from its parent, if it has one.
    pub fn remove_from_parent(&self) -> bool {
        match self.parent() {
            Some(parent) => parent.remove_child(self),
            None => false,
        }
    }

    pub fn child_at(&self, index: usize) -> Option<NodeRef> {
        self.with_container(|container| container.children.get(index).cloned())
            .flatten()
    }

    pub fn index_of(&self, child: &NodeRef) -> Option<usize> {
        self.with_container(|container| container.children.iter().position(|c| c == child))
            .flatten()
    }

    /// A snapshot of the children, in paint order. Empty for non-containers.
    pub fn children(&self) -> Vec<NodeRef> {
        self.with_container(|container| container.children.clone())
            .unwrap_or_default()
    }

    pub fn child_count(&self) -> usize {
        self.with_container(|container| container.children.len())
            .unwrap_or(0)
    }

    pub(super) fn container_bounds(&self) -> Rect<i32> {
        let mut bounds: Option<Rect<i32>> = None;

        for child in self.children() {
            if !child.visible() {
                continue;
            }

            let child_bounds = child.bounds();
            if child_bounds.is_null() {
                continue;
            }

            bounds = Some(match bounds {
                Some(bounds) => bounds.union(&child_bounds),
                None => child_bounds,
            });
        }

        bounds.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::decoded_image::DecodedImage;
    use crate::geometry::{Point, Rect};
    use crate::node::NodeRef;
    use crate::texture::Texture;

    fn sprite(width: u32, height: u32, x: f32, y: f32) -> NodeRef {
        let texture = Texture::from_image(DecodedImage::solid(width, height, [255; 4])).unwrap();
        let sprite = NodeRef::sprite(texture);
        sprite.set_position(Point::new(x, y));
        sprite
    }

    #[test]
    fn attach_then_detach_clears_parent() {
        let parent = NodeRef::container();
        let child = NodeRef::new();

        parent.add_child(&child);
        assert_eq!(child.parent(), Some(parent.clone()));
        assert_eq!(parent.child_count(), 1);

        assert!(parent.remove_child(&child));
        assert_eq!(child.parent(), None);
        assert_eq!(parent.child_count(), 0);
        assert!(!parent.remove_child(&child));
    }

    #[test]
    fn reparenting_detaches_from_previous_container() {
        let first = NodeRef::container();
        let second = NodeRef::container();
        let child = NodeRef::new();

        first.add_child(&child);
        second.add_child(&child);

        assert_eq!(first.child_count(), 0);
        assert_eq!(second.children(), vec![child.clone()]);
        assert_eq!(child.parent(), Some(second));
    }

    #[test]
    fn insert_at_index_keeps_paint_order() {
        let parent = NodeRef::container();
        let a = NodeRef::new();
        let b = NodeRef::new();
        let c = NodeRef::new();

        parent.add_child(&a);
        parent.add_child(&c);
        parent.add_child_at(&b, 1);

        assert_eq!(parent.children(), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(parent.index_of(&c), Some(2));
        assert_eq!(parent.remove_child_at(0), a);
        assert_eq!(parent.child_at(0), Some(b));
        assert_eq!(parent.child_at(5), None);
    }

    #[test]
    fn readding_a_child_moves_it() {
        let parent = NodeRef::container();
        let a = NodeRef::new();
        let b = NodeRef::new();
        parent.add_child(&a);
        parent.add_child(&b);

        parent.add_child_at(&b, 0);
        assert_eq!(parent.children(), vec![b, a]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn remove_child_at_out_of_range_panics() {
        NodeRef::container().remove_child_at(0);
    }

    #[test]
    #[should_panic(expected = "descendants")]
    fn adding_an_ancestor_panics() {
        let root = NodeRef::container();
        let child = NodeRef::container();
        root.add_child(&child);
        child.add_child(&root);
    }

    #[test]
    #[should_panic(expected = "cannot hold children")]
    fn sprites_cannot_hold_children() {
        let parent = sprite(1, 1, 0.0, 0.0);
        let texture = Texture::from_image(DecodedImage::solid(1, 1, [0; 4])).unwrap();
        parent.add_child(&NodeRef::sprite(texture));
    }

    #[test]
    fn dropping_a_container_clears_back_references() {
        let child = NodeRef::new();
        {
            let parent = NodeRef::container();
            parent.add_child(&child);
        }
        assert_eq!(child.parent(), None);
    }

    #[test]
    fn empty_container_has_zero_bounds() {
        assert_eq!(NodeRef::container().bounds(), Rect::default());
    }

    #[test]
    fn bounds_union_visible_children_only() {
        let root = NodeRef::container();
        let left = sprite(10, 10, 0.0, 0.0);
        let right = sprite(10, 20, 30.0, 5.0);
        let hidden = sprite(10, 10, 100.0, 100.0);
        hidden.set_visible(false);
        root.add_child(&left);
        root.add_child(&right);
        root.add_child(&hidden);
        root.update_transform(true);

        assert_eq!(root.bounds(), Rect::new(0, 0, 40, 25));
    }

    #[test]
    fn container_with_only_invisible_children_has_zero_bounds() {
        let root = NodeRef::container();
        let hidden = sprite(10, 10, 5.0, 5.0);
        hidden.set_visible(false);
        root.add_child(&hidden);
        root.add_child(&NodeRef::container());
        root.update_transform(true);

        assert!(root.bounds().is_null());
    }

    #[test]
    fn local_bounds_ignore_the_parent_transform() {
        let root = NodeRef::container();
        root.set_position(Point::new(50.0, 50.0));
        let child = sprite(4, 4, 1.0, 1.0);
        root.add_child(&child);
        root.update_transform(true);
        assert_eq!(root.bounds(), Rect::new(51, 51, 4, 4));

        assert_eq!(root.local_bounds(), Rect::new(1, 1, 4, 4));
    }
}
