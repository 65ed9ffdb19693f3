//! Scene graph behavior through the public API.
use trellis::{
    DecodedImage, NodeRef, Point, RecordingBackend, Rect, Renderer, RendererSettings, Size,
    Texture,
};

fn sprite(width: u32, height: u32, x: f32, y: f32) -> NodeRef {
    let texture = Texture::from_image(DecodedImage::solid(width, height, [255; 4])).unwrap();
    let sprite = NodeRef::sprite(texture);
    sprite.set_position(Point::new(x, y));
    sprite
}

fn assert_close(a: Point<f32>, b: Point<f32>) {
    assert!(
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4,
        "{a:?} != {b:?}"
    );
}

#[test]
fn child_transform_composes_with_the_parent_local_transform() {
    let root = NodeRef::container();
    let parent = NodeRef::container();
    parent.set_position(Point::new(10.0, 0.0));
    parent.set_scale(Point::new(2.0, 2.0));
    let child = NodeRef::new();
    child.set_position(Point::new(1.0, 0.0));
    root.add_child(&parent);
    parent.add_child(&child);

    root.update_transform(true);

    // The parent maps the point first; the child's offset is added unscaled.
    assert_close(child.world_transform().translation_part(), Point::new(11.0, 0.0));
    assert_close(
        child.to_global_position(Point::new(1.0, 0.0)),
        Point::new(13.0, 0.0),
    );
}

#[test]
fn world_alpha_multiplies_with_the_parent() {
    let parent = NodeRef::container();
    parent.set_alpha(0.5);
    let child = NodeRef::new();
    child.set_alpha(0.5);
    parent.add_child(&child);

    parent.update_transform(true);
    assert_eq!(child.world_alpha(), 0.25);
}

#[test]
fn detached_child_forgets_its_parent() {
    let parent = NodeRef::container();
    let child = sprite(2, 2, 0.0, 0.0);
    parent.add_child(&child);

    assert!(child.remove_from_parent());
    assert_eq!(child.parent(), None);
    assert!(parent.children().is_empty());
    assert!(!child.remove_from_parent());
}

#[test]
fn dropping_the_parent_orphans_its_children() {
    let child = NodeRef::new();
    {
        let parent = NodeRef::container();
        parent.add_child(&child);
        assert!(child.parent().is_some());
    }
    assert_eq!(child.parent(), None);
}

#[test]
fn container_bounds_enclose_visible_children() {
    let root = NodeRef::container();
    root.add_child(&sprite(4, 4, 2.0, 3.0));
    root.add_child(&sprite(2, 2, 10.0, 10.0));
    let hidden = sprite(50, 50, 100.0, 100.0);
    hidden.set_visible(false);
    root.add_child(&hidden);

    root.update_transform(true);
    assert_eq!(root.bounds(), Rect::new(2, 3, 10, 9));
}

#[test]
fn container_without_drawable_children_has_null_bounds() {
    let root = NodeRef::container();
    root.add_child(&NodeRef::new());
    root.add_child(&NodeRef::container());
    let hidden = sprite(4, 4, 5.0, 5.0);
    hidden.set_visible(false);
    root.add_child(&hidden);

    assert!(root.bounds().is_null());
}

#[test]
fn redundant_setters_leave_the_revision_alone() {
    let node = sprite(4, 4, 3.0, 4.0);
    let revision = node.revision();

    node.set_position(Point::new(3.0, 4.0));
    node.set_visible(true);
    node.set_alpha(1.0);
    assert_eq!(node.revision(), revision);

    node.set_alpha(0.5);
    assert_eq!(node.revision(), revision + 1);
}

#[test]
fn local_and_global_positions_round_trip_through_a_hierarchy() {
    let root = NodeRef::container();
    root.set_position(Point::new(-7.0, 12.0));
    let node = NodeRef::container();
    node.set_position(Point::new(3.0, 4.0));
    node.set_rotation(0.7);
    node.set_scale(Point::new(1.5, 0.5));
    root.add_child(&node);

    let global = node.to_global_position(Point::new(5.0, -2.0));
    let local = node.to_local_position(global, None).unwrap();
    assert_close(local, Point::new(5.0, -2.0));
}

#[test]
fn moving_a_sprite_between_frames_moves_its_quad() {
    let mut renderer = Renderer::new(
        RecordingBackend::new(),
        Size::new(64.0, 64.0),
        RendererSettings::default(),
    )
    .unwrap();
    let root = NodeRef::container();
    let node = sprite(4, 4, 0.0, 0.0);
    root.add_child(&node);

    renderer.render(&root).unwrap();
    assert_eq!(node.vertices()[0], Point::new(0.0, 0.0));

    node.set_position(Point::new(8.0, 2.0));
    renderer.render(&root).unwrap();
    assert_eq!(node.vertices()[0], Point::new(8.0, 2.0));
    assert_eq!(node.vertices()[2], Point::new(12.0, 6.0));
}
