use crate::color::Color;
use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec2, Vec3};

// ---------- Components ----------
#[derive(Component, Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    HemisphereLight { sky: Color, ground: Color, intensity: f32 },
    AmbientLight { color: Color, intensity: f32 },
    UiPanel { text: String, size: Vec2, background: Color },
    Model { source: String, meshes: usize },
    VideoPlane { size: Vec2 },
    XrController { index: usize },
    XrControllerRay { index: usize, length: f32 },
    XrGrip { index: usize, profile: Option<String> },
    /// Follows the camera so children such as the audio listener move with the view.
    CameraRig,
    AudioListener,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::HemisphereLight { .. } => "hemisphere_light",
            NodeKind::AmbientLight { .. } => "ambient_light",
            NodeKind::UiPanel { .. } => "ui_panel",
            NodeKind::Model { .. } => "model",
            NodeKind::VideoPlane { .. } => "video_plane",
            NodeKind::XrController { .. } => "xr_controller",
            NodeKind::XrControllerRay { .. } => "xr_controller_ray",
            NodeKind::XrGrip { .. } => "xr_grip",
            NodeKind::CameraRig => "camera_rig",
            NodeKind::AudioListener => "audio_listener",
        }
    }
}

#[derive(Component, Clone, Copy, Debug)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl Transform3D {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Default::default() }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Visibility(pub bool);

#[derive(Component, Clone, Copy, Debug)]
pub struct Parent(pub Entity);

/// Marks a node as eligible for pointer-driven repositioning.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Draggable;

/// Local-space axis aligned bounds, used for pointer picking.
#[derive(Component, Clone, Copy, Debug)]
pub struct LocalBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl LocalBounds {
    pub fn unit() -> Self {
        Self { min: Vec3::splat(-0.5), max: Vec3::splat(0.5) }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn radius(&self) -> f32 {
        ((self.max - self.min) * 0.5).length()
    }
}

// ---------- Graph ----------
/// Node graph of one scene session. Insertion order is kept so renderers and tests see nodes
/// in the order setup created them.
pub struct SceneGraph {
    world: World,
    order: Vec<Entity>,
    clear_color: Color,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self { world: World::new(), order: Vec::new(), clear_color: Color::default() }
    }

    pub fn spawn(&mut self, name: impl Into<String>, kind: NodeKind, transform: Transform3D) -> Entity {
        let entity =
            self.world.spawn((SceneNode { name: name.into(), kind }, transform, Visibility(true))).id();
        self.order.push(entity);
        entity
    }

    pub fn spawn_child(
        &mut self,
        parent: Entity,
        name: impl Into<String>,
        kind: NodeKind,
        transform: Transform3D,
    ) -> Entity {
        let entity = self.spawn(name, kind, transform);
        self.world.entity_mut(entity).insert(Parent(parent));
        entity
    }

    /// Despawns every node. Returns how many nodes were detached.
    pub fn detach_all(&mut self) -> usize {
        let count = self.order.len();
        for entity in self.order.drain(..) {
            self.world.despawn(entity);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.world.get::<SceneNode>(entity).is_some()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.order.iter().copied()
    }

    pub fn node(&self, entity: Entity) -> Option<&SceneNode> {
        self.world.get::<SceneNode>(entity)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (Entity, &SceneNode)> + '_ {
        self.order.iter().filter_map(|entity| self.world.get::<SceneNode>(*entity).map(|node| (*entity, node)))
    }

    pub fn count_kind(&self, label: &str) -> usize {
        self.nodes().filter(|(_, node)| node.kind.label() == label).count()
    }

    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.world.get::<Parent>(entity).map(|parent| parent.0)
    }

    pub fn transform(&self, entity: Entity) -> Option<Transform3D> {
        self.world.get::<Transform3D>(entity).copied()
    }

    pub fn set_translation(&mut self, entity: Entity, translation: Vec3) -> bool {
        if let Some(mut transform) = self.world.get_mut::<Transform3D>(entity) {
            transform.translation = translation;
            true
        } else {
            false
        }
    }

    pub fn set_scale(&mut self, entity: Entity, scale: Vec3) -> bool {
        if let Some(mut transform) = self.world.get_mut::<Transform3D>(entity) {
            transform.scale = scale;
            true
        } else {
            false
        }
    }

    pub fn set_visible(&mut self, entity: Entity, visible: bool) -> bool {
        if let Some(mut visibility) = self.world.get_mut::<Visibility>(entity) {
            visibility.0 = visible;
            true
        } else {
            false
        }
    }

    pub fn is_visible(&self, entity: Entity) -> bool {
        self.world.get::<Visibility>(entity).map(|v| v.0).unwrap_or(false)
    }

    pub fn visible_count(&self) -> usize {
        self.order.iter().filter(|entity| self.is_visible(**entity)).count()
    }

    pub fn mark_draggable(&mut self, entity: Entity, bounds: LocalBounds) -> bool {
        if !self.contains(entity) {
            return false;
        }
        self.world.entity_mut(entity).insert((Draggable, bounds));
        true
    }

    pub fn is_draggable(&self, entity: Entity) -> bool {
        self.world.get::<Draggable>(entity).is_some()
    }

    pub fn bounds(&self, entity: Entity) -> Option<LocalBounds> {
        self.world.get::<LocalBounds>(entity).copied()
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_keeps_insertion_order() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", NodeKind::AudioListener, Transform3D::default());
        let b = graph.spawn(
            "b",
            NodeKind::AmbientLight { color: Color::WHITE, intensity: 0.5 },
            Transform3D::default(),
        );
        assert_eq!(graph.entities().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(graph.count_kind("ambient_light"), 1);
    }

    #[test]
    fn detach_all_empties_graph() {
        let mut graph = SceneGraph::new();
        let parent = graph.spawn("controller", NodeKind::XrController { index: 0 }, Transform3D::default());
        let child = graph.spawn_child(
            parent,
            "ray",
            NodeKind::XrControllerRay { index: 0, length: 5.0 },
            Transform3D::default(),
        );
        assert_eq!(graph.parent(child), Some(parent));
        assert_eq!(graph.detach_all(), 2);
        assert!(graph.is_empty());
        assert!(!graph.contains(parent));
    }

    #[test]
    fn draggable_requires_existing_node() {
        let mut graph = SceneGraph::new();
        let model = graph.spawn(
            "model",
            NodeKind::Model { source: "a.glb".into(), meshes: 1 },
            Transform3D::default(),
        );
        assert!(graph.mark_draggable(model, LocalBounds::unit()));
        assert!(graph.is_draggable(model));
        graph.detach_all();
        assert!(!graph.mark_draggable(model, LocalBounds::unit()));
    }
}
