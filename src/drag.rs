use crate::scene::SceneGraph;
use bevy_ecs::prelude::Entity;
use glam::Vec3;

#[derive(Debug, Clone, Copy)]
struct ActiveDrag {
    entity: Entity,
    offset: Vec3,
    plane_origin: Vec3,
    plane_normal: Vec3,
}

/// Pointer drag of scene nodes on a camera-facing plane.
///
/// The target list is append-only for the lifetime of a session: rebinding after an upload
/// keeps every earlier entity.
#[derive(Debug, Default)]
pub struct DragControls {
    targets: Vec<Entity>,
    active: Option<ActiveDrag>,
}

impl DragControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> &[Entity] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Re-registers the drag set from the graph's draggable nodes, preserving existing order.
    pub fn rebind(&mut self, graph: &SceneGraph) -> usize {
        for entity in graph.entities() {
            if graph.is_draggable(entity) && !self.targets.contains(&entity) {
                self.targets.push(entity);
            }
        }
        self.targets.len()
    }

    pub fn is_target(&self, entity: Entity) -> bool {
        self.targets.contains(&entity)
    }

    /// Closest registered target whose bounding sphere the ray hits.
    pub fn pick(&self, graph: &SceneGraph, origin: Vec3, direction: Vec3) -> Option<Entity> {
        let dir = direction.normalize_or_zero();
        if dir.length_squared() <= f32::EPSILON {
            return None;
        }
        let mut closest: Option<(Entity, f32)> = None;
        for entity in &self.targets {
            let (Some(transform), Some(bounds)) = (graph.transform(*entity), graph.bounds(*entity)) else {
                continue;
            };
            let max_scale =
                transform.scale.x.abs().max(transform.scale.y.abs()).max(transform.scale.z.abs()).max(0.0001);
            let center = transform.translation + transform.rotation * (bounds.center() * transform.scale);
            let radius = bounds.radius() * max_scale;
            if radius <= 0.0 {
                continue;
            }
            if let Some(distance) = ray_sphere_intersection(origin, dir, center, radius) {
                match closest {
                    Some((_, best)) if distance >= best => {}
                    _ => closest = Some((*entity, distance)),
                }
            }
        }
        closest.map(|(entity, _)| entity)
    }

    /// Starts dragging `entity` on the plane through its origin facing the camera.
    pub fn start(
        &mut self,
        graph: &SceneGraph,
        entity: Entity,
        ray: (Vec3, Vec3),
        camera_forward: Vec3,
    ) -> bool {
        let Some(transform) = graph.transform(entity) else {
            return false;
        };
        let plane_normal = camera_forward.normalize_or_zero();
        if plane_normal.length_squared() <= f32::EPSILON {
            return false;
        }
        let plane_origin = transform.translation;
        let Some(hit) = intersect_ray_plane(ray.0, ray.1, plane_origin, plane_normal) else {
            return false;
        };
        self.active = Some(ActiveDrag { entity, offset: plane_origin - hit, plane_origin, plane_normal });
        true
    }

    /// Moves the dragged entity under the pointer. Returns the new translation.
    pub fn update(&mut self, graph: &mut SceneGraph, ray: (Vec3, Vec3)) -> Option<Vec3> {
        let drag = self.active?;
        let hit = intersect_ray_plane(ray.0, ray.1, drag.plane_origin, drag.plane_normal)?;
        let translation = hit + drag.offset;
        graph.set_translation(drag.entity, translation).then_some(translation)
    }

    pub fn finish(&mut self) -> Option<Entity> {
        self.active.take().map(|drag| drag.entity)
    }

    pub fn active(&self) -> Option<Entity> {
        self.active.map(|drag| drag.entity)
    }
}

pub fn intersect_ray_plane(origin: Vec3, dir: Vec3, plane_origin: Vec3, plane_normal: Vec3) -> Option<Vec3> {
    let denom = plane_normal.dot(dir);
    if denom.abs() < 1e-4 {
        return None;
    }
    let t = (plane_origin - origin).dot(plane_normal) / denom;
    if t < 0.0 {
        return None;
    }
    Some(origin + dir * t)
}

pub fn ray_sphere_intersection(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let mut t = -b - sqrt_d;
    if t < 0.0 {
        t = -b + sqrt_d;
    }
    if t < 0.0 {
        return None;
    }
    Some(t)
}
