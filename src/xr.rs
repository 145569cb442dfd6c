use crate::config::XrConfig;
use crate::platform::XrRuntime;
use crate::scene::{NodeKind, SceneGraph, Transform3D};
use bevy_ecs::prelude::Entity;
use glam::Vec3;
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerBinding {
    pub index: usize,
    pub controller: Entity,
    pub ray: Entity,
    pub grip: Option<Entity>,
}

/// Controller visuals: a target-ray line per controller and a grip model where the runtime
/// exposes one. Missing controllers are skipped, never fatal.
#[derive(Debug, Default, Clone)]
pub struct XrControllerRig {
    bindings: Vec<ControllerBinding>,
}

impl XrControllerRig {
    pub fn attach(graph: &mut SceneGraph, runtime: Option<&dyn XrRuntime>, config: &XrConfig) -> Self {
        let Some(runtime) = runtime else {
            debug!("No XR runtime; controller visuals skipped");
            return Self::default();
        };
        let mut bindings = Vec::new();
        for index in 0..config.controller_count {
            let space = match runtime.controller(index) {
                Ok(space) => space,
                Err(err) => {
                    warn!("XR controller {index} unavailable: {err:#}");
                    continue;
                }
            };
            let controller = graph.spawn(
                format!("xr_controller_{index}"),
                NodeKind::XrController { index },
                Transform3D::default(),
            );
            let mut ray_transform = Transform3D::default();
            ray_transform.scale = Vec3::new(1.0, 1.0, config.ray_length);
            let ray = graph.spawn_child(
                controller,
                format!("xr_controller_ray_{index}"),
                NodeKind::XrControllerRay { index, length: config.ray_length },
                ray_transform,
            );
            let grip = space.has_grip.then(|| {
                graph.spawn(
                    format!("xr_grip_{index}"),
                    NodeKind::XrGrip { index, profile: space.profile.clone() },
                    Transform3D::default(),
                )
            });
            bindings.push(ControllerBinding { index, controller, ray, grip });
        }
        Self { bindings }
    }

    pub fn bindings(&self) -> &[ControllerBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
