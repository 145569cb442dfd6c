use crate::config::{CameraConfig, ControlsConfig};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

const DEFAULT_UP: Vec3 = Vec3::Y;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Perspective camera shared by the orbit controls, drag picking, and the render surface.
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, target, up: DEFAULT_UP, fov_y_radians, aspect: 1.0, near, far }
    }

    pub fn from_config(config: &CameraConfig, viewport: PhysicalSize<u32>) -> Self {
        let mut camera = Self::new(
            config.position_vec(),
            config.target_vec(),
            config.fov_degrees.to_radians(),
            config.near,
            config.far,
        );
        camera.set_viewport(viewport);
        camera
    }

    /// Recomputes the aspect ratio after a viewport change.
    pub fn set_viewport(&mut self, viewport: PhysicalSize<u32>) {
        self.aspect = aspect_ratio(viewport);
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, self.aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Generates a world-space ray originating from the camera through a screen-space position.
    pub fn screen_ray(&self, screen: Vec2, viewport: PhysicalSize<u32>) -> Option<(Vec3, Vec3)> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let ndc_x = (2.0 * screen.x / viewport.width as f32) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen.y / viewport.height as f32);
        let clip = Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let inv_view_proj = self.view_projection().inverse();
        let world = inv_view_proj * clip;
        if world.w.abs() < f32::EPSILON {
            return None;
        }
        let dir = ((world.truncate() / world.w) - self.position).normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }
        Some((self.position, dir))
    }
}

pub fn aspect_ratio(viewport: PhysicalSize<u32>) -> f32 {
    if viewport.height > 0 {
        viewport.width as f32 / viewport.height as f32
    } else {
        1.0
    }
}

/// Orbit-style controller storing yaw/pitch around a target.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub radius: f32,
    pub yaw_radians: f32,
    pub pitch_radians: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, radius: f32) -> Self {
        Self { target, radius: radius.max(0.01), yaw_radians: 0.0, pitch_radians: 0.0 }
    }

    pub fn from_camera(camera: &Camera3D) -> Self {
        let offset = camera.position - camera.target;
        let radius = offset.length().max(0.01);
        let yaw_radians = offset.x.atan2(offset.z);
        let pitch_radians = (-offset.y / radius).clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
        Self { target: camera.target, radius, yaw_radians, pitch_radians }
    }

    pub fn position(&self) -> Vec3 {
        let rotation = Quat::from_euler(glam::EulerRot::YXZ, self.yaw_radians, self.pitch_radians, 0.0);
        self.target + rotation * Vec3::new(0.0, 0.0, self.radius)
    }

    pub fn apply_to(&self, camera: &mut Camera3D) {
        camera.position = self.position();
        camera.target = self.target;
    }

    pub fn orbit(&mut self, delta: Vec2) {
        self.yaw_radians += delta.x;
        self.pitch_radians = (self.pitch_radians + delta.y).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn zoom(&mut self, factor: f32) {
        self.radius = (self.radius * factor).clamp(0.1, 10_000.0);
    }
}

/// Pointer-driven orbit controls with optional inertial damping.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    orbit: OrbitCamera,
    enabled: bool,
    damping: Option<f32>,
    rotate_speed: f32,
    pending: Vec2,
}

impl OrbitControls {
    pub fn new(camera: &Camera3D, config: &ControlsConfig) -> Self {
        let damping = config.damping.then(|| config.damping_factor.clamp(0.001, 1.0));
        Self {
            orbit: OrbitCamera::from_camera(camera),
            enabled: true,
            damping,
            rotate_speed: config.rotate_speed,
            pending: Vec2::ZERO,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling also drops any inertia so the camera stops immediately.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.pending = Vec2::ZERO;
        }
    }

    pub fn orbit(&self) -> &OrbitCamera {
        &self.orbit
    }

    /// Feeds a pointer delta in pixels. Ignored while disabled.
    pub fn rotate(&mut self, pixels: Vec2) -> bool {
        if !self.enabled {
            return false;
        }
        self.pending += -pixels * self.rotate_speed;
        true
    }

    pub fn zoom(&mut self, factor: f32) -> bool {
        if !self.enabled {
            return false;
        }
        self.orbit.zoom(factor);
        true
    }

    /// Applies pending rotation to the camera. Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut Camera3D) -> bool {
        if !self.enabled || self.pending == Vec2::ZERO {
            return false;
        }
        let step = match self.damping {
            Some(factor) => self.pending * factor,
            None => self.pending,
        };
        self.orbit.orbit(step);
        self.pending -= step;
        if self.pending.length_squared() < 1e-10 {
            self.pending = Vec2::ZERO;
        }
        self.orbit.apply_to(camera);
        true
    }
}
