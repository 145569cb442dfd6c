use crate::color::Color;
use anyhow::{Context, Result};
use glam::Vec3;
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use winit::dpi::PhysicalSize;

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "WindowConfig::default_pixel_ratio")]
    pub pixel_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "CameraConfig::default_near")]
    pub near: f32,
    #[serde(default = "CameraConfig::default_far")]
    pub far: f32,
    #[serde(default = "CameraConfig::default_position")]
    pub position: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct LightingConfig {
    #[serde(default = "LightingConfig::default_sky")]
    pub hemisphere_sky: Color,
    #[serde(default = "LightingConfig::default_ground")]
    pub hemisphere_ground: Color,
    #[serde(default = "LightingConfig::default_hemisphere_intensity")]
    pub hemisphere_intensity: f32,
    #[serde(default = "LightingConfig::default_hemisphere_position")]
    pub hemisphere_position: [f32; 3],
    #[serde(default = "LightingConfig::default_ambient")]
    pub ambient_color: Color,
    #[serde(default = "LightingConfig::default_ambient_intensity")]
    pub ambient_intensity: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundConfig {
    #[serde(default)]
    pub color: Color,
    #[serde(default = "BackgroundConfig::default_native_aspect")]
    pub live_native_aspect: f32,
    #[serde(default = "BackgroundConfig::default_plane_size")]
    pub plane_size: [f32; 2],
    #[serde(default = "BackgroundConfig::default_plane_depth")]
    pub plane_depth: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlsConfig {
    #[serde(default = "ControlsConfig::default_damping")]
    pub damping: bool,
    #[serde(default = "ControlsConfig::default_damping_factor")]
    pub damping_factor: f32,
    #[serde(default = "ControlsConfig::default_rotate_speed")]
    pub rotate_speed: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XrConfig {
    #[serde(default = "XrConfig::default_controller_count")]
    pub controller_count: usize,
    #[serde(default = "XrConfig::default_ray_length")]
    pub ray_length: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "AudioConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "AudioConfig::default_cue_path")]
    pub cue_path: String,
    #[serde(default = "AudioConfig::default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub looped: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiPanelConfig {
    #[serde(default = "UiPanelConfig::default_text")]
    pub text: String,
    #[serde(default = "UiPanelConfig::default_size")]
    pub size: [f32; 2],
    #[serde(default = "UiPanelConfig::default_position")]
    pub position: [f32; 3],
    #[serde(default = "UiPanelConfig::default_tilt")]
    pub tilt_radians: f32,
    #[serde(default = "UiPanelConfig::default_background")]
    pub background: Color,
}

/// Capabilities the headless platform pretends to have.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub xr_supported: bool,
    #[serde(default = "PlatformConfig::default_camera_available")]
    pub camera_available: bool,
    #[serde(default = "PlatformConfig::default_camera_size")]
    pub camera_size: [u32; 2],
    #[serde(default)]
    pub sensor_permission_required: bool,
    #[serde(default = "PlatformConfig::default_asset_root")]
    pub asset_root: String,
    #[serde(default = "PlatformConfig::default_audio_output")]
    pub audio_output: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub lighting: LightingConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub xr: XrConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub ui: UiPanelConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub xr_supported: Option<bool>,
    pub camera_available: Option<bool>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "MRWeb".to_string(), width: 1280, height: 720, pixel_ratio: Self::default_pixel_ratio() }
    }
}

impl WindowConfig {
    const fn default_pixel_ratio() -> f64 {
        1.0
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.width.max(1), self.height.max(1))
    }
}

impl CameraConfig {
    const fn default_fov_degrees() -> f32 {
        75.0
    }

    const fn default_near() -> f32 {
        0.1
    }

    const fn default_far() -> f32 {
        1000.0
    }

    const fn default_position() -> [f32; 3] {
        [0.0, 1.6, 3.0]
    }

    pub fn position_vec(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn target_vec(&self) -> Vec3 {
        Vec3::from_array(self.target)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: Self::default_fov_degrees(),
            near: Self::default_near(),
            far: Self::default_far(),
            position: Self::default_position(),
            target: [0.0; 3],
        }
    }
}

impl LightingConfig {
    fn default_sky() -> Color {
        Color::from_hex(0xffffff)
    }

    fn default_ground() -> Color {
        Color::from_hex(0x444444)
    }

    const fn default_hemisphere_intensity() -> f32 {
        1.0
    }

    const fn default_hemisphere_position() -> [f32; 3] {
        [0.0, 20.0, 0.0]
    }

    fn default_ambient() -> Color {
        Color::from_hex(0xffffff)
    }

    const fn default_ambient_intensity() -> f32 {
        0.5
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            hemisphere_sky: Self::default_sky(),
            hemisphere_ground: Self::default_ground(),
            hemisphere_intensity: Self::default_hemisphere_intensity(),
            hemisphere_position: Self::default_hemisphere_position(),
            ambient_color: Self::default_ambient(),
            ambient_intensity: Self::default_ambient_intensity(),
        }
    }
}

impl BackgroundConfig {
    fn default_native_aspect() -> f32 {
        16.0 / 9.0
    }

    const fn default_plane_size() -> [f32; 2] {
        [16.0, 9.0]
    }

    const fn default_plane_depth() -> f32 {
        -10.0
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            color: Color::default(),
            live_native_aspect: Self::default_native_aspect(),
            plane_size: Self::default_plane_size(),
            plane_depth: Self::default_plane_depth(),
        }
    }
}

impl ControlsConfig {
    const fn default_damping() -> bool {
        true
    }

    const fn default_damping_factor() -> f32 {
        0.05
    }

    const fn default_rotate_speed() -> f32 {
        0.005
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            damping: Self::default_damping(),
            damping_factor: Self::default_damping_factor(),
            rotate_speed: Self::default_rotate_speed(),
        }
    }
}

impl XrConfig {
    const fn default_controller_count() -> usize {
        2
    }

    const fn default_ray_length() -> f32 {
        5.0
    }
}

impl Default for XrConfig {
    fn default() -> Self {
        Self { controller_count: Self::default_controller_count(), ray_length: Self::default_ray_length() }
    }
}

impl AudioConfig {
    const fn default_enabled() -> bool {
        true
    }

    fn default_cue_path() -> String {
        "audio/sound.wav".to_string()
    }

    const fn default_volume() -> f32 {
        0.5
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            cue_path: Self::default_cue_path(),
            volume: Self::default_volume(),
            looped: false,
        }
    }
}

impl UiPanelConfig {
    fn default_text() -> String {
        "Hello, MRWeb!".to_string()
    }

    const fn default_size() -> [f32; 2] {
        [2.0, 1.0]
    }

    const fn default_position() -> [f32; 3] {
        [0.0, 1.6, -2.0]
    }

    const fn default_tilt() -> f32 {
        -0.15
    }

    fn default_background() -> Color {
        Color::from_hex(0x333333)
    }
}

impl Default for UiPanelConfig {
    fn default() -> Self {
        Self {
            text: Self::default_text(),
            size: Self::default_size(),
            position: Self::default_position(),
            tilt_radians: Self::default_tilt(),
            background: Self::default_background(),
        }
    }
}

impl PlatformConfig {
    const fn default_camera_available() -> bool {
        true
    }

    const fn default_camera_size() -> [u32; 2] {
        [1280, 720]
    }

    fn default_asset_root() -> String {
        "assets".to_string()
    }

    const fn default_audio_output() -> bool {
        true
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            xr_supported: false,
            camera_available: Self::default_camera_available(),
            camera_size: Self::default_camera_size(),
            sensor_permission_required: false,
            asset_root: Self::default_asset_root(),
            audio_output: Self::default_audio_output(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(xr) = overrides.xr_supported {
            self.platform.xr_supported = xr;
        }
        if let Some(camera) = overrides.camera_available {
            self.platform.camera_available = camera;
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.xr_supported.is_none()
            && self.camera_available.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.width.is_some() {
            fields.push("width");
        }
        if self.height.is_some() {
            fields.push("height");
        }
        if self.xr_supported.is_some() {
            fields.push("xr");
        }
        if self.camera_available.is_some() {
            fields.push("camera");
        }
        fields
    }
}
