//! Seams to the outside world.
//!
//! Everything the scene core does not own lives behind one of these traits: the render
//! surface, the XR runtime, camera streams, orientation sensors, asset bytes, the model
//! decoder, and audio output. Async operations return `LocalBoxFuture` because every
//! continuation resumes on the single host event loop.

use crate::assets::{AssetBlob, DecodedAsset};
use crate::audio::{AudioCueSettings, SoundClip};
use crate::camera3d::Camera3D;
use crate::color::Color;
use crate::scene::SceneGraph;
use anyhow::Result;
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::rc::Rc;
use winit::dpi::PhysicalSize;

/// Snapshot handed to the surface once per frame.
pub struct FrameView<'a> {
    pub camera: &'a Camera3D,
    pub graph: &'a SceneGraph,
    pub clear_color: Color,
    pub live_texture_dirty: bool,
}

pub trait RenderSurface {
    fn set_size(&mut self, size: PhysicalSize<u32>);

    fn set_pixel_ratio(&mut self, ratio: f64);

    /// Switch the surface into XR-capable mode. Failure leaves the surface usable in 2D.
    fn enable_xr(&mut self) -> Result<()>;

    fn render(&mut self, frame: &FrameView<'_>);
}

pub type SharedSurface = Rc<RefCell<dyn RenderSurface>>;

#[derive(Debug, Clone, Copy)]
pub struct SurfaceOptions {
    pub size: PhysicalSize<u32>,
    pub antialias: bool,
    pub alpha: bool,
}

/// Creates a surface when the scene runs standalone and no host surface was provided.
pub trait SurfaceFactory {
    fn create(&self, options: &SurfaceOptions) -> Result<SharedSurface>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrSessionMode {
    ImmersiveVr,
    ImmersiveAr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrControllerSpace {
    pub index: usize,
    pub has_grip: bool,
    pub profile: Option<String>,
}

pub trait XrRuntime {
    fn is_session_supported(&self, mode: XrSessionMode) -> LocalBoxFuture<'_, Result<bool>>;

    /// Target-ray and grip spaces for one tracked controller.
    fn controller(&self, index: usize) -> Result<XrControllerSpace>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub video: bool,
    pub audio: bool,
}

impl VideoConstraints {
    pub const VIDEO_ONLY: VideoConstraints = VideoConstraints { video: true, audio: false };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStream {
    pub label: String,
    pub width: u32,
    pub height: u32,
}

impl VideoStream {
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

pub trait MediaDevices {
    fn request_stream(&self, constraints: VideoConstraints) -> LocalBoxFuture<'_, Result<VideoStream>>;
}

pub trait OrientationSensors {
    /// Whether the platform gates sensor access behind a user-initiated permission call.
    fn requires_permission(&self) -> bool;

    fn request_permission(&self) -> LocalBoxFuture<'_, Result<bool>>;
}

/// Fetches bundled assets (such as the sound cue) by relative path.
pub trait AssetSource {
    fn fetch(&self, path: &str) -> LocalBoxFuture<'_, Result<Vec<u8>>>;
}

pub trait AssetDecoder {
    fn decode(&self, blob: AssetBlob) -> LocalBoxFuture<'static, Result<DecodedAsset>>;
}

pub trait AudioOutput {
    fn play(&self, clip: &SoundClip, settings: &AudioCueSettings) -> Result<()>;
}

/// Collaborators a scene session may call into. `None` means the platform lacks the API
/// entirely, which is distinct from the API refusing a request.
#[derive(Clone)]
pub struct Platform {
    pub surfaces: Rc<dyn SurfaceFactory>,
    pub xr: Option<Rc<dyn XrRuntime>>,
    pub media: Option<Rc<dyn MediaDevices>>,
    pub sensors: Option<Rc<dyn OrientationSensors>>,
    pub assets: Rc<dyn AssetSource>,
    pub decoder: Rc<dyn AssetDecoder>,
    pub audio: Option<Rc<dyn AudioOutput>>,
}

impl Platform {
    pub fn with_xr(mut self, xr: Option<Rc<dyn XrRuntime>>) -> Self {
        self.xr = xr;
        self
    }

    pub fn with_media(mut self, media: Option<Rc<dyn MediaDevices>>) -> Self {
        self.media = media;
        self
    }

    pub fn with_sensors(mut self, sensors: Option<Rc<dyn OrientationSensors>>) -> Self {
        self.sensors = sensors;
        self
    }

    pub fn with_surfaces(mut self, surfaces: Rc<dyn SurfaceFactory>) -> Self {
        self.surfaces = surfaces;
        self
    }

    pub fn with_assets(mut self, assets: Rc<dyn AssetSource>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_decoder(mut self, decoder: Rc<dyn AssetDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_audio(mut self, audio: Option<Rc<dyn AudioOutput>>) -> Self {
        self.audio = audio;
        self
    }
}
