use crate::assets::GltfDecoder;
use crate::audio::RodioOutput;
use crate::color::Color;
use crate::config::PlatformConfig;
use crate::platform::{
    AssetSource, AudioOutput, FrameView, MediaDevices, OrientationSensors, Platform, RenderSurface, SharedSurface,
    SurfaceFactory, SurfaceOptions, VideoConstraints, VideoStream, XrControllerSpace, XrRuntime, XrSessionMode,
};
use anyhow::{anyhow, bail, Context, Result};
use futures::future::{FutureExt, LocalBoxFuture};
use log::{debug, info};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use winit::dpi::PhysicalSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceStats {
    pub frames: u64,
    pub last_visible_nodes: usize,
    pub live_texture_uploads: u64,
}

/// Render surface that records what it was asked to draw.
pub struct HeadlessSurface {
    size: PhysicalSize<u32>,
    pixel_ratio: f64,
    xr_enabled: bool,
    last_clear: Option<Color>,
    stats: SurfaceStats,
}

impl HeadlessSurface {
    pub fn new(size: PhysicalSize<u32>) -> Self {
        Self { size, pixel_ratio: 1.0, xr_enabled: false, last_clear: None, stats: SurfaceStats::default() }
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn xr_enabled(&self) -> bool {
        self.xr_enabled
    }

    pub fn last_clear(&self) -> Option<Color> {
        self.last_clear
    }

    pub fn stats(&self) -> SurfaceStats {
        self.stats
    }
}

impl RenderSurface for HeadlessSurface {
    fn set_size(&mut self, size: PhysicalSize<u32>) {
        self.size = size;
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
    }

    fn enable_xr(&mut self) -> Result<()> {
        self.xr_enabled = true;
        Ok(())
    }

    fn render(&mut self, frame: &FrameView<'_>) {
        self.stats.frames += 1;
        self.stats.last_visible_nodes = frame.graph.visible_count();
        if frame.live_texture_dirty {
            self.stats.live_texture_uploads += 1;
        }
        self.last_clear = Some(frame.clear_color);
    }
}

/// Creates `HeadlessSurface`s and keeps the last one reachable for reporting.
#[derive(Default)]
pub struct HeadlessSurfaceFactory {
    last: RefCell<Option<Rc<RefCell<HeadlessSurface>>>>,
}

impl HeadlessSurfaceFactory {
    pub fn last_surface(&self) -> Option<Rc<RefCell<HeadlessSurface>>> {
        self.last.borrow().clone()
    }
}

impl SurfaceFactory for HeadlessSurfaceFactory {
    fn create(&self, options: &SurfaceOptions) -> Result<SharedSurface> {
        if options.size.width == 0 || options.size.height == 0 {
            bail!("Cannot create a {}x{} surface", options.size.width, options.size.height);
        }
        let surface = Rc::new(RefCell::new(HeadlessSurface::new(options.size)));
        *self.last.borrow_mut() = Some(surface.clone());
        Ok(surface)
    }
}

/// XR runtime with a fixed support answer and a fixed number of connected controllers.
#[derive(Debug, Clone, Copy)]
pub struct StaticXr {
    pub supported: bool,
    pub controllers: usize,
}

impl XrRuntime for StaticXr {
    fn is_session_supported(&self, mode: XrSessionMode) -> LocalBoxFuture<'_, Result<bool>> {
        let supported = self.supported && mode == XrSessionMode::ImmersiveVr;
        async move { Ok(supported) }.boxed_local()
    }

    fn controller(&self, index: usize) -> Result<XrControllerSpace> {
        if index >= self.controllers {
            return Err(anyhow!("controller {index} not connected"));
        }
        Ok(XrControllerSpace { index, has_grip: true, profile: Some("generic-trigger".to_string()) })
    }
}

/// Camera simulator: either a fixed-size stream or a permission error.
#[derive(Debug, Clone)]
pub struct HeadlessMedia {
    stream: Option<VideoStream>,
}

impl HeadlessMedia {
    pub fn available(width: u32, height: u32) -> Self {
        Self { stream: Some(VideoStream { label: "headless camera".to_string(), width, height }) }
    }

    pub fn denied() -> Self {
        Self { stream: None }
    }
}

impl MediaDevices for HeadlessMedia {
    fn request_stream(&self, constraints: VideoConstraints) -> LocalBoxFuture<'_, Result<VideoStream>> {
        let result = match (&self.stream, constraints.video) {
            (_, false) => Err(anyhow!("TypeError: at least one of audio and video must be requested")),
            (Some(stream), true) => Ok(stream.clone()),
            (None, true) => Err(anyhow!("NotAllowedError: Permission denied")),
        };
        async move { result }.boxed_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeadlessSensors {
    pub requires_permission: bool,
    pub grant: bool,
}

impl OrientationSensors for HeadlessSensors {
    fn requires_permission(&self) -> bool {
        self.requires_permission
    }

    fn request_permission(&self) -> LocalBoxFuture<'_, Result<bool>> {
        let grant = self.grant;
        async move { Ok(grant) }.boxed_local()
    }
}

/// Serves asset paths relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for FsAssetSource {
    fn fetch(&self, path: &str) -> LocalBoxFuture<'_, Result<Vec<u8>>> {
        let full = self.root.join(path);
        async move {
            debug!("Fetching asset {}", full.display());
            std::fs::read(&full).with_context(|| format!("Failed to read asset {}", full.display()))
        }
        .boxed_local()
    }
}

impl Platform {
    /// Collaborators for running without a browser or headset, shaped by `platform` config.
    pub fn headless(config: &PlatformConfig) -> Self {
        let media: Rc<dyn MediaDevices> = if config.camera_available {
            Rc::new(HeadlessMedia::available(config.camera_size[0], config.camera_size[1]))
        } else {
            Rc::new(HeadlessMedia::denied())
        };
        let xr: Rc<dyn XrRuntime> =
            Rc::new(StaticXr { supported: config.xr_supported, controllers: if config.xr_supported { 2 } else { 0 } });
        let sensors: Rc<dyn OrientationSensors> =
            Rc::new(HeadlessSensors { requires_permission: config.sensor_permission_required, grant: true });
        let audio: Option<Rc<dyn AudioOutput>> =
            if config.audio_output { Some(Rc::new(RodioOutput::new(8))) } else { None };
        if !config.audio_output {
            info!("Audio output disabled by platform config");
        }
        Platform {
            surfaces: Rc::new(HeadlessSurfaceFactory::default()),
            xr: Some(xr),
            media: Some(media),
            sensors: Some(sensors),
            assets: Rc::new(FsAssetSource::new(&config.asset_root)),
            decoder: Rc::new(GltfDecoder),
            audio,
        }
    }
}
