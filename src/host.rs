use crate::assets::BlobStore;
use crate::color::Color;
use crate::config::AppConfig;
use crate::controls::ControlMode;
use crate::error::BootstrapError;
use crate::events::{EventBus, SceneEvent};
use crate::listeners::{HostEvent, ListenerRegistry};
use crate::platform::{Platform, SharedSurface, SurfaceOptions};
use crate::render_loop::FrameScheduler;
use crate::session::SessionId;
use anyhow::Result;
use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use winit::dpi::PhysicalSize;

/// Deferred host work. Listeners enqueue these instead of replacing the scene from inside
/// their own dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    ReplaceScene(String),
}

/// Narrow command interface exposed to page-level UI so it can drive the active scene without
/// reaching into session internals.
pub trait HostCommands {
    /// Name of the scene currently on screen.
    fn active_scene(&self) -> Option<String>;

    /// Current interaction mode of the active scene.
    fn control_mode(&self) -> Option<ControlMode>;

    /// Apply a colour picker value to the active scene's clear colour.
    fn set_background_color(&mut self, color: &str) -> Result<Color>;

    /// Forward a page event to the listeners registered by the active scene.
    ///
    /// Synchronous: host requests the listeners queue, such as the intro's scene replacement,
    /// stay queued until `SceneHost::handle` or `SceneHost::process_requests` runs.
    fn dispatch(&mut self, event: HostEvent) -> usize;
}

/// State shared by the host and every scene it creates. Lives for the whole page.
pub struct HostContext {
    config: AppConfig,
    platform: Platform,
    spawner: LocalSpawner,
    listeners: Rc<RefCell<ListenerRegistry>>,
    scheduler: Rc<RefCell<FrameScheduler>>,
    events: Rc<RefCell<EventBus>>,
    blobs: Rc<RefCell<BlobStore>>,
    surface: RefCell<Option<SharedSurface>>,
    requests: RefCell<VecDeque<HostRequest>>,
    viewport: Cell<PhysicalSize<u32>>,
    next_session: Cell<u64>,
}

impl HostContext {
    pub fn new(config: AppConfig, platform: Platform, spawner: LocalSpawner) -> Rc<Self> {
        let viewport = config.window.size();
        Rc::new(Self {
            config,
            platform,
            spawner,
            listeners: Rc::new(RefCell::new(ListenerRegistry::new())),
            scheduler: Rc::new(RefCell::new(FrameScheduler::new())),
            events: Rc::new(RefCell::new(EventBus::default())),
            blobs: Rc::new(RefCell::new(BlobStore::new())),
            surface: RefCell::new(None),
            requests: RefCell::new(VecDeque::new()),
            viewport: Cell::new(viewport),
            next_session: Cell::new(0),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn listeners(&self) -> &Rc<RefCell<ListenerRegistry>> {
        &self.listeners
    }

    pub fn scheduler(&self) -> &Rc<RefCell<FrameScheduler>> {
        &self.scheduler
    }

    pub fn events(&self) -> &Rc<RefCell<EventBus>> {
        &self.events
    }

    pub fn blobs(&self) -> &Rc<RefCell<BlobStore>> {
        &self.blobs
    }

    pub fn viewport(&self) -> PhysicalSize<u32> {
        self.viewport.get()
    }

    pub fn set_viewport(&self, viewport: PhysicalSize<u32>) {
        self.viewport.set(viewport);
    }

    pub fn next_session_id(&self) -> SessionId {
        let next = self.next_session.get() + 1;
        self.next_session.set(next);
        SessionId::from_raw(next)
    }

    /// Hands an existing surface to the next scene, as the intro does for its successor.
    pub fn provide_surface(&self, surface: SharedSurface) {
        *self.surface.borrow_mut() = Some(surface);
    }

    pub fn has_surface(&self) -> bool {
        self.surface.borrow().is_some()
    }

    /// Reuses the surface handed over by a previous scene, or creates one when running
    /// standalone. Failure is fatal for the scene being bootstrapped.
    pub fn acquire_surface(&self) -> Result<SharedSurface, BootstrapError> {
        if let Some(surface) = self.surface.borrow().as_ref() {
            debug!("Reusing provided render surface");
            return Ok(surface.clone());
        }
        let options = SurfaceOptions { size: self.viewport(), antialias: true, alpha: true };
        let surface = self
            .platform
            .surfaces
            .create(&options)
            .map_err(|err| BootstrapError::Surface(format!("{err:#}")))?;
        info!("Created render surface {}x{}", options.size.width, options.size.height);
        *self.surface.borrow_mut() = Some(surface.clone());
        Ok(surface)
    }

    pub fn emit(&self, event: SceneEvent) {
        if event.is_notice() {
            warn!("{event}");
        } else {
            debug!("{event}");
        }
        self.events.borrow_mut().push(event);
    }

    pub fn notify(&self, message: impl Into<String>) {
        self.emit(SceneEvent::notice(message));
    }

    pub fn request(&self, request: HostRequest) {
        self.requests.borrow_mut().push_back(request);
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn take_requests(&self) -> Vec<HostRequest> {
        self.requests.borrow_mut().drain(..).collect()
    }

    /// Queues a continuation on the host event loop.
    pub fn spawn_local(&self, task: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.spawner.spawn_local(task) {
            warn!("Failed to schedule host task: {err}");
        }
    }
}
