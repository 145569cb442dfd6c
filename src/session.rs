use crate::assets::DecodedAsset;
use crate::background::{BackgroundSwitcher, ToggleOutcome};
use crate::camera3d::{Camera3D, OrbitControls};
use crate::capability::CapabilityState;
use crate::color::Color;
use crate::config::AppConfig;
use crate::controls::{ControlArbiter, ControlMode};
use crate::drag::DragControls;
use crate::listeners::{ListenerId, PointerEvent, PointerPhase};
use crate::platform::{FrameView, SharedSurface, VideoStream};
use crate::render_loop::LoopHandle;
use crate::scene::{LocalBounds, NodeKind, SceneGraph, Transform3D};
use crate::xr::XrControllerRig;
use bevy_ecs::prelude::Entity;
use glam::{Vec2, Vec3};
use log::{debug, info};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use winit::dpi::PhysicalSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Initialized,
}

#[derive(Debug, Default, Clone, Copy)]
struct PointerState {
    pressed: bool,
    last: Option<Vec2>,
}

/// What `teardown` released, for logging and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    pub session: SessionId,
    pub nodes: usize,
    pub render_loop: Option<LoopHandle>,
}

/// Everything one scene owns. Created uninitialized, populated by bootstrap, and torn down
/// exactly once when a replacement is requested.
pub struct SceneSession {
    id: SessionId,
    scene: String,
    init: InitState,
    live: bool,
    graph: SceneGraph,
    camera: Option<Camera3D>,
    camera_rig: Option<Entity>,
    orbit: Option<OrbitControls>,
    arbiter: ControlArbiter,
    drag: DragControls,
    capabilities: CapabilityState,
    background: BackgroundSwitcher,
    xr_rig: XrControllerRig,
    surface: Option<SharedSurface>,
    render_loop: Option<LoopHandle>,
    listeners: Vec<ListenerId>,
    viewport: PhysicalSize<u32>,
    pointer: PointerState,
    start_affordance: bool,
    xr_entry_affordance: bool,
    frames: u64,
}

impl SceneSession {
    pub fn new(id: SessionId, scene: impl Into<String>, config: &AppConfig, viewport: PhysicalSize<u32>) -> Self {
        Self {
            id,
            scene: scene.into(),
            init: InitState::Uninitialized,
            live: true,
            graph: SceneGraph::new(),
            camera: None,
            camera_rig: None,
            orbit: None,
            arbiter: ControlArbiter::new(),
            drag: DragControls::new(),
            capabilities: CapabilityState::default(),
            background: BackgroundSwitcher::new(&config.background, viewport),
            xr_rig: XrControllerRig::default(),
            surface: None,
            render_loop: None,
            listeners: Vec::new(),
            viewport,
            pointer: PointerState::default(),
            start_affordance: false,
            xr_entry_affordance: false,
            frames: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn scene_name(&self) -> &str {
        &self.scene
    }

    pub fn init_state(&self) -> InitState {
        self.init
    }

    pub fn is_initialized(&self) -> bool {
        self.init == InitState::Initialized
    }

    /// False once the session has been torn down. Async continuations check this before
    /// touching anything.
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn camera(&self) -> Option<&Camera3D> {
        self.camera.as_ref()
    }

    pub fn orbit(&self) -> Option<&OrbitControls> {
        self.orbit.as_ref()
    }

    pub fn control_mode(&self) -> ControlMode {
        self.arbiter.mode()
    }

    pub fn orbit_enabled(&self) -> bool {
        self.orbit.as_ref().is_some_and(OrbitControls::enabled)
    }

    pub fn drag_controls(&self) -> &DragControls {
        &self.drag
    }

    pub fn capabilities(&self) -> &CapabilityState {
        &self.capabilities
    }

    pub fn background(&self) -> &BackgroundSwitcher {
        &self.background
    }

    pub fn xr_rig(&self) -> &XrControllerRig {
        &self.xr_rig
    }

    pub fn render_loop(&self) -> Option<LoopHandle> {
        self.render_loop
    }

    pub fn listener_ids(&self) -> &[ListenerId] {
        &self.listeners
    }

    pub fn viewport(&self) -> PhysicalSize<u32> {
        self.viewport
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn start_affordance_visible(&self) -> bool {
        self.start_affordance
    }

    pub fn xr_entry_visible(&self) -> bool {
        self.xr_entry_affordance
    }

    // ---------- bootstrap wiring ----------

    pub(crate) fn begin_init(&mut self) {
        self.init = InitState::Initializing;
    }

    pub(crate) fn abort_init(&mut self) {
        self.init = InitState::Uninitialized;
    }

    pub(crate) fn finish_init(&mut self, render_loop: LoopHandle) {
        self.render_loop = Some(render_loop);
        self.init = InitState::Initialized;
    }

    pub(crate) fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub(crate) fn capabilities_mut(&mut self) -> &mut CapabilityState {
        &mut self.capabilities
    }

    pub(crate) fn install_camera(&mut self, camera: Camera3D) {
        self.camera = Some(camera);
    }

    /// Spawns the node that tracks the camera each frame. Idempotent.
    pub(crate) fn camera_rig(&mut self) -> Entity {
        if let Some(rig) = self.camera_rig {
            return rig;
        }
        let position = self.camera.as_ref().map_or(Vec3::ZERO, |camera| camera.position);
        let rig = self.graph.spawn("camera", NodeKind::CameraRig, Transform3D::from_translation(position));
        self.camera_rig = Some(rig);
        rig
    }

    pub fn camera_rig_node(&self) -> Option<Entity> {
        self.camera_rig
    }

    pub(crate) fn install_orbit(&mut self, orbit: OrbitControls) {
        self.orbit = Some(orbit);
        self.sync_orbit();
    }

    pub(crate) fn install_xr_rig(&mut self, rig: XrControllerRig) {
        self.xr_rig = rig;
    }

    pub(crate) fn attach_surface(&mut self, surface: SharedSurface) {
        self.surface = Some(surface);
    }

    pub(crate) fn track_listener(&mut self, id: ListenerId) {
        self.listeners.push(id);
    }

    pub(crate) fn rebind_drag_targets(&mut self) -> usize {
        self.drag.rebind(&self.graph)
    }

    pub(crate) fn set_start_affordance(&mut self, visible: bool) {
        self.start_affordance = visible;
    }

    pub(crate) fn set_xr_entry_affordance(&mut self, visible: bool) {
        self.xr_entry_affordance = visible;
    }

    // ---------- interaction ----------

    fn sync_orbit(&mut self) {
        let enabled = self.arbiter.orbit_enabled();
        if let Some(orbit) = self.orbit.as_mut() {
            orbit.set_enabled(enabled);
        }
    }

    /// Enters `Dragging` for a registered target. Orbit is suspended until the drag ends.
    pub fn begin_drag(&mut self, entity: Entity) -> bool {
        let draggable = self.drag.is_target(entity) && self.graph.is_draggable(entity);
        let started = self.arbiter.begin_drag(entity, draggable);
        if started {
            self.sync_orbit();
        }
        started
    }

    pub fn end_drag(&mut self) -> Option<Entity> {
        self.drag.finish();
        let ended = self.arbiter.end_drag();
        if ended.is_some() {
            self.sync_orbit();
        }
        ended
    }

    pub fn xr_session_started(&mut self) {
        if let Some(interrupted) = self.arbiter.xr_presenting_started() {
            debug!("XR presentation cancelled drag of entity {}", interrupted.index());
        }
        self.drag.finish();
        self.sync_orbit();
    }

    pub fn xr_session_ended(&mut self) {
        self.arbiter.xr_presenting_ended();
        self.sync_orbit();
    }

    fn pointer_ray(&self, position: Vec2) -> Option<((Vec3, Vec3), Vec3)> {
        let camera = self.camera.as_ref()?;
        let ray = camera.screen_ray(position, self.viewport)?;
        Some((ray, camera.forward()))
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event.phase {
            PointerPhase::Down => {
                self.pointer = PointerState { pressed: true, last: Some(event.position) };
                if self.arbiter.mode() == ControlMode::XrPresenting {
                    return;
                }
                let Some((ray, forward)) = self.pointer_ray(event.position) else {
                    return;
                };
                if let Some(hit) = self.drag.pick(&self.graph, ray.0, ray.1) {
                    if self.begin_drag(hit) {
                        self.drag.start(&self.graph, hit, ray, forward);
                    }
                }
            }
            PointerPhase::Move => {
                let last = self.pointer.last.replace(event.position);
                if self.arbiter.dragging().is_some() {
                    if let Some((ray, _)) = self.pointer_ray(event.position) {
                        self.drag.update(&mut self.graph, ray);
                    }
                } else if self.pointer.pressed {
                    if let (Some(last), Some(orbit)) = (last, self.orbit.as_mut()) {
                        orbit.rotate(event.position - last);
                    }
                }
            }
            PointerPhase::Up | PointerPhase::Cancel => {
                self.pointer = PointerState::default();
                self.end_drag();
            }
        }
    }

    pub fn on_viewport_change(&mut self, viewport: PhysicalSize<u32>) {
        self.viewport = viewport;
        if let Some(camera) = self.camera.as_mut() {
            camera.set_viewport(viewport);
        }
        if let Some(surface) = &self.surface {
            surface.borrow_mut().set_size(viewport);
        }
        self.background.on_viewport_change(&mut self.graph, viewport);
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background.set_color(&mut self.graph, color);
    }

    pub fn toggle_live_background(&mut self) -> ToggleOutcome {
        self.background.toggle_visibility(&mut self.graph)
    }

    pub(crate) fn claim_live_source(&mut self) -> bool {
        self.background.begin_acquire()
    }

    pub(crate) fn live_source_ready(&mut self, stream: VideoStream) -> Entity {
        self.background.live_ready(&mut self.graph, stream)
    }

    pub(crate) fn live_source_unavailable(&mut self, reason: &str) {
        self.background.live_unavailable(reason);
    }

    pub fn live_source_lost(&mut self, reason: &str) {
        self.background.live_lost(&mut self.graph, reason);
    }

    /// Adds a decoded model as a draggable node and rebinds drag controls so the new node is
    /// immediately pickable alongside every earlier one.
    pub fn register_model(&mut self, file: &str, decoded: &DecodedAsset) -> Entity {
        let bounds = decoded.bounds.map(|(min, max)| LocalBounds { min, max }).unwrap_or_else(LocalBounds::unit);
        let entity = self.graph.spawn(
            decoded.root_name.clone(),
            NodeKind::Model { source: file.to_string(), meshes: decoded.mesh_count },
            Transform3D::default(),
        );
        self.graph.mark_draggable(entity, bounds);
        let targets = self.drag.rebind(&self.graph);
        info!("Model '{file}' added to session {} ({targets} draggable)", self.id);
        entity
    }

    /// One animation-loop tick: damped orbit, live texture refresh, then draw.
    pub fn render_frame(&mut self) -> bool {
        if !self.live {
            return false;
        }
        let Some(camera) = self.camera.as_mut() else {
            return false;
        };
        if let Some(orbit) = self.orbit.as_mut() {
            orbit.update(camera);
        }
        if let Some(rig) = self.camera_rig {
            self.graph.set_translation(rig, camera.position);
        }
        let live_texture_dirty = self.background.mark_frame();
        if let Some(surface) = &self.surface {
            let frame = FrameView {
                camera: &*camera,
                graph: &self.graph,
                clear_color: self.graph.clear_color(),
                live_texture_dirty,
            };
            surface.borrow_mut().render(&frame);
        }
        self.frames += 1;
        true
    }

    /// Detaches every node. Listener removal and loop cancellation happen in the host, which owns
    /// those tables, and the host calls [`SceneSession::mark_dead`] once they are gone.
    pub(crate) fn teardown(&mut self) -> TeardownReport {
        self.drag.finish();
        self.arbiter.end_drag();
        let nodes = self.graph.detach_all();
        self.camera_rig = None;
        self.listeners.clear();
        self.surface = None;
        self.init = InitState::Uninitialized;
        TeardownReport { session: self.id, nodes, render_loop: self.render_loop.take() }
    }

    /// After this, weak handles no longer upgrade and late async results are discarded.
    pub(crate) fn mark_dead(&mut self) {
        self.live = false;
    }
}

/// Shared ownership of a session on the single host thread.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    inner: Rc<RefCell<SceneSession>>,
}

impl SessionHandle {
    pub fn new(session: SceneSession) -> Self {
        Self { id: session.id(), inner: Rc::new(RefCell::new(session)) }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn borrow(&self) -> Ref<'_, SceneSession> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, SceneSession> {
        self.inner.borrow_mut()
    }

    pub fn downgrade(&self) -> WeakSession {
        WeakSession { id: self.id, inner: Rc::downgrade(&self.inner) }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

/// What listeners and async continuations hold. Upgrading fails once the session is dropped
/// or torn down.
#[derive(Clone)]
pub struct WeakSession {
    id: SessionId,
    inner: Weak<RefCell<SceneSession>>,
}

impl WeakSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn upgrade_live(&self) -> Option<SessionHandle> {
        let inner = self.inner.upgrade()?;
        if !inner.borrow().is_live() {
            return None;
        }
        Some(SessionHandle { id: self.id, inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::LocalBounds;

    fn session() -> SceneSession {
        let config = AppConfig::default();
        let mut session = SceneSession::new(SessionId::from_raw(1), "test", &config, PhysicalSize::new(800, 600));
        let camera = Camera3D::from_config(&config.camera, PhysicalSize::new(800, 600));
        session.install_orbit(OrbitControls::new(&camera, &config.controls));
        session.install_camera(camera);
        session
    }

    fn decoded(name: &str) -> DecodedAsset {
        DecodedAsset {
            root_name: name.to_string(),
            node_count: 1,
            mesh_count: 1,
            bounds: Some((Vec3::splat(-0.5), Vec3::splat(0.5))),
        }
    }

    #[test]
    fn drag_suspends_orbit() {
        let mut session = session();
        let entity = session.register_model("cube.glb", &decoded("Cube"));
        assert!(session.begin_drag(entity));
        assert!(!session.orbit_enabled());
        assert_eq!(session.end_drag(), Some(entity));
        assert!(session.orbit_enabled());
    }

    #[test]
    fn drag_on_unregistered_node_is_ignored() {
        let mut session = session();
        let panel = session.graph_mut().spawn(
            "panel",
            NodeKind::UiPanel { text: "hi".into(), size: Vec2::ONE, background: Color::BLACK },
            Transform3D::default(),
        );
        session.graph_mut().mark_draggable(panel, LocalBounds::unit());
        assert!(!session.begin_drag(panel), "not in the drag target list");
        assert!(session.orbit_enabled());
    }

    #[test]
    fn xr_start_cancels_drag_and_disables_orbit() {
        let mut session = session();
        let entity = session.register_model("cube.glb", &decoded("Cube"));
        assert!(session.begin_drag(entity));
        session.xr_session_started();
        assert_eq!(session.control_mode(), ControlMode::XrPresenting);
        assert!(!session.orbit_enabled());
        assert!(!session.begin_drag(entity));
        session.xr_session_ended();
        assert!(session.orbit_enabled());
    }

    #[test]
    fn weak_handle_dies_with_teardown() {
        let handle = SessionHandle::new(session());
        let weak = handle.downgrade();
        assert!(weak.upgrade_live().is_some());
        let report = handle.borrow_mut().teardown();
        assert_eq!(report.session, SessionId::from_raw(1));
        assert!(weak.upgrade_live().is_some(), "still live until the host marks it dead");
        handle.borrow_mut().mark_dead();
        assert!(weak.upgrade_live().is_none());
        drop(handle);
        assert!(weak.upgrade_live().is_none());
    }

    #[test]
    fn torn_down_session_stops_rendering() {
        let mut session = session();
        assert!(session.render_frame());
        session.teardown();
        session.mark_dead();
        assert!(!session.is_live());
        assert!(!session.render_frame());
        assert!(session.graph().is_empty());
    }
}
