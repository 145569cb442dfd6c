//! Scene setup.
//!
//! `bootstrap` turns a fresh `SceneSession` into a running scene: capability probe, clear
//! colour, camera, surface, lighting, controls, UI, controllers, async acquisitions and
//! listeners, with the render loop started last. The init guard makes it safe to call more
//! than once.

use crate::assets;
use crate::audio;
use crate::background::{self, ToggleOutcome};
use crate::camera3d::{Camera3D, OrbitControls};
use crate::capability::{self, probe_xr};
use crate::error::BootstrapError;
use crate::events::SceneEvent;
use crate::host::{HostContext, HostRequest};
use crate::listeners::{HostEvent, ListenerKind, XrSessionEvent};
use crate::scene::{NodeKind, Transform3D};
use crate::session::{InitState, SessionHandle};
use crate::xr::XrControllerRig;
use glam::{Quat, Vec2, Vec3};
use log::{info, warn};
use std::rc::Rc;

/// Which setup steps a scene runs. Steps a recipe leaves out are skipped, never reordered.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRecipe {
    pub camera_position: Option<Vec3>,
    pub probe_xr: bool,
    pub lighting: bool,
    pub orbit_controls: bool,
    pub ui_panel: bool,
    pub xr_controllers: bool,
    pub drag_controls: bool,
    pub audio_cue: bool,
    pub live_background: bool,
    pub uploads: bool,
    pub sensor_gate: bool,
    /// Scene to request when the start affordance is used.
    pub start_target: Option<String>,
}

impl SceneRecipe {
    /// Landing scene: a camera, a resize handler and the start affordance.
    pub fn intro(next_scene: impl Into<String>) -> Self {
        Self {
            camera_position: Some(Vec3::new(0.0, 0.0, 5.0)),
            probe_xr: false,
            lighting: false,
            orbit_controls: false,
            ui_panel: false,
            xr_controllers: false,
            drag_controls: false,
            audio_cue: false,
            live_background: false,
            uploads: false,
            sensor_gate: false,
            start_target: Some(next_scene.into()),
        }
    }

    pub fn mixed_reality() -> Self {
        Self {
            camera_position: None,
            probe_xr: true,
            lighting: true,
            orbit_controls: true,
            ui_panel: true,
            xr_controllers: true,
            drag_controls: true,
            audio_cue: true,
            live_background: true,
            uploads: true,
            sensor_gate: true,
            start_target: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Initialized,
    AlreadyInitialized,
    /// Another call is still running setup for this session.
    InProgress,
}

pub async fn bootstrap(
    session: &SessionHandle,
    ctx: &Rc<HostContext>,
    recipe: &SceneRecipe,
) -> Result<BootstrapOutcome, BootstrapError> {
    {
        let mut guard = session.borrow_mut();
        match guard.init_state() {
            InitState::Initialized => return Ok(BootstrapOutcome::AlreadyInitialized),
            InitState::Initializing => return Ok(BootstrapOutcome::InProgress),
            InitState::Uninitialized => guard.begin_init(),
        }
    }

    // Controller setup consumes this result, so it resolves before any synchronous step.
    let xr_supported = if recipe.probe_xr {
        let runtime = ctx.platform().xr.clone();
        Some(probe_xr(runtime.as_deref()).await)
    } else {
        None
    };

    if let Err(err) = setup_scene(session, ctx, recipe, xr_supported) {
        session.borrow_mut().abort_init();
        return Err(err);
    }
    start_async_acquisitions(session, ctx, recipe);
    register_listeners(session, ctx, recipe);

    let render_loop = ctx.scheduler().borrow_mut().start(session);
    let scene = {
        let mut guard = session.borrow_mut();
        guard.finish_init(render_loop);
        guard.scene_name().to_string()
    };
    info!("Scene '{scene}' initialized as session {}", session.id());
    ctx.emit(SceneEvent::SessionStarted { session: session.id(), scene });
    Ok(BootstrapOutcome::Initialized)
}

fn setup_scene(
    session: &SessionHandle,
    ctx: &Rc<HostContext>,
    recipe: &SceneRecipe,
    xr_supported: Option<bool>,
) -> Result<(), BootstrapError> {
    let config = ctx.config();
    let viewport = ctx.viewport();
    let mut guard = session.borrow_mut();

    if let Some(supported) = xr_supported {
        let settled = guard.capabilities_mut().resolve_xr(supported);
        ctx.emit(SceneEvent::XrCapability { session: session.id(), supported: settled });
    }

    guard.set_background_color(config.background.color);

    let mut camera = Camera3D::from_config(&config.camera, viewport);
    if let Some(position) = recipe.camera_position {
        camera.position = position;
        camera.target = Vec3::ZERO;
    }

    let surface = ctx.acquire_surface()?;
    {
        let mut surface = surface.borrow_mut();
        surface.set_pixel_ratio(config.window.pixel_ratio);
        surface.set_size(viewport);
        if xr_supported == Some(true) {
            match surface.enable_xr() {
                Ok(()) => guard.set_xr_entry_affordance(true),
                Err(err) => warn!("WebXR initialization failed: {err:#}"),
            }
        }
    }
    guard.attach_surface(surface);

    if recipe.lighting {
        let lighting = &config.lighting;
        guard.graph_mut().spawn(
            "hemisphere_light",
            NodeKind::HemisphereLight {
                sky: lighting.hemisphere_sky,
                ground: lighting.hemisphere_ground,
                intensity: lighting.hemisphere_intensity,
            },
            Transform3D::from_translation(Vec3::from_array(lighting.hemisphere_position)),
        );
        guard.graph_mut().spawn(
            "ambient_light",
            NodeKind::AmbientLight { color: lighting.ambient_color, intensity: lighting.ambient_intensity },
            Transform3D::default(),
        );
    }

    if recipe.orbit_controls {
        guard.install_orbit(OrbitControls::new(&camera, &config.controls));
    }
    guard.install_camera(camera);

    if recipe.ui_panel {
        let ui = &config.ui;
        let transform = Transform3D {
            translation: Vec3::from_array(ui.position),
            rotation: Quat::from_rotation_x(ui.tilt_radians),
            scale: Vec3::ONE,
        };
        guard.graph_mut().spawn(
            "ui_panel",
            NodeKind::UiPanel { text: ui.text.clone(), size: Vec2::from_array(ui.size), background: ui.background },
            transform,
        );
    }

    if recipe.xr_controllers {
        let runtime = ctx.platform().xr.clone();
        let rig = XrControllerRig::attach(guard.graph_mut(), runtime.as_deref(), &config.xr);
        guard.install_xr_rig(rig);
    }

    if recipe.drag_controls {
        guard.rebind_drag_targets();
    }

    if recipe.sensor_gate {
        let requires = ctx.platform().sensors.as_ref().is_some_and(|sensors| sensors.requires_permission());
        guard.capabilities_mut().configure_sensor_gate(requires);
    }

    if recipe.audio_cue && config.audio.enabled {
        let rig = guard.camera_rig();
        guard.graph_mut().spawn_child(rig, "audio_listener", NodeKind::AudioListener, Transform3D::default());
    }

    if recipe.start_target.is_some() {
        guard.set_start_affordance(true);
    }
    Ok(())
}

fn start_async_acquisitions(session: &SessionHandle, ctx: &Rc<HostContext>, recipe: &SceneRecipe) {
    if recipe.audio_cue && ctx.config().audio.enabled {
        ctx.spawn_local(audio::play_cue(session.downgrade(), ctx.clone()));
    }
    if recipe.live_background {
        let weak = session.downgrade();
        let task_ctx = ctx.clone();
        ctx.spawn_local(async move {
            background::acquire_live_source(weak, task_ctx).await;
        });
    }
}

fn register_listeners(session: &SessionHandle, ctx: &Rc<HostContext>, recipe: &SceneRecipe) {
    let owner = session.id();
    let host = Rc::downgrade(ctx);
    let registry = ctx.listeners().clone();
    let mut registry = registry.borrow_mut();
    let mut ids = Vec::new();

    let weak = session.downgrade();
    ids.push(registry.add(owner, ListenerKind::Resize, move |event| {
        if let (HostEvent::Resize(size), Some(session)) = (event, weak.upgrade_live()) {
            session.borrow_mut().on_viewport_change(*size);
        }
    }));

    if let Some(target) = recipe.start_target.clone() {
        let weak = session.downgrade();
        let host = host.clone();
        ids.push(registry.add_once(owner, ListenerKind::StartRequested, move |_| {
            let (Some(session), Some(ctx)) = (weak.upgrade_live(), host.upgrade()) else {
                return;
            };
            session.borrow_mut().set_start_affordance(false);
            info!("Start requested; switching to '{target}'");
            ctx.request(HostRequest::ReplaceScene(target.clone()));
        }));
    }

    if recipe.live_background {
        let weak = session.downgrade();
        let host = host.clone();
        ids.push(registry.add(owner, ListenerKind::ToggleLiveBackground, move |_| {
            let (Some(session), Some(ctx)) = (weak.upgrade_live(), host.upgrade()) else {
                return;
            };
            let outcome = session.borrow_mut().toggle_live_background();
            match outcome {
                ToggleOutcome::Unavailable => ctx.notify("Live video background is unavailable."),
                ToggleOutcome::Shown | ToggleOutcome::Hidden => {
                    let visible = outcome == ToggleOutcome::Shown;
                    ctx.emit(SceneEvent::LiveSourceToggled { session: session.id(), visible });
                }
                ToggleOutcome::Pending { show } => {
                    info!("Live background toggle recorded (show={show}); waiting for camera");
                }
            }
        }));

        let weak = session.downgrade();
        ids.push(registry.add(owner, ListenerKind::CameraRevoked, move |event| {
            if let (HostEvent::CameraRevoked { reason }, Some(session)) = (event, weak.upgrade_live()) {
                warn!("Camera stream lost: {reason}");
                session.borrow_mut().live_source_lost(reason);
            }
        }));
    }

    if recipe.uploads {
        let weak = session.downgrade();
        let host = host.clone();
        ids.push(registry.add(owner, ListenerKind::FileChosen, move |event| {
            let (HostEvent::FileChosen(file), Some(ctx)) = (event, host.upgrade()) else {
                return;
            };
            let session = weak.clone();
            let task_ctx = ctx.clone();
            let file = file.clone();
            ctx.spawn_local(async move {
                // Failures are logged and reported inside `ingest`.
                let _ = assets::ingest(session, task_ctx, file).await;
            });
        }));
    }

    if recipe.drag_controls || recipe.orbit_controls {
        let weak = session.downgrade();
        ids.push(registry.add(owner, ListenerKind::Pointer, move |event| {
            if let (HostEvent::Pointer(pointer), Some(session)) = (event, weak.upgrade_live()) {
                session.borrow_mut().handle_pointer(*pointer);
            }
        }));
    }

    if recipe.xr_controllers {
        let weak = session.downgrade();
        ids.push(registry.add(owner, ListenerKind::XrSession, move |event| {
            let (HostEvent::XrSession(phase), Some(session)) = (event, weak.upgrade_live()) else {
                return;
            };
            match phase {
                XrSessionEvent::Started => session.borrow_mut().xr_session_started(),
                XrSessionEvent::Ended => session.borrow_mut().xr_session_ended(),
            }
        }));
    }

    let sensor_prompt = session.borrow().capabilities().sensor_prompt_visible();
    if recipe.sensor_gate && sensor_prompt {
        let weak = session.downgrade();
        let host = host.clone();
        ids.push(registry.add_once(owner, ListenerKind::UserGesture, move |_| {
            let Some(ctx) = host.upgrade() else {
                return;
            };
            let task_ctx = ctx.clone();
            let session = weak.clone();
            ctx.spawn_local(async move {
                capability::request_orientation_permission(session, task_ctx).await;
            });
        }));
    }

    drop(registry);
    let mut guard = session.borrow_mut();
    for id in ids {
        guard.track_listener(id);
    }
}
