mod common;

use common::{instant_platform, DeferredXr, Harness};
use futures::task::LocalSpawnExt;
use mrweb_host::bootstrap::{bootstrap, BootstrapOutcome, SceneRecipe};
use mrweb_host::events::SceneEvent;
use mrweb_host::headless::{HeadlessSurfaceFactory, StaticXr};
use mrweb_host::host::HostCommands;
use mrweb_host::listeners::{HostEvent, ListenerKind, PointerEvent, PointerPhase};
use mrweb_host::platform::XrRuntime;
use mrweb_host::scenes::MixedRealityScene;
use mrweb_host::session::{InitState, SceneSession, SessionHandle};
use std::rc::Rc;

fn fresh_session(harness: &Harness, scene: &str) -> SessionHandle {
    let ctx = &harness.ctx;
    SessionHandle::new(SceneSession::new(ctx.next_session_id(), scene, ctx.config(), ctx.viewport()))
}

#[test]
fn second_bootstrap_is_a_no_op() {
    let mut harness = Harness::new(instant_platform());
    let session = fresh_session(&harness, "mixed-reality");
    let recipe = SceneRecipe::mixed_reality();

    let first = harness.pool.run_until(bootstrap(&session, &harness.ctx, &recipe)).expect("first");
    assert_eq!(first, BootstrapOutcome::Initialized);
    let nodes = session.borrow().graph().len();
    let listeners = harness.ctx.listeners().borrow().len();

    let second = harness.pool.run_until(bootstrap(&session, &harness.ctx, &recipe)).expect("second");
    assert_eq!(second, BootstrapOutcome::AlreadyInitialized);
    assert_eq!(session.borrow().graph().len(), nodes);
    assert_eq!(harness.ctx.listeners().borrow().len(), listeners);
    assert_eq!(harness.ctx.scheduler().borrow().active_count(), 1);
}

#[test]
fn concurrent_bootstrap_reports_in_progress() {
    let mut xr = DeferredXr::default();
    xr.controllers = 2;
    let xr = Rc::new(xr);
    let platform = instant_platform().with_xr(Some(xr.clone() as Rc<dyn XrRuntime>));
    let mut harness = Harness::new(platform);
    let session = fresh_session(&harness, "mixed-reality");
    let recipe = SceneRecipe::mixed_reality();

    let (task_session, task_ctx, task_recipe) = (session.clone(), harness.ctx.clone(), recipe.clone());
    harness
        .pool
        .spawner()
        .spawn_local(async move {
            bootstrap(&task_session, &task_ctx, &task_recipe).await.expect("first bootstrap");
        })
        .expect("spawn");
    harness.settle();
    assert_eq!(xr.pending(), 1, "setup waits on the XR probe");
    assert_eq!(session.borrow().init_state(), InitState::Initializing);
    assert!(session.borrow().graph().is_empty(), "no synchronous step ran before the probe");

    let second = harness.pool.run_until(bootstrap(&session, &harness.ctx, &recipe)).expect("second");
    assert_eq!(second, BootstrapOutcome::InProgress);
    assert_eq!(xr.pending(), 1);

    xr.resolve_next(true);
    harness.settle();
    let guard = session.borrow();
    assert_eq!(guard.init_state(), InitState::Initialized);
    assert_eq!(guard.xr_rig().len(), 2);
    assert_eq!(harness.ctx.listeners().borrow().count(ListenerKind::Resize), 1);
}

#[test]
fn supported_xr_enables_entry_and_controllers() {
    let surfaces = Rc::new(HeadlessSurfaceFactory::default());
    let platform = instant_platform()
        .with_surfaces(surfaces.clone())
        .with_xr(Some(Rc::new(StaticXr { supported: true, controllers: 2 }) as Rc<dyn XrRuntime>));
    let mut harness = Harness::new(platform);
    harness.pool.run_until(harness.host.replace_scene(&MixedRealityScene)).expect("scene starts");

    let session = harness.host.active_session().expect("session").borrow();
    assert!(session.capabilities().xr_supported());
    assert!(session.xr_entry_visible());
    assert!(surfaces.last_surface().expect("surface").borrow().xr_enabled());
    assert_eq!(session.xr_rig().len(), 2);
    assert_eq!(session.graph().count_kind("xr_controller"), 2);
    assert_eq!(session.graph().count_kind("xr_controller_ray"), 2);
    assert_eq!(session.graph().count_kind("xr_grip"), 2);
    for binding in session.xr_rig().bindings() {
        assert_eq!(session.graph().parent(binding.ray), Some(binding.controller));
    }
}

#[test]
fn unsupported_xr_hides_entry_but_keeps_scene() {
    let mut harness = Harness::new(instant_platform().with_xr(None));
    harness.pool.run_until(harness.host.replace_scene(&MixedRealityScene)).expect("scene starts");

    let session = harness.host.active_session().expect("session").borrow();
    assert!(!session.capabilities().xr_supported());
    assert!(session.capabilities().xr_resolved());
    assert!(!session.xr_entry_visible());
    assert!(session.xr_rig().is_empty());
    assert!(harness
        .ctx
        .events()
        .borrow()
        .iter()
        .any(|event| matches!(event, SceneEvent::XrCapability { supported: false, .. })));
}

#[test]
fn mixed_reality_scene_has_lights_panel_and_listener() {
    let mut harness = Harness::new(instant_platform());
    harness.pool.run_until(harness.host.replace_scene(&MixedRealityScene)).expect("scene starts");
    harness.settle();

    let session = harness.host.active_session().expect("session").borrow();
    let graph = session.graph();
    assert_eq!(graph.count_kind("hemisphere_light"), 1);
    assert_eq!(graph.count_kind("ambient_light"), 1);
    assert_eq!(graph.count_kind("ui_panel"), 1);
    assert_eq!(graph.count_kind("audio_listener"), 1);
    let rig = session.camera_rig_node().expect("camera rig");
    let (listener, _) = graph.nodes().find(|(_, node)| node.kind.label() == "audio_listener").expect("listener");
    assert_eq!(graph.parent(listener), Some(rig));
    assert!(session.orbit().is_some());
    assert!(session.camera().is_some());
    assert!(session.render_loop().is_some());
    assert!(!session.start_affordance_visible());
    assert!(harness
        .ctx
        .events()
        .borrow()
        .iter()
        .any(|event| matches!(event, SceneEvent::AudioCueFailed { .. })));
}

#[test]
fn intro_scene_shows_only_start_affordance() {
    let mut harness = Harness::new(instant_platform());
    harness.pool.run_until(harness.host.replace_scene_named("intro")).expect("intro starts");
    harness.settle();

    let session = harness.host.active_session().expect("session").borrow();
    assert!(session.start_affordance_visible());
    assert!(session.graph().is_empty());
    assert!(session.orbit().is_none());
    let camera = session.camera().expect("camera");
    assert_eq!(camera.position, glam::Vec3::new(0.0, 0.0, 5.0));
    assert_eq!(harness.ctx.listeners().borrow().count(ListenerKind::StartRequested), 1);
    assert_eq!(harness.ctx.listeners().borrow().count(ListenerKind::Pointer), 0);
}

#[test]
fn camera_rig_follows_the_orbiting_camera() {
    let mut harness = Harness::new(instant_platform());
    harness.pool.run_until(harness.host.replace_scene(&MixedRealityScene)).expect("scene starts");
    harness.settle();
    let session = harness.host.active_session().cloned().expect("session");
    let rig = session.borrow().camera_rig_node().expect("camera rig");

    harness.host.dispatch(HostEvent::Pointer(PointerEvent::new(PointerPhase::Down, 20.0, 20.0)));
    harness.host.dispatch(HostEvent::Pointer(PointerEvent::new(PointerPhase::Move, 140.0, 20.0)));
    harness.host.pump_frame();
    harness.host.dispatch(HostEvent::Pointer(PointerEvent::new(PointerPhase::Up, 140.0, 20.0)));

    let guard = session.borrow();
    let camera = guard.camera().expect("camera").position;
    assert_eq!(guard.graph().transform(rig).expect("rig transform").translation, camera);
}
