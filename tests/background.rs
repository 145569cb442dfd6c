mod common;

use common::{instant_platform, stream, DeferredMedia, Harness};
use mrweb_host::background::{BackgroundSource, LiveSourceState, ScaleAxis};
use mrweb_host::color::Color;
use mrweb_host::events::SceneEvent;
use mrweb_host::headless::HeadlessMedia;
use mrweb_host::host::HostCommands;
use mrweb_host::listeners::HostEvent;
use mrweb_host::platform::MediaDevices;
use mrweb_host::scenes::MixedRealityScene;
use std::rc::Rc;
use winit::dpi::PhysicalSize;

fn start(platform: mrweb_host::platform::Platform) -> Harness {
    let mut harness = Harness::new(platform);
    harness.pool.run_until(harness.host.replace_scene(&MixedRealityScene)).expect("scene starts");
    harness.settle();
    harness
}

fn visible_source(harness: &Harness) -> BackgroundSource {
    harness.host.active_session().expect("session").borrow().background().visible_source()
}

#[test]
fn denied_camera_keeps_default_color_and_informs_on_toggle() {
    let platform = instant_platform().with_media(Some(Rc::new(HeadlessMedia::denied()) as Rc<dyn MediaDevices>));
    let mut harness = start(platform);

    assert_eq!(visible_source(&harness), BackgroundSource::SolidColor(Color::default()));
    let handled = harness.host.dispatch(HostEvent::ToggleLiveBackground);
    assert_eq!(handled, 1);
    assert_eq!(visible_source(&harness), BackgroundSource::SolidColor(Color::default()));
    let notices = harness.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("unavailable"));
}

#[test]
fn missing_media_api_degrades_like_denial() {
    let mut harness = start(instant_platform().with_media(None));
    let session = harness.host.active_session().cloned().expect("session");
    assert!(matches!(session.borrow().background().live_state(), LiveSourceState::Unavailable { .. }));
    harness.host.dispatch(HostEvent::ToggleLiveBackground);
    assert_eq!(harness.notices().len(), 1);
}

#[test]
fn toggle_before_stream_resolves_is_honoured_later() {
    let media = Rc::new(DeferredMedia::default());
    let mut harness = start(instant_platform().with_media(Some(media.clone() as Rc<dyn MediaDevices>)));

    harness.host.dispatch(HostEvent::ToggleLiveBackground);
    assert!(matches!(visible_source(&harness), BackgroundSource::SolidColor(_)));

    media.resolve_next(Ok(stream(1280, 720)));
    harness.settle();
    assert!(matches!(visible_source(&harness), BackgroundSource::LiveVideo { .. }));
    assert!(harness.notices().is_empty());
}

#[test]
fn toggling_twice_restores_the_visible_source() {
    let mut harness = start(instant_platform());
    let before = visible_source(&harness);
    harness.host.dispatch(HostEvent::ToggleLiveBackground);
    assert_ne!(visible_source(&harness), before);
    harness.host.dispatch(HostEvent::ToggleLiveBackground);
    assert_eq!(visible_source(&harness), before);
}

#[test]
fn portrait_resize_swaps_compensated_axis() {
    let mut harness = start(instant_platform());
    let session = harness.host.active_session().cloned().expect("session");
    assert_eq!(session.borrow().background().scale_axis(), ScaleAxis::Horizontal);

    harness.host.dispatch(HostEvent::Resize(PhysicalSize::new(1080, 1920)));
    let guard = session.borrow();
    assert_eq!(guard.background().scale_axis(), ScaleAxis::Vertical);
    let scale = guard.background().live_scale().expect("live plane exists");
    assert!((scale.x - 1.0).abs() < f32::EPSILON);
    assert!(scale.y > 3.0, "16:9 source stretched to cover a 9:16 viewport");
}

#[test]
fn revoked_camera_falls_back_to_color() {
    let mut harness = start(instant_platform());
    harness.host.dispatch(HostEvent::ToggleLiveBackground);
    assert!(matches!(visible_source(&harness), BackgroundSource::LiveVideo { .. }));

    harness.host.dispatch(HostEvent::CameraRevoked { reason: "track ended".into() });
    assert!(matches!(visible_source(&harness), BackgroundSource::SolidColor(_)));
    harness.host.dispatch(HostEvent::ToggleLiveBackground);
    assert_eq!(harness.notices().len(), 1);
}

#[test]
fn color_command_updates_clear_color() {
    let mut harness = start(instant_platform());
    let color = harness.host.set_background_color("#336699").expect("valid colour");
    assert_eq!(color.to_hex(), 0x336699);
    let session = harness.host.active_session().cloned().expect("session");
    assert_eq!(session.borrow().graph().clear_color(), color);
    assert!(harness
        .ctx
        .events()
        .borrow()
        .iter()
        .any(|event| matches!(event, SceneEvent::BackgroundColorChanged { color, .. } if color.as_str() == "#336699")));
    assert!(harness.host.set_background_color("not-a-colour").is_err());
    assert_eq!(session.borrow().graph().clear_color(), color);
}

#[test]
fn live_texture_refreshes_every_frame() {
    let mut harness = start(instant_platform());
    for _ in 0..3 {
        harness.host.pump_frame();
    }
    let session = harness.host.active_session().cloned().expect("session");
    assert_eq!(session.borrow().background().texture_frames(), 3);
}
