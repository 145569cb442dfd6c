use crate::color::Color;
use crate::config::BackgroundConfig;
use crate::events::SceneEvent;
use crate::host::HostContext;
use crate::platform::{VideoConstraints, VideoStream};
use crate::scene::{NodeKind, SceneGraph, Transform3D};
use crate::session::WeakSession;
use anyhow::anyhow;
use bevy_ecs::prelude::Entity;
use glam::{Vec2, Vec3};
use log::{debug, info, warn};
use std::rc::Rc;
use winit::dpi::PhysicalSize;

/// Which background is on screen right now.
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundSource {
    SolidColor(Color),
    LiveVideo { plane: Entity },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveSourceState {
    NotRequested,
    Acquiring,
    Ready(LiveVideo),
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveVideo {
    pub stream: VideoStream,
    pub plane: Entity,
    pub scale: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAxis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Shown,
    Hidden,
    /// Intent recorded; takes effect once the stream resolves.
    Pending { show: bool },
    /// The camera was denied or missing. Nothing changed.
    Unavailable,
}

/// Uniform cover scale for a plane of `native_aspect` shown in a viewport of `viewport_aspect`.
pub fn cover_scale(viewport_aspect: f32, native_aspect: f32) -> (Vec2, ScaleAxis) {
    let native = native_aspect.max(f32::EPSILON);
    let viewport = viewport_aspect.max(f32::EPSILON);
    if viewport >= native {
        (Vec2::new(viewport / native, 1.0), ScaleAxis::Horizontal)
    } else {
        (Vec2::new(1.0, native / viewport), ScaleAxis::Vertical)
    }
}

/// Solid colour plus an optional camera-fed plane, with one sticky visibility toggle.
pub struct BackgroundSwitcher {
    color: Color,
    live: LiveSourceState,
    show_live: bool,
    native_aspect: f32,
    plane_size: Vec2,
    plane_depth: f32,
    viewport_aspect: f32,
    texture_frames: u64,
}

impl BackgroundSwitcher {
    pub fn new(config: &BackgroundConfig, viewport: PhysicalSize<u32>) -> Self {
        Self {
            color: config.color,
            live: LiveSourceState::NotRequested,
            show_live: false,
            native_aspect: config.live_native_aspect,
            plane_size: Vec2::from_array(config.plane_size),
            plane_depth: config.plane_depth,
            viewport_aspect: crate::camera3d::aspect_ratio(viewport),
            texture_frames: 0,
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn live_state(&self) -> &LiveSourceState {
        &self.live
    }

    pub fn live_intent(&self) -> bool {
        self.show_live
    }

    pub fn visible_source(&self) -> BackgroundSource {
        match &self.live {
            LiveSourceState::Ready(video) if self.show_live => BackgroundSource::LiveVideo { plane: video.plane },
            _ => BackgroundSource::SolidColor(self.color),
        }
    }

    pub fn live_scale(&self) -> Option<Vec2> {
        match &self.live {
            LiveSourceState::Ready(video) => Some(video.scale),
            _ => None,
        }
    }

    pub fn scale_axis(&self) -> ScaleAxis {
        cover_scale(self.viewport_aspect, self.native_aspect).1
    }

    pub fn texture_frames(&self) -> u64 {
        self.texture_frames
    }

    pub fn set_color(&mut self, graph: &mut SceneGraph, color: Color) {
        self.color = color;
        graph.set_clear_color(color);
    }

    /// Claims the single acquisition for this session.
    pub fn begin_acquire(&mut self) -> bool {
        if self.live != LiveSourceState::NotRequested {
            return false;
        }
        self.live = LiveSourceState::Acquiring;
        true
    }

    /// Builds the video plane for a resolved stream, honouring whatever toggle intent was
    /// recorded while acquisition was in flight.
    pub fn live_ready(&mut self, graph: &mut SceneGraph, stream: VideoStream) -> Entity {
        let plane = graph.spawn(
            "webcam_background",
            NodeKind::VideoPlane { size: self.plane_size },
            Transform3D::from_translation(Vec3::new(0.0, 0.0, self.plane_depth)),
        );
        let (scale, _) = cover_scale(self.viewport_aspect, self.native_aspect);
        graph.set_scale(plane, Vec3::new(scale.x, scale.y, 1.0));
        graph.set_visible(plane, self.show_live);
        self.live = LiveSourceState::Ready(LiveVideo { stream, plane, scale });
        plane
    }

    pub fn live_unavailable(&mut self, reason: impl Into<String>) {
        self.live = LiveSourceState::Unavailable { reason: reason.into() };
        self.show_live = false;
    }

    /// Camera revoked after it was granted: hide the plane and fall back to the colour.
    pub fn live_lost(&mut self, graph: &mut SceneGraph, reason: impl Into<String>) {
        if let LiveSourceState::Ready(video) = &self.live {
            graph.set_visible(video.plane, false);
        }
        self.live_unavailable(reason);
    }

    pub fn toggle_visibility(&mut self, graph: &mut SceneGraph) -> ToggleOutcome {
        match &self.live {
            LiveSourceState::Unavailable { .. } => ToggleOutcome::Unavailable,
            LiveSourceState::NotRequested | LiveSourceState::Acquiring => {
                self.show_live = !self.show_live;
                ToggleOutcome::Pending { show: self.show_live }
            }
            LiveSourceState::Ready(video) => {
                self.show_live = !self.show_live;
                graph.set_visible(video.plane, self.show_live);
                if self.show_live {
                    ToggleOutcome::Shown
                } else {
                    ToggleOutcome::Hidden
                }
            }
        }
    }

    /// Recomputes the cover scale for the live plane. Returns the axis being compensated.
    pub fn on_viewport_change(&mut self, graph: &mut SceneGraph, viewport: PhysicalSize<u32>) -> ScaleAxis {
        self.viewport_aspect = crate::camera3d::aspect_ratio(viewport);
        let (scale, axis) = cover_scale(self.viewport_aspect, self.native_aspect);
        if let LiveSourceState::Ready(video) = &mut self.live {
            video.scale = scale;
            graph.set_scale(video.plane, Vec3::new(scale.x, scale.y, 1.0));
        }
        axis
    }

    /// Called once per rendered frame; the live texture needs a re-upload every frame.
    pub fn mark_frame(&mut self) -> bool {
        if matches!(self.live, LiveSourceState::Ready(_)) {
            self.texture_frames += 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveSourceOutcome {
    Ready,
    Unavailable,
    /// Another acquisition already ran for this session.
    AlreadyRequested,
    /// The session closed while the request was in flight.
    Discarded,
}

/// Requests the camera stream once per session. Denial or absence degrades to the solid
/// colour; a stream that resolves after teardown is dropped without touching anything.
pub async fn acquire_live_source(session: WeakSession, ctx: Rc<HostContext>) -> LiveSourceOutcome {
    match session.upgrade_live() {
        Some(handle) => {
            if !handle.borrow_mut().claim_live_source() {
                return LiveSourceOutcome::AlreadyRequested;
            }
        }
        None => return LiveSourceOutcome::Discarded,
    }

    let media = ctx.platform().media.clone();
    let result = match media.as_deref() {
        Some(media) => media.request_stream(VideoConstraints::VIDEO_ONLY).await,
        None => Err(anyhow!("media devices API not available")),
    };

    let Some(handle) = session.upgrade_live() else {
        debug!("Discarding camera result for closed session {}", session.id());
        return LiveSourceOutcome::Discarded;
    };
    match result {
        Ok(stream) => {
            let (width, height) = (stream.width, stream.height);
            handle.borrow_mut().live_source_ready(stream);
            info!("Webcam stream ready ({width}x{height})");
            ctx.emit(SceneEvent::LiveSourceReady { session: handle.id(), width, height });
            LiveSourceOutcome::Ready
        }
        Err(err) => {
            let reason = format!("{err:#}");
            warn!("Error accessing webcam: {reason}");
            handle.borrow_mut().live_source_unavailable(&reason);
            ctx.emit(SceneEvent::LiveSourceUnavailable { session: handle.id(), reason });
            LiveSourceOutcome::Unavailable
        }
    }
}
