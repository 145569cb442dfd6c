use crate::assets::{self, FileHandle};
use crate::color::Color;
use crate::controls::ControlMode;
use crate::error::{BootstrapError, IngestError};
use crate::events::SceneEvent;
use crate::host::{HostCommands, HostContext, HostRequest};
use crate::listeners::{self, HostEvent, ListenerKind};
use crate::render_loop::{self, FrameClock};
use crate::scenes::{SceneCatalog, SceneFactory};
use crate::session::{SessionHandle, SessionId, TeardownReport};
use anyhow::Result;
use bevy_ecs::prelude::Entity;
use log::{debug, error, info};
use std::rc::Rc;

/// What one teardown released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownSummary {
    pub session: SessionId,
    pub nodes: usize,
    pub listeners: usize,
    pub loop_cancelled: bool,
}

/// Owns the single active scene and swaps it wholesale.
pub struct SceneHost {
    ctx: Rc<HostContext>,
    catalog: SceneCatalog,
    active: Option<SessionHandle>,
    clock: FrameClock,
}

impl SceneHost {
    pub fn new(ctx: Rc<HostContext>, catalog: SceneCatalog) -> Self {
        Self { ctx, catalog, active: None, clock: FrameClock::new() }
    }

    pub fn context(&self) -> &Rc<HostContext> {
        &self.ctx
    }

    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    pub fn active_session(&self) -> Option<&SessionHandle> {
        self.active.as_ref()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Stops the loop, detaches all nodes, removes the session's listeners, then marks it
    /// dead. In that order. Notices it raised are dropped with it.
    pub fn teardown_active(&mut self) -> Option<TeardownSummary> {
        let session = self.active.take()?;
        let loop_handle = session.borrow().render_loop();
        let loop_cancelled = loop_handle.is_some_and(|handle| self.ctx.scheduler().borrow_mut().cancel(handle));
        let TeardownReport { session: id, nodes, .. } = session.borrow_mut().teardown();
        let listeners = self.ctx.listeners().borrow_mut().remove_owned_by(id);
        session.borrow_mut().mark_dead();
        let stale = self.ctx.events().borrow_mut().discard_notices();
        if stale > 0 {
            debug!("Discarded {stale} notices raised by session {id}");
        }
        info!("Tore down session {id}: {nodes} nodes, {listeners} listeners, loop cancelled={loop_cancelled}");
        self.ctx.emit(SceneEvent::SessionTornDown { session: id, nodes, listeners });
        Some(TeardownSummary { session: id, nodes, listeners, loop_cancelled })
    }

    /// Tears down the current scene and installs the one `factory` builds. On failure the host
    /// stays empty; the previous scene is never restored.
    pub async fn replace_scene(&mut self, factory: &dyn SceneFactory) -> Result<SessionId, BootstrapError> {
        self.teardown_active();
        let name = factory.name().to_string();
        match factory.build(&self.ctx).await {
            Ok(session) => {
                let id = session.id();
                info!("Scene '{name}' active as session {id}");
                self.active = Some(session);
                Ok(id)
            }
            Err(err) => {
                error!("Scene '{name}' failed to start: {err}");
                self.ctx.emit(SceneEvent::SceneFailed { scene: name, reason: err.to_string() });
                Err(err)
            }
        }
    }

    pub async fn replace_scene_named(&mut self, name: &str) -> Result<SessionId, BootstrapError> {
        let Some(factory) = self.catalog.get(name) else {
            self.teardown_active();
            let err = BootstrapError::UnknownScene(name.to_string());
            error!("{err}");
            self.ctx.emit(SceneEvent::SceneFailed { scene: name.to_string(), reason: err.to_string() });
            return Err(err);
        };
        self.replace_scene(factory.as_ref()).await
    }

    /// Runs queued requests, such as a replacement asked for by the intro's start listener.
    pub async fn process_requests(&mut self) -> Result<usize, BootstrapError> {
        let mut processed = 0;
        loop {
            let requests = self.ctx.take_requests();
            if requests.is_empty() {
                return Ok(processed);
            }
            for request in requests {
                processed += 1;
                match request {
                    HostRequest::ReplaceScene(name) => {
                        self.replace_scene_named(&name).await?;
                    }
                }
            }
        }
    }

    /// Dispatches the event, then settles any host requests its listeners queued.
    pub async fn handle(&mut self, event: HostEvent) -> Result<usize, BootstrapError> {
        let handled = self.dispatch_event(event);
        self.process_requests().await?;
        Ok(handled)
    }

    /// Returns the handlers invoked for `event` itself. Activating input is also forwarded as a
    /// `UserGesture` so permission prompts can ride on the first click.
    fn dispatch_event(&mut self, event: HostEvent) -> usize {
        if let HostEvent::Resize(size) = &event {
            self.ctx.set_viewport(*size);
        }
        let handled = listeners::dispatch(self.ctx.listeners(), &event);
        if event.is_user_gesture() && event.kind() != ListenerKind::UserGesture {
            listeners::dispatch(self.ctx.listeners(), &HostEvent::UserGesture);
        }
        handled
    }

    /// Ingests a file into the active scene directly, bypassing the upload listener.
    pub async fn ingest_file(&self, file: FileHandle) -> Result<Entity, IngestError> {
        let Some(session) = self.active.as_ref() else {
            return Err(IngestError::NoActiveScene { file: file.name().to_string() });
        };
        assets::ingest(session.downgrade(), self.ctx.clone(), file).await
    }

    /// Renders one frame for every active loop.
    pub fn pump_frame(&mut self) -> usize {
        self.clock.tick();
        render_loop::run_frame(self.ctx.scheduler())
    }
}

impl HostCommands for SceneHost {
    fn active_scene(&self) -> Option<String> {
        self.active.as_ref().map(|session| session.borrow().scene_name().to_string())
    }

    fn control_mode(&self) -> Option<ControlMode> {
        self.active.as_ref().map(|session| session.borrow().control_mode())
    }

    fn set_background_color(&mut self, color: &str) -> Result<Color> {
        let color = Color::parse(color)?;
        if let Some(session) = self.active.as_ref() {
            session.borrow_mut().set_background_color(color);
            self.ctx.emit(SceneEvent::BackgroundColorChanged { session: session.id(), color: color.to_string() });
        }
        Ok(color)
    }

    fn dispatch(&mut self, event: HostEvent) -> usize {
        self.dispatch_event(event)
    }
}
