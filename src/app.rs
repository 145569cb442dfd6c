use crate::assets::FileHandle;
use crate::cli::CliOverrides;
use crate::config::AppConfig;
use crate::headless::HeadlessSurfaceFactory;
use crate::host::{HostCommands, HostContext};
use crate::lifecycle::SceneHost;
use crate::listeners::HostEvent;
use crate::platform::Platform;
use crate::scenes::{SceneCatalog, INTRO_SCENE};
use anyhow::{Context, Result};
use futures::executor::LocalPool;
use log::{info, warn};
use std::rc::Rc;

const CONFIG_PATH: &str = "config/app.json";
const DEFAULT_FRAMES: u32 = 120;

/// End-of-run report, logged by `run` and returned for callers that want to inspect it.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub scene: Option<String>,
    pub frames_rendered: u64,
    pub draggables: usize,
    pub live_background_ready: bool,
    pub notices: Vec<String>,
    pub average_fps: f32,
}

pub fn run() -> Result<RunSummary> {
    run_with_overrides(CliOverrides::default())
}

/// Boots the configured start scene on headless collaborators, follows the intro's start
/// affordance, ingests every `--model`, then pumps frames.
pub fn run_with_overrides(cli: CliOverrides) -> Result<RunSummary> {
    let mut config = AppConfig::load_or_default(CONFIG_PATH);
    let overrides = cli.config_overrides();
    if !overrides.is_empty() {
        info!("Applying CLI overrides: {}", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }

    let surfaces = Rc::new(HeadlessSurfaceFactory::default());
    let platform = Platform::headless(&config.platform).with_surfaces(surfaces.clone());
    let mut pool = LocalPool::new();
    let ctx = HostContext::new(config, platform, pool.spawner());
    let mut host = SceneHost::new(ctx.clone(), SceneCatalog::with_defaults());

    let start_scene = cli.scene().unwrap_or(INTRO_SCENE).to_string();
    pool.run_until(host.replace_scene_named(&start_scene))
        .with_context(|| format!("Failed to start scene '{start_scene}'"))?;
    pool.run_until_stalled();

    if start_scene == INTRO_SCENE {
        host.pump_frame();
        pool.run_until(host.handle(HostEvent::StartRequested)).context("Failed to leave the intro scene")?;
        pool.run_until_stalled();
    }

    for path in cli.models() {
        let file = FileHandle::from_path(path)?;
        if let Err(err) = pool.run_until(host.ingest_file(file)) {
            warn!("{err}");
        }
    }

    let frames = cli.frames().unwrap_or(DEFAULT_FRAMES);
    for _ in 0..frames {
        pool.run_until_stalled();
        host.pump_frame();
    }
    pool.run_until_stalled();

    let summary = summarize(&host);
    info!(
        "Scene {:?}: {} frames, {} draggable models, live background ready={}, {:.1} fps",
        summary.scene, summary.frames_rendered, summary.draggables, summary.live_background_ready, summary.average_fps
    );
    if let Some(surface) = surfaces.last_surface() {
        let stats = surface.borrow().stats();
        info!(
            "Surface drew {} frames ({} visible nodes, {} live texture uploads)",
            stats.frames, stats.last_visible_nodes, stats.live_texture_uploads
        );
    }
    for notice in &summary.notices {
        warn!("Notice: {notice}");
    }
    Ok(summary)
}

fn summarize(host: &SceneHost) -> RunSummary {
    let (frames_rendered, draggables, live_background_ready) = match host.active_session() {
        Some(session) => {
            let session = session.borrow();
            (
                session.frames_rendered(),
                session.drag_controls().len(),
                session.background().live_scale().is_some(),
            )
        }
        None => (0, 0, false),
    };
    let notices = host.context().events().borrow().notices().map(str::to_string).collect();
    RunSummary {
        scene: host.active_scene(),
        frames_rendered,
        draggables,
        live_background_ready,
        notices,
        average_fps: host.clock().average_fps(),
    }
}
