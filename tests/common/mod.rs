#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::{FutureExt, LocalBoxFuture};
use mrweb_host::assets::{AssetBlob, DecodedAsset};
use mrweb_host::audio::{AudioCueSettings, SoundClip};
use mrweb_host::config::AppConfig;
use mrweb_host::headless::{HeadlessMedia, HeadlessSurfaceFactory, StaticXr};
use mrweb_host::host::HostContext;
use mrweb_host::lifecycle::SceneHost;
use mrweb_host::platform::{
    AssetDecoder, AssetSource, AudioOutput, MediaDevices, OrientationSensors, Platform, SharedSurface, SurfaceFactory,
    SurfaceOptions, VideoConstraints, VideoStream, XrControllerSpace, XrRuntime, XrSessionMode,
};
use mrweb_host::scenes::SceneCatalog;
use glam::Vec3;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

pub struct Harness {
    pub pool: LocalPool,
    pub ctx: Rc<HostContext>,
    pub host: SceneHost,
}

impl Harness {
    pub fn new(platform: Platform) -> Self {
        Self::with_config(AppConfig::default(), platform)
    }

    pub fn with_config(config: AppConfig, platform: Platform) -> Self {
        let pool = LocalPool::new();
        let ctx = HostContext::new(config, platform, pool.spawner());
        let host = SceneHost::new(ctx.clone(), SceneCatalog::with_defaults());
        Self { pool, ctx, host }
    }

    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn notices(&self) -> Vec<String> {
        self.ctx.events().borrow().notices().map(str::to_string).collect()
    }
}

/// Platform with every collaborator answering immediately: no XR, a working camera, the fake
/// decoder, no audio output.
pub fn instant_platform() -> Platform {
    Platform {
        surfaces: Rc::new(HeadlessSurfaceFactory::default()),
        xr: Some(Rc::new(StaticXr { supported: false, controllers: 0 })),
        media: Some(Rc::new(HeadlessMedia::available(1280, 720))),
        sensors: None,
        assets: Rc::new(MissingAssets),
        decoder: Rc::new(FakeDecoder::default()),
        audio: None,
    }
}

pub fn stream(width: u32, height: u32) -> VideoStream {
    VideoStream { label: "fake camera".to_string(), width, height }
}

pub struct MissingAssets;

impl AssetSource for MissingAssets {
    fn fetch(&self, path: &str) -> LocalBoxFuture<'_, Result<Vec<u8>>> {
        let path = path.to_string();
        async move { Err(anyhow!("404 for {path}")) }.boxed_local()
    }
}

/// Camera whose answers are released by the test.
#[derive(Default)]
pub struct DeferredMedia {
    pending: RefCell<VecDeque<oneshot::Sender<Result<VideoStream>>>>,
}

impl DeferredMedia {
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn resolve_next(&self, result: Result<VideoStream>) {
        let sender = self.pending.borrow_mut().pop_front().expect("a pending camera request");
        let _ = sender.send(result);
    }
}

impl MediaDevices for DeferredMedia {
    fn request_stream(&self, _constraints: VideoConstraints) -> LocalBoxFuture<'_, Result<VideoStream>> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push_back(tx);
        async move { rx.await.map_err(|_| anyhow!("camera request dropped"))? }.boxed_local()
    }
}

/// XR runtime whose support answer is released by the test.
#[derive(Default)]
pub struct DeferredXr {
    pending: RefCell<VecDeque<oneshot::Sender<bool>>>,
    pub controllers: usize,
}

impl DeferredXr {
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn resolve_next(&self, supported: bool) {
        let sender = self.pending.borrow_mut().pop_front().expect("a pending XR query");
        let _ = sender.send(supported);
    }
}

impl XrRuntime for DeferredXr {
    fn is_session_supported(&self, _mode: XrSessionMode) -> LocalBoxFuture<'_, Result<bool>> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push_back(tx);
        async move { rx.await.map_err(|_| anyhow!("XR query dropped")) }.boxed_local()
    }

    fn controller(&self, index: usize) -> Result<XrControllerSpace> {
        if index < self.controllers {
            Ok(XrControllerSpace { index, has_grip: true, profile: None })
        } else {
            bail!("controller {index} missing")
        }
    }
}

pub struct FailingSurfaces;

impl SurfaceFactory for FailingSurfaces {
    fn create(&self, _options: &SurfaceOptions) -> Result<SharedSurface> {
        bail!("WebGL context could not be created")
    }
}

/// Decodes anything except names containing "broken". Optionally holds results until released.
#[derive(Default)]
pub struct FakeDecoder {
    pub calls: Cell<usize>,
    deferred: Cell<bool>,
    held: Rc<RefCell<VecDeque<oneshot::Sender<()>>>>,
}

impl FakeDecoder {
    pub fn deferred() -> Self {
        let decoder = Self::default();
        decoder.deferred.set(true);
        decoder
    }

    pub fn held(&self) -> usize {
        self.held.borrow().len()
    }

    pub fn release_next(&self) {
        let sender = self.held.borrow_mut().pop_front().expect("a held decode");
        let _ = sender.send(());
    }
}

impl AssetDecoder for FakeDecoder {
    fn decode(&self, blob: AssetBlob) -> LocalBoxFuture<'static, Result<DecodedAsset>> {
        self.calls.set(self.calls.get() + 1);
        let gate = if self.deferred.get() {
            let (tx, rx) = oneshot::channel();
            self.held.borrow_mut().push_back(tx);
            Some(rx)
        } else {
            None
        };
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if blob.name.contains("broken") {
                bail!("glTF: invalid magic in {}", blob.name);
            }
            Ok(DecodedAsset {
                root_name: blob.name.trim_end_matches(".glb").to_string(),
                node_count: 1,
                mesh_count: 1,
                bounds: Some((Vec3::splat(-0.5), Vec3::splat(0.5))),
            })
        }
        .boxed_local()
    }
}

pub struct ScriptedSensors {
    pub requires: bool,
    pub grant: bool,
    pub calls: Cell<usize>,
}

impl OrientationSensors for ScriptedSensors {
    fn requires_permission(&self) -> bool {
        self.requires
    }

    fn request_permission(&self) -> LocalBoxFuture<'_, Result<bool>> {
        self.calls.set(self.calls.get() + 1);
        let grant = self.grant;
        async move { Ok(grant) }.boxed_local()
    }
}

/// Sensors behind a permission gate whose answer is released by the test.
#[derive(Default)]
pub struct DeferredSensors {
    pending: RefCell<VecDeque<oneshot::Sender<bool>>>,
}

impl DeferredSensors {
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn resolve_next(&self, granted: bool) {
        let sender = self.pending.borrow_mut().pop_front().expect("a pending permission request");
        let _ = sender.send(granted);
    }
}

impl OrientationSensors for DeferredSensors {
    fn requires_permission(&self) -> bool {
        true
    }

    fn request_permission(&self) -> LocalBoxFuture<'_, Result<bool>> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push_back(tx);
        async move { rx.await.map_err(|_| anyhow!("permission request dropped")) }.boxed_local()
    }
}

/// Asset fetches that complete when the test says so.
#[derive(Default)]
pub struct DeferredAssets {
    pending: RefCell<VecDeque<oneshot::Sender<Result<Vec<u8>>>>>,
}

impl DeferredAssets {
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn resolve_next(&self, result: Result<Vec<u8>>) {
        let sender = self.pending.borrow_mut().pop_front().expect("a pending fetch");
        let _ = sender.send(result);
    }
}

impl AssetSource for DeferredAssets {
    fn fetch(&self, _path: &str) -> LocalBoxFuture<'_, Result<Vec<u8>>> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push_back(tx);
        async move { rx.await.map_err(|_| anyhow!("fetch dropped"))? }.boxed_local()
    }
}

/// Audio output that only counts what it was asked to play.
#[derive(Default)]
pub struct RecordingAudio {
    pub plays: Cell<usize>,
}

impl AudioOutput for RecordingAudio {
    fn play(&self, _clip: &SoundClip, _settings: &AudioCueSettings) -> Result<()> {
        self.plays.set(self.plays.get() + 1);
        Ok(())
    }
}

/// 16-bit mono PCM WAV of silence.
pub fn silent_wav(samples: u32) -> Vec<u8> {
    let data_len = samples * 2;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&8000u32.to_le_bytes());
    out.extend_from_slice(&16000u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}
