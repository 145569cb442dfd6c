use crate::error::IngestError;
use crate::events::SceneEvent;
use crate::host::HostContext;
use crate::platform::AssetDecoder;
use crate::session::WeakSession;
use anyhow::{anyhow, Context, Result};
use bevy_ecs::prelude::Entity;
use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use glam::Vec3;
use log::{debug, error, info};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};
use std::thread;

/// A user-chosen file, as handed over by a file input.
#[derive(Clone)]
pub struct FileHandle {
    name: String,
    bytes: Rc<[u8]>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes: Rc::from(bytes) }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read model file {}", path.display()))?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle").field("name", &self.name).field("len", &self.bytes.len()).finish()
    }
}

/// What a decoder receives: the transient URL plus the bytes it resolves to.
#[derive(Clone)]
pub struct AssetBlob {
    pub url: String,
    pub name: String,
    pub bytes: Rc<[u8]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAsset {
    pub root_name: String,
    pub node_count: usize,
    pub mesh_count: usize,
    pub bounds: Option<(Vec3, Vec3)>,
}

/// Page-wide table of transient object URLs.
#[derive(Default)]
pub struct BlobStore {
    next: u64,
    live: BTreeMap<String, Rc<[u8]>>,
    revoked: u64,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, file: &FileHandle) -> String {
        self.next += 1;
        let url = format!("blob:mrweb/{}/{}", self.next, file.name());
        self.live.insert(url.clone(), file.bytes.clone());
        url
    }

    pub fn resolve(&self, url: &str) -> Option<Rc<[u8]>> {
        self.live.get(url).cloned()
    }

    pub fn revoke(&mut self, url: &str) -> bool {
        let removed = self.live.remove(url).is_some();
        if removed {
            self.revoked += 1;
        }
        removed
    }

    /// URLs created but not yet revoked.
    pub fn outstanding(&self) -> usize {
        self.live.len()
    }

    pub fn revoked(&self) -> u64 {
        self.revoked
    }
}

/// Owned object URL; revoked when dropped so every exit path releases it.
pub struct ObjectUrl {
    url: String,
    store: Weak<RefCell<BlobStore>>,
}

impl ObjectUrl {
    pub fn create(store: &Rc<RefCell<BlobStore>>, file: &FileHandle) -> Self {
        let url = store.borrow_mut().create(file);
        Self { url, store: Rc::downgrade(store) }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.borrow_mut().revoke(&self.url);
        }
    }
}

/// Parses glTF/GLB on a worker thread so the host loop keeps running during large decodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfDecoder;

impl AssetDecoder for GltfDecoder {
    fn decode(&self, blob: AssetBlob) -> LocalBoxFuture<'static, Result<DecodedAsset>> {
        let bytes = blob.bytes.to_vec();
        let name = blob.name.clone();
        let (tx, rx) = oneshot::channel();
        let worker = thread::Builder::new().name("gltf-decode".into()).spawn(move || {
            let _ = tx.send(summarize_gltf(&name, &bytes));
        });
        async move {
            worker.context("Failed to start glTF decode worker")?;
            rx.await.map_err(|_| anyhow!("glTF decode worker exited before finishing"))?
        }
        .boxed_local()
    }
}

/// Imports a glTF/GLB payload and summarises the default scene.
pub fn summarize_gltf(name: &str, bytes: &[u8]) -> Result<DecodedAsset> {
    let (document, _buffers, _images) =
        gltf::import_slice(bytes).with_context(|| format!("Failed to import glTF from {name}"))?;
    let scene = document.default_scene().or_else(|| document.scenes().next());
    let root_name = scene
        .and_then(|scene| scene.name().map(str::to_string))
        .unwrap_or_else(|| name.to_string());

    let mut bounds: Option<(Vec3, Vec3)> = None;
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let bb = primitive.bounding_box();
            let (min, max) = (Vec3::from(bb.min), Vec3::from(bb.max));
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(min), hi.max(max)),
                None => (min, max),
            });
        }
    }

    Ok(DecodedAsset {
        root_name,
        node_count: document.nodes().count(),
        mesh_count: document.meshes().count(),
        bounds,
    })
}

/// Decodes a chosen file and adds it to the session as a draggable model.
///
/// The object URL is released whatever the outcome. A decode failure is reported and leaves
/// the scene untouched; a result arriving after the session closed is discarded.
pub async fn ingest(session: WeakSession, ctx: Rc<HostContext>, file: FileHandle) -> Result<Entity, IngestError> {
    let url = ObjectUrl::create(ctx.blobs(), &file);
    let blob = AssetBlob { url: url.as_str().to_string(), name: file.name().to_string(), bytes: file.bytes.clone() };
    debug!("Decoding '{}' via {}", file.name(), url.as_str());
    let decoder = ctx.platform().decoder.clone();
    let decoded = decoder.decode(blob).await;
    drop(url);

    let decoded = match decoded {
        Ok(decoded) => decoded,
        Err(err) => {
            let reason = format!("{err:#}");
            error!("Failed to load model '{}': {reason}", file.name());
            ctx.emit(SceneEvent::AssetFailed { file: file.name().to_string(), reason: reason.clone() });
            return Err(IngestError::Decode { file: file.name().to_string(), reason });
        }
    };

    let Some(handle) = session.upgrade_live() else {
        debug!("Discarding '{}' decoded after session {} closed", file.name(), session.id());
        return Err(IngestError::SessionClosed { file: file.name().to_string() });
    };
    let entity = handle.borrow_mut().register_model(file.name(), &decoded);
    info!(
        "Loaded '{}' ({} nodes, {} meshes) into session {}",
        file.name(),
        decoded.node_count,
        decoded.mesh_count,
        handle.id()
    );
    ctx.emit(SceneEvent::AssetLoaded { session: handle.id(), file: file.name().to_string(), entity });
    Ok(entity)
}
