use crate::capability::OrientationPermission;
use crate::session::SessionId;
use bevy_ecs::prelude::Entity;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone)]
pub enum SceneEvent {
    SessionStarted { session: SessionId, scene: String },
    SessionTornDown { session: SessionId, nodes: usize, listeners: usize },
    SceneFailed { scene: String, reason: String },
    XrCapability { session: SessionId, supported: bool },
    OrientationPermission { session: SessionId, state: OrientationPermission },
    LiveSourceReady { session: SessionId, width: u32, height: u32 },
    LiveSourceUnavailable { session: SessionId, reason: String },
    LiveSourceToggled { session: SessionId, visible: bool },
    BackgroundColorChanged { session: SessionId, color: String },
    AssetLoaded { session: SessionId, file: String, entity: Entity },
    AssetFailed { file: String, reason: String },
    AudioCueStarted { session: SessionId, cue: String },
    AudioCueFailed { cue: String, reason: String },
    /// User-facing message, the equivalent of an alert box.
    Notice { message: String },
}

impl SceneEvent {
    pub fn notice(message: impl Into<String>) -> Self {
        SceneEvent::Notice { message: message.into() }
    }

    pub fn is_notice(&self) -> bool {
        matches!(self, SceneEvent::Notice { .. })
    }
}

impl fmt::Display for SceneEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneEvent::SessionStarted { session, scene } => {
                write!(f, "SessionStarted session={session} scene={scene}")
            }
            SceneEvent::SessionTornDown { session, nodes, listeners } => {
                write!(f, "SessionTornDown session={session} nodes={nodes} listeners={listeners}")
            }
            SceneEvent::SceneFailed { scene, reason } => write!(f, "SceneFailed scene={scene} reason={reason}"),
            SceneEvent::XrCapability { session, supported } => {
                write!(f, "XrCapability session={session} supported={supported}")
            }
            SceneEvent::OrientationPermission { session, state } => {
                write!(f, "OrientationPermission session={session} state={}", state.label())
            }
            SceneEvent::LiveSourceReady { session, width, height } => {
                write!(f, "LiveSourceReady session={session} size={width}x{height}")
            }
            SceneEvent::LiveSourceUnavailable { session, reason } => {
                write!(f, "LiveSourceUnavailable session={session} reason={reason}")
            }
            SceneEvent::LiveSourceToggled { session, visible } => {
                write!(f, "LiveSourceToggled session={session} visible={visible}")
            }
            SceneEvent::BackgroundColorChanged { session, color } => {
                write!(f, "BackgroundColorChanged session={session} color={color}")
            }
            SceneEvent::AssetLoaded { session, file, entity } => {
                write!(f, "AssetLoaded session={session} file={file} entity={}", entity.index())
            }
            SceneEvent::AssetFailed { file, reason } => write!(f, "AssetFailed file={file} reason={reason}"),
            SceneEvent::AudioCueStarted { session, cue } => {
                write!(f, "AudioCueStarted session={session} cue={cue}")
            }
            SceneEvent::AudioCueFailed { cue, reason } => write!(f, "AudioCueFailed cue={cue} reason={reason}"),
            SceneEvent::Notice { message } => write!(f, "Notice {message}"),
        }
    }
}

/// Events kept by a default [`EventBus`]. Older entries are dropped first.
pub const EVENT_LOG_CAPACITY: usize = 64;

/// Host-scoped event log. Outlives individual sessions so the host can surface notices, but keeps
/// only the most recent `capacity` events.
pub struct EventBus {
    events: VecDeque<SceneEvent>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { events: VecDeque::with_capacity(capacity), capacity, dropped: 0 }
    }

    pub fn push(&mut self, event: SceneEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<SceneEvent> {
        self.events.drain(..).collect()
    }

    /// Forgets pending notices. Called when the session that raised them is torn down.
    pub fn discard_notices(&mut self) -> usize {
        let before = self.events.len();
        self.events.retain(|event| !event.is_notice());
        before - self.events.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneEvent> {
        self.events.iter()
    }

    pub fn notices(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|event| match event {
            SceneEvent::Notice { message } => Some(message.as_str()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events evicted to respect the capacity.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
