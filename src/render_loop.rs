use crate::session::{SessionHandle, SessionId, WeakSession};
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub struct FrameClock {
    start: Instant,
    last: Instant,
    pub delta: Duration,
    frames: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now, delta: Duration::ZERO, frames: 0 }
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last;
        self.last = now;
        self.frames += 1;
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.last.duration_since(self.start).as_secs_f32()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn average_fps(&self) -> f32 {
        let elapsed = self.elapsed_seconds();
        if elapsed <= f32::EPSILON {
            return 0.0;
        }
        self.frames as f32 / elapsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopHandle(u64);

struct ActiveLoop {
    owner: SessionId,
    session: WeakSession,
}

/// Per-frame callbacks, one per session. Cancelling a handle guarantees its session is never
/// rendered again.
#[derive(Default)]
pub struct FrameScheduler {
    next: u64,
    active: BTreeMap<LoopHandle, ActiveLoop>,
    frames: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, session: &SessionHandle) -> LoopHandle {
        self.next += 1;
        let handle = LoopHandle(self.next);
        self.active.insert(handle, ActiveLoop { owner: session.id(), session: session.downgrade() });
        debug!("Animation loop {:?} started for session {}", handle, session.id());
        handle
    }

    pub fn cancel(&mut self, handle: LoopHandle) -> bool {
        self.active.remove(&handle).is_some()
    }

    pub fn is_active(&self, handle: LoopHandle) -> bool {
        self.active.contains_key(&handle)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn owners(&self) -> Vec<SessionId> {
        self.active.values().map(|entry| entry.owner).collect()
    }

    pub fn frames_dispatched(&self) -> u64 {
        self.frames
    }

    fn snapshot(&self) -> Vec<(LoopHandle, WeakSession)> {
        self.active.iter().map(|(handle, entry)| (*handle, entry.session.clone())).collect()
    }
}

/// Runs one frame for every active loop. Loops whose session is gone are dropped.
pub fn run_frame(scheduler: &Rc<RefCell<FrameScheduler>>) -> usize {
    let loops = scheduler.borrow().snapshot();
    let mut rendered = 0;
    for (handle, session) in loops {
        match session.upgrade_live() {
            Some(session) => {
                if session.borrow_mut().render_frame() {
                    rendered += 1;
                }
            }
            None => {
                warn!("Dropping animation loop {:?} for closed session {}", handle, session.id());
                scheduler.borrow_mut().cancel(handle);
            }
        }
    }
    scheduler.borrow_mut().frames += rendered as u64;
    rendered
}
