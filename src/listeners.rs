use crate::assets::FileHandle;
use crate::session::SessionId;
use glam::Vec2;
use std::cell::RefCell;
use std::rc::Rc;
use winit::dpi::PhysicalSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub position: Vec2,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, x: f32, y: f32) -> Self {
        Self { phase, position: Vec2::new(x, y) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrSessionEvent {
    Started,
    Ended,
}

/// Page-level triggers. These stand in for window/document events and button clicks.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Resize(PhysicalSize<u32>),
    StartRequested,
    ToggleLiveBackground,
    FileChosen(FileHandle),
    UserGesture,
    Pointer(PointerEvent),
    XrSession(XrSessionEvent),
    CameraRevoked { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Resize,
    StartRequested,
    ToggleLiveBackground,
    FileChosen,
    UserGesture,
    Pointer,
    XrSession,
    CameraRevoked,
}

impl HostEvent {
    pub fn kind(&self) -> ListenerKind {
        match self {
            HostEvent::Resize(_) => ListenerKind::Resize,
            HostEvent::StartRequested => ListenerKind::StartRequested,
            HostEvent::ToggleLiveBackground => ListenerKind::ToggleLiveBackground,
            HostEvent::FileChosen(_) => ListenerKind::FileChosen,
            HostEvent::UserGesture => ListenerKind::UserGesture,
            HostEvent::Pointer(_) => ListenerKind::Pointer,
            HostEvent::XrSession(_) => ListenerKind::XrSession,
            HostEvent::CameraRevoked { .. } => ListenerKind::CameraRevoked,
        }
    }

    /// Whether the event counts as a user activation (needed for sensor permission prompts).
    pub fn is_user_gesture(&self) -> bool {
        matches!(
            self,
            HostEvent::UserGesture
                | HostEvent::StartRequested
                | HostEvent::ToggleLiveBackground
                | HostEvent::Pointer(PointerEvent { phase: PointerPhase::Down, .. })
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback = Rc<RefCell<dyn FnMut(&HostEvent)>>;

struct ListenerEntry {
    id: ListenerId,
    owner: SessionId,
    kind: ListenerKind,
    once: bool,
    callback: Callback,
}

/// Host-level listener table. Every entry is tagged with the session that registered it so
/// teardown can remove exactly that session's handlers.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    entries: Vec<ListenerEntry>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        owner: SessionId,
        kind: ListenerKind,
        callback: impl FnMut(&HostEvent) + 'static,
    ) -> ListenerId {
        self.insert(owner, kind, false, Rc::new(RefCell::new(callback)))
    }

    /// Registers a handler that removes itself after its first invocation.
    pub fn add_once(
        &mut self,
        owner: SessionId,
        kind: ListenerKind,
        callback: impl FnMut(&HostEvent) + 'static,
    ) -> ListenerId {
        self.insert(owner, kind, true, Rc::new(RefCell::new(callback)))
    }

    fn insert(&mut self, owner: SessionId, kind: ListenerKind, once: bool, callback: Callback) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push(ListenerEntry { id, owner, kind, once, callback });
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn remove_owned_by(&mut self, owner: SessionId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.owner != owner);
        before - self.entries.len()
    }

    pub fn count(&self, kind: ListenerKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }

    pub fn count_owned_by(&self, owner: SessionId) -> usize {
        self.entries.iter().filter(|entry| entry.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take_matching(&mut self, kind: ListenerKind) -> Vec<Callback> {
        let callbacks =
            self.entries.iter().filter(|entry| entry.kind == kind).map(|entry| entry.callback.clone()).collect();
        self.entries.retain(|entry| !(entry.once && entry.kind == kind));
        callbacks
    }
}

/// Invokes every handler registered for the event's kind. The registry is not borrowed while
/// handlers run, so handlers may register or remove listeners.
pub fn dispatch(registry: &Rc<RefCell<ListenerRegistry>>, event: &HostEvent) -> usize {
    let callbacks = registry.borrow_mut().take_matching(event.kind());
    for callback in &callbacks {
        (callback.borrow_mut())(event);
    }
    callbacks.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn remove_owned_by_only_touches_that_session() {
        let mut registry = ListenerRegistry::new();
        let a = SessionId::from_raw(1);
        let b = SessionId::from_raw(2);
        registry.add(a, ListenerKind::Resize, |_| {});
        registry.add(a, ListenerKind::Pointer, |_| {});
        registry.add(b, ListenerKind::Resize, |_| {});
        assert_eq!(registry.remove_owned_by(a), 2);
        assert_eq!(registry.count(ListenerKind::Resize), 1);
        assert_eq!(registry.count_owned_by(b), 1);
    }

    #[test]
    fn once_listeners_fire_a_single_time() {
        let registry = Rc::new(RefCell::new(ListenerRegistry::new()));
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        registry.borrow_mut().add_once(SessionId::from_raw(1), ListenerKind::StartRequested, move |_| {
            counter.set(counter.get() + 1);
        });
        assert_eq!(dispatch(&registry, &HostEvent::StartRequested), 1);
        assert_eq!(dispatch(&registry, &HostEvent::StartRequested), 0);
        assert_eq!(hits.get(), 1);
        assert!(registry.borrow().is_empty());
    }

    #[test]
    fn handlers_may_mutate_registry_during_dispatch() {
        let registry = Rc::new(RefCell::new(ListenerRegistry::new()));
        let inner = registry.clone();
        registry.borrow_mut().add(SessionId::from_raw(1), ListenerKind::Resize, move |_| {
            inner.borrow_mut().remove_owned_by(SessionId::from_raw(1));
        });
        assert_eq!(dispatch(&registry, &HostEvent::Resize(PhysicalSize::new(10, 10))), 1);
        assert!(registry.borrow().is_empty());
    }

    #[test]
    fn pointer_down_counts_as_gesture() {
        assert!(HostEvent::Pointer(PointerEvent::new(PointerPhase::Down, 0.0, 0.0)).is_user_gesture());
        assert!(!HostEvent::Pointer(PointerEvent::new(PointerPhase::Move, 0.0, 0.0)).is_user_gesture());
        assert!(!HostEvent::Resize(PhysicalSize::new(1, 1)).is_user_gesture());
    }
}
