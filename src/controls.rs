use bevy_ecs::prelude::Entity;
use log::debug;

/// Which input scheme currently owns camera and object manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    #[default]
    Orbit,
    Dragging {
        entity: Entity,
    },
    XrPresenting,
}

impl ControlMode {
    pub fn label(self) -> &'static str {
        match self {
            ControlMode::Orbit => "Orbit",
            ControlMode::Dragging { .. } => "Dragging",
            ControlMode::XrPresenting => "XR presenting",
        }
    }
}

/// Enforces that orbit and drag never run together, and that XR presentation overrides both.
#[derive(Debug, Default)]
pub struct ControlArbiter {
    mode: ControlMode,
}

impl ControlArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn orbit_enabled(&self) -> bool {
        self.mode == ControlMode::Orbit
    }

    pub fn dragging(&self) -> Option<Entity> {
        match self.mode {
            ControlMode::Dragging { entity } => Some(entity),
            _ => None,
        }
    }

    /// Attempts to enter `Dragging`. Non-draggable targets, XR presentation, and an already
    /// running drag all leave the mode untouched and return false.
    pub fn begin_drag(&mut self, entity: Entity, draggable: bool) -> bool {
        if !draggable {
            debug!("Ignoring drag start on non-draggable entity {}", entity.index());
            return false;
        }
        match self.mode {
            ControlMode::Orbit => {
                self.mode = ControlMode::Dragging { entity };
                true
            }
            ControlMode::Dragging { .. } | ControlMode::XrPresenting => false,
        }
    }

    /// Ends (or cancels) the active drag. Returns the entity that was being dragged.
    pub fn end_drag(&mut self) -> Option<Entity> {
        let entity = self.dragging()?;
        self.mode = ControlMode::Orbit;
        Some(entity)
    }

    /// XR presentation takes precedence. Returns the drag it interrupted, if any.
    pub fn xr_presenting_started(&mut self) -> Option<Entity> {
        let interrupted = self.dragging();
        self.mode = ControlMode::XrPresenting;
        interrupted
    }

    pub fn xr_presenting_ended(&mut self) {
        if self.mode == ControlMode::XrPresenting {
            self.mode = ControlMode::Orbit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(index: u32) -> Entity {
        Entity::from_raw(index)
    }

    #[test]
    fn drag_suspends_orbit_until_end() {
        let mut arbiter = ControlArbiter::new();
        assert!(arbiter.orbit_enabled());
        assert!(arbiter.begin_drag(entity(3), true));
        assert!(!arbiter.orbit_enabled());
        assert_eq!(arbiter.end_drag(), Some(entity(3)));
        assert!(arbiter.orbit_enabled());
        assert_eq!(arbiter.end_drag(), None);
    }

    #[test]
    fn non_draggable_target_is_a_noop() {
        let mut arbiter = ControlArbiter::new();
        assert!(!arbiter.begin_drag(entity(1), false));
        assert_eq!(arbiter.mode(), ControlMode::Orbit);
    }

    #[test]
    fn xr_rejects_drag_and_cancels_running_one() {
        let mut arbiter = ControlArbiter::new();
        assert!(arbiter.begin_drag(entity(1), true));
        assert_eq!(arbiter.xr_presenting_started(), Some(entity(1)));
        assert!(!arbiter.begin_drag(entity(2), true));
        assert_eq!(arbiter.mode(), ControlMode::XrPresenting);
        assert!(!arbiter.orbit_enabled());
        arbiter.xr_presenting_ended();
        assert_eq!(arbiter.mode(), ControlMode::Orbit);
    }

    #[test]
    fn second_drag_does_not_steal_the_first() {
        let mut arbiter = ControlArbiter::new();
        assert!(arbiter.begin_drag(entity(1), true));
        assert!(!arbiter.begin_drag(entity(2), true));
        assert_eq!(arbiter.dragging(), Some(entity(1)));
    }
}
