use crate::events::SceneEvent;
use crate::host::HostContext;
use crate::platform::{OrientationSensors, XrRuntime, XrSessionMode};
use crate::session::WeakSession;
use log::{debug, info, warn};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientationPermission {
    Unknown,
    Requesting,
    Granted,
    Denied,
    /// The platform has no explicit-permission gate; treated as granted.
    NotRequired,
}

impl OrientationPermission {
    pub fn label(self) -> &'static str {
        match self {
            OrientationPermission::Unknown => "unknown",
            OrientationPermission::Requesting => "requesting",
            OrientationPermission::Granted => "granted",
            OrientationPermission::Denied => "denied",
            OrientationPermission::NotRequired => "not-required",
        }
    }

    pub fn is_usable(self) -> bool {
        matches!(self, OrientationPermission::Granted | OrientationPermission::NotRequired)
    }
}

/// Session-scoped capability facts. XR support resolves once; orientation permission is
/// requested at most once.
#[derive(Debug, Clone)]
pub struct CapabilityState {
    xr_supported: Option<bool>,
    orientation: OrientationPermission,
    sensor_prompt_visible: bool,
}

impl Default for CapabilityState {
    fn default() -> Self {
        Self { xr_supported: None, orientation: OrientationPermission::Unknown, sensor_prompt_visible: false }
    }
}

impl CapabilityState {
    pub fn xr_supported(&self) -> bool {
        self.xr_supported.unwrap_or(false)
    }

    pub fn xr_resolved(&self) -> bool {
        self.xr_supported.is_some()
    }

    /// Records the XR probe result. Later calls are ignored; returns the settled value.
    pub fn resolve_xr(&mut self, supported: bool) -> bool {
        *self.xr_supported.get_or_insert(supported)
    }

    pub fn orientation(&self) -> OrientationPermission {
        self.orientation
    }

    pub fn sensor_prompt_visible(&self) -> bool {
        self.sensor_prompt_visible
    }

    /// Decides whether the "enable sensor" affordance is needed at all.
    pub fn configure_sensor_gate(&mut self, requires_permission: bool) {
        if requires_permission {
            self.sensor_prompt_visible = self.orientation == OrientationPermission::Unknown;
        } else {
            self.orientation = OrientationPermission::NotRequired;
            self.sensor_prompt_visible = false;
        }
    }

    /// Claims the single permission request for this session.
    pub fn begin_orientation_request(&mut self) -> bool {
        if self.orientation != OrientationPermission::Unknown {
            return false;
        }
        self.orientation = OrientationPermission::Requesting;
        true
    }

    /// Settles the request. The prompt goes away either way: there is never a second request.
    pub fn finish_orientation_request(&mut self, result: OrientationPermission) {
        self.orientation = result;
        self.sensor_prompt_visible = false;
    }
}

/// Asks the platform whether immersive XR is available. Absence and errors both mean `false`.
pub async fn probe_xr(runtime: Option<&dyn XrRuntime>) -> bool {
    let Some(runtime) = runtime else {
        warn!("WebXR runtime not present; continuing without immersive mode");
        return false;
    };
    match runtime.is_session_supported(XrSessionMode::ImmersiveVr).await {
        Ok(supported) => {
            info!("Immersive XR supported: {supported}");
            supported
        }
        Err(err) => {
            warn!("XR support query failed: {err:#}");
            false
        }
    }
}

/// Requests orientation-sensor access. Must be driven from a user gesture on platforms that
/// gate the API.
pub async fn probe_orientation_permission(sensors: Option<&dyn OrientationSensors>) -> OrientationPermission {
    let Some(sensors) = sensors else {
        return OrientationPermission::NotRequired;
    };
    if !sensors.requires_permission() {
        return OrientationPermission::NotRequired;
    }
    match sensors.request_permission().await {
        Ok(true) => OrientationPermission::Granted,
        Ok(false) => {
            warn!("Orientation sensor permission denied");
            OrientationPermission::Denied
        }
        Err(err) => {
            warn!("Orientation sensor permission request failed: {err:#}");
            OrientationPermission::Denied
        }
    }
}

/// Runs the single gesture-driven permission request for a session and records the result.
/// Returns `None` when the request was already claimed or the session closed meanwhile.
pub async fn request_orientation_permission(
    session: WeakSession,
    ctx: Rc<HostContext>,
) -> Option<OrientationPermission> {
    {
        let handle = session.upgrade_live()?;
        let mut guard = handle.borrow_mut();
        if !guard.capabilities_mut().begin_orientation_request() {
            return None;
        }
    }
    let sensors = ctx.platform().sensors.clone();
    let result = probe_orientation_permission(sensors.as_deref()).await;
    let Some(handle) = session.upgrade_live() else {
        debug!("Discarding orientation permission for closed session {}", session.id());
        return None;
    };
    handle.borrow_mut().capabilities_mut().finish_orientation_request(result);
    ctx.emit(SceneEvent::OrientationPermission { session: handle.id(), state: result });
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use futures::future::{FutureExt, LocalBoxFuture};
    use std::cell::Cell;

    struct FixedXr(Result<bool, String>);

    impl XrRuntime for FixedXr {
        fn is_session_supported(&self, _mode: XrSessionMode) -> LocalBoxFuture<'_, Result<bool>> {
            let result = self.0.clone().map_err(|msg| anyhow!(msg));
            async move { result }.boxed_local()
        }

        fn controller(&self, _index: usize) -> Result<crate::platform::XrControllerSpace> {
            Err(anyhow!("no controllers"))
        }
    }

    struct CountingSensors {
        required: bool,
        grant: bool,
        calls: Cell<u32>,
    }

    impl OrientationSensors for CountingSensors {
        fn requires_permission(&self) -> bool {
            self.required
        }

        fn request_permission(&self) -> LocalBoxFuture<'_, Result<bool>> {
            self.calls.set(self.calls.get() + 1);
            let grant = self.grant;
            async move { Ok(grant) }.boxed_local()
        }
    }

    #[test]
    fn xr_probe_never_raises() {
        assert!(!futures::executor::block_on(probe_xr(None)));
        let failing = FixedXr(Err("SecurityError".into()));
        assert!(!futures::executor::block_on(probe_xr(Some(&failing))));
        let ok = FixedXr(Ok(true));
        assert!(futures::executor::block_on(probe_xr(Some(&ok))));
    }

    #[test]
    fn xr_resolution_is_immutable() {
        let mut state = CapabilityState::default();
        assert!(!state.xr_resolved());
        assert!(state.resolve_xr(true));
        assert!(state.resolve_xr(false), "first resolution wins");
        assert!(state.xr_supported());
    }

    #[test]
    fn permission_without_gate_is_not_required() {
        let sensors = CountingSensors { required: false, grant: false, calls: Cell::new(0) };
        let state = futures::executor::block_on(probe_orientation_permission(Some(&sensors)));
        assert_eq!(state, OrientationPermission::NotRequired);
        assert!(state.is_usable());
        assert_eq!(sensors.calls.get(), 0);
    }

    #[test]
    fn permission_request_is_claimed_once() {
        let mut state = CapabilityState::default();
        state.configure_sensor_gate(true);
        assert!(state.sensor_prompt_visible());
        assert!(state.begin_orientation_request());
        assert!(!state.begin_orientation_request());

        let sensors = CountingSensors { required: true, grant: true, calls: Cell::new(0) };
        let result = futures::executor::block_on(probe_orientation_permission(Some(&sensors)));
        state.finish_orientation_request(result);
        assert_eq!(state.orientation(), OrientationPermission::Granted);
        assert!(!state.sensor_prompt_visible());
        assert!(!state.begin_orientation_request());
    }
}
