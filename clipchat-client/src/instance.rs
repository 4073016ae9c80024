//! One running copy per user session. Later launches wake the first one and exit.

use std::fmt;

pub const DEFAULT_LOCK_NAME: &str = "Local\\ClipChat-SingleInstance";
pub const DEFAULT_ACTIVATE_EVENT: &str = "Local\\ClipChat-Activate";

#[derive(Debug)]
pub enum InstanceError {
    CreateMutex { status: u32 },
    CreateEvent { status: u32 },
    OpenEvent { status: u32 },
    SetEvent { status: u32 },
    SpawnListener(std::io::Error),
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceError::CreateMutex { status } => write!(f, "CreateMutexW failed: {status}"),
            InstanceError::CreateEvent { status } => write!(f, "CreateEventW failed: {status}"),
            InstanceError::OpenEvent { status } => write!(f, "OpenEventW failed: {status}"),
            InstanceError::SetEvent { status } => write!(f, "SetEvent failed: {status}"),
            InstanceError::SpawnListener(e) => write!(f, "activation listener spawn failed: {e}"),
        }
    }
}

impl std::error::Error for InstanceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InstanceError::SpawnListener(e) => Some(e),
            _ => None,
        }
    }
}

pub enum LockOutcome {
    Primary(InstanceLock),
    AlreadyRunning,
}

pub enum LaunchDecision {
    /// Start the UI. `None` means the lock could not be taken and we run unguarded.
    Run(Option<InstanceLock>),
    /// Another copy owns the session; wake it and exit.
    ActivateExisting,
}

pub fn decide_launch(outcome: Result<LockOutcome, InstanceError>) -> LaunchDecision {
    match outcome {
        Ok(LockOutcome::Primary(lock)) => LaunchDecision::Run(Some(lock)),
        Ok(LockOutcome::AlreadyRunning) => LaunchDecision::ActivateExisting,
        Err(err) => {
            tracing::warn!("single-instance lock unavailable, continuing without it: {err}");
            LaunchDecision::Run(None)
        }
    }
}

pub use platform::{ActivationEvent, InstanceLock, acquire_lock, signal_primary};

#[cfg(target_os = "windows")]
mod platform {
    use windows_sys::Win32::Foundation::{
        CloseHandle, ERROR_ALREADY_EXISTS, GetLastError, HANDLE,
    };
    use windows_sys::Win32::System::Threading::{
        CreateEventW, CreateMutexW, EVENT_MODIFY_STATE, OpenEventW, SetEvent, WaitForSingleObject,
    };

    use super::{InstanceError, LockOutcome};

    const INFINITE: u32 = 0xFFFF_FFFF;
    const WAIT_OBJECT_0: u32 = 0;

    /// Holds the named mutex for the life of the process.
    #[derive(Debug)]
    pub struct InstanceLock {
        handle: HANDLE,
    }

    impl Drop for InstanceLock {
        fn drop(&mut self) {
            unsafe { CloseHandle(self.handle) };
        }
    }

    pub fn acquire_lock(name: &str) -> Result<LockOutcome, InstanceError> {
        let name_w = wide_null(name);
        let handle = unsafe { CreateMutexW(std::ptr::null(), 0, name_w.as_ptr()) };
        let status = unsafe { GetLastError() };
        if handle == 0 {
            return Err(InstanceError::CreateMutex { status });
        }
        if status == ERROR_ALREADY_EXISTS {
            unsafe { CloseHandle(handle) };
            return Ok(LockOutcome::AlreadyRunning);
        }
        Ok(LockOutcome::Primary(InstanceLock { handle }))
    }

    pub fn signal_primary(event_name: &str) -> Result<(), InstanceError> {
        let name_w = wide_null(event_name);
        let handle = unsafe { OpenEventW(EVENT_MODIFY_STATE, 0, name_w.as_ptr()) };
        if handle == 0 {
            let status = unsafe { GetLastError() };
            return Err(InstanceError::OpenEvent { status });
        }
        let ok = unsafe { SetEvent(handle) };
        let status = unsafe { GetLastError() };
        unsafe { CloseHandle(handle) };
        if ok == 0 {
            return Err(InstanceError::SetEvent { status });
        }
        Ok(())
    }

    /// The primary's auto-reset event. Signals that arrive before [`ActivationEvent::listen`]
    /// stay pending until the listener starts.
    #[derive(Debug)]
    pub struct ActivationEvent {
        handle: HANDLE,
    }

    impl Drop for ActivationEvent {
        fn drop(&mut self) {
            unsafe { CloseHandle(self.handle) };
        }
    }

    impl ActivationEvent {
        pub fn create(event_name: &str) -> Result<Self, InstanceError> {
            let name_w = wide_null(event_name);
            // Auto-reset, initially unsignalled.
            let handle = unsafe { CreateEventW(std::ptr::null(), 0, 0, name_w.as_ptr()) };
            if handle == 0 {
                let status = unsafe { GetLastError() };
                return Err(InstanceError::CreateEvent { status });
            }
            Ok(Self { handle })
        }

        /// Runs `on_activate` on a background thread each time a later launch signals.
        pub fn listen<F>(self, on_activate: F) -> Result<(), InstanceError>
        where
            F: Fn() + Send + 'static,
        {
            std::thread::Builder::new()
                .name("clipchat-activate".to_owned())
                .spawn(move || {
                    let event = self;
                    loop {
                        let wait = unsafe { WaitForSingleObject(event.handle, INFINITE) };
                        if wait != WAIT_OBJECT_0 {
                            tracing::warn!(wait, "activation wait ended");
                            break;
                        }
                        tracing::info!("activation requested by another launch");
                        on_activate();
                    }
                })
                .map_err(InstanceError::SpawnListener)?;
            Ok(())
        }
    }

    fn wide_null(s: &str) -> Vec<u16> {
        let mut v: Vec<u16> = s.encode_utf16().collect();
        v.push(0);
        v
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::{InstanceError, LockOutcome};

    #[derive(Debug)]
    pub struct InstanceLock;

    pub fn acquire_lock(_name: &str) -> Result<LockOutcome, InstanceError> {
        Ok(LockOutcome::Primary(InstanceLock))
    }

    pub fn signal_primary(_event_name: &str) -> Result<(), InstanceError> {
        Ok(())
    }

    #[derive(Debug)]
    pub struct ActivationEvent;

    impl ActivationEvent {
        pub fn create(_event_name: &str) -> Result<Self, InstanceError> {
            Ok(Self)
        }

        pub fn listen<F>(self, _on_activate: F) -> Result<(), InstanceError>
        where
            F: Fn() + Send + 'static,
        {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_launch_activates_the_first() {
        assert!(matches!(
            decide_launch(Ok(LockOutcome::AlreadyRunning)),
            LaunchDecision::ActivateExisting
        ));
    }

    #[test]
    fn lock_failure_still_runs_the_app() {
        let decision = decide_launch(Err(InstanceError::CreateMutex { status: 5 }));
        assert!(matches!(decision, LaunchDecision::Run(None)));
    }

    #[test]
    fn primary_keeps_its_lock() {
        let name = format!("Local\\ClipChat-Test-Primary-{}", std::process::id());
        let outcome = acquire_lock(&name).expect("acquire");
        assert!(matches!(decide_launch(Ok(outcome)), LaunchDecision::Run(Some(_))));
    }
}
