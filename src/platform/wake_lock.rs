//! Best-effort wake lock
//!
//! The timer holds a wake lock while it runs so the display does not sleep
//! in the middle of a screen-time grant. Platforms without support are
//! tolerated silently and the platform may revoke a held lock at any time.

use std::{fmt, sync::Arc};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::WakeLockError;

/// A granted wake lock
pub trait WakeLockSentinel: Send + fmt::Debug {
    /// False once the platform has dropped the lock on its own
    fn is_active(&mut self) -> bool;

    fn release(&mut self);
}

/// Something that can hand out wake locks
pub trait WakeLockProvider: Send + Sync + fmt::Debug {
    fn request(&self) -> Result<Box<dyn WakeLockSentinel>, WakeLockError>;
}

/// Whether the platform offers wake locks at all
#[derive(Debug, Clone)]
pub enum WakeLockCapability {
    Available(Arc<dyn WakeLockProvider>),
    Unavailable,
}

impl WakeLockCapability {
    /// Use `systemd-inhibit` when it is installed
    pub async fn detect() -> Self {
        let probe = Command::new("systemd-inhibit").arg("--version").output().await;
        match probe {
            Ok(output) if output.status.success() => {
                info!("systemd-inhibit is available, wake lock enabled");
                Self::Available(Arc::new(SystemdInhibitor::default()))
            }
            _ => {
                debug!("systemd-inhibit not found, wake lock disabled");
                Self::Unavailable
            }
        }
    }
}

/// Wake lock owned by a running timer
#[derive(Debug)]
pub struct WakeLock {
    capability: WakeLockCapability,
    sentinel: Option<Box<dyn WakeLockSentinel>>,
}

impl WakeLock {
    pub fn new(capability: WakeLockCapability) -> Self {
        Self {
            capability,
            sentinel: None,
        }
    }

    /// Acquire the lock, replacing one the platform revoked
    ///
    /// Failures are logged and otherwise ignored.
    pub fn acquire(&mut self) {
        let provider = match &self.capability {
            WakeLockCapability::Available(provider) => Arc::clone(provider),
            WakeLockCapability::Unavailable => return,
        };

        if let Some(sentinel) = self.sentinel.as_mut() {
            if sentinel.is_active() {
                return;
            }
            info!("Wake lock was revoked, re-acquiring");
            self.sentinel = None;
        }

        match provider.request() {
            Ok(sentinel) => {
                debug!("Wake lock acquired");
                self.sentinel = Some(sentinel);
            }
            Err(e) => warn!("Failed to acquire wake lock: {}", e),
        }
    }

    pub fn release(&mut self) {
        if let Some(mut sentinel) = self.sentinel.take() {
            sentinel.release();
            debug!("Wake lock released");
        }
    }

    pub fn is_held(&mut self) -> bool {
        self.sentinel.as_mut().is_some_and(|s| s.is_active())
    }
}

impl Drop for WakeLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Holds an idle/sleep inhibitor through a `systemd-inhibit` child process
#[derive(Debug, Clone)]
pub struct SystemdInhibitor {
    pub why: String,
}

impl Default for SystemdInhibitor {
    fn default() -> Self {
        Self {
            why: "EarnQuest timer running".to_string(),
        }
    }
}

impl WakeLockProvider for SystemdInhibitor {
    fn request(&self) -> Result<Box<dyn WakeLockSentinel>, WakeLockError> {
        let child = Command::new("systemd-inhibit")
            .args(["--what=idle:sleep", "--who=earnquest-timer", "--mode=block"])
            .arg(format!("--why={}", self.why))
            .args(["sleep", "infinity"])
            .kill_on_drop(true)
            .spawn()?;
        Ok(Box::new(InhibitorProcess { child }))
    }
}

#[derive(Debug)]
struct InhibitorProcess {
    child: Child,
}

impl WakeLockSentinel for InhibitorProcess {
    fn is_active(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn release(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("Inhibitor already gone: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    /// Counts grants and releases; `revoke` simulates the OS dropping the lock
    #[derive(Debug, Default)]
    pub struct FakeWakeLock {
        pub granted: AtomicUsize,
        pub released: AtomicUsize,
        pub revoked: Arc<AtomicBool>,
    }

    impl FakeWakeLock {
        pub fn revoke(&self) {
            self.revoked.store(true, Ordering::SeqCst);
        }

        pub fn granted(&self) -> usize {
            self.granted.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    #[derive(Debug)]
    struct FakeSentinel {
        owner: Arc<FakeWakeLock>,
    }

    impl WakeLockSentinel for FakeSentinel {
        fn is_active(&mut self) -> bool {
            !self.owner.revoked.load(Ordering::SeqCst)
        }

        fn release(&mut self) {
            self.owner.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    pub struct FakeProvider(pub Arc<FakeWakeLock>);

    impl WakeLockProvider for FakeProvider {
        fn request(&self) -> Result<Box<dyn WakeLockSentinel>, WakeLockError> {
            self.0.revoked.store(false, Ordering::SeqCst);
            self.0.granted.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSentinel {
                owner: Arc::clone(&self.0),
            }))
        }
    }

    pub fn fake_capability() -> (WakeLockCapability, Arc<FakeWakeLock>) {
        let fake = Arc::new(FakeWakeLock::default());
        let capability = WakeLockCapability::Available(Arc::new(FakeProvider(Arc::clone(&fake))));
        (capability, fake)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::fake_capability;
    use super::*;

    #[test]
    fn acquire_is_idempotent_while_held() {
        let (capability, fake) = fake_capability();
        let mut lock = WakeLock::new(capability);

        lock.acquire();
        lock.acquire();

        assert!(lock.is_held());
        assert_eq!(fake.granted(), 1);
    }

    #[test]
    fn revoked_lock_is_reacquired() {
        let (capability, fake) = fake_capability();
        let mut lock = WakeLock::new(capability);

        lock.acquire();
        fake.revoke();
        assert!(!lock.is_held());

        lock.acquire();
        assert!(lock.is_held());
        assert_eq!(fake.granted(), 2);
    }

    #[test]
    fn release_on_drop() {
        let (capability, fake) = fake_capability();
        {
            let mut lock = WakeLock::new(capability);
            lock.acquire();
        }
        assert_eq!(fake.released(), 1);
    }

    #[test]
    fn unavailable_platform_is_silent() {
        let mut lock = WakeLock::new(WakeLockCapability::Unavailable);
        lock.acquire();
        assert!(!lock.is_held());
        lock.release();
    }
}
