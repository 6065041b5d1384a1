use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ResourceError;

/// Handle to an OS-granted hint that keeps the display awake
#[derive(Debug, PartialEq, Eq)]
pub struct ScreenLock {
    id: Uuid,
}

impl ScreenLock {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for ScreenLock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait ScreenLockProvider: Send + Sync {
    /// `Ok(None)` means the platform has no screen lock support
    async fn acquire(&self) -> Result<Option<ScreenLock>, ResourceError>;
    async fn release(&self, lock: ScreenLock) -> Result<(), ResourceError>;
}

/// Provider for platforms without screen lock support
pub struct UnsupportedScreenLock;

#[async_trait]
impl ScreenLockProvider for UnsupportedScreenLock {
    async fn acquire(&self) -> Result<Option<ScreenLock>, ResourceError> {
        Ok(None)
    }

    async fn release(&self, _lock: ScreenLock) -> Result<(), ResourceError> {
        Ok(())
    }
}
