//! Microphone and recognition permission checks.

use crate::error::{Result, SessionError};
use async_trait::async_trait;

/// Platform permission gate consulted before any pipeline is built.
#[async_trait]
pub trait PermissionProbe: Send + Sync {
    async fn check_microphone(&self) -> Result<()>;
    async fn check_recognition(&self) -> Result<()>;
}

/// Probe for platforms without a permission broker; everything is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantedPermissions;

#[async_trait]
impl PermissionProbe for GrantedPermissions {
    async fn check_microphone(&self) -> Result<()> {
        Ok(())
    }

    async fn check_recognition(&self) -> Result<()> {
        Ok(())
    }
}

/// Probe for tests with deniable permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockPermissionProbe {
    deny_microphone: bool,
    deny_recognition: bool,
}

impl MockPermissionProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_microphone(mut self) -> Self {
        self.deny_microphone = true;
        self
    }

    pub fn deny_recognition(mut self) -> Self {
        self.deny_recognition = true;
        self
    }
}

#[async_trait]
impl PermissionProbe for MockPermissionProbe {
    async fn check_microphone(&self) -> Result<()> {
        if self.deny_microphone {
            Err(SessionError::MicrophonePermissionDenied)
        } else {
            Ok(())
        }
    }

    async fn check_recognition(&self) -> Result<()> {
        if self.deny_recognition {
            Err(SessionError::RecognitionPermissionDenied)
        } else {
            Ok(())
        }
    }
}
