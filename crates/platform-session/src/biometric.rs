//! Biometric gate abstraction.

use crate::error::GateError;
use async_trait::async_trait;

/// Yes/no device-owner check performed before a biometric-assisted login.
#[async_trait]
pub trait BiometricGate: Send + Sync {
    /// Whether biometric authentication can be attempted on this device.
    fn is_available(&self) -> bool;

    /// Prompt the user. `Ok(())` means the owner was verified.
    async fn authenticate(&self, reason: &str) -> Result<(), GateError>;
}

/// Gate with a fixed answer.
///
/// [`StaticBiometricGate::unavailable`] is the right choice on platforms
/// with no biometric hardware.
#[derive(Debug, Clone, Copy)]
pub struct StaticBiometricGate {
    available: bool,
    outcome: Result<(), GateError>,
}

impl StaticBiometricGate {
    /// Gate that is available and always verifies the user.
    pub fn approving() -> Self {
        Self {
            available: true,
            outcome: Ok(()),
        }
    }

    /// Gate that is available and always fails with `error`.
    pub fn failing(error: GateError) -> Self {
        Self {
            available: true,
            outcome: Err(error),
        }
    }

    /// Gate that reports no biometric support.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            outcome: Err(GateError::NotAvailable),
        }
    }
}

#[async_trait]
impl BiometricGate for StaticBiometricGate {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn authenticate(&self, _reason: &str) -> Result<(), GateError> {
        if !self.available {
            return Err(GateError::NotAvailable);
        }
        self.outcome
    }
}
