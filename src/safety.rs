//! Safety controller: hard cutoff, off button, one-shot shutdown
//!
//! Two independent triggers can ask for the host to go down: the polling loop
//! when the pack reaches the critical voltage, and the button interrupt on its
//! own thread. Both go through [`ShutdownIntent::try_claim`], a single atomic
//! check-and-set, so the OS halt/reboot request is issued at most once per
//! process however the triggers interleave.
//!
//! ```text
//! IDLE --(critical voltage | button)--> SHUTDOWN_REQUESTED   (terminal)
//! ```

use crate::config::ButtonAction;
use crate::core::driver::PowerControl;
use crate::core::retry::RetryPolicy;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide one-shot flag. Never reset once set.
#[derive(Debug, Default)]
pub struct ShutdownIntent {
    requested: AtomicBool,
}

impl ShutdownIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. True only for the single caller that set it.
    pub fn try_claim(&self) -> bool {
        self.requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_set(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Privileged action requested from the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Halt,
    Reboot,
}

impl From<ButtonAction> for PowerAction {
    fn from(action: ButtonAction) -> Self {
        match action {
            ButtonAction::Halt => PowerAction::Halt,
            ButtonAction::Reboot => PowerAction::Reboot,
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerAction::Halt => write!(f, "halt"),
            PowerAction::Reboot => write!(f, "reboot"),
        }
    }
}

/// Result of a shutdown or restart request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// This call claimed the intent and the OS accepted the action
    Issued(PowerAction),
    /// Another trigger got there first; nothing was sent
    AlreadyRequested,
    /// This call claimed the intent but every attempt was rejected
    Failed(PowerAction),
}

impl fmt::Display for ShutdownOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownOutcome::Issued(action) => write!(f, "{} issued", action),
            ShutdownOutcome::AlreadyRequested => write!(f, "already requested"),
            ShutdownOutcome::Failed(action) => write!(f, "{} FAILED", action),
        }
    }
}

/// Owns the cutoff threshold and the only path to the OS power actions.
///
/// Shared (`Arc`) between the polling loop and the button interrupt.
pub struct SafetyController {
    intent: ShutdownIntent,
    power: Box<dyn PowerControl>,
    critical_voltage: f32,
    button_action: PowerAction,
    retry: RetryPolicy,
}

impl SafetyController {
    pub fn new(power: Box<dyn PowerControl>, critical_voltage: f32) -> Self {
        Self {
            intent: ShutdownIntent::new(),
            power,
            critical_voltage,
            button_action: PowerAction::Halt,
            retry: RetryPolicy::NONE,
        }
    }

    /// What the off button requests (halt unless configured otherwise)
    pub fn with_button_action(mut self, action: PowerAction) -> Self {
        self.button_action = action;
        self
    }

    /// Retry for rejected OS requests
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn critical_voltage(&self) -> f32 {
        self.critical_voltage
    }

    /// True at or below the cutoff
    pub fn check_critical(&self, pack_voltage: f32) -> bool {
        pack_voltage <= self.critical_voltage
    }

    /// Button interrupt entry point (debounced by the GPIO driver)
    pub fn on_button_press(&self) -> ShutdownOutcome {
        log::warn!("Off button pressed");
        self.request(self.button_action)
    }

    /// Request an OS halt, at most once per process
    pub fn request_shutdown(&self) -> ShutdownOutcome {
        self.request(PowerAction::Halt)
    }

    /// Request an OS reboot, at most once per process
    pub fn request_restart(&self) -> ShutdownOutcome {
        self.request(PowerAction::Reboot)
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.intent.is_set()
    }

    fn request(&self, action: PowerAction) -> ShutdownOutcome {
        if !self.intent.try_claim() {
            log::debug!("Host {} not sent: shutdown already requested", action);
            return ShutdownOutcome::AlreadyRequested;
        }

        log::warn!("Requesting host {}", action);
        let attempts = self.retry.retries + 1;
        let result = self.retry.run(
            || match action {
                PowerAction::Halt => self.power.halt_now(),
                PowerAction::Reboot => self.power.reboot_now(),
            },
            |attempt, e| {
                log::error!("Host {} attempt {}/{} rejected: {}", action, attempt, attempts, e);
            },
        );

        match result {
            Ok(()) => ShutdownOutcome::Issued(action),
            Err(_) => {
                // The intent stays set: a second trigger must not re-issue
                log::error!(
                    "Host {} could not be requested after {} attempts; the pack is unprotected",
                    action,
                    attempts
                );
                ShutdownOutcome::Failed(action)
            }
        }
    }
}
