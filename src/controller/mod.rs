//! # Controller Module
//!
//! Turns raw device input into command state.
//!
//! This module handles:
//! - The [`Controller`] capability the sampling loop reads from
//! - Deadzone, expo and inversion shaping per axis
//! - Ground vehicle mapping (steering, ESC, gear) with steering trim

pub mod curve;
pub mod ground;

use crate::error::DeviceError;
use crate::packet::protocol::CommandState;

pub use ground::GroundController;

/// Produces a fresh command state on demand
#[cfg_attr(test, mockall::automock)]
pub trait Controller {
    /// Read the devices and map them to the current command state
    ///
    /// # Errors
    ///
    /// Fails when a device cannot be read, usually because it was unplugged.
    fn updated_state(&mut self) -> Result<CommandState, DeviceError>;
}

impl<T: Controller + ?Sized> Controller for Box<T> {
    fn updated_state(&mut self) -> Result<CommandState, DeviceError> {
        (**self).updated_state()
    }
}
