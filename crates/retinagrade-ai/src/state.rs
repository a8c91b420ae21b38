//! Process-wide model state.
//!
//! Resolution runs once at startup and its outcome is installed here. After
//! that the state is only read; there is no way to replace or retry it.

use std::sync::OnceLock;

use crate::resolver::ModelState;

static MODEL: OnceLock<ModelState> = OnceLock::new();

/// Install the resolved state. Returns the state back if one was already
/// installed.
pub fn install_model(state: ModelState) -> Result<(), ModelState> {
    MODEL.set(state)
}

/// The installed state, or `None` before startup resolution has run.
pub fn installed_model() -> Option<&'static ModelState> {
    MODEL.get()
}
