//! Application-level orchestration utilities.
//!
//! This module owns run lifecycle control and post-run processing (result
//! discovery and opening results in the viewer). The UI layer calls into this
//! module to keep responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::{run_controller, UiCommand};
