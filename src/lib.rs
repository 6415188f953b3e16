// SPDX-License-Identifier: MIT

pub mod config;
pub mod error;
pub mod state;

pub use error::{StateError, StateLoadError, StateWriteError};
