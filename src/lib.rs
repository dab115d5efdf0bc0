// SPDX-License-Identifier: MPL-2.0

//! Core of Shutter, a photo-sharing client: live explore feed with likes and
//! comments, image posts, the user's profile and session routing.
//!
//! Shells supply the screens, a [`flows::Navigator`] and a
//! [`flows::MediaLibrary`]; [`app::ShutterApp`] wires the rest.

pub mod app;
pub mod backend;
pub mod config;
pub mod flows;
pub mod logging;
pub mod notice;
pub mod runtime;
pub mod state;

#[cfg(test)]
mod testing;

pub use app::{Services, ShutterApp};
