// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera access
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          Session / App Layer                │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │    V4L2     │    │    Synthetic     │    │
//! │  └─────────────┘    └──────────────────┘    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! - [`camera`]: Camera backends with enumeration, characteristics and control

pub mod camera;
