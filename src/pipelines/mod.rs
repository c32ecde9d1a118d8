// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines for still capture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG File   │
//! │    (RGB)     │     │  - Rotation       │     │              │
//! │              │     │  - Encoding       │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```

pub mod photo;
