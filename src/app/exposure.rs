// SPDX-License-Identifier: GPL-3.0-only

//! Exposure compensation stepping
//!
//! Levels are resolved against a fresh [`ExposureState`] read from the camera
//! and the result is always inside the advertised index range.

use crate::backends::camera::types::{BackendError, BackendResult, ExposureState};
use crate::session::Camera;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Directional exposure request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExposureLevel {
    /// Lower bound of the compensation range
    #[value(name = "min")]
    Min,
    /// Upper bound of the compensation range
    #[value(name = "max")]
    Max,
    /// One index step darker
    #[value(name = "down")]
    StepDown,
    /// One index step brighter
    #[value(name = "up")]
    StepUp,
    /// One full EV darker
    #[value(name = "ev-down")]
    WholeStopDown,
    /// One full EV brighter
    #[value(name = "ev-up")]
    WholeStopUp,
    /// Leave the current compensation alone
    #[value(name = "neutral")]
    Neutral,
}

impl ExposureLevel {
    pub const ALL: [ExposureLevel; 7] = [
        ExposureLevel::Min,
        ExposureLevel::Max,
        ExposureLevel::StepDown,
        ExposureLevel::StepUp,
        ExposureLevel::WholeStopDown,
        ExposureLevel::WholeStopUp,
        ExposureLevel::Neutral,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ExposureLevel::Min => "Minimum",
            ExposureLevel::Max => "Maximum",
            ExposureLevel::StepDown => "Step down",
            ExposureLevel::StepUp => "Step up",
            ExposureLevel::WholeStopDown => "1 EV down",
            ExposureLevel::WholeStopUp => "1 EV up",
            ExposureLevel::Neutral => "Neutral",
        }
    }
}

/// Index a level resolves to, or `None` when compensation is unsupported
///
/// Single steps move by the step numerator and whole stops by the
/// denominator, so with a 1/6 EV step a whole stop is six indices.
pub fn compute_index(level: ExposureLevel, state: &ExposureState) -> Option<i32> {
    if !state.supported {
        return None;
    }

    let step = state.step;
    let index = match level {
        ExposureLevel::Min => state.range.lower,
        ExposureLevel::Max => state.range.upper,
        ExposureLevel::StepDown => state.index.saturating_sub(step.numerator),
        ExposureLevel::StepUp => state.index.saturating_add(step.numerator),
        ExposureLevel::WholeStopDown => state.index.saturating_sub(step.denominator),
        ExposureLevel::WholeStopUp => state.index.saturating_add(step.denominator),
        ExposureLevel::Neutral => state.index,
    };
    Some(state.range.clamp(index))
}

/// Applies exposure requests to a bound camera
#[derive(Debug, Clone, Copy, Default)]
pub struct ExposureController;

impl ExposureController {
    pub fn new() -> Self {
        Self
    }

    /// Fresh exposure state; unreadable state counts as unsupported
    pub fn exposure_info(&self, camera: &Camera) -> ExposureState {
        match camera.exposure_state() {
            Ok(state) => state,
            Err(err) => {
                debug!(camera_id = %camera.camera_id(), %err, "Exposure state unavailable");
                ExposureState::unsupported()
            }
        }
    }

    /// Resolve and apply `level`
    ///
    /// Returns the resolved index. Application failures are logged and not
    /// reported; `Neutral` resolves without touching the camera.
    pub fn apply(&self, camera: &Camera, level: ExposureLevel) -> Option<i32> {
        let state = self.exposure_info(camera);
        let Some(index) = compute_index(level, &state) else {
            debug!(camera_id = %camera.camera_id(), ?level, "Exposure compensation not supported");
            return None;
        };

        if level == ExposureLevel::Neutral {
            return Some(index);
        }

        match camera.set_exposure_compensation_index(index) {
            Ok(()) => info!(
                camera_id = %camera.camera_id(),
                ?level,
                from = state.index,
                to = index,
                "Exposure compensation applied"
            ),
            Err(err) => warn!(camera_id = %camera.camera_id(), ?level, index, %err, "Exposure compensation failed"),
        }
        Some(index)
    }

    /// Switch to manual exposure with an absolute exposure time
    ///
    /// The time is clamped into the range the camera advertises.
    pub fn set_exact_exposure_time(&self, camera: &Camera, exposure: Duration) -> BackendResult<()> {
        let Some((min, max)) = camera.characteristics().exposure_time_range else {
            return Err(BackendError::ControlNotSupported(
                "absolute exposure time".to_string(),
            ));
        };
        let exposure = exposure.clamp(min, max);
        camera.set_exposure_time(exposure)?;
        info!(camera_id = %camera.camera_id(), exposure_us = exposure.as_micros() as u64, "Exposure time set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{IndexRange, Rational};

    fn state(index: i32) -> ExposureState {
        ExposureState {
            index,
            range: IndexRange::new(-12, 12),
            step: Rational::new(1, 6),
            supported: true,
        }
    }

    #[test]
    fn test_single_and_whole_steps() {
        assert_eq!(compute_index(ExposureLevel::StepUp, &state(0)), Some(1));
        assert_eq!(compute_index(ExposureLevel::StepDown, &state(0)), Some(-1));
        assert_eq!(compute_index(ExposureLevel::WholeStopUp, &state(0)), Some(6));
        assert_eq!(compute_index(ExposureLevel::WholeStopDown, &state(0)), Some(-6));
    }

    #[test]
    fn test_bounds_and_neutral() {
        assert_eq!(compute_index(ExposureLevel::Min, &state(3)), Some(-12));
        assert_eq!(compute_index(ExposureLevel::Max, &state(3)), Some(12));
        assert_eq!(compute_index(ExposureLevel::Neutral, &state(3)), Some(3));
    }

    #[test]
    fn test_results_stay_in_range() {
        for index in -12..=12 {
            for level in ExposureLevel::ALL {
                let result = compute_index(level, &state(index)).unwrap();
                assert!((-12..=12).contains(&result), "{:?} from {} gave {}", level, index, result);
            }
        }
    }

    #[test]
    fn test_unsupported_is_none() {
        for level in ExposureLevel::ALL {
            assert_eq!(compute_index(level, &ExposureState::unsupported()), None);
        }
    }

    #[test]
    fn test_level_cli_names() {
        use clap::ValueEnum;
        let names: Vec<String> = ExposureLevel::value_variants()
            .iter()
            .filter_map(|level| level.to_possible_value())
            .map(|value| value.get_name().to_string())
            .collect();
        assert_eq!(names, ["min", "max", "down", "up", "ev-down", "ev-up", "neutral"]);
    }
}
