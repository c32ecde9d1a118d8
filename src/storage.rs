// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for captured photos

use crate::constants::{APP_NAME, FILENAME_FORMAT, JPG_FILE_EXTENSION};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Resolve the directory photos are written to
///
/// An explicit override wins. Otherwise `<pictures>/<app name>` is created on
/// demand, falling back to the data directory and finally the working
/// directory when no pictures directory exists or it cannot be created.
pub fn output_directory(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }

    if let Some(pictures) = dirs::picture_dir() {
        let dir = pictures.join(APP_NAME);
        match std::fs::create_dir_all(&dir) {
            Ok(()) => return dir,
            Err(err) => warn!(path = %dir.display(), error = %err, "Cannot create photo directory"),
        }
    }

    let fallback = dirs::data_dir()
        .map(|data| data.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."));
    debug!(path = %fallback.display(), "Using fallback photo directory");
    fallback
}

/// File name for a photo taken at `time` (`yyyy-MM-dd-HH-mm-ss-SSS.jpg`)
pub fn photo_file_name(time: DateTime<Local>) -> String {
    format!("{}.{}", time.format(FILENAME_FORMAT), JPG_FILE_EXTENSION)
}

pub fn photo_file_path(dir: &Path, time: DateTime<Local>) -> PathBuf {
    dir.join(photo_file_name(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_photo_file_name_format() {
        let time = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(photo_file_name(time), "2024-03-07-09-05-02-042.jpg");
    }

    #[test]
    fn test_photo_file_path_joins_directory() {
        let time = Local.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let path = photo_file_path(Path::new("/tmp/photos"), time);
        assert_eq!(path, PathBuf::from("/tmp/photos/2023-12-31-23-59-59-000.jpg"));
    }

    #[test]
    fn test_override_directory_is_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(output_directory(Some(dir.path())), dir.path());
    }
}
