use crate::error::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

/// Extension of committed recordings
const RECORDING_EXT: &str = "webm";

/// Temporary and final locations of one session's output file.
///
/// The writer subprocess only ever sees the temporary path; the name is
/// dot-prefixed so directory listings and retention tooling skip
/// in-flight files. Only a successful session promotes the file to its
/// final name, via a same-directory rename, so partial recordings never
/// appear under a final name.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub temp_path: PathBuf,
    pub final_path: PathBuf,
}

/// Derive the session name from its start instant, e.g.
/// `2024-05-01_12.34.56`
pub fn session_name(started_at: SystemTime, timezone: &Tz) -> String {
    let datetime = DateTime::<Utc>::from(started_at).with_timezone(timezone);
    datetime.format("%Y-%m-%d_%H.%M.%S").to_string()
}

/// Build the temporary and final paths for a session
pub fn output_paths(dir: &Path, name: &str) -> OutputPaths {
    OutputPaths {
        temp_path: dir.join(format!(".{}.{}", name, RECORDING_EXT)),
        final_path: dir.join(format!("{}.{}", name, RECORDING_EXT)),
    }
}

/// Create the output directory if it does not exist yet
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        info!("Created recording directory: {}", dir.display());
    }
    Ok(())
}

/// Promote the finished temporary file to its final name
pub fn commit(paths: &OutputPaths) -> Result<()> {
    info!("rename {}", paths.temp_path.display());
    info!("    -> {}", paths.final_path.display());
    fs::rename(&paths.temp_path, &paths.final_path)?;
    Ok(())
}

/// Remove a temporary file that must not be committed. Missing files
/// are fine; the writer may never have gotten far enough to create it.
pub fn discard(paths: &OutputPaths) {
    match fs::remove_file(&paths.temp_path) {
        Ok(()) => info!("removed {}", paths.temp_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove {}: {}",
            paths.temp_path.display(),
            e
        ),
    }
}

/// Human-readable byte count for log lines, e.g. `3.4MiB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{:.1}{}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}ZiB", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs::File;
    use std::io::Write;

    fn test_start() -> SystemTime {
        SystemTime::from(Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 56).unwrap())
    }

    #[test]
    fn test_session_name() {
        assert_eq!(
            session_name(test_start(), &chrono_tz::UTC),
            "2024-05-01_12.34.56"
        );
        assert_eq!(
            session_name(test_start(), &chrono_tz::Etc::GMTMinus2),
            "2024-05-01_14.34.56"
        );
    }

    #[test]
    fn test_output_paths() {
        let paths = output_paths(Path::new("/var/rec"), "2024-05-01_12.34.56");
        assert_eq!(
            paths.temp_path,
            PathBuf::from("/var/rec/.2024-05-01_12.34.56.webm")
        );
        assert_eq!(
            paths.final_path,
            PathBuf::from("/var/rec/2024-05-01_12.34.56.webm")
        );
    }

    #[test]
    fn test_commit_renames() {
        let dir = tempfile::tempdir().unwrap();
        let paths = output_paths(dir.path(), "session");

        let mut file = File::create(&paths.temp_path).unwrap();
        file.write_all(b"video").unwrap();

        commit(&paths).unwrap();

        assert!(!paths.temp_path.exists());
        assert_eq!(fs::read(&paths.final_path).unwrap(), b"video");
    }

    #[test]
    fn test_discard_removes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = output_paths(dir.path(), "session");

        File::create(&paths.temp_path).unwrap();
        discard(&paths);
        assert!(!paths.temp_path.exists());

        // Second discard hits the missing-file path without complaint
        discard(&paths);
    }

    #[test]
    fn test_ensure_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");

        ensure_output_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // Existing directory is fine
        ensure_output_dir(&nested).unwrap();
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.0B");
        assert_eq!(format_size(512), "512.0B");
        assert_eq!(format_size(2048), "2.0KiB");
        assert_eq!(format_size(5 * 1024 * 1024 + 256 * 1024), "5.2MiB");
    }
}
