//! Creation of fresh log files for streamed acquisition.
use crate::error::{AppResult, DaqError};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Name of a timestamped log file, e.g. `LOG_0314_152233.csv`.
pub fn default_log_name(extension: &str) -> String {
    format!(
        "LOG_{}.{}",
        chrono::Local::now().format("%m%d_%H%M%S"),
        extension
    )
}

/// Create a new, empty log file in `directory` and return its file name and full path.
///
/// Without `filename` a timestamped name is generated. The directory is created if
/// missing; an existing file is never overwritten.
pub fn create_log_file(
    directory: impl AsRef<Path>,
    extension: &str,
    filename: Option<&str>,
) -> AppResult<(String, PathBuf)> {
    let directory = directory.as_ref();
    if !directory.as_os_str().is_empty() && !directory.exists() {
        std::fs::create_dir_all(directory)?;
    }

    let name = filename
        .map(str::to_string)
        .unwrap_or_else(|| default_log_name(extension));
    let path = directory.join(&name);

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => DaqError::SinkWrite(format!(
                "Log file '{}' already exists",
                path.display()
            )),
            _ => DaqError::Io(e),
        })?;

    tracing::info!(path = %path.display(), "Log file created");
    Ok((name, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_name_has_prefix_and_extension() {
        let name = default_log_name("csv");
        assert!(name.starts_with("LOG_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "LOG_0314_152233.csv".len());
    }

    #[test]
    fn creates_empty_file_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("logs");
        let (name, path) = create_log_file(&target, "csv", Some("run1.csv")).unwrap();

        assert_eq!(name, "run1.csv");
        assert_eq!(path, target.join("run1.csv"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        create_log_file(dir.path(), "csv", Some("run1.csv")).unwrap();
        let err = create_log_file(dir.path(), "csv", Some("run1.csv")).unwrap_err();
        assert!(matches!(err, DaqError::SinkWrite(_)));
    }
}
