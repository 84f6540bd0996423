use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

/// Writes `text` to a staging file beside `path`, then renames it into place.
pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path);
    if let Err(error) = fs::write(&staging, text) {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }
    match fs::rename(&staging, path) {
        Ok(()) => Ok(()),
        // Some platforms refuse to rename over an existing file.
        Err(first) if path.exists() => {
            let retried = fs::remove_file(path).and_then(|()| fs::rename(&staging, path));
            if retried.is_err() {
                let _ = fs::remove_file(&staging);
                return Err(first);
            }
            Ok(())
        }
        Err(error) => {
            let _ = fs::remove_file(&staging);
            Err(error)
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("save");
    path.with_file_name(format!(".{file_name}.{}.tmp", process::id()))
}
