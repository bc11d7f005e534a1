use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

/// Writes the raw bytes of an encoded request to `<dir>/<problem name>.<extension>`.
/// Debugging aid only, the file format is the wire format.
pub fn dump(dir: &Path, problem_name: &str, extension: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let name: String = problem_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    let path = dir.join(format!("{}.{}", name, extension));
    fs::write(&path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "dumped request");
    Ok(path)
}
