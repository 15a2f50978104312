use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `lines` to `path` (newline-terminated) through a tempfile in the
/// same directory, replacing the file in one rename. Roster files feed the
/// provisioning batch, so a partial write must never be left behind.
pub fn write_lines<I, S>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    for line in lines {
        tmp.write_all(line.as_ref().as_bytes())?;
        tmp.write_all(b"\n")?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
