use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder as TempFileBuilder, NamedTempFile};

use super::error::{ReelError, ReelResult};

pub fn canonicalize_existing(path: &Path) -> ReelResult<PathBuf> {
    if !path.exists() {
        return Err(ReelError::validation(format!(
            "{} does not exist",
            path.display()
        )));
    }
    Ok(path.canonicalize()?)
}

pub fn compute_file_hash(path: &Path) -> ReelResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn file_stem(path: &Path) -> ReelResult<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ReelError::validation(format!("{} has no usable file name", path.display()))
        })
}

/// Reserve a hidden temporary file next to `destination`, so the final rename stays on one filesystem.
pub fn sibling_temp_file(destination: &Path) -> ReelResult<NamedTempFile> {
    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let suffix = destination
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    Ok(TempFileBuilder::new()
        .prefix(".captionreel-")
        .suffix(&suffix)
        .tempfile_in(parent)?)
}

/// Move a finished temporary file over `destination`, replacing any previous file.
/// The result keeps the mode of the file it replaces, or 0644 when it is new.
pub fn persist_into_place(temp: NamedTempFile, destination: &Path) -> ReelResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = match fs::metadata(destination) {
            Ok(existing) => existing.permissions(),
            Err(_) => fs::Permissions::from_mode(0o644),
        };
        fs::set_permissions(temp.path(), perms)?;
    }
    temp.persist(destination).map_err(|err| ReelError::Io(err.error))?;
    Ok(())
}

pub fn write_atomically(destination: &Path, contents: &[u8]) -> ReelResult<()> {
    let mut temp = sibling_temp_file(destination)?;
    temp.write_all(contents)?;
    temp.flush()?;
    persist_into_place(temp, destination)
}
