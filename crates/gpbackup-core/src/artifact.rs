//! Writing backup artifacts to disk.

use crate::{Error, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// Mode of coordinator artifacts once they are complete.
pub const READ_ONLY: u32 = 0o444;

/// Mode of segment data files.
pub const DATA_FILE: u32 = 0o600;

/// Writes `contents` to a sibling temporary file, syncs it, renames it over
/// `path` and applies `mode`.
///
/// Readers never observe a partially written artifact.
pub fn write_atomically(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = match dir {
        Some(dir) => dir.join(format!(".{file_name}.tmp")),
        None => PathBuf::from(format!(".{file_name}.tmp")),
    };

    let write = || -> std::io::Result<()> {
        let _ = fs::remove_file(&tmp);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)?;
        set_mode(path, mode)
    };

    write().map_err(|err| {
        let _ = fs::remove_file(&tmp);
        Error::artifact_io(path, err)
    })
}

/// Changes the permission bits of `path`.
pub fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(mode & 0o222 == 0);
        fs::set_permissions(path, perms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_read_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpbackup_history.yaml");

        write_atomically(&path, b"first", READ_ONLY).unwrap();
        write_atomically(&path, b"second", READ_ONLY).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(fs::metadata(&path).unwrap().permissions().readonly());
        assert!(!dir.path().join(".gpbackup_history.yaml.tmp").exists());
    }
}
