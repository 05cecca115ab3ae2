//! Archive extraction and entry lookup.
//!
//! These functions block; async callers should run them on the blocking pool.

use devfetch_core::tools::ArchiveKind;
use devfetch_core::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

/// Unpack `archive` into `dest`.
///
/// Entries that would escape `dest` are skipped. Unix permissions stored in
/// the archive are restored.
///
/// # Errors
///
/// Returns an install error if the archive is corrupt, or an I/O error if
/// files cannot be written.
pub fn extract_archive(archive: &Path, kind: ArchiveKind, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest).map_err(|e| Error::io(e, dest, "create extraction directory"))?;

    match kind {
        ArchiveKind::Raw => Err(Error::install(format!(
            "{} is not an archive",
            archive.display()
        ))),
        ArchiveKind::TarGz => extract_tar_gz(archive, dest),
        ArchiveKind::Zip => extract_zip(archive, dest),
    }
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(e, archive, "open archive"))?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(|e| {
        Error::install_with_help(
            format!("Failed to extract tar.gz archive: {e}"),
            "The download may be corrupt or not a gzip-compressed tarball; check the `archive` setting",
        )
    })?;
    debug!(archive = %archive.display(), dest = %dest.display(), "Extracted tar.gz");
    Ok(())
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(e, archive, "open archive"))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        Error::install_with_help(
            format!("Failed to open zip archive: {e}"),
            "The download may be corrupt or not a zip file; check the `archive` setting",
        )
    })?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::install(format!("Failed to read zip entry: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| Error::io(e, &outpath, "create directory"))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create directory"))?;
        }
        let mut out = File::create(&outpath).map_err(|e| Error::io(e, &outpath, "create file"))?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::io(e, &outpath, "write file"))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|e| Error::io(e, &outpath, "set permissions"))?;
        }
    }

    debug!(archive = %archive.display(), dest = %dest.display(), "Extracted zip");
    Ok(())
}

/// Find the file named `entry` in an extracted tree.
///
/// A relative path (`dist/tool`) is looked up as given. A bare name is looked
/// up at the root, then one directory level down, which covers the common
/// `tool-1.2.3-linux-amd64/tool` layout.
///
/// # Errors
///
/// Returns an install error listing the extracted contents when nothing
/// matches.
pub fn locate_entry(root: &Path, entry: &str) -> Result<PathBuf> {
    let direct = root.join(entry);
    if let Some(found) = regular_file(root, &direct)? {
        return Ok(found);
    }

    if !entry.contains('/') {
        let subdirs: Vec<PathBuf> = read_dir_sorted(root)?
            .into_iter()
            .filter(|p| std::fs::symlink_metadata(p).is_ok_and(|m| m.is_dir()))
            .collect();
        for dir in subdirs {
            if let Some(found) = regular_file(root, &dir.join(entry))? {
                return Ok(found);
            }
        }
    }

    let contents = list_contents(root, 2);
    Err(Error::install_with_help(
        format!(
            "Entry '{entry}' not found in archive. Contents: [{}]",
            contents.join(", ")
        ),
        "Set `entry` to the path of the executable inside the archive",
    ))
}

/// `candidate` if it is a regular file inside `root`.
///
/// Symlinks are rejected, as are paths that leave `root` through a linked
/// directory.
fn regular_file(root: &Path, candidate: &Path) -> Result<Option<PathBuf>> {
    let Ok(metadata) = std::fs::symlink_metadata(candidate) else {
        return Ok(None);
    };
    if metadata.file_type().is_symlink() {
        return Err(Error::install_with_help(
            format!("Archive entry {} is a symbolic link", candidate.display()),
            "Only regular files can be installed; point `entry` at the real executable",
        ));
    }
    if !metadata.is_file() {
        return Ok(None);
    }

    let real_root = root
        .canonicalize()
        .map_err(|e| Error::io(e, root, "resolve extraction directory"))?;
    let real = candidate
        .canonicalize()
        .map_err(|e| Error::io(e, candidate, "resolve archive entry"))?;
    if !real.starts_with(&real_root) {
        return Err(Error::install(format!(
            "Archive entry {} resolves outside the extraction directory",
            candidate.display()
        )));
    }
    Ok(Some(candidate.to_path_buf()))
}

/// Extract `archive` into `scratch` and return the path of `entry` inside it.
///
/// Raw artifacts are returned unchanged.
///
/// # Errors
///
/// See [`extract_archive`] and [`locate_entry`].
pub fn extract_entry(
    archive: &Path,
    kind: ArchiveKind,
    entry: &str,
    scratch: &Path,
) -> Result<PathBuf> {
    if kind == ArchiveKind::Raw {
        return Ok(archive.to_path_buf());
    }
    extract_archive(archive, kind, scratch)?;
    locate_entry(scratch, entry)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(dir)
        .map_err(|e| Error::io(e, dir, "read directory"))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

fn list_contents(root: &Path, depth: usize) -> Vec<String> {
    fn walk(root: &Path, dir: &Path, depth: usize, out: &mut Vec<String>) {
        let Ok(paths) = read_dir_sorted(dir) else {
            return;
        };
        for path in paths {
            let relative = path
                .strip_prefix(root)
                .map_or_else(|_| path.display().to_string(), |p| p.display().to_string());
            if std::fs::symlink_metadata(&path).is_ok_and(|m| m.is_dir()) {
                out.push(format!("{relative}/"));
                if depth > 1 {
                    walk(root, &path, depth - 1, out);
                }
            } else {
                out.push(relative);
            }
        }
    }

    let mut out = Vec::new();
    walk(root, root, depth, &mut out);
    out
}
