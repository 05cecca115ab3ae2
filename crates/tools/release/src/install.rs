//! Atomic placement of an installed file.

use devfetch_core::tools::DEFAULT_MODE;
use devfetch_core::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How a candidate file is placed at its install path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceOptions {
    /// Permission bits applied before the file becomes visible.
    pub mode: u32,
    /// Retry through `sudo -n` when the destination is not writable.
    pub allow_sudo: bool,
}

impl Default for PlaceOptions {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE,
            allow_sudo: false,
        }
    }
}

/// Move `candidate` to `dest` so that `dest` is never observed half-written.
///
/// The mode is applied to the candidate first and the file is renamed into
/// place. When the rename crosses filesystems the file is copied into a temp
/// file beside `dest`, which is then renamed. Existing files at `dest` are
/// replaced.
///
/// # Errors
///
/// Returns an install error when the destination cannot be written and
/// escalation is disabled or fails.
pub async fn place(candidate: &Path, dest: &Path, options: &PlaceOptions) -> Result<()> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    match try_place(candidate, dest, &parent, options.mode).await {
        Ok(()) => {
            info!(dest = %dest.display(), mode = %format!("{:o}", options.mode), "Installed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied && options.allow_sudo => {
            warn!(dest = %dest.display(), "Destination not writable; retrying with sudo");
            sudo_place(candidate, dest, &parent, options.mode).await
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(Error::install_with_help(
            format!("Cannot write {}: {e}", dest.display()),
            "Run as root, choose a writable install path, or enable `allow_sudo`",
        )),
        Err(e) => Err(Error::io(e, dest, "install")),
    }
}

async fn try_place(candidate: &Path, dest: &Path, parent: &Path, mode: u32) -> io::Result<()> {
    tokio::fs::create_dir_all(parent).await?;
    set_mode(candidate, mode).await?;

    match tokio::fs::rename(candidate, dest).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(dest = %dest.display(), "Rename crosses filesystems; staging copy beside destination");
            let candidate = candidate.to_path_buf();
            let dest = dest.to_path_buf();
            let parent = parent.to_path_buf();
            tokio::task::spawn_blocking(move || copy_then_rename(&candidate, &dest, &parent, mode))
                .await
                .map_err(io::Error::other)?
        }
        Err(e) => Err(e),
    }
}

fn copy_then_rename(candidate: &Path, dest: &Path, parent: &Path, mode: u32) -> io::Result<()> {
    let mut staged = tempfile::Builder::new()
        .prefix(".devfetch-")
        .suffix(".part")
        .tempfile_in(parent)?;
    let mut source = std::fs::File::open(candidate)?;
    io::copy(&mut source, staged.as_file_mut())?;
    staged.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    staged.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

async fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

async fn sudo_place(candidate: &Path, dest: &Path, parent: &Path, mode: u32) -> Result<()> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::install(format!("Invalid install path: {}", dest.display())))?;
    let staged = parent.join(format!(".{file_name}.devfetch-tmp"));

    sudo(&["mkdir", "-p"], &[parent]).await?;
    let mode = format!("{mode:o}");
    sudo(&["install", "-m", mode.as_str()], &[candidate, staged.as_path()]).await?;
    if let Err(e) = sudo(&["mv", "-f"], &[staged.as_path(), dest]).await {
        let _ = sudo(&["rm", "-f"], &[staged.as_path()]).await;
        return Err(e);
    }

    info!(dest = %dest.display(), %mode, "Installed with sudo");
    Ok(())
}

async fn sudo(args: &[&str], paths: &[&Path]) -> Result<()> {
    debug!(?args, ?paths, "Running sudo");
    let output = Command::new("sudo")
        .arg("-n")
        .args(args)
        .args(paths)
        .output()
        .await
        .map_err(|e| {
            Error::install_with_help(
                format!("Failed to run sudo: {e}"),
                "Install sudo or run as root",
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::install_with_help(
            format!("sudo {} failed: {}", args.join(" "), stderr.trim()),
            "Passwordless sudo is required; run as root or pick a writable install path",
        ));
    }
    Ok(())
}
