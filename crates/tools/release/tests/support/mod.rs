//! Shared fixtures for release installer tests.

#![allow(dead_code)]

use devfetch_core::tools::{Arch, Os, Platform};
use devfetch_tools_release::{InstallOptions, RetryPolicy, ToolInstaller};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

pub const BINARY: &[u8] = b"#!/bin/sh\necho tool\n";

/// Installer pinned to linux/arm64 with millisecond backoff.
pub fn installer(cache: &Path) -> ToolInstaller {
    ToolInstaller::new(
        InstallOptions::new(cache)
            .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
            .with_platform(Platform::new(Os::Linux, Arch::Arm64)),
    )
    .unwrap()
}

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Gzipped tarball containing `files` with mode 0644.
pub fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Gzipped tarball holding one symbolic link `name -> target`.
pub fn tar_gz_symlink(name: &str, target: &Path) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Symlink);
    header.set_size(0);
    header.set_mode(0o777);
    builder.append_link(&mut header, name, target).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// Zip archive containing `files` with mode 0644.
pub fn zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o644);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Files left in a staging directory, ignoring subdirectories.
pub fn staged_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[cfg(unix)]
pub fn mode_of(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777
}
