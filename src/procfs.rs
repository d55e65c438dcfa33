//! Running process discovery through `/proc`.

use std::path::{Path, PathBuf};

use anyhow::Result;
#[cfg(target_os = "linux")]
use anyhow::Context;

/// A running process and the image it was started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub exe: PathBuf,
}

/// Lists every process whose executable can be resolved.
///
/// Kernel threads and processes owned by other users usually have no readable `exe` link and are skipped.
#[cfg(target_os = "linux")]
pub fn list_processes() -> Result<Vec<ProcessEntry>> {
    let mut entries = Vec::new();
    for dir in std::fs::read_dir("/proc").context("failed to read /proc")?.flatten() {
        let Some(pid) = dir.file_name().to_str().and_then(|name| name.parse::<u32>().ok()) else {
            continue;
        };

        match process(pid) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::debug!("skipping process {pid}: {e:#}"),
        }
    }

    entries.sort_by_key(|entry| entry.pid);
    Ok(entries)
}

#[cfg(target_os = "linux")]
pub fn process(pid: u32) -> Result<ProcessEntry> {
    let root = Path::new("/proc").join(pid.to_string());
    let name = std::fs::read_to_string(root.join("comm")).with_context(|| format!("process {pid} not found"))?.trim().to_owned();
    let exe = std::fs::read_link(root.join("exe")).with_context(|| format!("cannot resolve the executable of process {pid}"))?;
    Ok(ProcessEntry { pid, name, exe: strip_deleted(&exe) })
}

/// Shared objects mapped into a process.
#[cfg(target_os = "linux")]
pub fn modules(pid: u32) -> Result<Vec<PathBuf>> {
    let maps = std::fs::read_to_string(format!("/proc/{pid}/maps")).with_context(|| format!("cannot read the memory map of process {pid}"))?;
    Ok(parse_maps(&maps))
}

#[cfg(not(target_os = "linux"))]
pub fn list_processes() -> Result<Vec<ProcessEntry>> {
    anyhow::bail!("process scanning is only supported on Linux")
}

#[cfg(not(target_os = "linux"))]
pub fn process(_pid: u32) -> Result<ProcessEntry> {
    anyhow::bail!("process scanning is only supported on Linux")
}

#[cfg(not(target_os = "linux"))]
pub fn modules(_pid: u32) -> Result<Vec<PathBuf>> {
    anyhow::bail!("process scanning is only supported on Linux")
}

/// Extracts file-backed mappings from a `/proc/<pid>/maps` listing, first occurrence order.
pub fn parse_maps(maps: &str) -> Vec<PathBuf> {
    let mut seen = hashbrown::HashSet::new();
    let mut paths = Vec::new();

    for line in maps.lines() {
        // address perms offset dev inode pathname
        let Some(pathname) = line.splitn(6, char::is_whitespace).filter(|field| !field.is_empty()).nth(5).map(str::trim) else {
            continue;
        };
        if !pathname.starts_with('/') {
            continue;
        }

        let path = strip_deleted(Path::new(pathname));
        if seen.insert(path.clone()) {
            paths.push(path);
        }
    }

    paths
}

fn strip_deleted(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    PathBuf::from(text.strip_suffix(" (deleted)").unwrap_or(&text))
}
