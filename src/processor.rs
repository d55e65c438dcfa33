//! Scan orchestration.
//!
//! Turns files, directories, hashes, links and running processes into lookups
//! on a shared [`ReportClient`], prints each result and tallies the outcome.
//! A failed lookup is reported and counted; it never aborts the batch.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, ensure};
use fast_glob::glob_match;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::client::{ClientError, ReportClient};
use crate::config::SCAN_CONCURRENCY;
use crate::context::RunContext;
use crate::procfs::{self, ProcessEntry};
use crate::types::Verdict;
use crate::ui::display;

/// Something that can be looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    File(PathBuf),
    Hash(String),
    Link(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Hash(hash) => f.write_str(hash),
            Self::Link(url) => f.write_str(url),
        }
    }
}

/// Result of a single lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Scanned(Verdict),
    Failed,
    Cancelled,
}

/// Tally of a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub scanned: usize,
    pub alerts: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl Summary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Scanned(verdict) => {
                self.scanned += 1;
                if verdict.is_alert() {
                    self.alerts += 1;
                }
            }
            Outcome::Failed => self.failed += 1,
            Outcome::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Clone)]
pub struct Processor {
    client: Arc<ReportClient>,
    context: Arc<RunContext>,
}

impl Processor {
    pub fn new(client: Arc<ReportClient>, context: Arc<RunContext>) -> Self {
        Self { client, context }
    }

    /// Looks up one target and prints the result.
    pub async fn scan(&self, target: &Target) -> Outcome {
        if self.context.is_exiting() {
            return Outcome::Cancelled;
        }

        let result = match target {
            Target::File(path) => self.client.check_file(path).await,
            Target::Hash(hash) => self.client.check_hash(hash).await,
            Target::Link(url) => self.client.check_file_link(url).await,
        };

        match result {
            Ok(report) => {
                let verdict = display::show_report(&target.to_string(), &report);
                match verdict {
                    Verdict::Malicious => error!("{target} flagged by {} of {} engines", report.positive_count, report.total_count),
                    Verdict::Suspicious => warn!("{target} flagged by {} of {} engines", report.positive_count, report.total_count),
                    Verdict::Clean | Verdict::Unavailable => {}
                }
                Outcome::Scanned(verdict)
            }
            Err(ClientError::Cancelled) => {
                debug!("scan of {target} abandoned on exit");
                Outcome::Cancelled
            }
            Err(e) => {
                error!("Scanning {target} failed: {}", self.context.describe(&e));
                Outcome::Failed
            }
        }
    }

    /// Looks up every target, a bounded number at a time.
    pub async fn scan_all(&self, targets: Vec<Target>) -> Summary {
        let limit = Arc::new(Semaphore::new(SCAN_CONCURRENCY));
        let mut tasks = JoinSet::new();

        for target in targets {
            let processor = self.clone();
            let limit = Arc::clone(&limit);
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await;
                processor.scan(&target).await
            });
        }

        let mut summary = Summary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    error!("scan task failed: {e}");
                    summary.record(Outcome::Failed);
                }
            }
        }

        summary
    }

    /// Scans every file under `root` whose name matches the glob `filter`.
    ///
    /// # Errors
    ///
    /// Fails only if `root` is not a directory; per-file failures are counted.
    pub async fn scan_directory(&self, root: &Path, filter: &str, recursive: bool) -> Result<Summary> {
        ensure!(root.is_dir(), "not a directory: {}", root.display());

        let files = collect_files(root, filter, recursive);
        info!("Scanning {} files in {}", files.len(), root.display());

        let summary = self.scan_all(files.into_iter().map(Target::File).collect()).await;
        if !self.context.is_exiting() {
            display::show_info(&format!("All files in {} have been scanned", root.display()));
        }

        Ok(summary)
    }

    /// Scans the executables (and optionally loaded modules) of every process
    /// whose name or executable path matches `filter`.
    ///
    /// # Errors
    ///
    /// Fails if the process table cannot be read.
    pub async fn scan_processes(&self, filter: &Regex, include_modules: bool) -> Result<Summary> {
        let processes = procfs::list_processes()?;
        let matching: Vec<&ProcessEntry> = processes.iter().filter(|entry| filter.is_match(&entry.name) || filter.is_match(&entry.exe.to_string_lossy())).collect();

        let targets = process_targets(&matching, include_modules);
        info!("{} matching processes, {} images to scan", matching.len(), targets.len());

        Ok(self.scan_all(targets).await)
    }

    /// # Errors
    ///
    /// Fails if the process does not exist or its executable cannot be resolved.
    pub async fn scan_process(&self, pid: u32, include_modules: bool) -> Result<Summary> {
        let entry = procfs::process(pid)?;
        let targets = process_targets(&[&entry], include_modules);
        Ok(self.scan_all(targets).await)
    }
}

/// Regular files under `root` whose file name matches `filter`, in walk order.
pub fn collect_files(root: &Path, filter: &str, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(root).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    walker
        .into_iter()
        .filter_map(|entry| entry.map_err(|e| debug!("skipping unreadable entry: {e}")).ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| glob_match(filter, entry.file_name().to_string_lossy().as_ref()))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Images to look up for a set of processes, each path once.
fn process_targets(entries: &[&ProcessEntry], include_modules: bool) -> Vec<Target> {
    let mut seen = hashbrown::HashSet::new();
    let mut targets = Vec::new();

    for entry in entries {
        if seen.insert(entry.exe.clone()) {
            targets.push(Target::File(entry.exe.clone()));
        }

        if !include_modules {
            continue;
        }

        match procfs::modules(entry.pid) {
            Ok(modules) => {
                for module in modules {
                    if seen.insert(module.clone()) {
                        targets.push(Target::File(module));
                    }
                }
            }
            Err(e) => warn!("skipping modules of {} ({}): {e:#}", entry.name, entry.pid),
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::api::{ApiError, ReportBackend};
    use crate::client::ClientOptions;
    use crate::sink::NullSink;
    use crate::types::Report;

    struct FixedBackend {
        report: Report,
    }

    #[async_trait]
    impl ReportBackend for FixedBackend {
        async fn report(&self, _resource: &str) -> Result<Report, ApiError> {
            Ok(self.report.clone())
        }
    }

    fn processor(report: Report) -> (Processor, Arc<RunContext>) {
        let context = Arc::new(RunContext::default());
        let options = ClientOptions { retry_delay: Duration::from_millis(1), ..ClientOptions::default() };
        let client = ReportClient::with_backend(Arc::new(FixedBackend { report }), options, Arc::clone(&context), Arc::new(NullSink)).unwrap();
        (Processor::new(Arc::new(client), Arc::clone(&context)), context)
    }

    fn clean() -> Report {
        Report { available: true, positive_count: 0, total_count: 60, scan_date: "2024-01-01 00:00:00".into(), permalink: "https://example.test".into() }
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.exe"), b"a").unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.exe"), b"c").unwrap();
        dir
    }

    #[test]
    fn test_collect_files() {
        let dir = tree();

        let mut recursive = collect_files(dir.path(), "*.exe", true);
        recursive.sort();
        assert_eq!(recursive, vec![dir.path().join("a.exe"), dir.path().join("sub").join("c.exe")]);

        assert_eq!(collect_files(dir.path(), "*.exe", false), vec![dir.path().join("a.exe")]);
        assert_eq!(collect_files(dir.path(), "*", true).len(), 3);
    }

    #[tokio::test]
    async fn test_scan_directory() {
        let dir = tree();
        let (processor, _) = processor(clean());

        let summary = processor.scan_directory(dir.path(), "*", true).await.unwrap();
        assert_eq!(summary, Summary { scanned: 3, ..Summary::default() });
    }

    #[tokio::test]
    async fn test_scan_directory_rejects_file() {
        let dir = tree();
        let (processor, _) = processor(clean());

        assert!(processor.scan_directory(&dir.path().join("a.exe"), "*", true).await.is_err());
    }

    #[tokio::test]
    async fn test_alerts_counted() {
        let (processor, _) = processor(Report { positive_count: 30, ..clean() });

        let summary = processor.scan_all(vec![Target::Hash("aa".into()), Target::Hash("bb".into())]).await;
        assert_eq!(summary, Summary { scanned: 2, alerts: 2, ..Summary::default() });
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let dir = tree();
        let (processor, _) = processor(clean());

        let targets = vec![Target::File(dir.path().join("missing.exe")), Target::File(dir.path().join("a.exe"))];
        let summary = processor.scan_all(targets).await;
        assert_eq!(summary, Summary { scanned: 1, failed: 1, ..Summary::default() });
    }

    #[tokio::test]
    async fn test_exiting_cancels() {
        let (processor, context) = processor(clean());
        context.request_exit();

        assert_eq!(processor.scan(&Target::Hash("aa".into())).await, Outcome::Cancelled);
    }

    #[test]
    fn test_target_names() {
        assert_eq!(Target::Hash("abc".into()).to_string(), "abc");
        assert_eq!(Target::Link("https://example.test/f".into()).to_string(), "https://example.test/f");
        assert_eq!(Target::File(PathBuf::from("/tmp/x")).to_string(), "/tmp/x");
    }

    #[test]
    fn test_process_targets_dedup() {
        let a = ProcessEntry { pid: 1, name: "a".into(), exe: PathBuf::from("/usr/bin/a") };
        let b = ProcessEntry { pid: 2, name: "a".into(), exe: PathBuf::from("/usr/bin/a") };

        assert_eq!(process_targets(&[&a, &b], false), vec![Target::File(PathBuf::from("/usr/bin/a"))]);
    }
}
