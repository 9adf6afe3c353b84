//! Post-publish hooks.
//!
//! A committed publish emits a [`PublishEvent`] onto a bounded queue. A
//! background worker drains it and runs every registered [`PublishHook`]
//! concurrently. Hooks never hold a package lock and their failures are
//! logged and counted, never reported to the publisher.

use bytes::Bytes;
use flate2::read::GzDecoder;
use lode_core::config::HookConfig;
use lode_metadata::MetadataStore;
use serde_json::Value;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Hook failures.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("artifact is not a readable gzip tarball: {0}")]
    Archive(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] lode_metadata::MetadataError),

    #[error("docs command failed: {0}")]
    Command(String),

    #[error("hook task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A committed publish, as seen by hooks.
#[derive(Clone, Debug)]
pub struct PublishEvent {
    pub package: String,
    pub version: String,
    /// Hex SHA-256 of `artifact`.
    pub shasum: String,
    /// Manifest exactly as published.
    pub manifest: Value,
    pub artifact: Bytes,
}

impl PublishEvent {
    /// The manifest's `main` entry point, if any.
    pub fn main(&self) -> Option<&str> {
        self.manifest.get("main").and_then(Value::as_str)
    }
}

/// Best-effort work derived from a published artifact.
#[async_trait::async_trait]
pub trait PublishHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, event: &PublishEvent) -> Result<(), HookError>;
}

/// Sending half of the hook queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct HookQueue {
    tx: Option<mpsc::Sender<PublishEvent>>,
}

impl HookQueue {
    pub fn new(tx: mpsc::Sender<PublishEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A queue that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Enqueue without waiting. A full or closed queue drops the event.
    pub fn emit(&self, event: PublishEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(event) {
            let (reason, event) = match e {
                mpsc::error::TrySendError::Full(event) => ("queue full", event),
                mpsc::error::TrySendError::Closed(event) => ("queue closed", event),
            };
            crate::metrics::HOOK_EVENTS_DROPPED.inc();
            tracing::warn!(
                package = %event.package,
                version = %event.version,
                reason,
                "dropping publish event"
            );
        }
    }
}

/// Start the hook worker. It stops once every [`HookQueue`] clone is gone.
pub fn spawn_hook_worker(
    hooks: Vec<Arc<dyn PublishHook>>,
    capacity: usize,
) -> (HookQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<PublishEvent>(capacity);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            futures::future::join_all(hooks.iter().map(|hook| run_hook(hook.as_ref(), &event)))
                .await;
        }
        tracing::debug!("hook queue closed, worker exiting");
    });
    (HookQueue::new(tx), handle)
}

async fn run_hook(hook: &dyn PublishHook, event: &PublishEvent) {
    match hook.run(event).await {
        Ok(()) => {
            crate::metrics::record_hook_run(hook.name(), "ok");
            tracing::debug!(
                hook = hook.name(),
                package = %event.package,
                version = %event.version,
                "hook finished"
            );
        }
        Err(e) => {
            crate::metrics::record_hook_run(hook.name(), "error");
            tracing::warn!(
                hook = hook.name(),
                package = %event.package,
                version = %event.version,
                error = %e,
                "hook failed"
            );
        }
    }
}

/// Hooks enabled by configuration.
pub fn hooks_from_config(
    config: &HookConfig,
    metadata: Arc<dyn MetadataStore>,
) -> Vec<Arc<dyn PublishHook>> {
    let mut hooks: Vec<Arc<dyn PublishHook>> = vec![Arc::new(StylesheetHook::new(metadata))];
    if let Some(command) = &config.docs_command {
        hooks.push(Arc::new(DocsHook::new(
            command.clone(),
            config.work_dir.clone(),
            config.docs_dir.clone(),
        )));
    }
    hooks
}

/// Strip `./` and the conventional `package/` root from a tarball path.
fn normalize_entry(path: &Path) -> PathBuf {
    let mut parts = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .peekable();
    if parts
        .peek()
        .is_some_and(|c| c.as_os_str() == std::ffi::OsStr::new("package"))
    {
        parts.next();
    }
    parts.collect()
}

/// Read one file out of a gzip tarball.
pub fn read_tarball_entry(artifact: &[u8], wanted: &str) -> std::io::Result<Option<Vec<u8>>> {
    let wanted = normalize_entry(Path::new(wanted));
    let mut archive = tar::Archive::new(GzDecoder::new(artifact));
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        if normalize_entry(&entry.path()?) == wanted {
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            return Ok(Some(contents));
        }
    }
    Ok(None)
}

/// Publishes plain CSS entry points as the version's CDN payload.
pub struct StylesheetHook {
    metadata: Arc<dyn MetadataStore>,
}

impl StylesheetHook {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }
}

#[async_trait::async_trait]
impl PublishHook for StylesheetHook {
    fn name(&self) -> &'static str {
        "stylesheet"
    }

    async fn run(&self, event: &PublishEvent) -> Result<(), HookError> {
        let Some(main) = event.main() else {
            return Ok(());
        };
        if !main.ends_with(".css") {
            // Other dialects need an external compiler.
            tracing::debug!(package = %event.package, main, "no plain css entry point, skipping");
            return Ok(());
        }

        let artifact = event.artifact.clone();
        let main = main.to_string();
        let found = tokio::task::spawn_blocking(move || read_tarball_entry(&artifact, &main))
            .await??;
        let Some(contents) = found else {
            tracing::debug!(package = %event.package, version = %event.version, "entry point missing from artifact");
            return Ok(());
        };

        let stylesheet = String::from_utf8_lossy(&contents);
        let stored = self
            .metadata
            .set_cdn_if_absent(&event.package, &event.version, &event.shasum, &stylesheet)
            .await?;
        if stored {
            tracing::info!(package = %event.package, version = %event.version, "stylesheet stored");
        } else {
            tracing::debug!(
                package = %event.package,
                version = %event.version,
                "stylesheet already set or artifact replaced, not stored"
            );
        }
        Ok(())
    }
}

/// Runs an external documentation generator over the unpacked artifact.
pub struct DocsHook {
    command: Vec<String>,
    work_dir: PathBuf,
    docs_dir: PathBuf,
}

impl DocsHook {
    pub fn new(command: Vec<String>, work_dir: PathBuf, docs_dir: PathBuf) -> Self {
        Self {
            command,
            work_dir,
            docs_dir,
        }
    }

    /// Command argv with `{src}` and `{dest}` substituted.
    pub fn argv(&self, src: &Path, dest: &Path) -> Vec<String> {
        let src = src.to_string_lossy();
        let dest = dest.to_string_lossy();
        self.command
            .iter()
            .map(|arg| arg.replace("{src}", &src).replace("{dest}", &dest))
            .collect()
    }
}

#[async_trait::async_trait]
impl PublishHook for DocsHook {
    fn name(&self) -> &'static str {
        "docs"
    }

    async fn run(&self, event: &PublishEvent) -> Result<(), HookError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        // Removed on drop, whatever the outcome.
        let scratch = tempfile::tempdir_in(&self.work_dir)?;
        let unpacked = scratch.path().join("src");
        // Staged next to its destination so publishing is a same-filesystem
        // rename whatever volume `work_dir` lives on.
        tokio::fs::create_dir_all(&self.docs_dir).await?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.docs_dir)?;
        let output = staging.path().to_path_buf();

        let artifact = event.artifact.clone();
        let target = unpacked.clone();
        tokio::task::spawn_blocking(move || {
            tar::Archive::new(GzDecoder::new(artifact.as_ref())).unpack(target)
        })
        .await??;

        let package_root = unpacked.join("package");
        let src = if tokio::fs::try_exists(&package_root).await? {
            package_root
        } else {
            unpacked
        };

        let argv = self.argv(&src, &output);
        let Some((program, args)) = argv.split_first() else {
            return Err(HookError::Command("empty command".to_string()));
        };
        let result = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&src)
            .output()
            .await?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(HookError::Command(format!(
                "{program} exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        let published = self.docs_dir.join(&event.package);
        if tokio::fs::try_exists(&published).await? {
            tokio::fs::remove_dir_all(&published).await?;
        }
        tokio::fs::rename(&output, &published).await?;
        // Already moved into place; nothing left to clean up.
        let _ = staging.keep();

        tracing::info!(
            package = %event.package,
            version = %event.version,
            path = %published.display(),
            "docs published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_read_entry_with_package_prefix() {
        let artifact = tarball(&[
            ("package/package.json", b"{}"),
            ("package/dist/style.css", b"a{color:red}"),
        ]);
        let found = read_tarball_entry(&artifact, "./dist/style.css").unwrap();
        assert_eq!(found.as_deref(), Some(&b"a{color:red}"[..]));
    }

    #[test]
    fn test_read_entry_without_prefix() {
        let artifact = tarball(&[("style.css", b"body{}")]);
        let found = read_tarball_entry(&artifact, "style.css").unwrap();
        assert_eq!(found.as_deref(), Some(&b"body{}"[..]));
        assert!(read_tarball_entry(&artifact, "other.css").unwrap().is_none());
    }

    #[test]
    fn test_read_entry_rejects_garbage() {
        assert!(read_tarball_entry(b"definitely not gzip", "style.css").is_err());
    }

    #[test]
    fn test_docs_argv_substitution() {
        let hook = DocsHook::new(
            vec![
                "docgen".to_string(),
                "--input={src}".to_string(),
                "{dest}".to_string(),
            ],
            PathBuf::from("/work"),
            PathBuf::from("/docs"),
        );
        let argv = hook.argv(Path::new("/tmp/a"), Path::new("/tmp/b"));
        assert_eq!(argv, vec!["docgen", "--input=/tmp/a", "/tmp/b"]);
    }

    #[tokio::test]
    async fn test_disabled_queue_discards() {
        HookQueue::disabled().emit(PublishEvent {
            package: "foo".to_string(),
            version: "1.0.0".to_string(),
            shasum: lode_core::ContentHash::compute(b"x").to_hex(),
            manifest: serde_json::json!({"version": "1.0.0"}),
            artifact: Bytes::from_static(b"x"),
        });
    }
}
