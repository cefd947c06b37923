use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

const RETRY_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(10);

/// Exclusive writer lock on `<data>/studio.lock`, released on drop.
#[derive(Debug)]
pub struct WriterLock {
    file: File,
}

impl WriterLock {
    /// Wait up to `wait` for any other writer process to finish.
    pub fn acquire(path: &Path, wait: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(err) if started.elapsed() >= wait => {
                    anyhow::bail!(
                        "another diary-studio process holds {} ({err})",
                        path.display()
                    );
                }
                Err(_) => thread::sleep(RETRY_INTERVAL),
            }
        }
        tracing::debug!(path = %path.display(), "writer lock acquired");
        Ok(Self { file })
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_holder_times_out_until_first_drops() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("data/studio.lock");
        let first = WriterLock::acquire(&path, DEFAULT_LOCK_WAIT).expect("first lock");
        assert!(path.exists());

        let err = WriterLock::acquire(&path, Duration::from_millis(120)).expect_err("contended");
        assert!(err.to_string().contains("holds"));

        drop(first);
        WriterLock::acquire(&path, Duration::from_millis(120)).expect("lock after release");
    }
}
