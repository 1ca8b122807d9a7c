use crate::bib::audit;
use crate::bib::config::{BibConfig, load_config};
use crate::bib::gallery::{self, GalleryOutcome};
use crate::bib::paths::{ArchivePaths, resolve_paths};
use crate::bib::state::{self, AssetStamp, WatchState};
use crate::bib::util::{file_name_string, list_files, now_epoch_secs};
use crate::bib::warn::{self, WarnEvent};
use crate::error::BibError;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, UNIX_EPOCH};

const LOCK_FILE_NAME: &str = "watch.lock";

#[derive(Debug, Clone, Default)]
pub struct WatchCycleOutcome {
    pub state_file: String,
    pub heartbeat_epoch_secs: u64,
    pub poll_interval_secs: u64,
    pub categories: Vec<String>,
    pub regenerated: Vec<GalleryOutcome>,
    pub failed: Vec<(String, String)>,
}

/// `None` when the file vanished after the directory was listed.
fn asset_stamp(path: &Path) -> Result<Option<AssetStamp>> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("failed to stat {}", path.display())),
    };
    let modified_nanos = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default();
    Ok(Some(AssetStamp {
        modified_nanos,
        len: meta.len(),
    }))
}

/// Asset file name -> stamp for one category folder.
fn snapshot(dir: &Path) -> Result<BTreeMap<String, AssetStamp>> {
    let mut out = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    for path in list_files(dir)? {
        let name = file_name_string(&path);
        if name.starts_with('.') {
            continue;
        }
        if let Some(stamp) = asset_stamp(&path)? {
            out.insert(name, stamp);
        }
    }
    Ok(out)
}

/// One polling pass: regenerate the gallery of every inspected category whose
/// folder changed since the last pass, or whose gallery file is missing.
pub fn run_cycle(
    paths: &ArchivePaths,
    cfg: &BibConfig,
    state: &mut WatchState,
) -> Result<WatchCycleOutcome> {
    let mut out = WatchCycleOutcome {
        poll_interval_secs: cfg.watch.poll_interval_secs,
        categories: cfg.inspect_categories(paths)?,
        ..WatchCycleOutcome::default()
    };

    for category in &out.categories {
        let current = snapshot(&paths.category_dir(category))?;
        let unchanged = state.seen_assets.get(category) == Some(&current)
            && paths.gallery_file(category).exists();
        if unchanged {
            continue;
        }
        match gallery::generate_category(paths, category) {
            Ok(generated) => {
                state.seen_assets.insert(category.clone(), current);
                out.regenerated.push(generated);
            }
            Err(err) => {
                warn::emit(WarnEvent {
                    code: "GALLERY_FAILED",
                    stage: "watch",
                    category,
                    target: &paths.gallery_file(category).display().to_string(),
                    reason: "gallery regeneration failed",
                    err: &format!("{err:#}"),
                });
                out.failed.push((category.clone(), format!("{err:#}")));
            }
        }
    }
    state
        .seen_assets
        .retain(|category, _| out.categories.contains(category));

    out.heartbeat_epoch_secs = now_epoch_secs()?;
    state.last_cycle_epoch_secs = out.heartbeat_epoch_secs;
    out.state_file = state::save(paths, state)?.display().to_string();

    let status = if out.failed.is_empty() { "ok" } else { "degraded" };
    audit::append_event(
        paths,
        "watch",
        status,
        &format!(
            "regenerated={} failed={}",
            out.regenerated.len(),
            out.failed.len()
        ),
    )?;
    Ok(out)
}

pub fn run_once() -> Result<WatchCycleOutcome> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut state = state::load(&paths)?;
    run_cycle(&paths, &cfg, &mut state)
}

/// Advisory lock held for the lifetime of a daemon. The file carries the
/// holder's pid for diagnostics.
pub struct DaemonLock {
    file: File,
    path: PathBuf,
}

impl DaemonLock {
    pub fn acquire(paths: &ArchivePaths) -> Result<Self> {
        fs::create_dir_all(&paths.logs_dir)
            .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
        let path = paths.logs_dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(BibError::WatcherRunning(path.display().to_string()).into());
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}

pub fn run_daemon() -> Result<()> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let lock = DaemonLock::acquire(&paths)?;
    audit::append_event(
        &paths,
        "watch",
        "started",
        &format!("lock={} pid={}", lock.path().display(), std::process::id()),
    )?;
    let mut state = state::load(&paths)?;
    let poll = Duration::from_secs(cfg.watch.poll_interval_secs);
    loop {
        if let Err(err) = run_cycle(&paths, &cfg, &mut state) {
            warn::emit(WarnEvent {
                code: "WATCH_CYCLE_FAILED",
                stage: "watch",
                category: "all",
                target: &paths.root.display().to_string(),
                reason: "cycle failed, retrying next poll",
                err: &format!("{err:#}"),
            });
        }
        thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, ArchivePaths, BibConfig) {
        let tmp = tempdir().expect("tempdir");
        let paths = ArchivePaths::under(tmp.path());
        fs::create_dir_all(paths.category_dir("Robotics")).expect("mkdir");
        fs::write(
            paths.category_dir("Robotics").join("Smith-2020-Arms Arms.png"),
            "",
        )
        .expect("write");
        let mut cfg = BibConfig::default();
        cfg.categories.inspect = vec!["Robotics".into()];
        (tmp, paths, cfg)
    }

    #[test]
    fn regenerates_only_changed_categories() {
        let (_tmp, paths, cfg) = setup();
        let mut state = WatchState::default();

        let first = run_cycle(&paths, &cfg, &mut state).expect("first cycle");
        assert_eq!(first.regenerated.len(), 1);
        assert!(paths.gallery_file("Robotics").exists());

        let second = run_cycle(&paths, &cfg, &mut state).expect("second cycle");
        assert!(second.regenerated.is_empty());

        fs::write(
            paths.category_dir("Robotics").join("Jones-2019-Legs Legs.jpg"),
            "",
        )
        .expect("write");
        let third = run_cycle(&paths, &cfg, &mut state).expect("third cycle");
        assert_eq!(third.regenerated.len(), 1);
        assert_eq!(third.regenerated[0].images, 2);

        let persisted = state::load(&paths).expect("load");
        assert_eq!(persisted.seen_assets["Robotics"].len(), 2);
    }

    #[test]
    fn missing_gallery_is_regenerated() {
        let (_tmp, paths, cfg) = setup();
        let mut state = WatchState::default();
        run_cycle(&paths, &cfg, &mut state).expect("first cycle");
        fs::remove_file(paths.gallery_file("Robotics")).expect("remove");
        let again = run_cycle(&paths, &cfg, &mut state).expect("cycle");
        assert_eq!(again.regenerated.len(), 1);
    }

    #[test]
    fn second_daemon_lock_is_refused() {
        let (_tmp, paths, _cfg) = setup();
        let lock = DaemonLock::acquire(&paths).expect("first lock");
        let pid = fs::read_to_string(lock.path()).expect("read lock");
        assert_eq!(pid.trim(), std::process::id().to_string());
        let err = DaemonLock::acquire(&paths).err().expect("second lock refused");
        assert!(err.to_string().contains("another watcher"));
        drop(lock);
        assert!(DaemonLock::acquire(&paths).is_ok());
    }

    #[test]
    fn vanished_file_is_skipped() {
        let tmp = tempdir().expect("tempdir");
        assert!(asset_stamp(&tmp.path().join("gone.png")).expect("stamp").is_none());
    }

    #[test]
    fn same_name_rewrite_with_new_size_is_detected() {
        let (_tmp, paths, cfg) = setup();
        let mut state = WatchState::default();
        run_cycle(&paths, &cfg, &mut state).expect("first cycle");

        fs::write(
            paths.category_dir("Robotics").join("Smith-2020-Arms Arms.png"),
            "new pixels",
        )
        .expect("rewrite");
        let again = run_cycle(&paths, &cfg, &mut state).expect("cycle");
        assert_eq!(again.regenerated.len(), 1);
        assert_eq!(state.seen_assets["Robotics"]["Smith-2020-Arms Arms.png"].len, 10);
    }
}
