use crate::config::Config;
use crate::context::TelemetryContext;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

pub(crate) fn create_initialized_state() -> TempDir {
    create_state_with_config(&Config::default())
}

pub(crate) fn create_state_with_config(config: &Config) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let ctx = TelemetryContext::resolve_from(temp_dir.path());

    std::fs::create_dir_all(&ctx.locks_dir).unwrap();
    std::fs::create_dir_all(ctx.tasks_dir()).unwrap();
    std::fs::create_dir_all(ctx.events_dir()).unwrap();
    std::fs::write(ctx.config_path(), config.to_yaml().unwrap()).unwrap();
    std::fs::write(ctx.adhoc_backlog_path(), "[]\n").unwrap();
    std::fs::write(ctx.scheduled_registry_path(), "[]\n").unwrap();

    temp_dir
}
