use crate::core::config::Config;
use std::path::Path;
use std::sync::{LazyLock, Mutex};
use tempfile::TempDir;

static CONFIG_OVERRIDE_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Run `f` with `Config::load`/`save`/`mutate` redirected to a fresh file in a
/// temp directory. Calls are serialized because the override is global.
pub fn with_test_config<T>(f: impl FnOnce(&Path) -> T) -> T {
    let _guard = CONFIG_OVERRIDE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("config.toml");
    Config::set_test_config_path(path.clone());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&path)));
    Config::clear_test_config_override();
    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
