use std::path::PathBuf;

pub const APP_NAME: &str = "CareBridge";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DATABASE_FILE: &str = "carebridge.db";

/// Per-user application data directory, created on demand.
pub fn app_data_dir() -> Result<PathBuf, std::io::Error> {
    let base = dirs::data_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no user data directory available",
        )
    })?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn database_path() -> Result<PathBuf, std::io::Error> {
    Ok(app_data_dir()?.join(DATABASE_FILE))
}

/// Default tracing filter: console noise stays down, our crate logs at
/// debug during development builds.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,carebridge_store=debug"
    } else {
        "info"
    }
}
