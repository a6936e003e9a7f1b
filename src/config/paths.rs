use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "juju", "bastion")
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Get the path to the settings file
pub fn settings_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("bastion.toml"))
}

/// Expand tilde in path (e.g., ~/keys/host_key -> /home/user/keys/host_key)
pub fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs_home() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
}

/// Log directory from `BASTION_LOG_DIR`, overriding the settings file.
pub fn log_dir_override() -> Option<PathBuf> {
    let raw = std::env::var("BASTION_LOG_DIR").ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

/// Ensure the log directory exists with owner-only permissions
pub fn ensure_log_dir(dir: &std::path::Path) -> std::io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}
