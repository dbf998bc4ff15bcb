//! Application directories for the campus access client.
//!
//! Linux/macOS use `~/.campus`, Windows uses `%APPDATA%\campus`.
//! Everything can be redirected with the `CAMPUS_HOME` environment variable.

use std::path::PathBuf;

/// Application name for directory paths
pub const APP_NAME: &str = "campus";

/// Primary home directory name on Linux/macOS
pub const HOME_DIR_NAME: &str = ".campus";

/// Environment variable overriding the home directory.
pub const CAMPUS_HOME_ENV: &str = "CAMPUS_HOME";

/// Application directories structure
#[derive(Debug, Clone)]
pub struct AppDirs {
    /// Home directory holding config and durable session data
    pub home: PathBuf,
}

impl AppDirs {
    /// Resolve the application directories.
    ///
    /// A relative `CAMPUS_HOME` is resolved against the current directory so
    /// session files never land somewhere unexpected.
    pub fn new() -> Option<Self> {
        if let Ok(home) = std::env::var(CAMPUS_HOME_ENV)
            && !home.is_empty()
        {
            let home = PathBuf::from(home);
            let home = if home.is_relative() {
                std::env::current_dir().ok()?.join(home)
            } else {
                home
            };
            return Some(Self { home });
        }

        #[cfg(target_os = "windows")]
        let home = dirs::config_dir()?.join(APP_NAME);

        #[cfg(not(target_os = "windows"))]
        let home = dirs::home_dir()?.join(HOME_DIR_NAME);

        Some(Self { home })
    }

    /// Path of the `config.toml` file
    pub fn config_file(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Create the home directory (0700 on Unix) if it does not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        if !self.home.exists() {
            std::fs::create_dir_all(&self.home)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&self.home, std::fs::Permissions::from_mode(0o700))?;
            }
        }
        Ok(())
    }
}

/// Get application directories (convenience function)
pub fn get_app_dirs() -> Option<AppDirs> {
    AppDirs::new()
}

/// Get the home directory for the application
pub fn get_campus_home() -> Option<PathBuf> {
    AppDirs::new().map(|dirs| dirs.home)
}
