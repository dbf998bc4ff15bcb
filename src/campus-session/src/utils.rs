//! Small helpers shared by the storage backends and the HTTP client.

use std::path::Path;

/// Mask a bearer token for logs.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 8 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}***")
}

/// Set restrictive file permissions (0600 on Unix).
pub(crate) fn set_file_permissions(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}
