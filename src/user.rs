use std::ffi::CStr;
use std::path::{Path, PathBuf};

/// Used when no source yields a non-root username.
pub const FALLBACK_USERNAME: &str = "user";

/// Where the username comes from, in order of preference.
#[derive(Debug, Clone, Default)]
pub struct UserSources {
    /// Username files written by the rest of the toolbox.
    pub username_files: Vec<PathBuf>,
    pub sudo_user: Option<String>,
    pub user: Option<String>,
    /// Login name reported by the process (`getlogin`).
    pub login_name: Option<String>,
}

impl UserSources {
    /// Collect sources from the live process environment.
    pub fn from_environment(username_files: Vec<PathBuf>) -> Self {
        Self {
            username_files,
            sudo_user: std::env::var("SUDO_USER").ok(),
            user: std::env::var("USER").ok(),
            login_name: login_name(),
        }
    }
}

/// The user whose `~` every target path is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    username: String,
    home: PathBuf,
}

impl UserContext {
    /// A user living in `/home/<username>`.
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let home = PathBuf::from(format!("/home/{}", username));
        Self { username, home }
    }

    /// A user with an explicit home directory.
    pub fn with_home(username: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            home: home.into(),
        }
    }

    /// Resolve the real user from `sources`, falling back to `fallback`.
    pub fn resolve(sources: &UserSources, fallback: &str) -> Self {
        Self::new(resolve_username(sources, fallback))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Replace the first `~` in `path` with this user's home directory.
    ///
    /// Returns `None` when there is nothing to expand.
    pub fn expand(&self, path: &str) -> Option<String> {
        if !path.contains('~') {
            return None;
        }
        Some(path.replacen('~', &self.home.to_string_lossy(), 1))
    }
}

/// Determine the real username: username file, `SUDO_USER`, `USER`, login
/// name, then `fallback`. `root` is rejected from the last two.
pub fn resolve_username(sources: &UserSources, fallback: &str) -> String {
    for location in &sources.username_files {
        if !location.is_file() {
            continue;
        }
        match std::fs::read_to_string(location) {
            Ok(content) => {
                let name = content.trim();
                if !name.is_empty() {
                    tracing::info!("found username '{}' in {}", name, location.display());
                    return name.to_string();
                }
            }
            Err(e) => {
                tracing::warn!("could not read username file {}: {}", location.display(), e);
            }
        }
    }

    if let Some(name) = non_empty(&sources.sudo_user) {
        tracing::warn!("username file not found, using SUDO_USER: {}", name);
        return name.to_string();
    }

    if let Some(name) = non_empty(&sources.user).filter(|n| *n != "root") {
        tracing::warn!("username file not found, using USER: {}", name);
        return name.to_string();
    }

    if let Some(name) = non_empty(&sources.login_name).filter(|n| *n != "root") {
        tracing::warn!("username file not found, using login name: {}", name);
        return name.to_string();
    }

    tracing::error!("could not determine real username, using fallback '{}'", fallback);
    fallback.to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn login_name() -> Option<String> {
    let ptr = unsafe { libc::getlogin() };
    if ptr.is_null() {
        return None;
    }
    let name = unsafe { CStr::from_ptr(ptr) };
    name.to_str().ok().map(str::to_string)
}
