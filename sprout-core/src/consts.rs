//! Constants shared across the sprout crates, including file names, git
//! remote names and executable names.

/// Platform-specific Git executable name
#[cfg(windows)]
pub const GIT_EXECUTABLE: &str = "git.exe";

/// Platform-specific Git executable name
#[cfg(not(windows))]
pub const GIT_EXECUTABLE: &str = "git";

/// Name of the remote the publisher binds and pushes to
pub const ORIGIN_REMOTE: &str = "origin";

/// File name of the symmetric key inside the data directory
pub const KEY_FILE_NAME: &str = "vault.key";

/// File name of the encrypted credential record inside the data directory
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// File name of the optional configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Placeholder written in place of secrets in logs and messages
pub const REDACTED: &str = "***";
