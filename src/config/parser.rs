use crate::config::types::FileOptions;
use crate::ConfigError;
use std::path::Path;

/// Loads an options file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML options file
///
/// # Returns
///
/// * `Ok(FileOptions)` - Successfully loaded options
/// * `Err(ConfigError)` - Failed to read or parse the file
pub fn load_options_file(path: &Path) -> Result<FileOptions, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let options: FileOptions = toml::from_str(&content)?;
    Ok(options)
}
