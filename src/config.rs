//! Configuration management for gradepilot
//!
//! Stores settings in ~/.config/gradepilot/config.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use url::Url;

use crate::keyring;

/// Default Gemini API endpoint (scheme + host only; the path is derived per request)
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

/// Default generation model, pinned so grade suggestions stay comparable across runs
fn default_model() -> String {
    "gemini-2.5-flash-preview-09-2025".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the generative-language API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model used for grade suggestions
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
        }
    }
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gradepilot"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        eprintln!(
                            "  Warning: Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)) {
                eprintln!("  Warning: Failed to set config directory permissions: {}", e);
            }
        }

        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(&path, &content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&path, content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        Ok(())
    }

    /// Build the generateContent URL for this endpoint and model.
    /// The key rides as a query pair, so the full URL must never be logged.
    pub fn request_url(&self, api_key: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.endpoint)?;
        url.set_path(&format!("v1beta/models/{}:generateContent", self.model));
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    /// Get the Gemini API key (from environment or keychain)
    pub fn get_api_key(&self) -> Option<String> {
        // Environment variable takes precedence
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }

        match keyring::get_api_key() {
            Ok(Some(key)) => Some(key),
            Ok(None) => None,
            Err(err) => {
                keyring::warn_keychain_error_once("the API key", &err);
                None
            }
        }
    }

    /// Store the API key in the system keychain
    pub fn set_api_key(key: &str) -> Result<(), String> {
        if let Err(write_err) = keyring::set_api_key(key) {
            return Err(format!(
                "Failed to store API key in system keychain: {}. \
                 You can set the GEMINI_API_KEY environment variable instead.",
                write_err
            ));
        }

        // Verify the write succeeded by reading it back
        match keyring::get_api_key() {
            Ok(Some(stored_key)) if stored_key == key => Ok(()),
            Ok(Some(_)) => Err(
                "API key verification failed: stored key doesn't match. \
                 You can set the GEMINI_API_KEY environment variable instead."
                    .to_string(),
            ),
            Ok(None) => Err(
                "API key verification failed: key was not persisted to keychain. \
                 You can set the GEMINI_API_KEY environment variable instead."
                    .to_string(),
            ),
            Err(read_err) => Err(format!(
                "API key verification failed: couldn't read back from keychain ({}). \
                 You can set the GEMINI_API_KEY environment variable instead.",
                read_err
            )),
        }
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }

    /// Validate API key format (Google API keys start with AIza)
    pub fn validate_api_key_format(key: &str) -> bool {
        key.starts_with("AIza")
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/gradepilot/config.json".to_string())
    }
}

/// Interactive prompt to set up the API key
pub fn setup_api_key_interactive() -> Result<String, String> {
    use std::io::{self, Write};

    println!();
    println!("  ┌─────────────────────────────────────────────────────────┐");
    println!("  │  GEMINI SETUP                                           │");
    println!("  └─────────────────────────────────────────────────────────┘");
    println!();
    println!("  gradepilot uses the Gemini API for grade suggestions.");
    println!();
    println!("  1. Get an API key at: https://aistudio.google.com/app/apikey");
    println!("  2. Paste it below (saved in your system keychain when available)");
    println!();
    print!("  API Key: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut key = String::new();
    io::stdin().read_line(&mut key).map_err(|e| e.to_string())?;
    let key = key.trim().to_string();

    if key.is_empty() {
        return Err("No API key provided".to_string());
    }

    // Validate key format
    if !Config::validate_api_key_format(&key) {
        println!();
        println!("  Warning: Key doesn't look like a Gemini key (should start with AIza)");
        println!("     Saving anyway...");
    }

    Config::set_api_key(&key)?;

    // Make sure the config file exists alongside the stored key so users can
    // find and edit the endpoint/model settings.
    let config = Config::load();
    config.save()?;

    println!();
    println!("  + API key saved. Settings live in {}", Config::config_location());
    println!();

    Ok(key)
}

fn preserve_corrupt_config(path: &std::path::Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &std::path::Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        eprintln!("  Warning: Failed to set temp config file permissions: {}", e);
    }

    file.write_all(content.as_bytes())
        .map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}
