use regex::Regex;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::error::PreferenceError;

pub const WHITELIST_KEY: &str = "pomofocus_whitelist";

static SITE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?([^/?#]*)").expect("site pattern is valid")
});

/// Key-value store for string lists that survives restarts.
pub trait Preferences: Send {
    fn load_list(&self, key: &str) -> Result<Option<Vec<String>>, PreferenceError>;
    fn save_list(&mut self, key: &str, values: &[String]) -> Result<(), PreferenceError>;
}

/// Preferences kept as one JSON object in a file.
#[derive(Debug, Clone)]
pub struct JsonPreferences {
    path: PathBuf,
}

impl JsonPreferences {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> Result<Map<String, Value>, PreferenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Preferences for JsonPreferences {
    fn load_list(&self, key: &str) -> Result<Option<Vec<String>>, PreferenceError> {
        let mut all = self.read_all()?;
        match all.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn save_list(&mut self, key: &str, values: &[String]) -> Result<(), PreferenceError> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), serde_json::to_value(values)?);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        Ok(())
    }
}

/// Lowercases, trims, and strips scheme, `www.` and any path.
pub fn normalize_site(site: &str) -> String {
    let lowered = site.trim().to_lowercase();
    SITE_PREFIX
        .captures(&lowered)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Normalizes saved entries, dropping empties and duplicates but keeping order.
fn clean_saved(saved: Vec<String>) -> Vec<String> {
    let mut sites: Vec<String> = Vec::with_capacity(saved.len());
    for site in saved {
        let cleaned = normalize_site(&site);
        if !cleaned.is_empty() && !sites.contains(&cleaned) {
            sites.push(cleaned);
        }
    }
    sites
}

fn read_saved(prefs: &dyn Preferences) -> Result<Vec<String>, PreferenceError> {
    Ok(clean_saved(prefs.load_list(WHITELIST_KEY)?.unwrap_or_default()))
}

/// Ordered, duplicate-free list of domains exempt from blocking.
///
/// Several processes may share one preferences file, so every edit re-reads
/// the saved list and applies the change on top of it.
pub struct WhitelistStore {
    sites: Vec<String>,
    prefs: Box<dyn Preferences>,
}

impl WhitelistStore {
    pub fn load(prefs: Box<dyn Preferences>) -> Self {
        let sites = read_saved(prefs.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not load whitelist, starting empty");
            Vec::new()
        });
        Self { sites, prefs }
    }

    /// Picks up edits saved by other processes. Keeps the current list when
    /// the file cannot be read.
    pub fn refresh(&mut self) {
        match read_saved(self.prefs.as_ref()) {
            Ok(saved) => self.sites = saved,
            Err(e) => tracing::warn!(error = %e, "could not reload whitelist"),
        }
    }

    /// Returns false when the input normalizes to nothing or is already listed.
    pub fn add(&mut self, site: &str) -> bool {
        self.refresh();
        let cleaned = normalize_site(site);
        if cleaned.is_empty() || self.sites.contains(&cleaned) {
            return false;
        }
        tracing::info!(site = %cleaned, "whitelisted");
        self.sites.push(cleaned);
        self.persist();
        true
    }

    pub fn remove(&mut self, site: &str) -> bool {
        self.refresh();
        let before = self.sites.len();
        self.sites.retain(|s| s != site);
        if self.sites.len() == before {
            return false;
        }
        tracing::info!(site, "removed from whitelist");
        self.persist();
        true
    }

    pub fn list(&self) -> &[String] {
        &self.sites
    }

    pub fn contains(&self, site: &str) -> bool {
        self.sites.iter().any(|s| s == site)
    }

    fn persist(&mut self) {
        if let Err(e) = self.prefs.save_list(WHITELIST_KEY, &self.sites) {
            tracing::warn!(error = %e, "failed to save whitelist");
        }
    }
}
