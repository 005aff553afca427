//! Persisted working configuration.
//!
//! The last configuration that successfully delivered a packet is saved so
//! later runs can omit the device identifiers. Where it lives is decided by
//! the caller through [`ConfigStore`].

use crate::error::{Error, Result};
use crate::ident::{DeviceIdentity, HexOrInt};
use crate::payload::{PacketTemplate, DEFAULT_PACKET_FOOTER, DEFAULT_PACKET_HEADER};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Endpoint used when no saved configuration names one.
pub const DEFAULT_ENDPOINT: u8 = 2;

fn default_endpoint() -> u8 {
    DEFAULT_ENDPOINT
}

fn default_header() -> String {
    DEFAULT_PACKET_HEADER.to_string()
}

fn default_footer() -> String {
    DEFAULT_PACKET_FOOTER.to_string()
}

/// A configuration that is known to reach the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingConfig {
    pub identity: DeviceIdentity,
    pub endpoint: u8,
    pub template: PacketTemplate,
}

/// On-disk form of the configuration.
///
/// Reading is lenient: identifiers may be integers or hex strings and every
/// other field falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vid: Option<HexOrInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<HexOrInt>,
    #[serde(default = "default_endpoint")]
    pub endpoint: u8,
    #[serde(default = "default_header")]
    pub packet_header: String,
    #[serde(default = "default_footer")]
    pub packet_footer: String,
}

impl Default for StoredConfig {
    fn default() -> Self {
        Self {
            vid: None,
            pid: None,
            endpoint: DEFAULT_ENDPOINT,
            packet_header: default_header(),
            packet_footer: default_footer(),
        }
    }
}

impl StoredConfig {
    pub fn template(&self) -> PacketTemplate {
        PacketTemplate::new(self.packet_header.clone(), self.packet_footer.clone())
    }
}

impl From<&WorkingConfig> for StoredConfig {
    fn from(config: &WorkingConfig) -> Self {
        Self {
            vid: Some(config.identity.vid.into()),
            pid: Some(config.identity.pid.into()),
            endpoint: config.endpoint,
            packet_header: config.template.header.clone(),
            packet_footer: config.template.footer.clone(),
        }
    }
}

/// Serialize with 4-space indentation.
pub fn to_json(config: &StoredConfig) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    config
        .serialize(&mut ser)
        .map_err(|e| Error::Config(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| Error::Config(e.to_string()))
}

/// Parse a stored configuration.
pub fn from_json(text: &str) -> Result<StoredConfig> {
    serde_json::from_str(text).map_err(|e| Error::ConfigCorrupt(e.to_string()))
}

/// Where the working configuration is kept.
pub trait ConfigStore {
    /// Read the saved configuration; `Ok(None)` when nothing has been saved.
    fn load(&self) -> Result<Option<StoredConfig>>;

    /// Overwrite the saved configuration.
    fn save(&self, config: &WorkingConfig) -> Result<()>;

    /// Human-readable location for messages.
    fn location(&self) -> String;
}

/// Load the saved configuration, treating any failure as "nothing saved".
///
/// The load error, if any, is handed back so the caller can tell the user
/// their file was ignored.
pub fn load_or_default(store: &dyn ConfigStore) -> (Option<StoredConfig>, Option<Error>) {
    match store.load() {
        Ok(config) => (config, None),
        Err(e) => {
            warn!(
                location = %store.location(),
                "Ignoring saved configuration, starting fresh: {}",
                e
            );
            (None, Some(e))
        }
    }
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<Option<StoredConfig>> {
        match File::open(&self.path) {
            Ok(reader) => serde_json::from_reader(reader)
                .map(Some)
                .map_err(|e| Error::ConfigCorrupt(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved configuration");
                Ok(None)
            }
            Err(e) => Err(Error::Config(format!(
                "could not open {} for reading: {e}",
                self.path.display()
            ))),
        }
    }

    fn save(&self, config: &WorkingConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("could not create {}: {e}", parent.display()))
                })?;
            }
        }

        let json = to_json(&StoredConfig::from(config))?;
        let mut file = File::create(&self.path).map_err(|e| {
            Error::Config(format!(
                "could not open {} for writing: {e}",
                self.path.display()
            ))
        })?;
        file.write_all(json.as_bytes())
            .map_err(|e| Error::Config(format!("could not write {}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store holding the serialized JSON text.
#[derive(Debug, Default)]
pub struct MemoryStore {
    contents: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `text`, valid JSON or not.
    pub fn with_contents(text: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(text.into())),
        }
    }

    /// The JSON text currently held.
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredConfig>> {
        self.contents().as_deref().map(from_json).transpose()
    }

    fn save(&self, config: &WorkingConfig) -> Result<()> {
        let json = to_json(&StoredConfig::from(config))?;
        *self
            .contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(json);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkingConfig {
        WorkingConfig {
            identity: DeviceIdentity::new(0x0416, 0x7399),
            endpoint: 2,
            template: PacketTemplate::default(),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("usb-rgb-test-{}-{name}", std::process::id()))
            .join("config.json")
    }

    #[test]
    fn stored_json_uses_integer_ids_and_reference_keys() {
        let json = to_json(&StoredConfig::from(&sample())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["vid"].as_u64(), Some(0x0416));
        assert_eq!(value["pid"].as_u64(), Some(0x7399));
        assert_eq!(value["endpoint"].as_u64(), Some(2));
        assert_eq!(value["packet_header"].as_str(), Some(DEFAULT_PACKET_HEADER));
        assert_eq!(value["packet_footer"].as_str(), Some(DEFAULT_PACKET_FOOTER));
        assert!(json.contains("\n    \"vid\""));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let stored = from_json(r#"{"vid": "0416", "pid": 29593}"#).unwrap();
        assert_eq!(stored.vid, Some(HexOrInt::Hex("0416".into())));
        assert_eq!(stored.pid, Some(HexOrInt::Int(29593)));
        assert_eq!(stored.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(stored.template(), PacketTemplate::default());

        let empty = from_json("{}").unwrap();
        assert_eq!(empty, StoredConfig::default());
    }

    #[test]
    fn garbage_is_config_corrupt() {
        assert!(matches!(from_json("{ not json"), Err(Error::ConfigCorrupt(_))));
        assert!(matches!(
            from_json(r#"{"endpoint": 512}"#),
            Err(Error::ConfigCorrupt(_))
        ));
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save(&sample()).unwrap();
        let stored = store.load().unwrap().unwrap();
        assert_eq!(stored, StoredConfig::from(&sample()));
    }

    #[test]
    fn load_or_default_swallows_corruption() {
        let store = MemoryStore::with_contents("{{{{");
        assert!(store.load().is_err());

        let (config, ignored) = load_or_default(&store);
        assert_eq!(config, None);
        assert!(matches!(ignored, Some(Error::ConfigCorrupt(_))));
    }

    #[test]
    fn load_or_default_reports_nothing_for_absent_config() {
        let (config, ignored) = load_or_default(&MemoryStore::new());
        assert_eq!(config, None);
        assert!(ignored.is_none());
    }

    #[test]
    fn file_store_missing_file_is_none() {
        let store = JsonFileStore::new(temp_path("missing"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn file_store_creates_directory_and_overwrites() {
        let path = temp_path("save");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
        let store = JsonFileStore::new(&path);

        store.save(&sample()).unwrap();
        let mut second = sample();
        second.endpoint = 3;
        store.save(&second).unwrap();

        let stored = store.load().unwrap().unwrap();
        assert_eq!(stored.endpoint, 3);
        assert_eq!(stored.vid, Some(HexOrInt::Int(0x0416)));

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn file_store_corrupt_file_is_config_corrupt() {
        let path = temp_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(Error::ConfigCorrupt(_))));
        let (config, ignored) = load_or_default(&store);
        assert_eq!(config, None);
        assert!(ignored.is_some());

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
