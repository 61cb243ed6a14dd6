//! Platform-specific endpoint resolution
//!
//! BMC vendors place the same logical Redfish services at different paths.
//! The endpoint map is a plain JSON document keyed by platform type:
//!
//! ```json
//! {
//!   "default": {
//!     "SessionService": "/redfish/v1/SessionService/Sessions",
//!     "ActiveBIOSTarget": "/redfish/v1/UpdateService/FirmwareInventory/ActiveBIOS"
//!   },
//!   "vendor_a": {
//!     "StartUpdate": "/redfish/v1/UpdateService/Actions/Oem/StartUpdate"
//!   }
//! }
//! ```
//!
//! Lookups fall back from the requested platform to the `"default"` platform
//! and finally to the built-in Redfish paths in [`builtin_path`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RedfishError, Result};

/// Platform key consulted when the requested platform lacks a service
pub const DEFAULT_PLATFORM: &str = "default";

/// Logical service names with a built-in default path
pub mod services {
    pub const SESSION_SERVICE: &str = "SessionService";
    pub const UPDATE_SERVICE: &str = "UpdateService";
    pub const FIRMWARE_INVENTORY: &str = "FirmwareInventory";
    pub const START_UPDATE: &str = "StartUpdate";
    pub const SIMPLE_UPDATE: &str = "SimpleUpdate";
    pub const TASK_SERVICE: &str = "TaskService";
    pub const SYSTEMS: &str = "Systems";
}

/// Built-in path for a known service, used when no map entry exists
pub fn builtin_path(service: &str) -> Option<&'static str> {
    match service {
        services::SESSION_SERVICE => Some("/redfish/v1/SessionService/Sessions"),
        services::UPDATE_SERVICE => Some("/redfish/v1/UpdateService"),
        services::FIRMWARE_INVENTORY => Some("/redfish/v1/UpdateService/FirmwareInventory"),
        services::START_UPDATE => {
            Some("/redfish/v1/UpdateService/Actions/UpdateService.StartUpdate")
        }
        services::SIMPLE_UPDATE => {
            Some("/redfish/v1/UpdateService/Actions/UpdateService.SimpleUpdate")
        }
        services::TASK_SERVICE => Some("/redfish/v1/TaskService/Tasks"),
        services::SYSTEMS => Some("/redfish/v1/Systems"),
        _ => None,
    }
}

/// Platform type → (service name → path)
///
/// Read-only once loaded; [`resolve`](Self::resolve) never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointMap {
    platforms: HashMap<String, HashMap<String, String>>,
}

impl EndpointMap {
    /// An empty map; every lookup falls through to the built-in defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the map from a JSON file.
    ///
    /// A missing or malformed file is logged and yields an empty map so that
    /// the built-in defaults still apply. Use [`from_json_file`](Self::from_json_file)
    /// to treat those cases as errors.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_json_file(path) {
            Ok(map) => {
                debug!(
                    "Loaded endpoint map from {} ({} platforms)",
                    path.display(),
                    map.platforms.len()
                );
                map
            }
            Err(e) => {
                warn!("Using built-in endpoints, could not load {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load the map from a JSON file, failing on IO or parse errors
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RedfishError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse the map from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RedfishError::configuration(format!("Invalid endpoint map: {}", e)))
    }

    /// Add or replace a single entry
    pub fn with_endpoint(
        mut self,
        platform: impl Into<String>,
        service: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        self.platforms
            .entry(platform.into())
            .or_default()
            .insert(service.into(), path.into());
        self
    }

    /// Configured path without any fallback
    pub fn get(&self, platform: &str, service: &str) -> Option<&str> {
        self.platforms
            .get(platform)
            .and_then(|services| services.get(service))
            .map(String::as_str)
    }

    /// Platform types present in the map
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }

    /// Resolve a service path for a platform.
    ///
    /// Order: `platform` entry, then the `"default"` platform entry, then the
    /// built-in path. Unknown services with no entry are a configuration error.
    pub fn resolve(&self, platform: &str, service: &str) -> Result<String> {
        self.get(platform, service)
            .or_else(|| self.get(DEFAULT_PLATFORM, service))
            .or_else(|| builtin_path(service))
            .map(str::to_string)
            .ok_or_else(|| {
                RedfishError::configuration(format!(
                    "No endpoint configured for service '{}' on platform '{}'",
                    service, platform
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"{
        "default": {
            "ActiveBIOSTarget": "/redfish/v1/UpdateService/FirmwareInventory/ActiveBIOS"
        },
        "vendor_a": {
            "SessionService": "/redfish/v1/SessionService/Sessions/",
            "ActiveBMCTarget": "/redfish/v1/UpdateService/FirmwareInventory/BMC"
        }
    }"#;

    #[test]
    fn test_resolve_configured_path() {
        let map = EndpointMap::from_json(MAP).unwrap();
        assert_eq!(
            map.resolve("vendor_a", "SessionService").unwrap(),
            "/redfish/v1/SessionService/Sessions/"
        );
        assert_eq!(
            map.resolve("vendor_a", "ActiveBMCTarget").unwrap(),
            "/redfish/v1/UpdateService/FirmwareInventory/BMC"
        );
    }

    #[test]
    fn test_resolve_every_platform_returns_its_own_entries() {
        let map = EndpointMap::from_json(MAP).unwrap();
        for platform in map.platforms().collect::<Vec<_>>() {
            for (service, path) in &map.platforms[platform] {
                assert_eq!(&map.resolve(platform, service).unwrap(), path);
            }
        }
    }

    #[test]
    fn test_resolve_falls_back_to_default_platform() {
        let map = EndpointMap::from_json(MAP).unwrap();
        assert_eq!(
            map.resolve("vendor_a", "ActiveBIOSTarget").unwrap(),
            "/redfish/v1/UpdateService/FirmwareInventory/ActiveBIOS"
        );
        assert_eq!(
            map.resolve("unknown_platform", "ActiveBIOSTarget").unwrap(),
            "/redfish/v1/UpdateService/FirmwareInventory/ActiveBIOS"
        );
    }

    #[test]
    fn test_resolve_falls_back_to_builtin() {
        let map = EndpointMap::from_json(MAP).unwrap();
        assert_eq!(
            map.resolve("vendor_a", services::FIRMWARE_INVENTORY).unwrap(),
            "/redfish/v1/UpdateService/FirmwareInventory"
        );
        assert_eq!(
            EndpointMap::new()
                .resolve("anything", services::START_UPDATE)
                .unwrap(),
            "/redfish/v1/UpdateService/Actions/UpdateService.StartUpdate"
        );
    }

    #[test]
    fn test_resolve_unknown_service_is_configuration_error() {
        let map = EndpointMap::from_json(MAP).unwrap();
        let err = map.resolve("vendor_a", "ActiveCPLDTarget").unwrap_err();
        assert!(matches!(err, RedfishError::Configuration(_)));
    }

    #[test]
    fn test_resolve_does_not_mutate() {
        let map = EndpointMap::from_json(MAP).unwrap();
        let before = map.clone();
        let _ = map.resolve("nope", "SessionService");
        let _ = map.resolve("nope", "Nope");
        assert_eq!(map, before);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let map = EndpointMap::load("/nonexistent/endpoints.json");
        assert_eq!(map, EndpointMap::new());
        assert_eq!(
            map.resolve("default", services::SESSION_SERVICE).unwrap(),
            "/redfish/v1/SessionService/Sessions"
        );
    }

    #[test]
    fn test_load_malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("endpoints.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(EndpointMap::load(&path), EndpointMap::new());
        assert!(EndpointMap::from_json_file(&path).is_err());
    }

    #[test]
    fn test_with_endpoint() {
        let map = EndpointMap::new().with_endpoint("default", "ActiveBIOSTarget", "/bios");
        assert_eq!(map.get("default", "ActiveBIOSTarget"), Some("/bios"));
        assert_eq!(map.get("other", "ActiveBIOSTarget"), None);
    }
}
