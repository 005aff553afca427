//! The combined "set a color" operation.
//!
//! Resolves which device to talk to, frames the packet, delivers it, and
//! persists the configuration that worked.

use crate::comm::{self, Delivery};
use crate::config::{load_or_default, ConfigStore, StoredConfig, WorkingConfig, DEFAULT_ENDPOINT};
use crate::device::locate;
use crate::error::{Error, Result};
use crate::ident::{parse_identifier, DeviceIdentity, HexOrInt};
use crate::payload::{build_payload, normalize_color, PacketTemplate};
use crate::transport::UsbBus;
use tracing::{info, warn};

/// A request to set a static color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub color: String,
    /// Overrides the saved vendor ID.
    pub vid: Option<HexOrInt>,
    /// Overrides the saved product ID.
    pub pid: Option<HexOrInt>,
}

impl SetRequest {
    pub fn new(color: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            vid: None,
            pid: None,
        }
    }

    pub fn with_ids(mut self, vid: impl Into<HexOrInt>, pid: impl Into<HexOrInt>) -> Self {
        self.vid = Some(vid.into());
        self.pid = Some(pid.into());
        self
    }
}

/// Where a failed request stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Working out vendor/product IDs.
    Resolve,
    /// Framing the packet.
    Payload,
    /// Finding and claiming the device.
    Locate,
    /// Writing to the claimed device.
    Send,
}

/// Result of [`set_color`].
#[derive(Debug)]
pub enum SetOutcome {
    /// The packet reached the device.
    Applied {
        config: WorkingConfig,
        delivery: Delivery,
        /// Set when the configuration could not be persisted.
        save_error: Option<Error>,
    },
    /// The packet did not reach the device; the saved configuration is untouched.
    Failed { stage: Stage, error: Error },
}

impl SetOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// A message for the user, if there is anything worth saying.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::Applied {
                save_error: Some(e),
                ..
            } => Some(format!("color applied, but the configuration was not saved: {e}")),
            Self::Applied { .. } => None,
            Self::Failed { error, .. } => Some(error.to_string()),
        }
    }
}

/// Result of [`set_color_reporting`]: the outcome plus anything worth
/// telling the user that did not stop the request.
#[derive(Debug)]
pub struct SetReport {
    pub outcome: SetOutcome,
    /// Why an existing saved configuration was ignored.
    pub ignored_config: Option<Error>,
}

impl SetReport {
    /// Warning for a saved configuration that could not be read.
    pub fn config_warning(&self) -> Option<String> {
        self.ignored_config
            .as_ref()
            .map(|e| format!("saved configuration ignored, starting fresh: {e}"))
    }
}

/// Pick the identity, endpoint and template for a request.
///
/// Identifiers given in the request win over saved ones; endpoint and
/// template always come from the saved configuration or the defaults.
pub fn resolve_config(request: &SetRequest, saved: Option<&StoredConfig>) -> Result<WorkingConfig> {
    let vid = request
        .vid
        .as_ref()
        .or_else(|| saved.and_then(|s| s.vid.as_ref()))
        .ok_or(Error::MissingIdentity)?;
    let pid = request
        .pid
        .as_ref()
        .or_else(|| saved.and_then(|s| s.pid.as_ref()))
        .ok_or(Error::MissingIdentity)?;

    let identity = DeviceIdentity::new(parse_identifier("vid", vid)?, parse_identifier("pid", pid)?);

    let (endpoint, template) = match saved {
        Some(s) => (s.endpoint, s.template()),
        None => (DEFAULT_ENDPOINT, PacketTemplate::default()),
    };

    Ok(WorkingConfig {
        identity,
        endpoint,
        template,
    })
}

/// Set a static color on the device and remember what worked.
///
/// The packet is framed before any USB I/O, so a bad color or template never
/// touches the device. Only a delivered packet updates the saved config.
pub fn set_color(bus: &dyn UsbBus, store: &dyn ConfigStore, request: &SetRequest) -> SetOutcome {
    set_color_reporting(bus, store, request).outcome
}

/// [`set_color`], also reporting a saved configuration that was ignored.
pub fn set_color_reporting(
    bus: &dyn UsbBus,
    store: &dyn ConfigStore,
    request: &SetRequest,
) -> SetReport {
    let (saved, ignored_config) = load_or_default(store);
    let outcome = apply(bus, store, request, saved.as_ref());
    SetReport {
        outcome,
        ignored_config,
    }
}

fn apply(
    bus: &dyn UsbBus,
    store: &dyn ConfigStore,
    request: &SetRequest,
    saved: Option<&StoredConfig>,
) -> SetOutcome {
    let config = match resolve_config(request, saved) {
        Ok(config) => config,
        Err(error) => return failed(Stage::Resolve, error),
    };

    let payload = match build_payload(&config.template, &request.color) {
        Ok(payload) => payload,
        Err(error) => return failed(Stage::Payload, error),
    };

    info!("Connecting to {}...", config.identity);
    let link = match locate(bus, config.identity) {
        Ok(link) => link,
        Err(error) => return failed(Stage::Locate, error),
    };

    let delivery = match comm::send(bus, config.identity, link, config.endpoint, &payload) {
        Ok(delivery) => delivery,
        Err(error) => return failed(Stage::Send, error),
    };

    info!(
        color = %normalize_color(&request.color),
        delivery = ?delivery,
        "Color set"
    );

    let save_error = store.save(&config).err();
    if let Some(e) = &save_error {
        warn!(location = %store.location(), "Could not save configuration: {}", e);
    }

    SetOutcome::Applied {
        config,
        delivery,
        save_error,
    }
}

fn failed(stage: Stage, error: Error) -> SetOutcome {
    warn!(stage = ?stage, "Set color failed: {}", error);
    SetOutcome::Failed { stage, error }
}
