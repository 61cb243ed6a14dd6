//! Firmware inventory, task and update-run types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Id prefix the BMC gives a freshly uploaded image awaiting activation
pub const PLACEHOLDER_PREFIX: &str = "New";

// =============================================================================
// Firmware Inventory
// =============================================================================

/// Redfish resource collection (`Members` array)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    #[serde(rename = "Members", default = "Vec::new")]
    pub members: Vec<T>,

    #[serde(rename = "Members@odata.count", default)]
    pub count: Option<usize>,
}

/// Firmware inventory entry (SoftwareInventory resource or collection link)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryEntry {
    /// Resource URI
    #[serde(rename = "@odata.id", default)]
    pub odata_id: String,

    /// Entry id, e.g. `ActiveBIOS` or `NewBIOS` (absent on plain collection links)
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub updateable: Option<bool>,

    /// Remaining vendor fields
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl InventoryEntry {
    /// Entry id, falling back to the last segment of `@odata.id`
    pub fn id(&self) -> &str {
        match &self.id {
            Some(id) if !id.is_empty() => id,
            _ => self
                .odata_id
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default(),
        }
    }

    /// True for an uploaded image awaiting activation
    pub fn is_placeholder(&self) -> bool {
        self.is_placeholder_with(PLACEHOLDER_PREFIX)
    }

    /// True when the id starts with `prefix` or the URI has a `/{prefix}` segment
    pub fn is_placeholder_with(&self, prefix: &str) -> bool {
        self.id().starts_with(prefix) || self.odata_id.contains(&format!("/{}", prefix))
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// Redfish `TaskState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskState {
    New,
    Starting,
    Running,
    Suspended,
    Interrupted,
    Pending,
    Stopping,
    Completed,
    Killed,
    Exception,
    Service,
    Cancelling,
    Cancelled,
    /// Non-standard, reported by some vendors
    Failed,
    /// Anything this client does not recognise
    #[default]
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Check if the task has stopped (successfully or not)
    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failed()
    }

    /// Check if the task succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if the task failed
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::Exception | Self::Cancelled | Self::Killed | Self::Failed
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Message attached to a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskMessage {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub message_id: Option<String>,

    #[serde(default)]
    pub severity: Option<String>,
}

/// Redfish Task resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Task {
    #[serde(rename = "@odata.id", default)]
    pub odata_id: Option<String>,

    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub task_state: TaskState,

    /// Health of the task: `OK`, `Warning`, `Critical`
    #[serde(default)]
    pub task_status: Option<String>,

    #[serde(default)]
    pub percent_complete: Option<u32>,

    #[serde(default)]
    pub messages: Vec<TaskMessage>,

    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub end_time: Option<String>,
}

impl Task {
    /// Best human-readable reason for the task's current state
    pub fn status_message(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find_map(|m| m.message.clone())
            .or_else(|| self.task_status.clone())
            .unwrap_or_else(|| "no message reported".into())
    }
}

// =============================================================================
// Actions
// =============================================================================

/// `ComputerSystem.Reset` reset types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetType {
    On,
    ForceOff,
    GracefulShutdown,
    GracefulRestart,
    ForceRestart,
    Nmi,
    ForceOn,
    PushPowerButton,
    PowerCycle,
    ForcePowerCycle,
}

impl std::fmt::Display for ResetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// Update Run
// =============================================================================

/// Result of a successful image upload
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// Placeholder entry created by the BMC for the uploaded image
    pub placeholder: InventoryEntry,

    /// Local file name sent in the multipart part
    pub file_name: String,

    /// Bytes uploaded
    pub size: u64,
}

impl UploadResult {
    /// Placeholder identifier
    pub fn id(&self) -> &str {
        self.placeholder.id()
    }
}

/// Parameters for a complete firmware update run
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Local firmware image
    pub image: PathBuf,

    /// Logical update target, resolved through the endpoint map (e.g. `ActiveBIOSTarget`)
    pub target: String,

    /// Preserve BIOS/BMC settings across the flash; `None` leaves the BMC default
    pub preserve_config: Option<bool>,

    /// Delete a leftover placeholder from an earlier upload before uploading
    pub delete_stale_placeholder: bool,

    /// Power-cycle the system once the update completes
    pub power_cycle: bool,
}

impl UpdateRequest {
    pub fn new(image: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            target: target.into(),
            preserve_config: None,
            delete_stale_placeholder: false,
            power_cycle: false,
        }
    }

    pub fn preserve_config(mut self, preserve: bool) -> Self {
        self.preserve_config = Some(preserve);
        self
    }

    pub fn delete_stale_placeholder(mut self, delete: bool) -> Self {
        self.delete_stale_placeholder = delete;
        self
    }

    pub fn power_cycle(mut self, power_cycle: bool) -> Self {
        self.power_cycle = power_cycle;
        self
    }
}

/// Outcome of a complete update run
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub upload: UploadResult,

    /// Task URI returned by the update action, `None` when it completed synchronously
    pub task_uri: Option<String>,

    /// Final task payload when a task was polled
    pub task: Option<Task>,

    pub power_cycled: bool,
}

/// Update run phases for progress reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// Nothing started yet
    Idle,
    /// Uploading the image
    Uploading,
    /// Update action accepted
    Triggered,
    /// Waiting for the task and the placeholder to clear
    Polling,
    /// Complete
    Completed,
    /// A step failed; the run stopped there
    Failed,
}

impl UpdatePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Uploading => write!(f, "Uploading"),
            Self::Triggered => write!(f, "Triggered"),
            Self::Polling => write!(f, "Polling"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
