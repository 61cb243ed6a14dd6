//! Firmware update workflow: upload, trigger, task polling, cleanup, reset

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use super::types::*;
use crate::client::RedfishClient;
use crate::endpoints::services;
use crate::error::{RedfishError, Result, TransportError};
use crate::transport::RedfishRequest;

/// Firmware operations bound to an authenticated [`RedfishClient`]
///
/// Obtained with [`RedfishClient::firmware`]. Every call needs a valid
/// session; steps are never retried and a failure stops the run.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareService<'a> {
    client: &'a RedfishClient,
}

impl<'a> FirmwareService<'a> {
    pub fn new(client: &'a RedfishClient) -> Self {
        Self { client }
    }

    fn inventory_path(&self) -> Result<String> {
        self.client.resolve(services::FIRMWARE_INVENTORY)
    }

    /// Path of an inventory entry given its `Id` or full `/redfish/...` URI
    fn entry_path(&self, id: &str) -> Result<String> {
        if id.starts_with("/redfish/") {
            return Ok(id.to_string());
        }
        Ok(format!(
            "{}/{}",
            self.inventory_path()?.trim_end_matches('/'),
            id
        ))
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// List the firmware inventory collection members
    #[instrument(skip(self))]
    pub async fn get_firmware_inventory(&self) -> Result<Vec<InventoryEntry>> {
        let path = self.inventory_path()?;
        info!("Fetching firmware inventory: {}", path);

        let inventory: Collection<InventoryEntry> = self.client.get_json(&path).await?;
        info!("Found {} firmware entries", inventory.members.len());
        Ok(inventory.members)
    }

    /// List the inventory with `$expand=.` so members carry their details
    #[instrument(skip(self))]
    pub async fn get_firmware_inventory_expanded(&self) -> Result<Vec<InventoryEntry>> {
        let path = format!("{}?$expand=.", self.inventory_path()?);
        debug!("Fetching expanded firmware inventory: {}", path);

        let inventory: Collection<InventoryEntry> = self.client.get_json(&path).await?;
        Ok(inventory.members)
    }

    /// Fetch one inventory entry by `Id` or full URI
    #[instrument(skip(self))]
    pub async fn get_firmware_info(&self, firmware_id: &str) -> Result<InventoryEntry> {
        let path = self.entry_path(firmware_id)?;
        info!("Fetching firmware details: {}", path);
        self.client.get_json(&path).await
    }

    /// First placeholder entry in the inventory, if any
    pub async fn find_placeholder(&self) -> Result<Option<InventoryEntry>> {
        let members = self.get_firmware_inventory_expanded().await?;
        Ok(members.into_iter().find(InventoryEntry::is_placeholder))
    }

    // =========================================================================
    // Upload
    // =========================================================================

    /// Upload a firmware image and wait for its placeholder entry to appear
    ///
    /// Missing, unreadable or empty files fail with [`RedfishError::Upload`]
    /// before anything is sent.
    #[instrument(skip(self))]
    pub async fn upload_image(&self, file_path: impl AsRef<Path> + std::fmt::Debug) -> Result<UploadResult> {
        let file_path = file_path.as_ref();
        let data = tokio::fs::read(file_path).await.map_err(|e| {
            error!("Firmware file unreadable: {} ({})", file_path.display(), e);
            RedfishError::upload(format!("cannot read {}: {}", file_path.display(), e))
        })?;
        if data.is_empty() {
            error!("Firmware file is empty: {}", file_path.display());
            return Err(RedfishError::upload(format!(
                "{} is empty",
                file_path.display()
            )));
        }

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "firmware.bin".into());
        let size = data.len() as u64;

        self.client.require_session()?;
        let target_uri = self.inventory_path()?;
        info!(
            "Uploading firmware: src={} size={}B target={}",
            file_path.display(),
            size,
            target_uri
        );

        let request = RedfishRequest::post(&target_uri).multipart("file", file_name.clone(), data);
        let response = self.client.request(request).await.map_err(|e| match e {
            RedfishError::Transport(TransportError::HttpStatus { code, body, .. }) => {
                RedfishError::upload(format!(
                    "{} rejected the image with HTTP {}: {}",
                    target_uri, code, body
                ))
            }
            other => other,
        })?;
        info!(
            "Firmware upload accepted: status={} length={}B",
            response.status,
            response.body.len()
        );

        let polling = &self.client.config().polling;
        let placeholder = self
            .wait_for_placeholder(polling.inventory_poll_interval(), polling.inventory_timeout())
            .await?;

        Ok(UploadResult {
            placeholder,
            file_name,
            size,
        })
    }

    /// Poll the inventory until a placeholder (`New*`) entry appears
    #[instrument(skip(self))]
    pub async fn wait_for_placeholder(
        &self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<InventoryEntry> {
        let entry = self
            .poll_until(
                "uploaded firmware placeholder",
                poll_interval,
                timeout,
                move || async move { self.find_placeholder().await },
            )
            .await?;
        info!("Detected uploaded firmware entry: {}", entry.id());
        Ok(entry)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Set the vendor flag that keeps BIOS or BMC settings across the flash
    ///
    /// Targets whose name contains `bmc` toggle `PreserveBmcConfig`, all
    /// others `PreserveBiosConfig`. A rejected PATCH is a configuration error.
    #[instrument(skip(self))]
    pub async fn preset_save_config(&self, target_service: &str, preserve: bool) -> Result<()> {
        let path = self.client.resolve(services::UPDATE_SERVICE)?;
        let flag = if target_service.to_lowercase().contains("bmc") {
            "PreserveBmcConfig"
        } else {
            "PreserveBiosConfig"
        };
        let payload = json!({"Oem": {"Public": {flag: preserve}}});
        info!("Presetting update config: path={} payload={}", path, payload);

        let etag = self
            .client
            .get(&path)
            .await?
            .header("ETag")
            .map(str::to_string);

        let mut request = RedfishRequest::patch(&path).json(payload);
        if let Some(etag) = etag {
            request = request.header("If-Match", etag);
        }

        self.client.request(request).await.map_err(|e| match e {
            RedfishError::Transport(TransportError::HttpStatus { code, body, .. }) => {
                RedfishError::configuration(format!(
                    "setting {}={} on {} failed with HTTP {}: {}",
                    flag, preserve, path, code, body
                ))
            }
            other => other,
        })?;
        Ok(())
    }

    /// Trigger the update of `target_service` and return the task URI, if any
    ///
    /// The task URI comes from the response body's `@odata.id`, else from the
    /// `Location` header. `None` means the BMC finished synchronously.
    #[instrument(skip(self))]
    pub async fn simple_update(&self, target_service: &str) -> Result<Option<String>> {
        let path = self.client.resolve(services::START_UPDATE)?;
        let target = self.client.resolve(target_service)?;

        let payload = json!({
            "ForceUpdate": true,
            "Targets": [target],
        });
        info!("Triggering update: path={} targets=[{}]", path, target);

        let response = self.client.post(&path, payload).await?;

        let from_body = response.json_value().and_then(|body| {
            body.get("@odata.id")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });
        let task_uri = from_body.or_else(|| {
            response
                .header("Location")
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });

        match &task_uri {
            Some(uri) => info!("Update accepted, task URI: {}", uri),
            None => info!("Update accepted without a task, assuming synchronous completion"),
        }
        Ok(task_uri)
    }

    /// Fetch a task once
    #[instrument(skip(self))]
    pub async fn get_task_status(&self, task_uri: &str) -> Result<Task> {
        let task: Task = self.client.get_json(task_uri).await?;
        info!(
            "Task status: state={} status={} percent={:?}",
            task.task_state,
            task.task_status.as_deref().unwrap_or("Unknown"),
            task.percent_complete
        );
        Ok(task)
    }

    /// Poll a task every `poll_interval` until it reaches a terminal state
    ///
    /// Returns the final task on `Completed`, [`RedfishError::TaskFailed`] on
    /// `Exception`/`Cancelled`/`Killed`, and [`RedfishError::TaskTimeout`]
    /// once `timeout` has elapsed (overshooting by at most one interval).
    #[instrument(skip(self))]
    pub async fn wait_for_task_completion(
        &self,
        task_uri: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Task> {
        info!(
            "Waiting for task {} interval={:?} timeout={:?}",
            task_uri, poll_interval, timeout
        );
        let operation = format!("task {}", task_uri);

        let task = self
            .poll_until(&operation, poll_interval, timeout, move || async move {
                let task = self.get_task_status(task_uri).await?;
                debug!(
                    "Task progress: state={} percent={:?}",
                    task.task_state, task.percent_complete
                );

                if task.task_state.is_failed() {
                    error!("Task {} ended in state {}", task_uri, task.task_state);
                    return Err(RedfishError::TaskFailed {
                        task_uri: task_uri.to_string(),
                        state: task.task_state.to_string(),
                        message: task.status_message(),
                    });
                }
                Ok::<_, RedfishError>(task.task_state.is_success().then_some(task))
            })
            .await?;

        if task.task_status.as_deref().is_some_and(|s| s != "OK") {
            warn!(
                "Task {} completed with status {}",
                task_uri,
                task.status_message()
            );
        }
        info!("Task {} completed", task_uri);
        Ok(task)
    }

    /// Poll the inventory until no placeholder entry remains (image activated)
    #[instrument(skip(self))]
    pub async fn wait_for_new_firmware_marker(
        &self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<()> {
        self.poll_until(
            "uploaded firmware placeholder to clear",
            poll_interval,
            timeout,
            move || async move {
                Ok::<_, RedfishError>(match self.find_placeholder().await? {
                    Some(entry) => {
                        debug!("Placeholder {} still present", entry.id());
                        None
                    }
                    None => Some(()),
                })
            },
        )
        .await?;
        info!("Placeholder cleared, firmware activated");
        Ok(())
    }

    /// Run `check` until it yields a value, an error, or `timeout` elapses
    ///
    /// Each check is bounded by the time left before the deadline and the
    /// sleep between checks is clamped to it, so the wait ends within one
    /// `poll_interval` of `timeout` even when the BMC stalls.
    async fn poll_until<T, F, Fut>(
        &self,
        operation: &str,
        poll_interval: Duration,
        timeout: Duration,
        mut check: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let start = Instant::now();
        let mut attempts = 0u32;
        let timed_out = |attempts: u32| {
            error!(
                "Timed out waiting for {} after {} polls ({:?})",
                operation,
                attempts,
                start.elapsed()
            );
            RedfishError::TaskTimeout {
                operation: operation.to_string(),
                elapsed: start.elapsed(),
            }
        };

        loop {
            let remaining = timeout.saturating_sub(start.elapsed());
            let outcome = tokio::time::timeout(remaining, check())
                .await
                .map_err(|_| timed_out(attempts))??;
            attempts += 1;

            if let Some(done) = outcome {
                debug!("{} done after {} polls", operation, attempts);
                return Ok(done);
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(timed_out(attempts));
            }
            debug!(
                "Waiting for {}: attempts={} next_poll_in={:?}",
                operation,
                attempts,
                poll_interval.min(remaining)
            );
            tokio::time::sleep(poll_interval.min(remaining)).await;
        }
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Delete an uploaded placeholder entry. Already absent (404) is success.
    #[instrument(skip(self))]
    pub async fn delete_uploaded_firmware(&self, firmware_id: &str) -> Result<()> {
        let path = self.entry_path(firmware_id)?;
        info!("Deleting uploaded firmware: id={} path={}", firmware_id, path);

        match self.client.delete(&path).await {
            Ok(response) => {
                let code = response
                    .json_value()
                    .and_then(|body| body["error"]["code"].as_str().map(str::to_string));
                info!(
                    "Delete accepted: status={} code={}",
                    response.status,
                    code.as_deref().unwrap_or("-")
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("Firmware entry {} already absent", firmware_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete whatever placeholder is currently in the inventory
    ///
    /// Returns the deleted id, or `None` when there was nothing to delete.
    #[instrument(skip(self))]
    pub async fn delete_pending_upload(&self) -> Result<Option<String>> {
        let Some(entry) = self.find_placeholder().await? else {
            debug!("No pending upload to delete");
            return Ok(None);
        };
        let target = if entry.odata_id.starts_with("/redfish/") {
            entry.odata_id.clone()
        } else {
            entry.id().to_string()
        };
        self.delete_uploaded_firmware(&target).await?;
        Ok(Some(entry.id().to_string()))
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Issue `ComputerSystem.Reset` on a system. Does not wait for it to return.
    #[instrument(skip(self))]
    pub async fn reset_system(&self, system_id: &str, reset_type: ResetType) -> Result<()> {
        let systems = self.client.resolve(services::SYSTEMS)?;
        let path = format!(
            "{}/{}/Actions/ComputerSystem.Reset",
            systems.trim_end_matches('/'),
            system_id
        );
        let payload = json!({"ResetType": reset_type});
        info!("Resetting system: path={} payload={}", path, payload);

        self.client.post(&path, payload).await?;
        Ok(())
    }

    /// Force a power cycle of the configured system
    pub async fn power_cycle(&self) -> Result<()> {
        let system_id = &self.client.config().connection.system_id;
        self.reset_system(system_id, ResetType::ForcePowerCycle)
            .await
    }

    // =========================================================================
    // High-Level Operations
    // =========================================================================

    /// Perform a complete firmware update
    ///
    /// 1. Resolve the update target
    /// 2. Optionally delete a stale placeholder
    /// 3. Upload the image
    /// 4. Optionally set the preserve-config flag
    /// 5. Trigger the update
    /// 6. Poll the task (if any) and wait for the placeholder to clear
    /// 7. Optionally power-cycle
    ///
    /// Phase changes are reported through `progress_callback`; the first
    /// failing step reports [`UpdatePhase::Failed`] and its error is returned.
    #[instrument(skip(self, progress_callback))]
    pub async fn update_firmware<F>(
        &self,
        request: &UpdateRequest,
        mut progress_callback: Option<F>,
    ) -> Result<UpdateOutcome>
    where
        F: FnMut(UpdatePhase) + Send,
    {
        let mut report = |phase: UpdatePhase| {
            info!("Firmware update phase: {}", phase);
            if let Some(ref mut cb) = progress_callback {
                cb(phase);
            }
        };

        report(UpdatePhase::Idle);
        match self.run_update(request, &mut report).await {
            Ok(outcome) => {
                report(UpdatePhase::Completed);
                Ok(outcome)
            }
            Err(e) => {
                error!("Firmware update failed: {}", e);
                report(UpdatePhase::Failed);
                Err(e)
            }
        }
    }

    async fn run_update(
        &self,
        request: &UpdateRequest,
        report: &mut (dyn FnMut(UpdatePhase) + Send),
    ) -> Result<UpdateOutcome> {
        self.client.require_session()?;
        self.client.resolve(&request.target)?;

        if request.delete_stale_placeholder {
            if let Some(id) = self.delete_pending_upload().await? {
                info!("Deleted stale placeholder {}", id);
            }
        }

        report(UpdatePhase::Uploading);
        let upload = self.upload_image(&request.image).await?;

        if let Some(preserve) = request.preserve_config {
            self.preset_save_config(&request.target, preserve).await?;
        }

        let task_uri = self.simple_update(&request.target).await?;
        report(UpdatePhase::Triggered);

        report(UpdatePhase::Polling);
        let polling = &self.client.config().polling;
        let task = match &task_uri {
            Some(uri) => Some(
                self.wait_for_task_completion(
                    uri,
                    polling.task_poll_interval(),
                    polling.task_timeout(),
                )
                .await?,
            ),
            None => None,
        };
        self.wait_for_new_firmware_marker(
            polling.inventory_poll_interval(),
            polling.inventory_timeout(),
        )
        .await?;

        if request.power_cycle {
            self.power_cycle().await?;
        }

        Ok(UpdateOutcome {
            upload,
            task_uri,
            task,
            power_cycled: request.power_cycle,
        })
    }
}
