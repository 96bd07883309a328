//! The [`Sequencer`]: every user-level operation in one place.
//!
//! Long-running steps (discovery, file reads, profile installs) run without
//! holding the registry lock; results are committed under the lock in a
//! single step. Administrative operations pass the [`PermissionGate`] before
//! anything else happens.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::backend::{BackendChannel, BackendEvent, BackendGlobalState, BackendMessage, HttpTransport};
use crate::codec::{import_batch, open_all_files_in_folder, PickedFile, SequenceCodec};
use crate::config::SequencerConfig;
use crate::discovery::{DiscoveryService, HttpDiscoveryService, ImportSettings, TestDiscoverer};
use crate::error::{SequencerError, SequencerResult};
use crate::permission::{PermissionGate, StaticRole};
use crate::profile::{DependencyInstaller, HttpProfileInstaller, ProfileInstaller};
use crate::registry::SequenceRegistry;
use crate::sequence::{TestSequenceContainer, TestSequenceElement, TestSequencerProject};

/// Orchestrates sequences, discovery, persistence and the backend.
pub struct Sequencer {
    registry: Mutex<SequenceRegistry>,
    discoverer: TestDiscoverer,
    codec: SequenceCodec,
    gate: PermissionGate,
    backend: Option<BackendChannel>,
    profiles: Option<Arc<dyn ProfileInstaller>>,
    dependencies: Option<Arc<dyn DependencyInstaller>>,
}

impl Sequencer {
    pub fn new(discovery: Arc<dyn DiscoveryService>, gate: PermissionGate) -> Self {
        Self {
            registry: Mutex::new(SequenceRegistry::new()),
            discoverer: TestDiscoverer::new(discovery),
            codec: SequenceCodec::default(),
            gate,
            backend: None,
            profiles: None,
            dependencies: None,
        }
    }

    /// Wire HTTP collaborators from configuration. Spawns the backend pump, so
    /// this must run inside a tokio runtime.
    pub fn from_config(config: &SequencerConfig) -> SequencerResult<Self> {
        let discovery = Arc::new(HttpDiscoveryService::new(config)?);
        let gate = PermissionGate::new(Arc::new(StaticRole(config.role)));
        let transport = Arc::new(HttpTransport::new(config)?);
        let backend = BackendChannel::spawn(transport, config.outbound_capacity);
        let profiles = Arc::new(HttpProfileInstaller::new(config)?);

        Ok(Self::new(discovery, gate)
            .with_codec(SequenceCodec::new(config.sequence_extension.clone()))
            .with_backend(backend)
            .with_profile_installer(profiles))
    }

    pub fn with_codec(mut self, codec: SequenceCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_backend(mut self, backend: BackendChannel) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_profile_installer(mut self, installer: Arc<dyn ProfileInstaller>) -> Self {
        self.profiles = Some(installer);
        self
    }

    pub fn with_dependency_installer(mut self, installer: Arc<dyn DependencyInstaller>) -> Self {
        self.dependencies = Some(installer);
        self
    }

    pub fn codec(&self) -> &SequenceCodec {
        &self.codec
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn backend(&self) -> Option<&BackendChannel> {
        self.backend.as_ref()
    }

    /// Lock the registry for reading or direct edits.
    pub async fn registry(&self) -> MutexGuard<'_, SequenceRegistry> {
        self.registry.lock().await
    }

    // ========================================================================
    // Test discovery
    // ========================================================================

    /// Discover tests without touching any sequence.
    pub async fn discover_elements(
        &self,
        path: &Path,
        settings: ImportSettings,
    ) -> SequencerResult<Vec<TestSequenceElement>> {
        self.discoverer.discover(path, settings).await
    }

    /// Discover tests under `path` and append them to the live sequence.
    /// Returns the number of added elements.
    pub async fn import_tests(&self, path: &Path, settings: ImportSettings) -> SequencerResult<usize> {
        self.ensure_unlocked().await?;
        let elements = match self.discoverer.discover(path, settings).await {
            Ok(elements) => elements,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "test discovery failed");
                return Err(err);
            }
        };
        self.commit_elements(elements).await
    }

    /// Like [`Sequencer::import_tests`] with the strategy picked by extension.
    pub async fn import_tests_by_extension(&self, path: &Path) -> SequencerResult<usize> {
        self.ensure_unlocked().await?;
        let elements = self.discoverer.discover_by_extension(path).await?;
        self.commit_elements(elements).await
    }

    async fn commit_elements(&self, elements: Vec<TestSequenceElement>) -> SequencerResult<usize> {
        let mut registry = self.registry.lock().await;
        if registry.is_locked() {
            return Err(locked_error());
        }
        if registry.project().is_none() {
            return Err(SequencerError::NoProject);
        }
        let added = elements.len();
        registry.add_new_elems(elements)?;
        info!(added, "imported tests into live sequence");
        Ok(added)
    }

    async fn ensure_unlocked(&self) -> SequencerResult<()> {
        if self.registry.lock().await.is_locked() {
            return Err(locked_error());
        }
        Ok(())
    }

    /// Forward a missing library to the dependency installer. The failed
    /// import is not retried.
    pub async fn install_dependency(&self, name: &str) -> SequencerResult<()> {
        let installer = self
            .dependencies
            .as_ref()
            .ok_or_else(|| SequencerError::NotFound("dependency installer".to_string()))?;
        installer.install_dependency(name).await?;
        info!(dependency = name, "installed dependency");
        Ok(())
    }

    // ========================================================================
    // Sequence files
    // ========================================================================

    /// Import picked `.tjoy` files: the first becomes live, the rest merge
    /// into it.
    pub async fn import_sequences(&self, files: Vec<PickedFile>) -> SequencerResult<usize> {
        self.gate.check("import sequences")?;
        import_batch(&self.codec, files, &self.registry).await
    }

    /// Import every sequence file directly inside `path`. With `relative`, the
    /// path is resolved against the current directory.
    pub async fn import_folder(&self, path: &Path, relative: bool) -> SequencerResult<usize> {
        self.gate.check("import sequences from folder")?;
        let base = if relative {
            Some(std::env::current_dir()?)
        } else {
            None
        };
        let files =
            open_all_files_in_folder(path, self.codec.extension(), base.as_deref()).await?;
        import_batch(&self.codec, files, &self.registry).await
    }

    /// Replace every open sequence with the sequences of a test profile.
    /// Unsaved changes in any open sequence are only discarded when
    /// `confirmed`.
    pub async fn load_test_profile(
        &self,
        git_url: &str,
        cycles: i64,
        confirmed: bool,
    ) -> SequencerResult<usize> {
        self.gate.check("load test profile")?;
        {
            let mut registry = self.registry.lock().await;
            if registry.has_unsaved_sequences() && !confirmed {
                return Err(SequencerError::Cancelled(
                    "all unsaved changes would be lost".to_string(),
                ));
            }
            registry.clear_state();
            if git_url.trim().is_empty() {
                return Err(SequencerError::NotFound(
                    "No sequences associated with the test profile".to_string(),
                ));
            }
            registry.set_cycle_count(cycles);
        }

        let installer = self
            .profiles
            .as_ref()
            .ok_or_else(|| SequencerError::NotFound("profile installer".to_string()))?;
        let profile = installer.install_profile(git_url).await.map_err(|err| {
            warn!(git_url, error = %err, "failed to load test profile");
            err
        })?;
        self.registry
            .lock()
            .await
            .set_commit_hash(Some(profile.hash.clone()));

        let files =
            open_all_files_in_folder(&profile.profile_root, self.codec.extension(), None).await?;
        let count = import_batch(&self.codec, files, &self.registry).await?;

        // Profile cycles win over the counts stored in the files.
        self.registry.lock().await.set_cycle_count(cycles);
        info!(git_url, commit = %profile.hash, sequences = count, "loaded test profile");
        Ok(count)
    }

    /// Save the live sequence to its project location.
    pub async fn save(&self) -> SequencerResult<PathBuf> {
        self.gate.check("save sequence")?;
        let mut registry = self.registry.lock().await;
        let container = registry.snapshot().ok_or(SequencerError::NoProject)?;
        let path = self.codec.save(&container)?;
        registry.mark_saved(&container.project.name);
        Ok(path)
    }

    /// Save every open sequence. All saves are attempted; the first failure
    /// is returned.
    pub async fn save_all(&self) -> SequencerResult<Vec<PathBuf>> {
        self.gate.check("save all sequences")?;
        let mut registry = self.registry.lock().await;
        let mut saved = Vec::new();
        let mut first_error = None;
        for container in registry.all_containers() {
            match self.codec.save(&container) {
                Ok(path) => {
                    registry.mark_saved(&container.project.name);
                    saved.push(path);
                }
                Err(err) => {
                    warn!(sequence = %container.project.name, error = %err, "failed to save sequence");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(saved),
        }
    }

    /// Open a new empty sequence and make it live.
    pub async fn create_sequence(&self, project: TestSequencerProject) -> SequencerResult<()> {
        self.gate.check("create sequence")?;
        let mut registry = self.registry.lock().await;
        registry.activate(TestSequenceContainer::new(project));
        registry.set_unsaved(true);
        Ok(())
    }

    /// Close the live sequence. Unsaved changes are only discarded when
    /// `confirmed`. Returns the closed sequence.
    pub async fn close_sequence(&self, confirmed: bool) -> SequencerResult<TestSequenceContainer> {
        let mut registry = self.registry.lock().await;
        if registry.project().is_none() {
            return Err(SequencerError::NoProject);
        }
        if registry.is_unsaved() && !confirmed {
            return Err(SequencerError::Cancelled(
                "the sequence has unsaved changes".to_string(),
            ));
        }
        registry.close_active().ok_or(SequencerError::NoProject)
    }

    // ========================================================================
    // Switching and cycles
    // ========================================================================

    pub async fn set_sequence_as_runnable(&self, name: &str) -> SequencerResult<bool> {
        self.registry.lock().await.set_sequence_as_runnable(name)
    }

    pub async fn set_next_sequence_as_runnable(&self) -> bool {
        self.registry.lock().await.set_next_sequence_as_runnable()
    }

    pub async fn set_cycle_count(&self, count: i64) {
        self.registry.lock().await.set_cycle_count(count);
    }

    pub async fn set_infinite(&self, infinite: bool) {
        self.registry.lock().await.set_infinite(infinite);
    }

    pub async fn save_run(&self) {
        self.registry.lock().await.save_run();
    }

    pub async fn previous_cycle(&self) {
        self.registry.lock().await.previous_cycle();
    }

    pub async fn next_cycle(&self) {
        self.registry.lock().await.next_cycle();
    }

    pub async fn clear_previous_runs(&self) {
        self.registry.lock().await.clear_previous_runs();
    }

    pub async fn has_remaining_cycles(&self) -> bool {
        self.registry
            .lock()
            .await
            .cycle_controller()
            .has_remaining_cycles()
    }

    /// Whether every open sequence can run.
    pub async fn integrity(&self) -> bool {
        self.registry.lock().await.integrity()
    }

    // ========================================================================
    // Backend
    // ========================================================================

    fn channel(&self) -> SequencerResult<&BackendChannel> {
        self.backend
            .as_ref()
            .ok_or_else(|| SequencerError::Transport("no backend channel configured".to_string()))
    }

    /// Ask the backend to execute the live sequence. Statuses are reset only
    /// once the run request is queued.
    pub async fn run(&self) -> SequencerResult<()> {
        let channel = self.channel()?;
        let mut registry = self.registry.lock().await;
        if registry.project().is_none() {
            return Err(SequencerError::NoProject);
        }
        let mut data = registry.tree().clone();
        for leaf in data.leaves() {
            if let Some(test) = data.test_mut(&leaf.id) {
                test.reset();
            }
        }
        channel.send(BackendMessage::TestSequenceRun { data })?;
        registry.reset_statuses();
        Ok(())
    }

    pub fn stop(&self) -> SequencerResult<()> {
        self.channel()?.send(BackendMessage::TestSequenceStop)
    }

    /// Send the live tree's results to a cloud project and lock editing until
    /// the backend reports the test set done.
    pub async fn export_to_cloud(&self, serial_number: &str, project_id: &str) -> SequencerResult<()> {
        let channel = self.channel()?;
        let mut registry = self.registry.lock().await;
        if registry.project().is_none() {
            return Err(SequencerError::NoProject);
        }
        channel.send(BackendMessage::TestSequenceExportCloud {
            data: registry.tree().clone(),
            serial_number: serial_number.to_string(),
            project_id: project_id.to_string(),
        })?;
        registry.set_locked(true);
        info!(serial_number, project_id, "exporting results to cloud");
        Ok(())
    }

    /// Latest backend phase, `test_set_done` without a backend.
    pub fn backend_state(&self) -> BackendGlobalState {
        self.backend
            .as_ref()
            .map(|b| b.global_state())
            .unwrap_or_default()
    }

    /// Handle a raw inbound backend message.
    pub async fn handle_backend_message(&self, raw: &str) -> SequencerResult<BackendEvent> {
        let event = match &self.backend {
            Some(channel) => channel.ingest(raw)?,
            None => serde_json::from_str(raw)?,
        };
        self.apply_backend_event(&event).await;
        Ok(event)
    }

    /// Apply element status and lock changes carried by a backend event.
    pub async fn apply_backend_event(&self, event: &BackendEvent) {
        let mut registry = self.registry.lock().await;
        if let (Some(id), Some(status)) = (event.target_id.as_deref(), event.status) {
            if !registry.update_status(id, status, event.time_taken, event.error.clone()) {
                debug!(target_id = id, "status update for unknown element");
            }
        }
        if event.phase() == Some(BackendGlobalState::TestSetDone) && registry.is_locked() {
            registry.set_locked(false);
            info!("test set done, sequence unlocked");
        }
    }
}

fn locked_error() -> SequencerError {
    SequencerError::Cancelled("the sequence is locked while results are exported".to_string())
}
