use std::path::{Path, PathBuf};

use crate::components::credentials::{
    self, CredentialError, CredentialStore, FileCredentialStore, KEY_FILE_NAME, MemoryCredentialStore,
};
use crate::components::history::{
    FileHistoryStore, HISTORY_FILE_NAME, HistoryStore, MemoryHistoryStore, StoreError,
};
use crate::components::slots::SlotManager;
use crate::io;
use crate::ops::ai::{ErrorCategory, GeneratedImage, GenerationApi, GenerationError};
use crate::ops::request::{OutboundRequest, RequestComposer, SizeHint};
use crate::settings::{Settings, config_dir};
use crate::{log_err, log_info, log_warn};

/// A generation that has been validated and composed but not yet answered.
/// Hand it back to [`Session::finish_generation`] with the outcome.
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    pub request: OutboundRequest,
    pub api_key: String,
    prompt: String,
    record_history: bool,
}

/// One user's page: reference slots, prompt, stores and the last result.
pub struct Session {
    settings: Settings,
    slots: SlotManager,
    composer: RequestComposer,
    credentials: Box<dyn CredentialStore>,
    history: Box<dyn HistoryStore>,
    prompt: String,
    size_hint: SizeHint,
    in_flight: bool,
    last_prompt: Option<String>,
    last_image: Option<GeneratedImage>,
}

impl Session {
    pub fn new(
        settings: Settings,
        credentials: Box<dyn CredentialStore>,
        history: Box<dyn HistoryStore>,
    ) -> Self {
        let slots = SlotManager::new(settings.slot_mode)
            .with_max_upload_bytes(settings.max_upload_bytes)
        .with_max_image_pixels(settings.max_image_pixels)
            .with_engine_defaults(settings.engine_defaults());
        Self {
            composer: RequestComposer::new(settings.guide_policy),
            settings,
            slots,
            credentials,
            history,
            prompt: String::new(),
            size_hint: SizeHint::default(),
            in_flight: false,
            last_prompt: None,
            last_image: None,
        }
    }

    /// Session backed by the key and history files in the config directory,
    /// or by in-memory stores when there is none.
    pub fn open(settings: Settings) -> Self {
        match config_dir() {
            Some(dir) => Self::open_in(settings, &dir),
            None => {
                log_warn!("No config directory; API key and history will not persist");
                let max_items = settings.max_history_items;
                Self::new(
                    settings,
                    Box::new(MemoryCredentialStore::default()),
                    Box::new(MemoryHistoryStore::new(max_items)),
                )
            }
        }
    }

    /// Session whose key and history files live in `dir`.
    pub fn open_in(settings: Settings, dir: &Path) -> Self {
        let credentials = FileCredentialStore::open(dir.join(KEY_FILE_NAME));
        let history = FileHistoryStore::open(dir.join(HISTORY_FILE_NAME), settings.max_history_items);
        Self::new(settings, Box::new(credentials), Box::new(history))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn slots(&self) -> &SlotManager {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut SlotManager {
        &mut self.slots
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn size_hint(&self) -> SizeHint {
        self.size_hint
    }

    pub fn set_size_hint(&mut self, hint: SizeHint) {
        self.size_hint = hint;
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight
    }

    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    pub fn last_image(&self) -> Option<&GeneratedImage> {
        self.last_image.as_ref()
    }

    // ---- credentials --------------------------------------------------------

    pub fn has_api_key(&self) -> bool {
        self.credentials.get().is_some()
    }

    pub fn save_api_key(&mut self, key: &str) -> Result<(), CredentialError> {
        credentials::save_api_key(self.credentials.as_mut(), key)
    }

    pub fn clear_api_key(&mut self) -> Result<(), StoreError> {
        self.credentials.clear()?;
        log_info!("API key removed");
        Ok(())
    }

    // ---- history ------------------------------------------------------------

    pub fn history(&self) -> Vec<String> {
        self.history.list()
    }

    /// Put a remembered prompt back into the prompt box.
    pub fn select_from_history(&mut self, index: usize) -> bool {
        match self.history.list().into_iter().nth(index) {
            Some(p) => {
                self.prompt = p;
                true
            }
            None => false,
        }
    }

    pub fn clear_history(&mut self) -> Result<(), StoreError> {
        self.history.clear()?;
        log_info!("Prompt history cleared");
        Ok(())
    }

    // ---- annotations --------------------------------------------------------

    /// Add the annotation hint for a slot to the prompt box. Returns false when
    /// the slot has nothing drawn.
    pub fn apply_annotation_hint(&mut self, slot_index: usize) -> bool {
        let Some(hint) = self
            .slots
            .drawing_engine(slot_index)
            .and_then(|e| e.instruction_hint())
        else {
            return false;
        };
        self.prompt = hint.apply_to_prompt(&self.prompt, slot_index + 1);
        true
    }

    // ---- generation ---------------------------------------------------------

    fn check_prompt(&self, prompt: &str) -> Result<(), GenerationError> {
        if prompt.is_empty() {
            return Err(GenerationError::new(ErrorCategory::Validation, "Please enter a prompt"));
        }
        let len = prompt.chars().count();
        if len > self.settings.max_prompt_length {
            return Err(GenerationError::new(
                ErrorCategory::Validation,
                format!(
                    "Prompt is {} characters; the limit is {}",
                    len, self.settings.max_prompt_length
                ),
            ));
        }
        Ok(())
    }

    fn check_ready(&self, prompt: &str) -> Result<String, GenerationError> {
        if self.in_flight {
            return Err(GenerationError::new(
                ErrorCategory::Validation,
                "A generation is already in progress",
            ));
        }
        let key = self
            .credentials
            .get()
            .ok_or_else(|| GenerationError::new(ErrorCategory::Auth, "Please set an API key first"))?;
        self.check_prompt(prompt)?;
        Ok(key)
    }

    /// Whether the generate control should be enabled.
    pub fn can_generate(&self) -> bool {
        self.check_ready(self.prompt.trim()).is_ok()
    }

    pub fn can_regenerate(&self) -> bool {
        self.last_prompt
            .as_deref()
            .is_some_and(|p| self.check_ready(p).is_ok())
    }

    fn begin(&mut self, prompt: String, record_history: bool) -> Result<PendingGeneration, GenerationError> {
        let api_key = self.check_ready(&prompt)?;
        let prepared = self.slots.prepared_images_for_request();
        let request = self.composer.build(&prompt, prepared, self.size_hint);
        self.in_flight = true;
        log_info!(
            "Generation started ({} image(s), size {}, {} chars)",
            request.images.len(),
            request.size_hint,
            prompt.chars().count()
        );
        Ok(PendingGeneration {
            request,
            api_key,
            prompt,
            record_history,
        })
    }

    /// Validate the current prompt and compose the request. Marks the session
    /// busy until [`Session::finish_generation`] is called.
    pub fn begin_generation(&mut self) -> Result<PendingGeneration, GenerationError> {
        let prompt = self.prompt.trim().to_string();
        self.begin(prompt, true)
    }

    /// Same as [`Session::begin_generation`] but with the last successful
    /// prompt. Regenerating does not touch the history.
    pub fn begin_regeneration(&mut self) -> Result<PendingGeneration, GenerationError> {
        let prompt = self.last_prompt.clone().ok_or_else(|| {
            GenerationError::new(ErrorCategory::Validation, "There is no prompt to regenerate")
        })?;
        self.begin(prompt, false)
    }

    /// Record the outcome. Slots and drawings are never rolled back.
    pub fn finish_generation(
        &mut self,
        pending: PendingGeneration,
        result: Result<GeneratedImage, GenerationError>,
    ) -> Result<GeneratedImage, GenerationError> {
        self.in_flight = false;
        match result {
            Ok(image) => {
                log_info!(
                    "Generation finished ({}, {} bytes)",
                    image.mime_type,
                    image.bytes.len()
                );
                if pending.record_history
                    && let Err(e) = self.history.append(&pending.prompt)
                {
                    log_warn!("Could not save prompt history: {}", e);
                }
                self.last_prompt = Some(pending.prompt);
                self.last_image = Some(image.clone());
                Ok(image)
            }
            Err(e) => {
                log_err!("Generation failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run<A: GenerationApi>(
        &mut self,
        api: &A,
        pending: PendingGeneration,
    ) -> Result<GeneratedImage, GenerationError> {
        let mut guard = InFlight(self);
        let result = api.generate(&pending.request, &pending.api_key).await;
        guard.0.finish_generation(pending, result)
    }

    /// Dropping the returned future before it resolves releases the session
    /// without recording anything.
    pub async fn generate<A: GenerationApi>(&mut self, api: &A) -> Result<GeneratedImage, GenerationError> {
        let pending = self.begin_generation()?;
        self.run(api, pending).await
    }

    pub async fn regenerate<A: GenerationApi>(&mut self, api: &A) -> Result<GeneratedImage, GenerationError> {
        let pending = self.begin_regeneration()?;
        self.run(api, pending).await
    }

    /// Write the last generated image into `dir` under a timestamped name.
    pub fn save_last_image(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let image = self.last_image.as_ref().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "No generated image to save")
        })?;
        let path = dir.join(io::download_file_name());
        std::fs::write(&path, &image.bytes)?;
        log_info!("Saved generated image to {}", path.display());
        Ok(path)
    }
}

/// Releases the in-flight flag if a generation future is dropped mid-request.
struct InFlight<'a>(&'a mut Session);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.0.in_flight {
            self.0.in_flight = false;
            log_warn!("Generation abandoned before a response arrived");
        }
    }
}
