use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::composer::reply::parse_scene_action;
use crate::composer::{ClipboardSink, ComposerError};
use crate::config::CONFIG;
use crate::llm::media::{detect_mime_type, is_image_mime, mime_from_extension, resolve_image_mime};
use crate::llm::{GenerationGateway, ImagePayload};
use crate::prompts::{
    brainstorm_prompt, combined_description, compose_final_prompt, enhance_prompt,
    translation_prompt,
};
use crate::state::{ImagePreview, Operation, SessionState};
use crate::utils::timing::{complete_operation_timer, start_operation_timer};

#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub input_error_flash: Duration,
    pub copy_confirm: Duration,
    pub description_language: String,
    pub target_language: String,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        ComposerSettings {
            input_error_flash: Duration::from_millis(500),
            copy_confirm: Duration::from_millis(2000),
            description_language: "Portuguese".to_string(),
            target_language: "English".to_string(),
        }
    }
}

impl ComposerSettings {
    pub fn from_config() -> Self {
        ComposerSettings {
            input_error_flash: CONFIG.input_error_flash(),
            copy_confirm: CONFIG.copy_confirm(),
            description_language: CONFIG.description_language.clone(),
            target_language: CONFIG.target_language.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>, mime_type: &str, file_name: Option<String>) -> Self {
        ImageUpload {
            bytes,
            mime_type: mime_type.trim().to_string(),
            file_name,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, ComposerError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ComposerError::ImageRead {
                path: path.to_path_buf(),
                source,
            })?;
        let declared = mime_from_extension(path).unwrap_or_default();
        let mime_type = resolve_image_mime(declared, &bytes)
            .or_else(|| detect_mime_type(&bytes))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string());
        Ok(ImageUpload::new(bytes, &mime_type, file_name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FlagTimer {
    InputError,
    CopyConfirmation,
}

impl FlagTimer {
    fn clear(self, state: &mut SessionState) {
        match self {
            FlagTimer::InputError => state.input_error = false,
            FlagTimer::CopyConfirmation => state.copy_confirmed = false,
        }
    }
}

#[derive(Debug)]
struct Scheduled {
    ticket: u64,
    handle: AbortHandle,
}

#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    in_flight: HashMap<Operation, Scheduled>,
    timers: HashMap<FlagTimer, Scheduled>,
    next_ticket: u64,
}

impl Inner {
    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

type Update = Box<dyn FnOnce(&mut SessionState) + Send>;

struct Outcome {
    status: &'static str,
    update: Update,
}

impl Outcome {
    fn apply<F>(status: &'static str, update: F) -> Self
    where
        F: FnOnce(&mut SessionState) + Send + 'static,
    {
        Outcome {
            status,
            update: Box::new(update),
        }
    }

    fn unchanged(status: &'static str) -> Self {
        Outcome {
            status,
            update: Box::new(|_: &mut SessionState| {}),
        }
    }
}

struct Shared<G, C> {
    gateway: G,
    clipboard: C,
    settings: ComposerSettings,
    inner: Mutex<Inner>,
}

impl<G, C> Shared<G, C>
where
    G: GenerationGateway,
    C: ClipboardSink,
{
    fn schedule_flag_reset(self: &Arc<Self>, inner: &mut Inner, timer: FlagTimer, delay: Duration) {
        let ticket = inner.issue_ticket();
        let shared = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = shared.inner.lock();
            let current = inner.timers.get(&timer).map(|scheduled| scheduled.ticket);
            if current == Some(ticket) {
                inner.timers.remove(&timer);
                timer.clear(&mut inner.state);
            }
        });
        let scheduled = Scheduled {
            ticket,
            handle: task.abort_handle(),
        };
        if let Some(previous) = inner.timers.insert(timer, scheduled) {
            previous.handle.abort();
        }
    }

    // Only the newest call of a kind may write; the busy flag is released by
    // whichever call applies.
    fn apply_if_current(&self, operation: Operation, ticket: u64, update: Update) -> bool {
        let mut inner = self.inner.lock();
        let current = inner.in_flight.get(&operation).map(|scheduled| scheduled.ticket);
        if current != Some(ticket) {
            return false;
        }
        inner.in_flight.remove(&operation);
        update(&mut inner.state);
        inner.state.busy.set(operation, false);
        true
    }
}

pub struct Composer<G, C> {
    shared: Arc<Shared<G, C>>,
}

impl<G, C> Clone for Composer<G, C> {
    fn clone(&self) -> Self {
        Composer {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<G, C> Composer<G, C>
where
    G: GenerationGateway,
    C: ClipboardSink,
{
    pub fn new(gateway: G, clipboard: C, settings: ComposerSettings) -> Self {
        Composer {
            shared: Arc::new(Shared {
                gateway,
                clipboard,
                settings,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.shared.inner.lock().state.clone()
    }

    pub fn set_scene(&self, scene: &str) -> SessionState {
        let mut inner = self.shared.inner.lock();
        inner.state.scene = scene.to_string();
        inner.state.clone()
    }

    pub fn set_action(&self, action: &str) -> SessionState {
        let mut inner = self.shared.inner.lock();
        inner.state.action = action.to_string();
        inner.state.clone()
    }

    async fn run_operation<P, Fut>(&self, operation: Operation, prepare: P, work: Fut) -> SessionState
    where
        P: FnOnce(&mut SessionState),
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let task = {
            let mut inner = self.shared.inner.lock();
            let ticket = inner.issue_ticket();
            prepare(&mut inner.state);
            inner.state.busy.set(operation, true);

            let shared = Arc::clone(&self.shared);
            let task = tokio::spawn(async move {
                let mut timer = start_operation_timer(operation.as_str(), ticket);
                let outcome = work.await;
                let status = if shared.apply_if_current(operation, ticket, outcome.update) {
                    outcome.status
                } else {
                    "superseded"
                };
                complete_operation_timer(&mut timer, status, None);
            });

            let scheduled = Scheduled {
                ticket,
                handle: task.abort_handle(),
            };
            if let Some(previous) = inner.in_flight.insert(operation, scheduled) {
                previous.handle.abort();
                info!(
                    "{} ticket {} superseded by ticket {}",
                    operation, previous.ticket, ticket
                );
            }
            task
        };

        if let Err(err) = task.await {
            if err.is_cancelled() {
                debug!("{} call cancelled before completion", operation);
            } else {
                error!("{} task failed: {}", operation, err);
                let mut inner = self.shared.inner.lock();
                inner.in_flight.remove(&operation);
                inner.state.busy.set(operation, false);
            }
        }
        self.snapshot()
    }

    pub async fn submit_image(&self, upload: ImageUpload) -> Result<SessionState, ComposerError> {
        if !is_image_mime(&upload.mime_type) {
            warn!(
                "Rejected non-image upload {:?} ({})",
                upload.file_name, upload.mime_type
            );
            return Err(ComposerError::NotAnImage {
                mime_type: upload.mime_type,
            });
        }

        let payload = ImagePayload::new(upload.bytes, &upload.mime_type);
        let preview = ImagePreview {
            data_url: payload.data_url(),
            mime_type: payload.mime_type.clone(),
            file_name: upload.file_name,
            size_bytes: payload.bytes.len(),
        };

        let shared = Arc::clone(&self.shared);
        let state = self
            .run_operation(
                Operation::AnalyzeImage,
                move |state| state.image_preview = Some(preview),
                async move {
                    match shared.gateway.vision_analysis(&payload).await {
                        Some(analysis) => Outcome::apply("success", move |state| {
                            state.scene = analysis.trim().to_string();
                        }),
                        None => Outcome::unchanged("no_reply"),
                    }
                },
            )
            .await;
        Ok(state)
    }

    pub fn clear_image(&self) -> SessionState {
        let mut inner = self.shared.inner.lock();
        inner.state.image_preview = None;
        inner.state.clone()
    }

    pub async fn enhance(&self) -> SessionState {
        let (scene, action) = {
            let inner = self.shared.inner.lock();
            (inner.state.scene.clone(), inner.state.action.clone())
        };
        if scene.trim().is_empty() && action.trim().is_empty() {
            return self.trigger_input_error();
        }

        let prompt = enhance_prompt(&scene, &action, &self.shared.settings.description_language);
        let shared = Arc::clone(&self.shared);
        self.run_operation(Operation::Enhance, |_| {}, async move {
            let Some(reply) = shared.gateway.text_completion(&prompt, true).await else {
                return Outcome::unchanged("no_reply");
            };
            match parse_scene_action(&reply) {
                Ok(parsed) => Outcome::apply("success", move |state| {
                    if let Some(scene) = parsed.scene {
                        state.scene = scene;
                    }
                    if let Some(action) = parsed.action {
                        state.action = action;
                    }
                }),
                Err(err) => {
                    warn!("Failed to parse enhancement reply, keeping raw text: {}", err);
                    Outcome::apply("fallback", move |state| state.scene = reply)
                }
            }
        })
        .await
    }

    pub async fn brainstorm(&self) -> SessionState {
        let prompt = brainstorm_prompt(&self.shared.settings.description_language);
        let shared = Arc::clone(&self.shared);
        self.run_operation(Operation::Brainstorm, |_| {}, async move {
            let Some(reply) = shared.gateway.text_completion(&prompt, true).await else {
                return Outcome::unchanged("no_reply");
            };
            match parse_scene_action(&reply) {
                Ok(parsed) => Outcome::apply("success", move |state| {
                    if let Some(scene) = parsed.scene {
                        state.scene = scene;
                    }
                    if let Some(action) = parsed.action {
                        state.action = action;
                    }
                }),
                Err(err) => {
                    warn!("Failed to parse brainstorm reply: {}", err);
                    Outcome::unchanged("parse_error")
                }
            }
        })
        .await
    }

    pub async fn generate(&self) -> SessionState {
        let (scene, action) = {
            let inner = self.shared.inner.lock();
            (inner.state.scene.clone(), inner.state.action.clone())
        };
        if scene.trim().is_empty() {
            return self.trigger_input_error();
        }

        let description = combined_description(&scene, &action);
        let prompt = translation_prompt(&description, &self.shared.settings.target_language);
        let shared = Arc::clone(&self.shared);
        self.run_operation(Operation::Generate, |_| {}, async move {
            match shared.gateway.text_completion(&prompt, false).await {
                Some(translated) => {
                    let output = compose_final_prompt(translated.trim());
                    Outcome::apply("success", move |state| state.output = output)
                }
                None => {
                    warn!("Translation unavailable; composing prompt from untranslated description");
                    let output = compose_final_prompt(&description);
                    Outcome::apply("fallback", move |state| state.output = output)
                }
            }
        })
        .await
    }

    pub fn clear_all(&self) -> SessionState {
        let mut inner = self.shared.inner.lock();
        let cancelled_calls = inner.in_flight.len();
        for (_, scheduled) in inner.in_flight.drain() {
            scheduled.handle.abort();
        }
        for (_, scheduled) in inner.timers.drain() {
            scheduled.handle.abort();
        }
        inner.state = SessionState::default();
        if cancelled_calls > 0 {
            info!("Session cleared; cancelled {} in-flight call(s)", cancelled_calls);
        }
        inner.state.clone()
    }

    pub fn copy_output(&self) -> SessionState {
        let output = self.shared.inner.lock().state.output.clone();
        if output.is_empty() {
            return self.snapshot();
        }

        if let Err(err) = self.shared.clipboard.write_text(&output) {
            error!("Failed to copy output: {}", err);
            return self.snapshot();
        }

        let mut inner = self.shared.inner.lock();
        inner.state.copy_confirmed = true;
        let delay = self.shared.settings.copy_confirm;
        self.shared
            .schedule_flag_reset(&mut inner, FlagTimer::CopyConfirmation, delay);
        inner.state.clone()
    }

    pub fn trigger_input_error(&self) -> SessionState {
        let mut inner = self.shared.inner.lock();
        inner.state.input_error = true;
        let delay = self.shared.settings.input_error_flash;
        self.shared
            .schedule_flag_reset(&mut inner, FlagTimer::InputError, delay);
        inner.state.clone()
    }
}
