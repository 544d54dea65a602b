//! Session implementation

use crate::{
    InferenceResponse, LoadModelRequest, OutputResult, RunImageRequest, RunOptions,
    SessionConfig, SessionError,
};
use execution::{ContextFactory, DefaultContextFactory, ExecutionContext, RunError};
use metrics::{counter, histogram};
use model_loader::{FsArtifactStore, ModelHandle, ModelInfo, ModelLoader};
use processing::{postprocess, ImageRef, Preprocessor};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tensor_core::Tensor;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

type RunOutcome = (Box<dyn ExecutionContext>, Result<Vec<Tensor>, RunError>);

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Unloaded,
    Loaded,
    Closed,
}

struct LoadedModel {
    handle: Arc<ModelHandle>,
    /// `None` after a timeout or fault, recreated by the next run
    context: Option<Box<dyn ExecutionContext>>,
    /// Worker of the in-flight run; left behind by a timeout or a cancelled
    /// caller, it still owns the previous context
    draining: Option<JoinHandle<RunOutcome>>,
}

enum SessionState {
    Unloaded,
    Loaded(LoadedModel),
    Closed,
}

impl SessionState {
    fn lifecycle(&self) -> Lifecycle {
        match self {
            SessionState::Unloaded => Lifecycle::Unloaded,
            SessionState::Loaded(_) => Lifecycle::Loaded,
            SessionState::Closed => Lifecycle::Closed,
        }
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedModel, SessionError> {
        match self {
            SessionState::Loaded(loaded) => Ok(loaded),
            SessionState::Unloaded => Err(SessionError::InvalidState(
                "No model loaded".to_string(),
            )),
            SessionState::Closed => Err(SessionError::InvalidState(
                "Session is closed".to_string(),
            )),
        }
    }
}

/// Inference session owning one model and its execution context
///
/// Every operation takes the session lock, which is FIFO fair: operations
/// run one at a time in arrival order. Loading and inference execute on the
/// blocking pool.
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    loader: ModelLoader,
    preprocessor: Preprocessor,
    factory: Arc<dyn ContextFactory>,
    state: Mutex<SessionState>,
}

impl Session {
    /// Create a session reading models from the filesystem
    pub fn new(config: SessionConfig) -> Self {
        let store = match &config.asset_root {
            Some(root) => FsArtifactStore::with_root(root.clone()),
            None => FsArtifactStore::new(),
        };
        let id = Uuid::new_v4();
        info!("[{}] Creating inference session", id);

        Self {
            id,
            config,
            loader: ModelLoader::new(Arc::new(store)),
            preprocessor: Preprocessor::default(),
            factory: Arc::new(DefaultContextFactory),
            state: Mutex::new(SessionState::Unloaded),
        }
    }

    pub fn with_loader(mut self, loader: ModelLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_context_factory(mut self, factory: Arc<dyn ContextFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn state(&self) -> Lifecycle {
        self.state.lock().await.lifecycle()
    }

    /// Info of the loaded model
    pub async fn model_info(&self) -> Result<ModelInfo, SessionError> {
        let mut state = self.state.lock().await;
        Ok(state.loaded_mut()?.handle.info())
    }

    /// Load a model; only valid while `Unloaded`
    ///
    /// On failure the session stays `Unloaded` and the loader's error is
    /// returned unchanged.
    pub async fn load_model(&self, request: LoadModelRequest) -> Result<ModelInfo, SessionError> {
        let mut state = self.state.lock().await;
        match &*state {
            SessionState::Unloaded => {}
            SessionState::Loaded(loaded) => {
                return Err(SessionError::InvalidState(format!(
                    "Model '{}' already loaded",
                    loaded.handle.name()
                )))
            }
            SessionState::Closed => {
                return Err(SessionError::InvalidState(
                    "Session is closed".to_string(),
                ))
            }
        }

        let mut options = request.load_options();
        options.accelerator = self.config.accelerator;
        let loader = self.loader.clone();
        let path = request.model.clone();
        let started = Instant::now();

        let loaded = tokio::task::spawn_blocking(move || loader.load(&path, options))
            .await
            .map_err(|e| SessionError::Worker(e.to_string()))?;
        let handle = match loaded {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                counter!("edge_infer_load_failures_total", "kind" => e.kind().as_str())
                    .increment(1);
                warn!("[{}] Failed to load {}: {}", self.id, request.model, e);
                return Err(e.into());
            }
        };

        let context = self.factory.create(&handle)?;
        let info = handle.info();
        counter!("edge_infer_loads_total").increment(1);
        histogram!("edge_infer_load_latency_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            "[{}] Loaded model '{}' ({} threads, {})",
            self.id,
            info.name,
            info.thread_count,
            info.accelerator.as_str()
        );

        *state = SessionState::Loaded(LoadedModel {
            handle,
            context: Some(context),
            draining: None,
        });
        Ok(info)
    }

    /// Classify the image at `request.path`; only valid while `Loaded`
    pub async fn run_model_on_image_multi(
        &self,
        request: RunImageRequest,
    ) -> Result<InferenceResponse, SessionError> {
        let resolved = request.resolve();
        let mut state = self.state.lock().await;
        let loaded = state.loaded_mut()?;
        let (image, options) = resolved?;

        let result = self.run_image_locked(loaded, image, &options).await;
        self.record_run(&result);
        result
    }

    /// Run on any image source
    pub async fn run_image(
        &self,
        image: ImageRef,
        options: RunOptions,
    ) -> Result<InferenceResponse, SessionError> {
        let mut state = self.state.lock().await;
        let loaded = state.loaded_mut()?;
        options.validate()?;

        let result = self.run_image_locked(loaded, image, &options).await;
        self.record_run(&result);
        result
    }

    /// Run on an already built input tensor
    pub async fn run_tensor(
        &self,
        input: Tensor,
        options: RunOptions,
    ) -> Result<InferenceResponse, SessionError> {
        let mut state = self.state.lock().await;
        let loaded = state.loaded_mut()?;
        options.validate()?;

        let result = self.execute(loaded, input, &options, Instant::now()).await;
        self.record_run(&result);
        result
    }

    /// Release the context and the model; safe in any state, never fails
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, SessionState::Closed) {
            SessionState::Loaded(mut loaded) => {
                if let Some(mut context) = loaded.context.take() {
                    context.destroy();
                }
                if loaded.draining.take().is_some() {
                    debug!("[{}] Detached running worker on close", self.id);
                }
                info!(
                    "[{}] Session closed, released model '{}'",
                    self.id,
                    loaded.handle.name()
                );
            }
            SessionState::Unloaded => info!("[{}] Session closed", self.id),
            SessionState::Closed => debug!("[{}] Session already closed", self.id),
        }
    }

    async fn run_image_locked(
        &self,
        loaded: &mut LoadedModel,
        image: ImageRef,
        options: &RunOptions,
    ) -> Result<InferenceResponse, SessionError> {
        let started = Instant::now();
        let preprocessor = self.preprocessor.clone();
        let spec = loaded.handle.input().clone();
        let params = options.preprocess;

        let input =
            tokio::task::spawn_blocking(move || preprocessor.preprocess(&image, &spec, &params))
                .await
                .map_err(|e| SessionError::Worker(e.to_string()))??;

        self.execute(loaded, input, options, started).await
    }

    async fn execute(
        &self,
        loaded: &mut LoadedModel,
        input: Tensor,
        options: &RunOptions,
        started: Instant,
    ) -> Result<InferenceResponse, SessionError> {
        let tensors = self.dispatch(loaded, input, options).await?;

        let declared = loaded.handle.outputs();
        if tensors.len() != declared.len() {
            return Err(RunError::ExecutionFault(format!(
                "Context returned {} output(s), model declares {}",
                tensors.len(),
                declared.len()
            ))
            .into());
        }

        let mut outputs = Vec::with_capacity(declared.len());
        for (tensor, spec) in tensors.into_iter().zip(declared) {
            outputs.push(OutputResult {
                name: spec.name.clone(),
                result: postprocess(tensor, spec, &options.postprocess)?,
            });
        }

        Ok(InferenceResponse {
            outputs,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Run the context on the blocking pool under the effective deadline
    async fn dispatch(
        &self,
        loaded: &mut LoadedModel,
        input: Tensor,
        options: &RunOptions,
    ) -> Result<Vec<Tensor>, SessionError> {
        let mut context = self.take_context(loaded)?;
        // Parked before awaiting so a cancelled run still leaves the worker tracked
        let worker = loaded.draining.insert(tokio::task::spawn_blocking(move || {
            let result = context.run(&input);
            (context, result)
        }));

        let joined = match options.timeout(self.config.run_timeout_ms) {
            Some((ms, limit)) => match tokio::time::timeout(limit, worker).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        "[{}] Inference exceeded {}ms, detaching execution context",
                        self.id, ms
                    );
                    return Err(SessionError::TimedOut(ms));
                }
            },
            None => worker.await,
        };
        loaded.draining = None;

        let (mut context, result) =
            joined.map_err(|e| SessionError::Worker(format!("Inference worker failed: {}", e)))?;
        match result {
            Ok(outputs) => {
                loaded.context = Some(context);
                Ok(outputs)
            }
            Err(e @ RunError::ShapeMismatch { .. }) => {
                loaded.context = Some(context);
                Err(e.into())
            }
            Err(e) => {
                warn!("[{}] Discarding faulted execution context: {}", self.id, e);
                context.destroy();
                Err(e.into())
            }
        }
    }

    /// Take the live context or create a fresh one once no worker is draining
    fn take_context(
        &self,
        loaded: &mut LoadedModel,
    ) -> Result<Box<dyn ExecutionContext>, SessionError> {
        if let Some(worker) = &loaded.draining {
            if !worker.is_finished() {
                return Err(SessionError::Worker(
                    "Previous inference is still running".to_string(),
                ));
            }
            loaded.draining = None;
            debug!("[{}] Detached worker drained", self.id);
        }

        match loaded.context.take() {
            Some(context) => Ok(context),
            None => {
                info!(
                    "[{}] Recreating execution context for '{}'",
                    self.id,
                    loaded.handle.name()
                );
                Ok(self.factory.create(&loaded.handle)?)
            }
        }
    }

    fn record_run(&self, result: &Result<InferenceResponse, SessionError>) {
        match result {
            Ok(response) => {
                counter!("edge_infer_runs_total").increment(1);
                histogram!("edge_infer_run_latency_ms").record(response.latency_ms as f64);
                debug!(
                    "[{}] Inference completed in {}ms",
                    self.id, response.latency_ms
                );
            }
            Err(e) => {
                counter!("edge_infer_run_failures_total", "kind" => e.kind().as_str())
                    .increment(1);
                warn!("[{}] Inference failed: {}", self.id, e);
            }
        }
    }
}
