//! Stream controller — owns the mode state machine and drives every capture
//! session.
//!
//! [`StreamController`] is the only place sessions are created or ended, so
//! the three modes stay mutually exclusive.  Everything that happens outside
//! the controller (capture callbacks, the recording ceiling, finished
//! predictions, model loads) comes back to it as a [`ControllerEvent`] over
//! an internal channel, and the event loop in [`StreamController::run`]
//! applies them one at a time.
//!
//! # Flow
//!
//! ```text
//! ControllerHandle ──command──▶ run() ◀──ControllerEvent── cpal callback (Batch)
//!                                │    ◀──────────────────── RecordingTimer (CeilingReached)
//!                                │    ◀──────────────────── predictor task (Predicted)
//!                                │
//!                                ├─ Batch      → session.ingest → submit each Chunk
//!                                ├─ Ceiling    → finish recording → submit clip
//!                                ├─ Predicted  → SharedStatus (stale results dropped)
//!                                └─ frame tick → snapshot → Renderer
//! ```
//!
//! Submissions run as independent tokio tasks and may overlap; their results
//! are applied in completion order.
//!
//! The controller holds the platform capture stream, which is not `Send` on
//! every backend, so `run` is awaited on the thread that built the
//! controller (for example with `tokio::join!` next to the code driving the
//! [`ControllerHandle`]).

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::audio::{
    sanitize, ActiveCapture, BatchCallback, CaptureDevice, Chunk, DecodeError, Decoder, Renderer,
    Resampler, SampleBatch,
};
use crate::config::{AppConfig, StreamConfig};
use crate::error::StreamError;
use crate::predict::{PredictError, Prediction, Predictor};

use super::session::{Finished, SessionId, StreamMode, StreamSession};
use super::state::{new_shared_status, ControllerState, SharedStatus, StatusSnapshot};
use super::timer::RecordingTimer;

// ---------------------------------------------------------------------------
// Events and commands
// ---------------------------------------------------------------------------

/// Something that happened outside the controller and must be applied by it.
#[derive(Debug)]
pub enum ControllerEvent {
    /// One capture callback's worth of samples at the device rate.
    Batch {
        session: SessionId,
        samples: SampleBatch,
    },
    /// The bounded-recording ceiling elapsed.
    CeilingReached { session: SessionId },
    /// A submission finished.
    Predicted {
        session: SessionId,
        one_shot: bool,
        result: Result<Prediction, PredictError>,
    },
    /// A model load finished.
    ModelLoaded { result: Result<String, PredictError> },
}

/// Requests sent by a [`ControllerHandle`].
#[derive(Debug)]
pub enum ControllerCommand {
    Upload {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<SessionId, StreamError>>,
    },
    StartRecording {
        reply: oneshot::Sender<Result<SessionId, StreamError>>,
    },
    StopRecording {
        reply: oneshot::Sender<Result<(), StreamError>>,
    },
    StartContinuous {
        reply: oneshot::Sender<Result<SessionId, StreamError>>,
    },
    StopContinuous {
        reply: oneshot::Sender<()>,
    },
    LoadModel {
        model_name: String,
    },
    State {
        reply: oneshot::Sender<ControllerState>,
    },
}

// ---------------------------------------------------------------------------
// ControllerHandle
// ---------------------------------------------------------------------------

/// Cloneable, `Send` front end for a running [`StreamController`].
///
/// Every method returns [`StreamError::ControllerClosed`] once the event loop
/// has exited.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<ControllerCommand>,
}

impl ControllerHandle {
    /// Create a handle and the receiver to pass to [`StreamController::run`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ControllerCommand>) {
        let (commands, rx) = mpsc::channel(capacity.max(1));
        (Self { commands }, rx)
    }

    pub async fn upload(&self, bytes: Vec<u8>) -> Result<SessionId, StreamError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControllerCommand::Upload { bytes, reply }).await?;
        rx.await.map_err(|_| StreamError::ControllerClosed)?
    }

    pub async fn start_recording(&self) -> Result<SessionId, StreamError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControllerCommand::StartRecording { reply }).await?;
        rx.await.map_err(|_| StreamError::ControllerClosed)?
    }

    pub async fn stop_recording(&self) -> Result<(), StreamError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControllerCommand::StopRecording { reply }).await?;
        rx.await.map_err(|_| StreamError::ControllerClosed)?
    }

    pub async fn start_continuous(&self) -> Result<SessionId, StreamError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControllerCommand::StartContinuous { reply }).await?;
        rx.await.map_err(|_| StreamError::ControllerClosed)?
    }

    pub async fn stop_continuous(&self) -> Result<(), StreamError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControllerCommand::StopContinuous { reply }).await?;
        rx.await.map_err(|_| StreamError::ControllerClosed)
    }

    /// Fire-and-forget; the outcome shows up in the shared status.
    pub async fn load_model(&self, model_name: impl Into<String>) -> Result<(), StreamError> {
        self.send(ControllerCommand::LoadModel {
            model_name: model_name.into(),
        })
        .await
    }

    pub async fn state(&self) -> Result<ControllerState, StreamError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControllerCommand::State { reply }).await?;
        rx.await.map_err(|_| StreamError::ControllerClosed)
    }

    async fn send(&self, command: ControllerCommand) -> Result<(), StreamError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| StreamError::ControllerClosed)
    }
}

// ---------------------------------------------------------------------------
// StreamController
// ---------------------------------------------------------------------------

/// Owns the capture device, the active session and the shared status.
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use emotion_stream::audio::{AudioCapture, WavDecoder};
/// use emotion_stream::config::AppConfig;
/// use emotion_stream::predict::Predictor;
/// use emotion_stream::stream::{ControllerHandle, StreamController};
///
/// async fn drive(predictor: Arc<dyn Predictor>) {
///     let config = AppConfig::load().unwrap_or_default();
///     let device = AudioCapture::with_device(config.stream.input_device.clone());
///     let controller =
///         StreamController::new(&config, Box::new(device), Box::new(WavDecoder), predictor);
///     let (handle, commands) = ControllerHandle::channel(16);
///
///     let ui = async move {
///         handle.start_continuous().await.unwrap();
///         tokio::time::sleep(std::time::Duration::from_secs(5)).await;
///         handle.stop_continuous().await.unwrap();
///     }; // dropping the handle ends the loop
///
///     tokio::join!(controller.run(commands), ui);
/// }
/// ```
pub struct StreamController {
    config: StreamConfig,
    waveform_width: usize,
    frame_interval: Duration,
    model_name: String,

    device: Box<dyn CaptureDevice>,
    decoder: Box<dyn Decoder>,
    predictor: Arc<dyn Predictor>,
    renderer: Option<Box<dyn Renderer>>,

    status: SharedStatus,
    session: Option<StreamSession>,
    next_session: u64,
    prediction_pending: bool,
    in_flight: usize,

    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<ControllerEvent>>,
}

impl StreamController {
    pub fn new(
        config: &AppConfig,
        device: Box<dyn CaptureDevice>,
        decoder: Box<dyn Decoder>,
        predictor: Arc<dyn Predictor>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config: config.stream.clone(),
            waveform_width: config.waveform.width,
            frame_interval: config.waveform.frame_interval(),
            model_name: config.predictor.model_name.clone(),
            device,
            decoder,
            predictor,
            renderer: None,
            status: new_shared_status(),
            session: None,
            next_session: 0,
            prediction_pending: false,
            in_flight: 0,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Attach a renderer that receives a waveform snapshot every frame.
    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Shared status for the UI.
    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    pub fn state(&self) -> ControllerState {
        self.session
            .as_ref()
            .map_or(ControllerState::Idle, StreamSession::state)
    }

    /// `true` while an upload or recording prediction is outstanding.
    pub fn is_prediction_pending(&self) -> bool {
        self.prediction_pending
    }

    /// Submissions whose result has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until every [`ControllerHandle`] is dropped.
    ///
    /// Any active session is ended (without submitting) on the way out.
    pub async fn run(mut self, mut commands: mpsc::Receiver<ControllerCommand>) {
        let Some(mut events) = self.events_rx.take() else {
            log::error!("controller: event receiver already taken, not running");
            return;
        };

        let mut frames = tokio::time::interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!("controller: running");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
                _ = frames.tick() => self.render_frame(),
            }
        }

        self.shutdown();
        log::info!("controller: command channel closed, shutting down");
    }

    fn handle_command(&mut self, command: ControllerCommand) {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            ControllerCommand::Upload { bytes, reply } => {
                let _ = reply.send(self.upload(&bytes));
            }
            ControllerCommand::StartRecording { reply } => {
                let _ = reply.send(self.start_recording());
            }
            ControllerCommand::StopRecording { reply } => {
                let _ = reply.send(self.stop_recording());
            }
            ControllerCommand::StartContinuous { reply } => {
                let _ = reply.send(self.start_continuous());
            }
            ControllerCommand::StopContinuous { reply } => {
                self.stop_continuous();
                let _ = reply.send(());
            }
            ControllerCommand::LoadModel { model_name } => self.load_model(&model_name),
            ControllerCommand::State { reply } => {
                let _ = reply.send(self.state());
            }
        }
    }

    /// Apply one event.  Batches and results for sessions that are no longer
    /// active are dropped here.
    pub fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Batch { session, samples } => self.on_batch(session, &samples),
            ControllerEvent::CeilingReached { session } => self.on_ceiling(session),
            ControllerEvent::Predicted {
                session,
                one_shot,
                result,
            } => self.on_predicted(session, one_shot, result),
            ControllerEvent::ModelLoaded { result } => self.on_model_loaded(result),
        }
    }

    /// Hand the current waveform to the renderer and the shared status.
    pub fn render_frame(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let points = session.snapshot(self.waveform_width);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render(&points);
        }
        self.update_status(|st| st.waveform = points);
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Decode `bytes`, resample the whole clip once and submit it as a single
    /// unit.  No session is kept; the controller stays `Idle`.
    pub fn upload(&mut self, bytes: &[u8]) -> Result<SessionId, StreamError> {
        self.ensure_can_start(StreamMode::Upload)?;
        self.set_message("Processing audio file...");

        let decoded = self
            .decoder
            .decode(bytes)
            .map_err(|e| self.fail(e.into()))?;
        let resampler = self.resampler_for(decoded.sample_rate)?;

        let mut samples = resampler.process(&decoded.samples).into_owned();
        let sanitized = sanitize(&mut samples);
        if sanitized > 0 {
            log::warn!("upload: replaced {sanitized} NaN samples with silence");
        }
        if samples.is_empty() {
            return Err(self.fail(DecodeError::Empty.into()));
        }

        let id = self.next_session_id();
        log::info!(
            "upload {id}: {} samples @ {} Hz → {} samples @ {} Hz",
            decoded.samples.len(),
            decoded.sample_rate,
            samples.len(),
            resampler.rate_out()
        );
        self.submit(id, Chunk::new(samples, resampler.rate_out()), true);
        Ok(id)
    }

    /// Open the input device and start a bounded recording.  It stops itself
    /// once `max_recording_secs` have elapsed.
    pub fn start_recording(&mut self) -> Result<SessionId, StreamError> {
        self.ensure_can_start(StreamMode::BoundedRecording)?;

        let id = self.next_session_id();
        let capture = self.start_capture(id)?;
        let resampler = self.resampler_for(capture.sample_rate())?;

        let ceiling = self.config.max_recording();
        let events = self.events_tx.clone();
        let timer = RecordingTimer::start(ceiling, move || {
            let _ = events.send(ControllerEvent::CeilingReached { session: id });
        });

        log::info!(
            "recording {id}: started @ {} Hz (ceiling {}s)",
            resampler.rate_in(),
            ceiling.as_secs()
        );
        self.session = Some(StreamSession::recording(
            id,
            capture,
            resampler,
            self.config.waveform_capacity(),
            timer,
        ));
        self.on_session_started(ControllerState::Recording, "Recording...");
        Ok(id)
    }

    /// Stop the bounded recording and submit the whole clip.  A no-op when
    /// not recording.
    pub fn stop_recording(&mut self) -> Result<(), StreamError> {
        if self.state() != ControllerState::Recording {
            log::debug!("stop_recording: not recording, ignoring");
            return Ok(());
        }
        self.finish_session()
    }

    /// Open the input device and start submitting one chunk per
    /// `chunk_secs` of captured audio.
    pub fn start_continuous(&mut self) -> Result<SessionId, StreamError> {
        self.ensure_can_start(StreamMode::Continuous)?;

        let id = self.next_session_id();
        let capture = self.start_capture(id)?;
        let resampler = self.resampler_for(capture.sample_rate())?;
        let chunk_len = self.config.chunk_len();

        log::info!(
            "continuous {id}: started @ {} Hz, {chunk_len}-sample chunks @ {} Hz",
            resampler.rate_in(),
            resampler.rate_out()
        );
        self.session = Some(StreamSession::continuous(
            id,
            capture,
            resampler,
            self.config.waveform_capacity(),
            chunk_len,
        ));
        self.on_session_started(ControllerState::Continuous, "Analyzing continuously...");
        Ok(id)
    }

    /// Stop continuous analysis.  A no-op when it is not running; the
    /// partial remainder is discarded.
    pub fn stop_continuous(&mut self) {
        if self.state() != ControllerState::Continuous {
            log::debug!("stop_continuous: not streaming, ignoring");
            return;
        }
        // Ending a continuous session never fails.
        let _ = self.finish_session();
    }

    /// Ask the predictor to load `model_name`; the outcome lands in the
    /// shared status.
    pub fn load_model(&mut self, model_name: &str) {
        log::info!("controller: loading model {model_name:?}");
        self.set_message(format!("Loading {model_name}..."));

        let predictor = Arc::clone(&self.predictor);
        let events = self.events_tx.clone();
        let model_name = model_name.to_owned();
        tokio::spawn(async move {
            let result = predictor.load_model(&model_name).await;
            let _ = events.send(ControllerEvent::ModelLoaded { result });
        });
    }

    /// [`load_model`](Self::load_model) with the configured model name.
    pub fn load_configured_model(&mut self) {
        let model_name = self.model_name.clone();
        self.load_model(&model_name);
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    fn on_batch(&mut self, session: SessionId, samples: &[f32]) {
        let Some(active) = self.session.as_mut().filter(|s| s.id() == session) else {
            log::trace!("controller: dropping batch for inactive session {session}");
            return;
        };

        let ingested = active.ingest(samples);
        if ingested.sanitized > 0 {
            log::warn!(
                "continuous {session}: replaced {} NaN samples with silence",
                ingested.sanitized
            );
        }
        for chunk in ingested.chunks {
            self.submit(session, chunk, false);
        }
    }

    fn on_ceiling(&mut self, session: SessionId) {
        let current = self.session.as_ref().map(|s| (s.id(), s.state()));
        if current != Some((session, ControllerState::Recording)) {
            log::debug!("controller: ignoring ceiling for inactive session {session}");
            return;
        }
        log::info!("recording {session}: ceiling reached, stopping");
        // Errors are already reported to the status.
        let _ = self.finish_session();
    }

    fn on_predicted(
        &mut self,
        session: SessionId,
        one_shot: bool,
        result: Result<Prediction, PredictError>,
    ) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if one_shot {
            self.prediction_pending = false;
        }
        let pending = self.prediction_pending;
        self.update_status(|st| st.prediction_pending = pending);

        let live = one_shot || self.session.as_ref().is_some_and(|s| s.id() == session);
        if !live {
            log::debug!("controller: dropping result for finished session {session}");
            return;
        }

        match result {
            Ok(prediction) => {
                log::debug!(
                    "session {session}: predicted {} ({:?})",
                    prediction.predicted_emotion,
                    prediction.probabilities
                );
                self.update_status(|st| st.apply_prediction(&prediction));
            }
            Err(e) => {
                let err = StreamError::Transport(e);
                log::warn!("session {session}: {err}");
                self.update_status(|st| st.apply_error(err.to_string()));
            }
        }
    }

    fn on_model_loaded(&mut self, result: Result<String, PredictError>) {
        match result {
            Ok(message) => {
                log::info!("controller: {message}");
                self.update_status(|st| {
                    st.model_loaded = true;
                    st.message = message;
                });
            }
            Err(e) => {
                let err = StreamError::Transport(e);
                log::warn!("controller: model load failed: {err}");
                self.update_status(|st| {
                    st.model_loaded = false;
                    st.apply_error(err.to_string());
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Reject a start while a session is active or a one-shot prediction is
    /// outstanding.  Nothing is mutated except the status line.
    fn ensure_can_start(&self, requested: StreamMode) -> Result<(), StreamError> {
        let err = if let Some(active) = &self.session {
            StreamError::ModeConflict {
                requested,
                active: active.state(),
            }
        } else if self.prediction_pending {
            StreamError::PredictionPending
        } else {
            return Ok(());
        };

        log::warn!("controller: {err}");
        self.set_message(err.to_string());
        Err(err)
    }

    fn start_capture(&mut self, session: SessionId) -> Result<Box<dyn ActiveCapture>, StreamError> {
        let events = self.events_tx.clone();
        let on_batch: BatchCallback = Box::new(move |samples| {
            let _ = events.send(ControllerEvent::Batch { session, samples });
        });

        match self.device.start(on_batch) {
            Ok(capture) => Ok(capture),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn resampler_for(&self, rate_in: u32) -> Result<Resampler, StreamError> {
        Resampler::with_quality(
            rate_in,
            self.config.target_sample_rate,
            self.config.resample_quality,
        )
        .map_err(|e| self.fail(e))
    }

    /// End the active session.  A recording submits its clip; a continuous
    /// stream drops its partial remainder.
    fn finish_session(&mut self) -> Result<(), StreamError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let id = session.id();
        self.update_status(|st| {
            st.state = ControllerState::Idle;
            st.waveform.clear();
        });

        match session.finish() {
            Finished::Recording { clip, sanitized } => {
                if sanitized > 0 {
                    log::warn!("recording {id}: replaced {sanitized} NaN samples with silence");
                }
                if clip.is_empty() {
                    log::warn!("recording {id}: stopped with no audio");
                    return Err(self.fail(DecodeError::Empty.into()));
                }
                log::info!(
                    "recording {id}: stopped, {:.2}s captured",
                    clip.duration_secs()
                );
                self.set_message("Processing recorded audio...");
                self.submit(id, clip, true);
                Ok(())
            }
            Finished::Continuous { discarded } => {
                log::info!("continuous {id}: stopped");
                if discarded > 0 {
                    log::debug!("continuous {id}: discarded {discarded} trailing samples");
                }
                self.set_message("Continuous analysis stopped.");
                Ok(())
            }
        }
    }

    /// Send `chunk` to the predictor on its own task.
    fn submit(&mut self, session: SessionId, chunk: Chunk, one_shot: bool) {
        self.in_flight += 1;
        if one_shot {
            self.prediction_pending = true;
            self.update_status(|st| {
                st.prediction_pending = true;
                st.message = "Predicting...".into();
            });
        }
        log::debug!(
            "session {session}: submitting {} samples @ {} Hz",
            chunk.len(),
            chunk.sample_rate
        );

        let predictor = Arc::clone(&self.predictor);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            // Every submission reports back, even if the predictor panics.
            let result = match tokio::spawn(async move { predictor.predict(chunk).await }).await {
                Ok(result) => result,
                Err(e) => {
                    log::error!("session {session}: predictor task failed: {e}");
                    Err(PredictError::Request(format!("predictor task failed: {e}")))
                }
            };
            let _ = events.send(ControllerEvent::Predicted {
                session,
                one_shot,
                result,
            });
        });
    }

    fn on_session_started(&mut self, state: ControllerState, message: &str) {
        self.update_status(|st| {
            st.state = state;
            st.error = None;
            st.message = message.into();
        });
    }

    fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("controller: ending {} session {}", session.mode(), session.id());
            let _ = session.finish();
        }
        self.update_status(|st| st.state = ControllerState::Idle);
    }

    fn next_session_id(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId(self.next_session)
    }

    /// Log `err`, show it in the status and hand it back for returning.
    fn fail(&self, err: StreamError) -> StreamError {
        log::error!("controller: {err}");
        self.update_status(|st| st.apply_error(err.to_string()));
        err
    }

    fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.update_status(|st| st.message = message);
    }

    fn update_status(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        let mut st = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut st);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CaptureError, DecodedAudio};
    use crate::predict::Emotion;
    use crate::stream::state::read_status;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    // -----------------------------------------------------------------------
    // Driving the controller without `run`
    // -----------------------------------------------------------------------

    /// Apply every event that is already queued, after letting spawned
    /// submissions run.  Returns how many were applied.
    async fn settle(ctl: &mut StreamController) -> usize {
        let mut applied = 0;
        for _ in 0..4 {
            for _ in 0..16 {
                tokio::task::yield_now().await;
            }
            let Some(events) = ctl.events_rx.as_mut() else {
                break;
            };
            let mut batch = Vec::new();
            while let Ok(event) = events.try_recv() {
                batch.push(event);
            }
            if batch.is_empty() {
                break;
            }
            applied += batch.len();
            for event in batch {
                ctl.handle_event(event);
            }
        }
        applied
    }

    /// Wait for the next event and apply it.
    async fn pump(ctl: &mut StreamController) {
        let event = match ctl.events_rx.as_mut() {
            Some(events) => events.recv().await,
            None => None,
        };
        if let Some(event) = event {
            ctl.handle_event(event);
        }
    }

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    type SharedCallback = Arc<Mutex<Option<BatchCallback>>>;

    /// Capture device whose callback the test drives by hand.
    #[derive(Clone)]
    struct FakeDevice {
        rate: u32,
        fail: bool,
        callback: SharedCallback,
        starts: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
    }

    impl FakeDevice {
        fn new(rate: u32) -> Self {
            Self {
                rate,
                fail: false,
                callback: Arc::new(Mutex::new(None)),
                starts: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicBool::new(false)),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(16_000)
            }
        }

        /// Deliver one batch as the audio thread would.
        fn feed(&self, samples: Vec<f32>) {
            if let Some(cb) = self.callback.lock().unwrap().as_mut() {
                cb(samples);
            }
        }

        fn released(&self) -> bool {
            self.released.load(Ordering::SeqCst)
        }
    }

    struct FakeCapture {
        rate: u32,
        released: Arc<AtomicBool>,
    }

    impl ActiveCapture for FakeCapture {
        fn sample_rate(&self) -> u32 {
            self.rate
        }
    }

    impl Drop for FakeCapture {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    impl CaptureDevice for FakeDevice {
        fn start(
            &mut self,
            on_batch: BatchCallback,
        ) -> Result<Box<dyn ActiveCapture>, CaptureError> {
            if self.fail {
                return Err(CaptureError::NoDevice);
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.released.store(false, Ordering::SeqCst);
            // The callback outlives the capture so tests can simulate late
            // deliveries from the audio thread.
            *self.callback.lock().unwrap() = Some(on_batch);
            Ok(Box::new(FakeCapture {
                rate: self.rate,
                released: Arc::clone(&self.released),
            }))
        }
    }

    /// Decoder that returns a fixed clip, or `Empty` when there is none.
    struct StubDecoder(Option<DecodedAudio>);

    impl Decoder for StubDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
            self.0.clone().ok_or(DecodeError::Empty)
        }
    }

    /// Records every chunk; optionally fails or waits on a gate.
    #[derive(Default)]
    struct RecordingPredictor {
        chunks: Mutex<Vec<Chunk>>,
        fail: bool,
        gate: Option<Arc<Semaphore>>,
    }

    impl RecordingPredictor {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        fn chunks(&self) -> Vec<Chunk> {
            self.chunks.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Predictor for RecordingPredictor {
        async fn load_model(&self, model_name: &str) -> Result<String, PredictError> {
            if self.fail {
                return Err(PredictError::Request("connection refused".into()));
            }
            Ok(format!("Model {model_name} loaded successfully"))
        }

        async fn predict(&self, chunk: Chunk) -> Result<Prediction, PredictError> {
            self.chunks.lock().unwrap().push(chunk);
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|e| PredictError::Request(e.to_string()))?
                    .forget();
            }
            if self.fail {
                return Err(PredictError::Status {
                    status: 500,
                    message: "model not loaded".into(),
                });
            }
            Ok(Prediction {
                probabilities: [0.05, 0.05, 0.7, 0.1, 0.05, 0.05],
                predicted_emotion: Emotion::Happiness.label().into(),
            })
        }
    }

    /// Holds each chunk on its own gate, chosen by the chunk's first sample:
    /// `0.1` waits on `first`, anything else on `second`.
    struct KeyedPredictor {
        first: Arc<Semaphore>,
        second: Arc<Semaphore>,
        arrived: AtomicUsize,
        completed: AtomicUsize,
    }

    impl KeyedPredictor {
        fn new() -> Self {
            Self {
                first: Arc::new(Semaphore::new(0)),
                second: Arc::new(Semaphore::new(0)),
                arrived: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Predictor for KeyedPredictor {
        async fn load_model(&self, model_name: &str) -> Result<String, PredictError> {
            Ok(format!("Model {model_name} loaded successfully"))
        }

        async fn predict(&self, chunk: Chunk) -> Result<Prediction, PredictError> {
            self.arrived.fetch_add(1, Ordering::SeqCst);
            let is_first = chunk.samples.first() == Some(&0.1);
            let (gate, emotion) = if is_first {
                (&self.first, Emotion::Anger)
            } else {
                (&self.second, Emotion::Sadness)
            };
            gate.acquire()
                .await
                .map_err(|e| PredictError::Request(e.to_string()))?
                .forget();
            self.completed.fetch_add(1, Ordering::SeqCst);

            let mut probabilities = [0.0; 6];
            probabilities[emotion.index()] = 1.0;
            Ok(Prediction {
                probabilities,
                predicted_emotion: emotion.label().into(),
            })
        }
    }

    struct PanickingPredictor;

    #[async_trait]
    impl Predictor for PanickingPredictor {
        async fn load_model(&self, _model_name: &str) -> Result<String, PredictError> {
            Ok(String::new())
        }

        async fn predict(&self, _chunk: Chunk) -> Result<Prediction, PredictError> {
            panic!("classifier backend bug");
        }
    }

    #[derive(Clone, Default)]
    struct FrameLog(Arc<Mutex<Vec<usize>>>);

    impl Renderer for FrameLog {
        fn render(&mut self, points: &[f32]) {
            self.0.lock().unwrap().push(points.len());
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// 16 kHz target, 1000-sample chunks, 1 s ceiling.
    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.stream.chunk_secs = 0.0625;
        config.stream.max_recording_secs = 1;
        config.stream.waveform_secs = 1;
        config.waveform.width = 64;
        config
    }

    fn controller(
        device: &FakeDevice,
        decoder: StubDecoder,
        predictor: &Arc<RecordingPredictor>,
    ) -> StreamController {
        StreamController::new(
            &test_config(),
            Box::new(device.clone()),
            Box::new(decoder),
            Arc::clone(predictor) as Arc<dyn Predictor>,
        )
    }

    fn no_upload() -> StubDecoder {
        StubDecoder(None)
    }

    // -----------------------------------------------------------------------
    // Continuous analysis
    // -----------------------------------------------------------------------

    /// Three 500-sample batches at 16 kHz produce exactly one chunk.
    #[tokio::test]
    async fn continuous_submits_one_chunk_per_chunk_len() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_continuous().unwrap();
        assert_eq!(ctl.state(), ControllerState::Continuous);

        for _ in 0..3 {
            device.feed(vec![0.1; 500]);
        }
        settle(&mut ctl).await;

        let chunks = predictor.chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 1_000);
        assert_eq!(chunks[0].sample_rate, 16_000);

        let st = read_status(&ctl.status());
        assert_eq!(st.predicted_emotion.as_deref(), Some("happiness"));
        assert_eq!(st.message, "Predicted Emotion: happiness");
        assert_eq!(ctl.in_flight(), 0);
    }

    #[tokio::test]
    async fn continuous_resamples_device_rate() {
        let device = FakeDevice::new(48_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_continuous().unwrap();
        device.feed(vec![0.2; 6_000]);
        settle(&mut ctl).await;

        let chunks = predictor.chunks();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 1_000 && c.sample_rate == 16_000));
    }

    #[tokio::test]
    async fn continuous_chunks_are_nan_free() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_continuous().unwrap();
        let mut batch = vec![0.5; 1_000];
        batch[3] = f32::NAN;
        batch[999] = f32::NAN;
        device.feed(batch);
        settle(&mut ctl).await;

        let chunks = predictor.chunks();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].samples.iter().all(|s| !s.is_nan()));
        assert_eq!(chunks[0].samples[3], 0.0);
    }

    /// A failing predictor reports each chunk's error but the stream keeps
    /// going.
    #[tokio::test]
    async fn transport_errors_do_not_halt_stream() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::failing());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_continuous().unwrap();
        device.feed(vec![0.1; 2_000]);
        settle(&mut ctl).await;

        assert_eq!(ctl.state(), ControllerState::Continuous);
        let st = read_status(&ctl.status());
        assert!(st.error.as_deref().is_some_and(|e| e.contains("500")));
        assert!(st.message.starts_with("Error: "));

        device.feed(vec![0.1; 1_000]);
        settle(&mut ctl).await;
        assert_eq!(predictor.chunks().len(), 3);
        assert_eq!(ctl.state(), ControllerState::Continuous);
    }

    #[tokio::test]
    async fn stop_continuous_releases_device_and_drops_late_batches() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_continuous().unwrap();
        device.feed(vec![0.1; 700]);
        settle(&mut ctl).await;

        ctl.stop_continuous();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(device.released());

        // The remainder was discarded, and a batch still in flight from the
        // audio thread belongs to a finished session.
        device.feed(vec![0.1; 1_000]);
        settle(&mut ctl).await;
        assert!(predictor.chunks().is_empty());

        // Stopping again is harmless.
        ctl.stop_continuous();
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn results_for_stopped_stream_are_dropped() {
        let gate = Arc::new(Semaphore::new(0));
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::gated(Arc::clone(&gate)));
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_continuous().unwrap();
        device.feed(vec![0.1; 1_000]);
        settle(&mut ctl).await;
        assert_eq!(ctl.in_flight(), 1);

        ctl.stop_continuous();
        gate.add_permits(1);
        settle(&mut ctl).await;

        assert_eq!(ctl.in_flight(), 0);
        let st = read_status(&ctl.status());
        assert_eq!(st.predictions, 0);
        assert!(st.predicted_emotion.is_none());
    }

    /// A slow submission does not hold back the next chunk, and results land
    /// in completion order.
    #[tokio::test]
    async fn submissions_overlap_and_apply_in_completion_order() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(KeyedPredictor::new());
        let mut ctl = StreamController::new(
            &test_config(),
            Box::new(device.clone()),
            Box::new(no_upload()),
            Arc::clone(&predictor) as Arc<dyn Predictor>,
        );

        ctl.start_continuous().unwrap();
        device.feed(vec![0.1; 1_000]);
        settle(&mut ctl).await;
        device.feed(vec![0.2; 1_000]);
        settle(&mut ctl).await;

        assert_eq!(ctl.in_flight(), 2);
        assert_eq!(predictor.arrived.load(Ordering::SeqCst), 2);
        assert_eq!(predictor.completed.load(Ordering::SeqCst), 0);

        // The second chunk finishes first.
        predictor.second.add_permits(1);
        settle(&mut ctl).await;
        let st = read_status(&ctl.status());
        assert_eq!(st.predicted_emotion.as_deref(), Some("sadness"));
        assert_eq!(st.predictions, 1);
        assert_eq!(ctl.in_flight(), 1);

        predictor.first.add_permits(1);
        settle(&mut ctl).await;
        let st = read_status(&ctl.status());
        assert_eq!(st.predicted_emotion.as_deref(), Some("anger"));
        assert_eq!(st.predictions, 2);
        assert_eq!(ctl.in_flight(), 0);
        assert_eq!(ctl.state(), ControllerState::Continuous);
    }

    #[tokio::test]
    async fn panicking_predictor_still_clears_pending() {
        let device = FakeDevice::new(16_000);
        let clip = DecodedAudio {
            samples: vec![0.1; 100],
            sample_rate: 16_000,
        };
        let mut ctl = StreamController::new(
            &test_config(),
            Box::new(device.clone()),
            Box::new(StubDecoder(Some(clip))),
            Arc::new(PanickingPredictor),
        );

        ctl.upload(b"RIFF").unwrap();
        assert!(ctl.is_prediction_pending());
        settle(&mut ctl).await;

        assert!(!ctl.is_prediction_pending());
        assert_eq!(ctl.in_flight(), 0);
        let st = read_status(&ctl.status());
        assert!(!st.prediction_pending);
        assert!(st.error.as_deref().is_some_and(|e| e.contains("predictor task failed")));
        assert!(ctl.start_recording().is_ok());
    }

    // -----------------------------------------------------------------------
    // Bounded recording
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn stop_recording_submits_whole_clip_once() {
        let device = FakeDevice::new(48_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_recording().unwrap();
        assert_eq!(ctl.state(), ControllerState::Recording);
        for _ in 0..4 {
            device.feed(vec![0.3; 4_800]);
        }
        settle(&mut ctl).await;
        assert!(predictor.chunks().is_empty(), "nothing is sent while recording");

        ctl.stop_recording().unwrap();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(device.released());
        assert!(ctl.is_prediction_pending());
        assert_eq!(read_status(&ctl.status()).message, "Predicting...");

        settle(&mut ctl).await;
        let chunks = predictor.chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 6_400);
        assert_eq!(chunks[0].sample_rate, 16_000);
        assert!(!ctl.is_prediction_pending());
        assert_eq!(read_status(&ctl.status()).predictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recording_stops_itself_at_ceiling() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_recording().unwrap();
        device.feed(vec![0.1; 800]);
        pump(&mut ctl).await; // batch

        // Nothing else is queued: the paused clock advances to the ceiling.
        pump(&mut ctl).await;
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(device.released());

        pump(&mut ctl).await; // prediction
        let chunks = predictor.chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 800);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_stop_cancels_ceiling() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_recording().unwrap();
        device.feed(vec![0.1; 800]);
        settle(&mut ctl).await;
        ctl.stop_recording().unwrap();
        settle(&mut ctl).await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(settle(&mut ctl).await, 0);
        assert_eq!(predictor.chunks().len(), 1);
    }

    #[tokio::test]
    async fn stop_recording_when_idle_is_a_no_op() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        assert!(ctl.stop_recording().is_ok());
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(device.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_recording_is_a_decode_error() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_recording().unwrap();
        let err = ctl.stop_recording().unwrap_err();
        assert!(matches!(err, StreamError::Decode(DecodeError::Empty)));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(!ctl.is_prediction_pending());
        assert!(read_status(&ctl.status()).error.is_some());
    }

    // -----------------------------------------------------------------------
    // Mutual exclusion
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn continuous_rejected_while_recording() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.start_recording().unwrap();
        device.feed(vec![0.1; 400]);
        settle(&mut ctl).await;

        let err = ctl.start_continuous().unwrap_err();
        assert!(matches!(
            err,
            StreamError::ModeConflict {
                requested: StreamMode::Continuous,
                active: ControllerState::Recording,
            }
        ));

        // The recording is untouched and keeps collecting.
        assert_eq!(ctl.state(), ControllerState::Recording);
        assert!(!device.released());
        assert_eq!(device.starts.load(Ordering::SeqCst), 1);
        device.feed(vec![0.1; 400]);
        settle(&mut ctl).await;
        ctl.stop_recording().unwrap();
        settle(&mut ctl).await;
        assert_eq!(predictor.chunks()[0].len(), 800);
    }

    #[tokio::test]
    async fn upload_and_recording_rejected_while_streaming() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let clip = DecodedAudio {
            samples: vec![0.1; 100],
            sample_rate: 16_000,
        };
        let mut ctl = controller(&device, StubDecoder(Some(clip)), &predictor);

        ctl.start_continuous().unwrap();
        assert!(matches!(
            ctl.upload(b"RIFF"),
            Err(StreamError::ModeConflict {
                requested: StreamMode::Upload,
                ..
            })
        ));
        assert!(matches!(
            ctl.start_recording(),
            Err(StreamError::ModeConflict {
                requested: StreamMode::BoundedRecording,
                active: ControllerState::Continuous,
            })
        ));
        // stop_recording does not end a continuous session.
        ctl.stop_recording().unwrap();
        assert_eq!(ctl.state(), ControllerState::Continuous);
    }

    #[tokio::test]
    async fn pending_prediction_blocks_new_sessions() {
        let gate = Arc::new(Semaphore::new(0));
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::gated(Arc::clone(&gate)));
        let clip = DecodedAudio {
            samples: vec![0.1; 100],
            sample_rate: 16_000,
        };
        let mut ctl = controller(&device, StubDecoder(Some(clip)), &predictor);

        ctl.upload(b"RIFF").unwrap();
        assert!(matches!(
            ctl.start_continuous(),
            Err(StreamError::PredictionPending)
        ));
        assert!(matches!(ctl.upload(b"RIFF"), Err(StreamError::PredictionPending)));
        assert_eq!(device.starts.load(Ordering::SeqCst), 0);

        gate.add_permits(1);
        settle(&mut ctl).await;
        assert!(!ctl.is_prediction_pending());
        assert!(ctl.start_continuous().is_ok());
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upload_resamples_and_submits_once() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let clip = DecodedAudio {
            samples: vec![0.25; 64_000],
            sample_rate: 32_000,
        };
        let mut ctl = controller(&device, StubDecoder(Some(clip)), &predictor);

        let id = ctl.upload(b"RIFF").unwrap();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(device.starts.load(Ordering::SeqCst), 0);

        settle(&mut ctl).await;
        let chunks = predictor.chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 32_000);
        assert_eq!(chunks[0].sample_rate, 16_000);

        let st = read_status(&ctl.status());
        assert_eq!(st.message, "Predicted Emotion: happiness");
        assert_eq!(st.probabilities[2], 0.7);

        // A later upload gets a fresh session id.
        let next = ctl.upload(b"RIFF").unwrap();
        assert!(next > id);
    }

    #[tokio::test]
    async fn upload_decode_failure_leaves_controller_idle() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        let err = ctl.upload(b"not audio").unwrap_err();
        assert!(matches!(err, StreamError::Decode(_)));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(!ctl.is_prediction_pending());
        assert!(read_status(&ctl.status()).message.starts_with("Error: "));

        settle(&mut ctl).await;
        assert!(predictor.chunks().is_empty());
    }

    // -----------------------------------------------------------------------
    // Device and rate failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn device_failure_stays_idle() {
        let device = FakeDevice::failing();
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        assert!(matches!(
            ctl.start_continuous(),
            Err(StreamError::Device(CaptureError::NoDevice))
        ));
        assert!(matches!(ctl.start_recording(), Err(StreamError::Device(_))));
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn zero_device_rate_is_invalid() {
        let device = FakeDevice::new(0);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        let err = ctl.start_continuous().unwrap_err();
        assert!(matches!(
            err,
            StreamError::InvalidRate {
                rate_in: 0,
                rate_out: 16_000
            }
        ));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(device.released());
    }

    // -----------------------------------------------------------------------
    // Waveform and model loading
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn render_frame_feeds_renderer_while_active() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let frames = FrameLog::default();
        let mut ctl =
            controller(&device, no_upload(), &predictor).with_renderer(Box::new(frames.clone()));

        ctl.render_frame();
        assert!(frames.0.lock().unwrap().is_empty(), "idle draws nothing");

        ctl.start_continuous().unwrap();
        device.feed(vec![1.0; 300]);
        settle(&mut ctl).await;
        ctl.render_frame();

        assert_eq!(*frames.0.lock().unwrap(), vec![64]);
        let st = read_status(&ctl.status());
        assert_eq!(st.waveform.len(), 64);
        assert!(st.waveform.iter().any(|&p| p > 0.0));
    }

    #[tokio::test]
    async fn load_model_updates_status() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.load_configured_model();
        settle(&mut ctl).await;

        let st = read_status(&ctl.status());
        assert!(st.model_loaded);
        assert_eq!(st.message, "Model XGBoost loaded successfully");
    }

    #[tokio::test]
    async fn load_model_failure_is_reported() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::failing());
        let mut ctl = controller(&device, no_upload(), &predictor);

        ctl.load_model("SVM");
        settle(&mut ctl).await;

        let st = read_status(&ctl.status());
        assert!(!st.model_loaded);
        assert!(st.error.as_deref().is_some_and(|e| e.contains("connection refused")));
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn run_exits_when_handles_drop() {
        let device = FakeDevice::new(16_000);
        let predictor = Arc::new(RecordingPredictor::default());
        let ctl = controller(&device, no_upload(), &predictor);
        let status = ctl.status();
        let (handle, commands) = ControllerHandle::channel(4);

        let driver = async move {
            handle.start_continuous().await.unwrap();
            assert_eq!(handle.state().await.unwrap(), ControllerState::Continuous);
        };
        tokio::join!(ctl.run(commands), driver);

        // Shutdown ends the session and releases the device.
        assert!(device.released());
        assert_eq!(read_status(&status).state, ControllerState::Idle);
    }

    #[tokio::test]
    async fn handle_reports_closed_controller() {
        let (handle, commands) = ControllerHandle::channel(1);
        drop(commands);
        assert!(matches!(
            handle.start_recording().await,
            Err(StreamError::ControllerClosed)
        ));
        assert!(matches!(
            handle.load_model("XGBoost").await,
            Err(StreamError::ControllerClosed)
        ));
    }
}
