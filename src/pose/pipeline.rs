use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use opencv::core::Mat;
use thiserror::Error;

use crate::camera::{Camera, CaptureError};
use crate::config::Config;
use crate::display::{HeadlessSink, SinkError, Window};

use super::angle::AngleEstimator;
use super::estimator::{EstimateError, PoseEstimator};
use super::keypoints::KeypointSet;
use super::reps::{RepCounter, RepRules, Status};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("pose model: {0}")]
    Model(#[from] EstimateError),
    #[error("video source: {0}")]
    Camera(#[from] CaptureError),
    #[error("display: {0}")]
    Display(#[from] SinkError),
}

/// Supplies frames to the loop. `Ok(None)` means the source is exhausted.
pub trait FrameSource {
    type Frame;

    fn next_frame(&mut self) -> Result<Option<Self::Frame>, CaptureError>;
}

pub trait PoseModel<F> {
    fn estimate(&mut self, frame: &F) -> Result<KeypointSet, EstimateError>;
}

impl PoseModel<Mat> for PoseEstimator {
    fn estimate(&mut self, frame: &Mat) -> Result<KeypointSet, EstimateError> {
        PoseEstimator::estimate(self, frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Continue,
    Quit,
}

/// Receives every processed frame along with its pose and status.
pub trait FrameSink<F> {
    fn present(
        &mut self,
        frame: &mut F,
        pose: Option<&KeypointSet>,
        status: &Status,
    ) -> Result<SinkEvent, SinkError>;
}

impl<F, T: FrameSink<F> + ?Sized> FrameSink<F> for Box<T> {
    fn present(
        &mut self,
        frame: &mut F,
        pose: Option<&KeypointSet>,
        status: &Status,
    ) -> Result<SinkEvent, SinkError> {
        (**self).present(frame, pose, status)
    }
}

/// Cooperative cancellation flag, polled once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames that produced a decoded pose.
    pub frames: u64,
    /// Frames dropped by the source or with no decodable pose.
    pub skipped: u64,
    pub reps: u32,
}

pub struct RepSession<S, M, K> {
    source: S,
    model: M,
    sink: K,
    angles: AngleEstimator,
    counter: RepCounter,
    frame_delay: Duration,
    clock: Box<dyn FnMut() -> Instant + Send>,
}

impl<S, M, K> RepSession<S, M, K>
where
    S: FrameSource,
    M: PoseModel<S::Frame>,
    K: FrameSink<S::Frame>,
{
    pub fn new(
        source: S,
        model: M,
        sink: K,
        angles: AngleEstimator,
        counter: RepCounter,
        frame_delay: Duration,
    ) -> Self {
        Self {
            source,
            model,
            sink,
            angles,
            counter,
            frame_delay,
            clock: Box::new(Instant::now),
        }
    }

    pub fn with_clock(mut self, clock: impl FnMut() -> Instant + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Processes frames one at a time until the source ends, the sink asks to
    /// quit, or `shutdown` is triggered.
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<SessionSummary, SessionError> {
        let mut summary = SessionSummary::default();
        tracing::info!("rep session started");

        while !shutdown.is_triggered() {
            let mut frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!("video source ended");
                    break;
                }
                Err(e) => {
                    summary.skipped += 1;
                    tracing::warn!(error = %e, "skipping frame");
                    continue;
                }
            };

            let pose = match self.model.estimate(&frame) {
                Ok(pose) => Some(pose),
                Err(e) if e.is_frame_local() => {
                    summary.skipped += 1;
                    tracing::warn!(error = %e, "no pose for frame");
                    None
                }
                Err(e) => return Err(e.into()),
            };

            if pose.is_some() {
                summary.frames += 1;
            }
            let angle = pose.as_ref().and_then(|p| self.angles.elbow_angle(p));
            let status = self.counter.update(angle, (self.clock)());
            tracing::trace!(frame = summary.frames, status = %status, "frame processed");

            if self.sink.present(&mut frame, pose.as_ref(), &status)? == SinkEvent::Quit {
                tracing::info!("quit requested");
                shutdown.trigger();
            }

            if !self.frame_delay.is_zero() {
                thread::sleep(self.frame_delay);
            }
        }

        summary.reps = self.counter.reps();
        tracing::info!(
            frames = summary.frames,
            skipped = summary.skipped,
            reps = summary.reps,
            "rep session finished"
        );
        Ok(summary)
    }
}

fn open_and_run(config: Config, shutdown: &Shutdown) -> Result<SessionSummary, SessionError> {
    let model = PoseEstimator::new(&config.model)?;
    let camera = Camera::open(&config.camera)?;
    let (width, height) = camera.resolution();
    tracing::info!(width, height, "camera ready");

    let angles = AngleEstimator::new(config.counter.min_confidence);
    let sink: Box<dyn FrameSink<Mat>> = if config.display.enabled {
        Box::new(Window::open(&config.display, angles.min_confidence())?)
    } else {
        Box::new(HeadlessSink::default())
    };

    let counter = RepCounter::new(RepRules::from(&config.counter));
    let mut session = RepSession::new(
        camera,
        model,
        sink,
        angles,
        counter,
        config.display.frame_delay(),
    );
    session.run(shutdown)
}

/// Runs the whole session on a blocking thread; every resource opened there
/// is released before the task completes.
pub fn spawn_session(
    config: Config,
    shutdown: Shutdown,
) -> tokio::task::JoinHandle<Result<SessionSummary, SessionError>> {
    tokio::task::spawn_blocking(move || {
        let result = open_and_run(config, &shutdown);
        if let Err(e) = &result {
            tracing::error!(error = %e, "rep session failed");
        }
        result
    })
}
