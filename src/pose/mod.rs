mod angle;
mod estimator;
mod keypoints;
mod pipeline;
mod preprocess;
mod reps;

pub use keypoints::{Keypoint, KeypointSet, SKELETON};
pub use pipeline::{spawn_session, FrameSink, FrameSource, Shutdown, SinkEvent};
pub use reps::Status;
