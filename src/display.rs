use opencv::core::{Mat, Point, Scalar};
use opencv::highgui;
use opencv::imgproc;
use thiserror::Error;

use crate::config::DisplayConfig;
use crate::pose::{FrameSink, Keypoint, KeypointSet, SinkEvent, Status, SKELETON};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),
}

const POINT_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0);
const LIMB_COLOR: (f64, f64, f64) = (255.0, 200.0, 0.0);
const TEXT_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);

fn bgr((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

fn pixel(k: &Keypoint) -> Point {
    Point::new(k.x.round() as i32, k.y.round() as i32)
}

/// Draws limbs, keypoint dots and the status line onto a BGR frame.
/// Keypoints at or below `min_confidence` are left out.
pub fn draw_overlay(
    frame: &mut Mat,
    pose: Option<&KeypointSet>,
    status: &Status,
    min_confidence: f32,
) -> Result<(), SinkError> {
    if let Some(pose) = pose {
        for (from, to) in SKELETON {
            let (a, b) = (pose[from], pose[to]);
            if a.confidence > min_confidence && b.confidence > min_confidence {
                imgproc::line(
                    frame,
                    pixel(&a),
                    pixel(&b),
                    bgr(LIMB_COLOR),
                    2,
                    imgproc::LINE_AA,
                    0,
                )?;
            }
        }

        for k in pose.iter().filter(|k| k.confidence > min_confidence) {
            imgproc::circle(
                frame,
                pixel(k),
                4,
                bgr(POINT_COLOR),
                imgproc::FILLED,
                imgproc::LINE_AA,
                0,
            )?;
        }
    }

    imgproc::put_text(
        frame,
        &status.to_string(),
        Point::new(10, 30),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.8,
        bgr(TEXT_COLOR),
        2,
        imgproc::LINE_AA,
        false,
    )?;

    Ok(())
}

/// On-screen window. Pressing the quit key or closing the window ends the session.
pub struct Window {
    title: String,
    quit_key: i32,
    min_confidence: f32,
}

impl Window {
    pub fn open(config: &DisplayConfig, min_confidence: f32) -> Result<Self, SinkError> {
        highgui::named_window(&config.title, highgui::WINDOW_AUTOSIZE)?;
        tracing::info!(title = %config.title, quit_key = %config.quit_key, "window opened");

        Ok(Self {
            title: config.title.clone(),
            quit_key: config.quit_key_code(),
            min_confidence,
        })
    }

    fn closed(&self) -> bool {
        highgui::get_window_property(&self.title, highgui::WND_PROP_VISIBLE)
            .map(|visible| visible < 1.0)
            .unwrap_or(true)
    }
}

impl FrameSink<Mat> for Window {
    fn present(
        &mut self,
        frame: &mut Mat,
        pose: Option<&KeypointSet>,
        status: &Status,
    ) -> Result<SinkEvent, SinkError> {
        draw_overlay(frame, pose, status, self.min_confidence)?;
        highgui::imshow(&self.title, &*frame)?;

        let key = highgui::wait_key(1)?;
        if key >= 0 && ((key & 0xff) as u8).to_ascii_lowercase() as i32 == self.quit_key {
            tracing::info!(title = %self.title, "quit key pressed");
            return Ok(SinkEvent::Quit);
        }
        if self.closed() {
            tracing::info!(title = %self.title, "window closed");
            return Ok(SinkEvent::Quit);
        }

        Ok(SinkEvent::Continue)
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(&self.title) {
            tracing::debug!(error = %e, "failed to destroy window");
        }
    }
}

/// Logs status changes instead of rendering.
#[derive(Debug, Default)]
pub struct HeadlessSink {
    last: Option<String>,
}

impl FrameSink<Mat> for HeadlessSink {
    fn present(
        &mut self,
        _frame: &mut Mat,
        _pose: Option<&KeypointSet>,
        status: &Status,
    ) -> Result<SinkEvent, SinkError> {
        let text = status.to_string();
        if self.last.as_deref() != Some(text.as_str()) {
            tracing::debug!(status = %text, "status");
            self.last = Some(text);
        }
        Ok(SinkEvent::Continue)
    }
}
