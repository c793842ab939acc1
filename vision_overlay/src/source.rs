use crate::config::{CanvasSize, SourceConfig, SourceKind};
use frame_pipeline::{Frame, FrameError};
use opencv::{
    core::{self, Mat, Scalar, Size},
    imgproc,
    prelude::*,
    videoio,
};
use std::time::Duration;
use thiserror::Error;

const FALLBACK_FRAME_DELAY: Duration = Duration::from_millis(33);

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open frame source {0}")]
    OpenFailed(String),
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(opencv::Error),
    #[error("OpenCV error: {0}")]
    OpenCvError(#[from] opencv::Error),
    #[error("Invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),
}

/// Placement of a scaled frame inside a fixed canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub width: i32,
    pub height: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

/// Largest size with the source aspect ratio that fits the canvas, centred.
pub fn fit_within(src_width: i32, src_height: i32, canvas: CanvasSize) -> Placement {
    let aspect_ratio = src_width as f64 / src_height as f64;
    let canvas_aspect_ratio = canvas.width as f64 / canvas.height as f64;

    let (width, height) = if aspect_ratio > canvas_aspect_ratio {
        (canvas.width, (canvas.width as f64 / aspect_ratio) as i32)
    } else {
        ((canvas.height as f64 * aspect_ratio) as i32, canvas.height)
    };

    Placement {
        width,
        height,
        x_offset: (canvas.width - width) / 2,
        y_offset: (canvas.height - height) / 2,
    }
}

pub fn letterbox(frame: &Mat, canvas: CanvasSize) -> Result<Mat, SourceError> {
    let placement = fit_within(frame.cols(), frame.rows(), canvas);

    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(placement.width, placement.height),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut boxed = Mat::default();
    core::copy_make_border(
        &resized,
        &mut boxed,
        placement.y_offset,
        canvas.height - placement.height - placement.y_offset,
        placement.x_offset,
        canvas.width - placement.width - placement.x_offset,
        core::BORDER_CONSTANT,
        Scalar::all(0.0),
    )?;
    Ok(boxed)
}

/// BGR `Mat` from OpenCV into an RGB pipeline frame.
pub fn mat_to_frame(mat: &Mat) -> Result<Frame, SourceError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(mat, &mut rgb, imgproc::COLOR_BGR2RGB)?;

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let pixels = rgb.data_bytes()?.to_vec();

    Ok(Frame::from_rgb(width, height, pixels)?)
}

pub struct FrameSource {
    capture: videoio::VideoCapture,
    description: String,
    size: Size,
    letterbox: Option<CanvasSize>,
    frame_delay: Duration,
}

impl FrameSource {
    pub fn open(config: &SourceConfig) -> Result<Self, SourceError> {
        let (capture, description, frame_delay) = match config.kind {
            SourceKind::Camera => {
                let description = format!("camera {}", config.camera_index);
                let mut capture = videoio::VideoCapture::new(config.camera_index, videoio::CAP_ANY)
                    .map_err(|e| SourceError::OpenFailed(format!("{}: {}", description, e)))?;
                capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)?;
                capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)?;
                capture.set(videoio::CAP_PROP_FPS, config.camera_fps)?;
                // Camera reads block until the next frame, so no extra pacing.
                (capture, description, Duration::ZERO)
            }
            SourceKind::File => {
                let path = config
                    .path
                    .as_ref()
                    .ok_or_else(|| SourceError::OpenFailed("file source without path".into()))?;
                let description = format!("file {}", path.display());
                let capture =
                    videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
                        .map_err(|e| SourceError::OpenFailed(format!("{}: {}", description, e)))?;
                let fps = capture.get(videoio::CAP_PROP_FPS)?;
                let frame_delay = if fps > 0.0 {
                    Duration::from_secs_f64(1.0 / fps)
                } else {
                    FALLBACK_FRAME_DELAY
                };
                (capture, description, frame_delay)
            }
        };

        if !capture.is_opened()? {
            return Err(SourceError::OpenFailed(description));
        }
        tracing::info!("Opened frame source {}", description);

        Ok(Self {
            capture,
            description,
            size: Size::new(config.width, config.height),
            letterbox: config.letterbox,
            frame_delay,
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Time between frames for sources that do not pace themselves.
    pub fn frame_delay(&self) -> Duration {
        self.frame_delay
    }

    /// Next frame, resized or letterboxed. `None` once the source is exhausted.
    pub fn read(&mut self) -> Result<Option<Mat>, SourceError> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(SourceError::ReadFrameFailed)?;
        if !grabbed || frame.empty() {
            return Ok(None);
        }

        if let Some(canvas) = self.letterbox {
            return letterbox(&frame, canvas).map(Some);
        }

        if frame.size()? != self.size {
            let mut resized = Mat::default();
            imgproc::resize(
                &frame,
                &mut resized,
                self.size,
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;
            frame = resized;
        }
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: CanvasSize = CanvasSize {
        width: 1280,
        height: 720,
    };

    #[test]
    fn test_fit_wider_source() {
        let placement = fit_within(1920, 800, HD);
        assert_eq!(
            placement,
            Placement {
                width: 1280,
                height: 533,
                x_offset: 0,
                y_offset: 93,
            }
        );
    }

    #[test]
    fn test_fit_taller_source() {
        let placement = fit_within(640, 480, HD);
        assert_eq!(
            placement,
            Placement {
                width: 960,
                height: 720,
                x_offset: 160,
                y_offset: 0,
            }
        );
    }

    #[test]
    fn test_letterbox_output_has_canvas_size() {
        let frame =
            Mat::new_rows_cols_with_default(480, 640, core::CV_8UC3, Scalar::all(255.0)).unwrap();
        let boxed = letterbox(&frame, HD).unwrap();

        assert_eq!(boxed.cols(), 1280);
        assert_eq!(boxed.rows(), 720);
        let border = boxed.at_2d::<core::Vec3b>(360, 10).unwrap();
        assert_eq!(border[0], 0);
        let inside = boxed.at_2d::<core::Vec3b>(360, 640).unwrap();
        assert_eq!(inside[0], 255);
    }

    #[test]
    fn test_mat_to_frame_swaps_channels() {
        let bgr = Mat::new_rows_cols_with_default(2, 3, core::CV_8UC3, Scalar::new(10.0, 20.0, 30.0, 0.0))
            .unwrap();
        let frame = mat_to_frame(&bgr).unwrap();

        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        assert_eq!(&frame.pixels()[..3], &[30, 20, 10]);
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let config = SourceConfig {
            kind: SourceKind::File,
            camera_index: 0,
            path: Some("does/not/exist.mp4".into()),
            width: 640,
            height: 480,
            camera_fps: 30.0,
            offer_every: 1,
            letterbox: None,
        };
        assert!(matches!(
            FrameSource::open(&config),
            Err(SourceError::OpenFailed(_))
        ));
    }
}
