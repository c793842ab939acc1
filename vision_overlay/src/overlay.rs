use crate::config::DisplayConfig;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Vector},
    imgcodecs, imgproc,
    prelude::*,
};
use thiserror::Error;

const TEXT_ORIGIN: (i32, i32) = (10, 30);
const LINE_HEIGHT: i32 = 25;
const FONT_SCALE: f64 = 0.7;
const THICKNESS: i32 = 2;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(opencv::Error),
    #[error("OpenCV error: {0}")]
    OpenCvError(#[from] opencv::Error),
}

/// Greedy word wrap. Words longer than `width` are split; output is capped at
/// `max_lines`.
pub fn wrap_text(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let current_len = current.chars().count();
        if current.is_empty() {
            current = word.into_iter().collect();
        } else if current_len + 1 + word.len() <= width {
            current.push(' ');
            current.extend(word);
        } else {
            lines.push(std::mem::replace(&mut current, word.into_iter().collect()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.truncate(max_lines);
    lines
}

/// Draws the current inference text over a frame.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    wrap_width: usize,
    max_lines: usize,
    alpha: f64,
}

impl OverlayRenderer {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            wrap_width: config.wrap_width,
            max_lines: config.max_lines,
            alpha: config.alpha,
        }
    }

    pub fn annotate(&self, frame: &mut Mat, text: &str) -> Result<(), OverlayError> {
        let lines = wrap_text(text, self.wrap_width, self.max_lines);
        if lines.is_empty() || frame.empty() {
            return Ok(());
        }

        let font = imgproc::FONT_HERSHEY_SIMPLEX;
        let mut text_w = 0;
        for line in &lines {
            let mut baseline = 0;
            let size = imgproc::get_text_size(line, font, FONT_SCALE, THICKNESS, &mut baseline)?;
            text_w = text_w.max(size.width);
        }
        let text_h = LINE_HEIGHT * lines.len() as i32;
        let (text_x, text_y) = TEXT_ORIGIN;

        let mut background = frame.try_clone()?;
        imgproc::rectangle(
            &mut background,
            Rect::new(text_x - 5, text_y - 20, text_w + 15, text_h + 20),
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;

        let mut blended = Mat::default();
        core::add_weighted(
            &background,
            self.alpha,
            &*frame,
            1.0 - self.alpha,
            0.0,
            &mut blended,
            -1,
        )?;
        *frame = blended;

        for (i, line) in lines.iter().enumerate() {
            imgproc::put_text(
                frame,
                line,
                Point::new(text_x, text_y + i as i32 * LINE_HEIGHT),
                font,
                FONT_SCALE,
                Scalar::new(0.0, 0.0, 0.0, 0.0),
                THICKNESS,
                imgproc::LINE_AA,
                false,
            )?;
        }

        Ok(())
    }
}

pub fn encode_jpg(frame: &Mat) -> Result<Vec<u8>, OverlayError> {
    let mut buf = Vector::<u8>::new();
    imgcodecs::imencode(".jpg", frame, &mut buf, &Vector::new())
        .map_err(OverlayError::EncodeFrameFailed)?;
    Ok(buf.into())
}
