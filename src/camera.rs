//! Thread-safe hand-off of the latest camera frame.
//!
//! A single producer (the stream-receiver thread) publishes frames; any
//! number of consumer threads read them. One guard covers both the decoded
//! image and the raw bitstream run, so a reader never observes a buffer
//! mid-write. No history is kept: each write fully supersedes the previous
//! frame and readers always see the latest complete one.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::{GatewayError, Result};

/// Bitstream format selector for the camera stream toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamCodec {
    /// H.264 bitstream, delivered as raw byte runs.
    H264,
    /// Decoded RGB images.
    Rgb,
}

/// Camera view selector for the stream toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraView {
    /// First-person-view camera.
    Fpv,
    /// Main gimbal camera.
    Main,
}

/// A decoded camera image.
///
/// The pixel buffer is owned exclusively by the frame buffer until handed to
/// a caller by value. The empty default (zero dimensions, no pixels) is what
/// readers get before the first frame arrives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl CameraImage {
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

#[derive(Debug, Default)]
struct Shared {
    image: CameraImage,
    raw: Vec<u8>,
    image_written: bool,
    raw_written: bool,
}

/// Mutex-guarded double buffer holding the most recent decoded image and the
/// most recent raw byte run.
///
/// Critical sections are bounded by the copy/replace of buffer contents; the
/// guard is never held across link I/O.
#[derive(Debug, Default)]
pub struct CameraFrameBuffer {
    shared: Mutex<Shared>,
}

impl CameraFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the raw byte run. Producer call, stream-receiver thread only.
    ///
    /// The backing allocation is reused; contents and valid length are
    /// overwritten, never appended.
    pub fn set_raw_data(&self, data: &[u8]) {
        let mut shared = self.lock();
        shared.raw.clear();
        shared.raw.extend_from_slice(data);
        shared.raw_written = true;
    }

    /// Replace the decoded image. Producer call, stream-receiver thread only.
    pub fn set_image(&self, image: CameraImage) {
        let mut shared = self.lock();
        shared.image = image;
        shared.image_written = true;
    }

    /// Copy out the latest complete decoded image.
    ///
    /// Returns the empty default if no image has ever been written.
    pub fn image(&self) -> CameraImage {
        self.lock().image.clone()
    }

    /// Copy out the latest complete raw byte run.
    ///
    /// Returns an empty vector if no raw data has ever been written.
    pub fn raw_data(&self) -> Vec<u8> {
        self.lock().raw.clone()
    }

    /// Like [`image`](Self::image), but distinguishes "never written" with
    /// [`GatewayError::BufferEmpty`].
    pub fn try_image(&self) -> Result<CameraImage> {
        let shared = self.lock();
        if shared.image_written {
            Ok(shared.image.clone())
        } else {
            Err(GatewayError::BufferEmpty { channel: "image" })
        }
    }

    /// Like [`raw_data`](Self::raw_data), but distinguishes "never written"
    /// with [`GatewayError::BufferEmpty`].
    pub fn try_raw_data(&self) -> Result<Vec<u8>> {
        let shared = self.lock();
        if shared.raw_written {
            Ok(shared.raw.clone())
        } else {
            Err(GatewayError::BufferEmpty { channel: "raw" })
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // A panicked writer cannot leave a frame half-replaced: both setters
        // publish complete values, so the data behind a poisoned guard is
        // still the last complete frame.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
