use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::core::FrameSlot;
use crate::error::{ArError, Result};
use crate::frame::VideoFrame;
use crate::traits::FrameSource;

const CHECKER_SIZE: u32 = 40;
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Drifting colour gradient under a checkerboard, for running without a camera
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    frame_index: u64,
    limit: Option<u64>,
}

impl SyntheticFrameSource {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ArError::Capture(format!(
                "synthetic frame size {}x{} is empty",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            frame_index: 0,
            limit: None,
        })
    }

    /// End the stream after `frames` frames
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    fn render(&self) -> Vec<u8> {
        let shift = (self.frame_index % 256) as u32;
        let mut pixels = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let dark = ((x + shift) / CHECKER_SIZE + y / CHECKER_SIZE) % 2 == 0;
                let r = (x * 255 / self.width.max(1)) as u8;
                let g = (y * 255 / self.height.max(1)) as u8;
                // Blue tracks the frame index unfaded so every frame differs
                let b = shift as u8;
                let fade = if dark { 2 } else { 1 };
                pixels.extend_from_slice(&[r / fade, g / fade, b, 255]);
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticFrameSource {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.limit.is_some_and(|limit| self.frame_index >= limit) {
            return None;
        }
        let frame = VideoFrame::new(self.width, self.height, self.render());
        self.frame_index += 1;
        frame.ok()
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Still images played back as a video stream
pub struct ImageFrameSource {
    name: String,
    frames: Vec<VideoFrame>,
    cursor: usize,
    looping: bool,
}

impl ImageFrameSource {
    /// Loads a single image, or every png/jpeg in a directory in name order
    pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self> {
        let path = path.as_ref();
        let files = if path.is_dir() {
            list_images(path)?
        } else {
            vec![path.to_path_buf()]
        };

        let frames = files
            .iter()
            .map(|file| load_image(file))
            .collect::<Result<Vec<_>>>()?;

        if frames.is_empty() {
            return Err(ArError::Capture(format!("no images found in {:?}", path)));
        }

        info!("Loaded {} frame(s) from {:?}", frames.len(), path);
        Ok(Self {
            name: path.display().to_string(),
            frames,
            cursor: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageFrameSource {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.cursor >= self.frames.len() {
            if !self.looping {
                return None;
            }
            self.cursor = 0;
        }
        let frame = self.frames.get(self.cursor).cloned();
        self.cursor += 1;
        frame
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ArError::Capture(format!("cannot read {:?}: {}", dir, e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn load_image(path: &Path) -> Result<VideoFrame> {
    let image = image::open(path)
        .map_err(|e| ArError::Capture(format!("cannot decode {:?}: {}", path, e)))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    debug!("  {:?}: {}x{}", path, width, height);
    VideoFrame::new(width, height, image.into_raw())
}

/// Runs a frame source on its own thread and keeps only the newest frame.
///
/// The render side never waits behind a backlog: frames captured while the
/// previous one is still unread replace it. The capture thread is stopped and
/// joined on drop.
pub struct ThreadedFrameSource {
    name: String,
    slot: Arc<FrameSlot<VideoFrame>>,
    finished: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ThreadedFrameSource {
    /// Starts capturing from `source`, pacing the thread at `interval`
    pub fn spawn<S>(mut source: S, interval: Duration) -> Result<Self>
    where
        S: FrameSource + Send + 'static,
    {
        let name = format!("threaded {}", source.name());
        let slot = Arc::new(FrameSlot::new());
        let finished = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_slot = Arc::clone(&slot);
        let thread_finished = Arc::clone(&finished);
        let handle = thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                loop {
                    // A closed channel means the owner is gone too
                    if !matches!(stop_rx.try_recv(), Err(mpsc::TryRecvError::Empty)) {
                        break;
                    }
                    match source.next_frame() {
                        Some(frame) => thread_slot.publish(frame),
                        None => break,
                    }
                    thread::sleep(interval);
                }
                thread_finished.store(true, Ordering::Release);
                debug!("Capture thread finished");
            })
            .map_err(|e| ArError::Capture(format!("cannot start capture thread: {}", e)))?;

        Ok(Self {
            name,
            slot,
            finished,
            stop_tx: Some(stop_tx),
            thread_handle: Some(handle),
        })
    }

    /// Frames overwritten before the render side read them
    pub fn dropped_frames(&self) -> u64 {
        self.slot.dropped()
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
    }
}

impl FrameSource for ThreadedFrameSource {
    /// Blocks until a frame is available; `None` once the inner source ended
    /// and its last frame was taken.
    fn next_frame(&mut self) -> Option<VideoFrame> {
        loop {
            if let Some(frame) = self.slot.take() {
                return Some(frame);
            }
            if self.finished.load(Ordering::Acquire) {
                // The last publish happens before the flag is set
                return self.slot.take();
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ThreadedFrameSource {
    fn drop(&mut self) {
        self.stop();
        debug!(
            "{}: {} frames captured, {} dropped",
            self.name,
            self.slot.published(),
            self.slot.dropped()
        );
    }
}
