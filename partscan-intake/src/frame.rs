//! Frames, the decoder boundary and frame sources
//!
//! A camera delivers [`Frame::Image`]s that must go through a
//! [`CodeDecoder`]; handheld scanners and HTTP submissions deliver
//! [`Frame::Decoded`] detections directly. Sources publish into a
//! [`FrameSink`]; the pipeline consumes a [`FrameFeed`]. The channel holds
//! only the latest frame, so a slow consumer skips frames instead of
//! queueing them.

use async_trait::async_trait;
use partscan_common::CodeType;
use std::borrow::Cow;
use std::io::{self, BufRead};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Pixel layout of an image frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Bgr8,
    Gray8,
}

/// Raw image buffer from a camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

/// One code found in a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedCode {
    pub code_type: CodeType,
    pub payload: Vec<u8>,
    /// Outline in image coordinates; only used for overlays
    pub polygon: Vec<(i32, i32)>,
}

impl DetectedCode {
    pub fn new(code_type: CodeType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            code_type,
            payload: payload.into(),
            polygon: Vec::new(),
        }
    }

    /// Payload as text; invalid UTF-8 is replaced rather than rejected
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Unit of work delivered to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Image(ImageFrame),
    Decoded(Vec<DetectedCode>),
}

/// Code detection capability for image frames
pub trait CodeDecoder: Send + Sync {
    /// Detect codes in an image. An empty result is normal.
    fn decode(&self, image: &ImageFrame) -> Vec<DetectedCode>;
}

/// Decoder for deployments without a camera; detects nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecoder;

impl CodeDecoder for NoDecoder {
    fn decode(&self, _image: &ImageFrame) -> Vec<DetectedCode> {
        Vec::new()
    }
}

/// Create a connected sink/feed pair
pub fn frame_channel() -> (FrameSink, FrameFeed) {
    let (tx, rx) = watch::channel(None);
    (FrameSink { tx: Arc::new(tx) }, FrameFeed { rx })
}

/// Publishing side of the latest-frame channel
#[derive(Clone)]
pub struct FrameSink {
    tx: Arc<watch::Sender<Option<Arc<Frame>>>>,
}

impl FrameSink {
    /// Publish a frame, replacing any frame not yet consumed
    ///
    /// Returns false once the consumer is gone.
    pub fn publish(&self, frame: Frame) -> bool {
        self.tx.send(Some(Arc::new(frame))).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consuming side of the latest-frame channel
pub struct FrameFeed {
    rx: watch::Receiver<Option<Arc<Frame>>>,
}

impl FrameFeed {
    /// Wait for the next unseen frame; `None` once every sink is dropped
    pub async fn next(&mut self) -> Option<Arc<Frame>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }
}

/// Capture settings a source may support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSetting {
    Autofocus(bool),
    /// Open the device's native settings dialog
    OpenSettings,
}

/// Frame source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Setting not supported by this source: {0:?}")]
    Unsupported(SourceSetting),

    #[error("Source already started")]
    AlreadyStarted,
}

/// Producer of frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Publish frames until the input ends, the sink closes or `cancel` fires
    async fn run(&self, sink: FrameSink, cancel: CancellationToken) -> Result<(), SourceError>;

    /// Adjust a capture setting while running
    fn apply_setting(&self, setting: SourceSetting) -> Result<(), SourceError> {
        Err(SourceError::Unsupported(setting))
    }
}

/// Keyboard-wedge scanner input
///
/// Handheld scanners decode on their own and type the payload followed by
/// Enter. Each non-empty line becomes a one-code [`Frame::Decoded`]; lines
/// shaped like `{...}` are tagged QR, anything else BARCODE.
///
/// Lines are read on a detached OS thread. A blocking read cannot be
/// interrupted, and a thread outside the runtime never holds up shutdown
/// while it waits for the next line.
pub struct LineScanner<R> {
    reader: Mutex<Option<R>>,
}

impl<R> LineScanner<R>
where
    R: BufRead + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
        }
    }
}

impl LineScanner<io::BufReader<io::Stdin>> {
    /// Scanner reading standard input
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }
}

/// Build the frame for one scanned line, or `None` for blank lines
pub fn line_frame(line: &str) -> Option<Frame> {
    let payload = line.trim_end_matches(['\r', '\n']);
    if payload.trim().is_empty() {
        return None;
    }

    let trimmed = payload.trim();
    let code_type = if trimmed.starts_with('{') && trimmed.ends_with('}') {
        CodeType::Qr
    } else {
        CodeType::Barcode
    };

    Some(Frame::Decoded(vec![DetectedCode::new(code_type, payload)]))
}

/// Publish one frame per line until EOF, cancellation or a closed sink
pub fn forward_lines<R: BufRead>(
    reader: R,
    sink: &FrameSink,
    cancel: &CancellationToken,
) -> Result<(), SourceError> {
    for line in reader.lines() {
        let line = line?;
        if cancel.is_cancelled() {
            break;
        }
        if let Some(frame) = line_frame(&line) {
            if !sink.publish(frame) {
                debug!("Frame consumer gone, scanner stopping");
                break;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl<R> FrameSource for LineScanner<R>
where
    R: BufRead + Send + 'static,
{
    fn name(&self) -> &'static str {
        "line-scanner"
    }

    async fn run(&self, sink: FrameSink, cancel: CancellationToken) -> Result<(), SourceError> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SourceError::AlreadyStarted)?;

        let (done_tx, done_rx) = oneshot::channel();
        let thread_cancel = cancel.clone();
        std::thread::Builder::new()
            .name("line-scanner".to_string())
            .spawn(move || {
                let result = forward_lines(reader, &sink, &thread_cancel);
                let _ = done_tx.send(result);
            })?;
        info!("Line scanner started");

        let result = tokio::select! {
            _ = cancel.cancelled() => Ok(()),
            done = done_rx => done.unwrap_or(Ok(())),
        };

        info!("Line scanner stopped");
        result
    }
}
