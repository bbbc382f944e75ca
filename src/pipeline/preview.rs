//! Best-effort preview path.
//!
//! The frame timeline drops frames into a single-slot mailbox; a UI-owned task
//! takes them out and renders. If the previous frame has not been taken yet the
//! new one is discarded, so the frame timeline never waits on the UI.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use image::{imageops, Rgb, RgbImage};
use tokio::sync::Notify;

use crate::{
    pipeline::sinks::PreviewSink,
    video::types::{Frame, PreviewRect},
};

/// Single-slot, skip-when-busy preview sink
#[derive(Default)]
pub struct PreviewMailbox {
    slot: Mutex<Option<Frame>>,
    notify: Notify,
    closed: AtomicBool,
    presented: AtomicU64,
    skipped: AtomicU64,
}

impl PreviewMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the next frame; `None` once closed and drained
    pub async fn next(&self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.take() {
                return Some(frame);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Take the pending frame, if any
    pub fn take(&self) -> Option<Frame> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Wake the consumer and make `next` return `None` once the slot is empty
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl PreviewSink for PreviewMailbox {
    fn present(&self, frame: Frame) -> bool {
        // try_lock: a consumer mid-take counts as busy too
        let accepted = match self.slot.try_lock() {
            Ok(mut slot) if slot.is_none() => {
                *slot = Some(frame);
                true
            }
            _ => false,
        };

        if accepted {
            self.presented.fetch_add(1, Ordering::Relaxed);
            self.notify.notify_one();
        } else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }
}

/// Draws frames into the preview rectangle of a surface
pub struct PreviewRenderer {
    rect: PreviewRect,
}

impl PreviewRenderer {
    pub fn new(rect: PreviewRect) -> Self {
        Self { rect }
    }

    /// Surface large enough to hold the rectangle, frame stretched into it
    pub fn render(&self, frame: &Frame) -> RgbImage {
        let mut surface = RgbImage::from_pixel(
            self.rect.x + self.rect.width,
            self.rect.y + self.rect.height,
            Rgb([0, 0, 0]),
        );

        let scaled = if frame.size() == self.rect.size() {
            frame.as_image().clone()
        } else {
            imageops::resize(
                frame.as_image(),
                self.rect.width,
                self.rect.height,
                imageops::FilterType::Triangle,
            )
        };

        imageops::replace(&mut surface, &scaled, self.rect.x as i64, self.rect.y as i64);
        surface
    }
}
