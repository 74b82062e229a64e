use super::DecodeOutcome;
use crate::picture_queue::{PictureInfoQueue, PictureInfoRecord};
use log::warn;
use std::collections::VecDeque;
use vdec_types::{
    AccessUnit, BackendError, BoxedBackend, DecodeBackendDyn, DecodeBackendDynMut,
    DecodedPicture, PictureResult,
};

/// Guest output buffer for one call.
pub struct FrameSlot<'a> {
    buffer: Option<&'a mut [u8]>,
    accepted: bool,
}

impl<'a> FrameSlot<'a> {
    pub fn new(buffer: Option<&'a mut [u8]>) -> Self {
        Self {
            buffer,
            accepted: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(None)
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }

    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, |buffer| buffer.len())
    }

    fn write(&mut self, bytes: &[u8]) -> bool {
        match self.buffer.as_deref_mut() {
            Some(buffer) if buffer.len() >= bytes.len() => {
                buffer[..bytes.len()].copy_from_slice(bytes);
                self.accepted = true;
                true
            }
            _ => false,
        }
    }
}

/// A finished unit waiting to be reported.
pub(super) struct Completion(Result<DecodedPicture, BackendError>);

impl Completion {
    pub(super) fn emit(
        self,
        codec_type: u32,
        slot: &mut FrameSlot<'_>,
        pictures: &PictureInfoQueue,
    ) -> DecodeOutcome {
        let picture = match self.0 {
            Ok(picture) => picture,
            Err(e) => {
                warn!("Backend failed to decode picture: {}", e);
                return DecodeOutcome::error_frame(codec_type);
            }
        };

        let pixels: &[u8] = &picture.pixels;
        if !slot.write(pixels) {
            warn!(
                "Frame buffer of {} bytes cannot hold a {} byte picture",
                slot.capacity(),
                pixels.len()
            );
            return DecodeOutcome::error_frame(codec_type);
        }

        pictures.push(PictureInfoRecord::from_picture(&picture));
        DecodeOutcome {
            is_valid: true,
            is_error_frame: false,
            picture_count: 1,
            codec_type,
            frame_width: picture.width,
            frame_pitch: picture.pitch,
            frame_height: picture.height,
            frame_buffer_size: pixels.len() as u64,
        }
    }
}

pub(super) struct Pipeline {
    backend: BoxedBackend,
    depth: u32,
    occupancy: u32,
    // Completions pulled from the backend but not reported yet.
    ready: VecDeque<Completion>,
}

impl Pipeline {
    pub(super) fn new(backend: BoxedBackend, depth: u32) -> Self {
        Self {
            backend,
            depth,
            occupancy: 0,
            ready: VecDeque::new(),
        }
    }

    pub(super) fn occupancy(&self) -> u32 {
        self.occupancy
    }

    /// Hands `unit` to the backend, first waiting on the oldest unit when the
    /// pipeline is full. Returns the completion this call should report.
    ///
    /// A rejected unit never takes a slot; a completion obtained before the
    /// rejection is kept for the next call.
    pub(super) fn submit(&mut self, unit: AccessUnit) -> Result<Option<Completion>, BackendError> {
        let mut completed = None;
        if self.occupancy >= self.depth {
            completed = self.take_oldest(true);
        }

        let sent: Result<(), BackendError> = self.backend.send_access_unit(unit).into();
        if let Err(e) = sent {
            warn!("Backend rejected access unit: {}", e);
            if let Some(completion) = completed {
                self.ready.push_front(completion);
                self.occupancy += 1;
            }
            return Err(e);
        }
        self.occupancy += 1;

        if completed.is_none() {
            completed = self.take_oldest(false);
        }
        Ok(completed)
    }

    /// Oldest unit still in flight, waiting for it if necessary.
    pub(super) fn next_completion(&mut self) -> Option<Completion> {
        if self.occupancy == 0 {
            return None;
        }
        self.take_oldest(true)
    }

    /// Discards everything in flight, returning how many units were dropped.
    pub(super) fn reset(&mut self) -> u32 {
        let discarded = self.occupancy;
        self.backend.reset();
        self.ready.clear();
        self.occupancy = 0;
        discarded
    }

    fn take_oldest(&mut self, block: bool) -> Option<Completion> {
        if let Some(completion) = self.ready.pop_front() {
            self.occupancy -= 1;
            return Some(completion);
        }

        let next: Option<PictureResult> = if block {
            self.backend.drain_picture().into()
        } else {
            self.backend.receive_picture().into()
        };
        match next {
            Some(result) => {
                self.occupancy = self.occupancy.saturating_sub(1);
                Some(Completion(result.into()))
            }
            None => {
                if block && self.occupancy > 0 {
                    let pending = self.backend.pending();
                    warn!(
                        "Backend has nothing to drain with {} units in flight, resyncing to {}",
                        self.occupancy, pending
                    );
                    self.occupancy = pending;
                }
                None
            }
        }
    }
}
