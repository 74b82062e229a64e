//! Decoder sessions and their bounded decode pipeline.
//!
//! A session owns one backend and counts the access units it has accepted but
//! not yet reported (`occupancy`). Completions are reported one per call in
//! submission order; when `occupancy` reaches the configured pipeline depth the
//! next submission blocks on the oldest unit before it is accepted.
//!
//! # Thread Safety
//! A session is used by one caller at a time and holds no locks itself. The
//! runtime wraps each session in its own mutex, so calls on one session never
//! wait on another.

mod pipeline;

pub use pipeline::FrameSlot;

use crate::arena::Handle;
use crate::error::{check_size, VdecError};
use crate::memory::MemoryLayout;
use crate::picture_queue::PictureInfoQueue;
use log::{info, trace};
use pipeline::Pipeline;
use vdec_types::abi::{DecoderConfigInfo, DECODER_CONFIG_INFO_SIZE};
use vdec_types::{AccessUnit, BoxedBackend};

/// Largest frame edge a session accepts. Backends size whole pictures from it.
pub const MAX_FRAME_DIMENSION: i32 = 8192;

/// Validated decode parameters fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    pub resource_type: u32,
    pub codec_type: u32,
    pub profile: u32,
    pub max_level: u32,
    pub max_frame_width: u32,
    pub max_frame_height: u32,
    pub max_dpb_frame_count: u32,
    pub pipeline_depth: u32,
    pub compute_queue: Option<Handle>,
    pub cpu_affinity_mask: u64,
    pub cpu_thread_priority: i32,
    pub optimize_progressive_video: bool,
    pub check_memory_type: bool,
}

impl DecoderConfig {
    pub fn from_raw(raw: &DecoderConfigInfo) -> Result<Self, VdecError> {
        check_size("decoder config info", DECODER_CONFIG_INFO_SIZE, raw.this_size)?;
        if raw.decode_pipeline_depth == 0 {
            return Err(VdecError::InvalidPipelineDepth);
        }
        let dimension = 1..=MAX_FRAME_DIMENSION;
        if !dimension.contains(&raw.max_frame_width)
            || !dimension.contains(&raw.max_frame_height)
        {
            return Err(VdecError::InvalidConfig(format!(
                "max frame size {}x{}",
                raw.max_frame_width, raw.max_frame_height
            )));
        }
        if raw.max_dpb_frame_count < 0 {
            return Err(VdecError::InvalidConfig(format!(
                "max dpb frame count {}",
                raw.max_dpb_frame_count
            )));
        }
        Ok(Self {
            resource_type: raw.resource_type,
            codec_type: raw.codec_type,
            profile: raw.profile,
            max_level: raw.max_level,
            max_frame_width: raw.max_frame_width as u32,
            max_frame_height: raw.max_frame_height as u32,
            max_dpb_frame_count: raw.max_dpb_frame_count as u32,
            pipeline_depth: raw.decode_pipeline_depth,
            compute_queue: Handle::from_raw(raw.compute_queue),
            cpu_affinity_mask: raw.cpu_affinity_mask,
            cpu_thread_priority: raw.cpu_thread_priority,
            optimize_progressive_video: raw.optimize_progressive_video,
            check_memory_type: raw.check_memory_type,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No unit submitted since creation.
    Created,
    /// Units are in flight.
    Decoding,
    /// Everything submitted has been reported, or the pipeline was reset.
    Idle,
}

/// What one decode or flush call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOutcome {
    pub is_valid: bool,
    pub is_error_frame: bool,
    pub picture_count: u8,
    pub codec_type: u32,
    pub frame_width: u32,
    pub frame_pitch: u32,
    pub frame_height: u32,
    pub frame_buffer_size: u64,
}

impl DecodeOutcome {
    fn pending(codec_type: u32) -> Self {
        Self {
            is_valid: true,
            codec_type,
            ..Default::default()
        }
    }

    fn error_frame(codec_type: u32) -> Self {
        Self {
            is_valid: true,
            is_error_frame: true,
            codec_type,
            ..Default::default()
        }
    }
}

pub struct DecoderSession {
    config: DecoderConfig,
    memory: MemoryLayout,
    pipeline: Pipeline,
    state: SessionState,
}

impl DecoderSession {
    pub fn new(config: DecoderConfig, memory: MemoryLayout, backend: BoxedBackend) -> Self {
        info!(
            "Decoder session: codec {} profile {} level {} {}x{}, depth {}, dpb {}",
            config.codec_type,
            config.profile,
            config.max_level,
            config.max_frame_width,
            config.max_frame_height,
            config.pipeline_depth,
            config.max_dpb_frame_count
        );
        Self {
            pipeline: Pipeline::new(backend, config.pipeline_depth),
            config,
            memory,
            state: SessionState::Created,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn memory(&self) -> &MemoryLayout {
        &self.memory
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn occupancy(&self) -> u32 {
        self.pipeline.occupancy()
    }

    /// Submits one access unit, reporting at most one completed picture.
    pub fn decode(
        &mut self,
        unit: AccessUnit,
        slot: &mut FrameSlot<'_>,
        pictures: &PictureInfoQueue,
    ) -> Result<DecodeOutcome, VdecError> {
        if unit.data.is_empty() {
            return Err(VdecError::EmptyAccessUnit);
        }
        trace!(
            "decode: {} bytes, pts {}, occupancy {}/{}",
            unit.data.len(),
            unit.pts,
            self.pipeline.occupancy(),
            self.config.pipeline_depth
        );

        let codec_type = self.config.codec_type;
        let outcome = match self.pipeline.submit(unit) {
            Ok(Some(completed)) => completed.emit(codec_type, slot, pictures),
            Ok(None) => DecodeOutcome::pending(codec_type),
            Err(_) => DecodeOutcome::error_frame(codec_type),
        };
        self.update_state();
        Ok(outcome)
    }

    /// Reports the next picture still in the pipeline, if any.
    pub fn flush(
        &mut self,
        slot: &mut FrameSlot<'_>,
        pictures: &PictureInfoQueue,
    ) -> DecodeOutcome {
        let codec_type = self.config.codec_type;
        let outcome = match self.pipeline.next_completion() {
            Some(completed) => completed.emit(codec_type, slot, pictures),
            None => DecodeOutcome::pending(codec_type),
        };
        self.update_state();
        outcome
    }

    /// Drops everything in flight without reporting it.
    pub fn reset(&mut self) {
        let discarded = self.pipeline.reset();
        info!("Decoder reset, discarded {} in-flight units", discarded);
        self.state = SessionState::Idle;
    }

    fn update_state(&mut self) {
        self.state = if self.pipeline.occupancy() > 0 {
            SessionState::Decoding
        } else {
            SessionState::Idle
        };
    }
}
