//! Raw-pointer side of the exported API.
//!
//! Every function here takes guest pointers, checks them (null first, then the
//! declared struct size, then contents) and turns the result into a status
//! code. Nothing in this module panics on bad guest input.

use crate::arena::Handle;
use crate::error::{check_size, HandleKind, VdecError};
use crate::runtime::Runtime;
use crate::session::{DecodeOutcome, FrameSlot};
use log::{error, trace};
use std::ffi::c_void;
use std::ptr::null_mut;
use vdec_types::abi::{
    AvcPictureInfo, ComputeConfigInfo, ComputeMemoryInfo, DecoderConfigInfo, DecoderMemoryInfo,
    FrameBuffer, InputData, OutputInfo, RawComputeQueue, RawDecoder, CODEC_TYPE_AVC,
    FRAME_BUFFER_SIZE, INPUT_DATA_SIZE, OK, OUTPUT_INFO_SIZE,
};
use vdec_types::AccessUnit;

fn status(call: &str, result: Result<(), VdecError>) -> i32 {
    match result {
        Ok(()) => OK,
        Err(e) => {
            error!("{}: {}", call, e);
            e.status()
        }
    }
}

fn decoder_handle(runtime: &Runtime, decoder: RawDecoder) -> Result<Handle, VdecError> {
    Handle::from_raw(decoder)
        .filter(|handle| runtime.has_decoder(*handle))
        .ok_or(VdecError::InvalidHandle(HandleKind::Decoder))
}

/// # Safety
/// `info` must be null or point to writable memory of the declared size.
pub unsafe fn query_compute_memory_info(runtime: &Runtime, info: *mut ComputeMemoryInfo) -> i32 {
    let result = match info.as_mut() {
        Some(info) => runtime.query_compute_memory_info(info),
        None => Err(VdecError::NullPointer("compute memory info")),
    };
    status("query_compute_memory_info", result)
}

/// # Safety
/// Every pointer must be null or valid for its struct.
pub unsafe fn allocate_compute_queue(
    runtime: &Runtime,
    config: *const ComputeConfigInfo,
    memory: *const ComputeMemoryInfo,
    queue_out: *mut RawComputeQueue,
) -> i32 {
    let result = (|| -> Result<(), VdecError> {
        let queue_out = queue_out
            .as_mut()
            .ok_or(VdecError::NullPointer("compute queue out"))?;
        let config = config
            .as_ref()
            .ok_or(VdecError::NullPointer("compute config info"))?;
        let memory = memory
            .as_ref()
            .ok_or(VdecError::NullPointer("compute memory info"))?;
        let handle = runtime.allocate_compute_queue(config, memory)?;
        *queue_out = handle.into_raw();
        Ok(())
    })();
    status("allocate_compute_queue", result)
}

pub fn release_compute_queue(runtime: &Runtime, queue: RawComputeQueue) -> i32 {
    let result = Handle::from_raw(queue)
        .ok_or(VdecError::InvalidHandle(HandleKind::ComputeQueue))
        .and_then(|handle| runtime.release_compute_queue(handle));
    status("release_compute_queue", result)
}

/// # Safety
/// `config` must be null or readable, `info` null or writable.
pub unsafe fn query_decoder_memory_info(
    runtime: &Runtime,
    config: *const DecoderConfigInfo,
    info: *mut DecoderMemoryInfo,
) -> i32 {
    let result = match (config.as_ref(), info.as_mut()) {
        (Some(config), Some(info)) => runtime.query_decoder_memory_info(config, info),
        (None, _) => Err(VdecError::NullPointer("decoder config info")),
        (_, None) => Err(VdecError::NullPointer("decoder memory info")),
    };
    status("query_decoder_memory_info", result)
}

/// # Safety
/// Every pointer must be null or valid for its struct.
pub unsafe fn create_decoder(
    runtime: &Runtime,
    config: *const DecoderConfigInfo,
    memory: *const DecoderMemoryInfo,
    decoder_out: *mut RawDecoder,
) -> i32 {
    let result = (|| -> Result<(), VdecError> {
        let decoder_out = decoder_out
            .as_mut()
            .ok_or(VdecError::NullPointer("decoder out"))?;
        *decoder_out = null_mut();
        let config = config
            .as_ref()
            .ok_or(VdecError::NullPointer("decoder config info"))?;
        let memory = memory
            .as_ref()
            .ok_or(VdecError::NullPointer("decoder memory info"))?;
        let handle = runtime.create_decoder(config, memory)?;
        *decoder_out = handle.into_raw();
        Ok(())
    })();
    status("create_decoder", result)
}

pub fn delete_decoder(runtime: &Runtime, decoder: RawDecoder) -> i32 {
    let result = Handle::from_raw(decoder)
        .ok_or(VdecError::InvalidHandle(HandleKind::Decoder))
        .and_then(|handle| runtime.delete_decoder(handle));
    status("delete_decoder", result)
}

unsafe fn frame_slot<'a>(frame: &FrameBuffer) -> FrameSlot<'a> {
    if frame.frame_buffer.is_null() || frame.frame_buffer_size == 0 {
        return FrameSlot::empty();
    }
    let buffer = std::slice::from_raw_parts_mut(
        frame.frame_buffer as *mut u8,
        frame.frame_buffer_size as usize,
    );
    FrameSlot::new(Some(buffer))
}

fn write_output(
    outcome: &DecodeOutcome,
    slot: &FrameSlot<'_>,
    frame: &mut FrameBuffer,
    output: &mut OutputInfo,
) {
    frame.is_accepted = slot.accepted();
    output.is_valid = outcome.is_valid;
    output.is_error_frame = outcome.is_error_frame;
    output.picture_count = outcome.picture_count;
    output.codec_type = outcome.codec_type;
    output.frame_width = outcome.frame_width;
    output.frame_pitch = outcome.frame_pitch;
    output.frame_height = outcome.frame_height;
    output.frame_buffer_size = outcome.frame_buffer_size;
    output.frame_buffer = if outcome.picture_count > 0 {
        frame.frame_buffer
    } else {
        null_mut()
    };
}

/// # Safety
/// Every pointer must be null or valid for its struct, and `au_data` /
/// `frame_buffer` inside them must cover their declared sizes.
pub unsafe fn decode(
    runtime: &Runtime,
    decoder: RawDecoder,
    input: *const InputData,
    frame: *mut FrameBuffer,
    output: *mut OutputInfo,
) -> i32 {
    trace!("decode: decoder {:p}", decoder);
    let result = (|| -> Result<(), VdecError> {
        let handle = decoder_handle(runtime, decoder)?;
        let input = input.as_ref().ok_or(VdecError::NullPointer("input data"))?;
        let frame = frame.as_mut().ok_or(VdecError::NullPointer("frame buffer"))?;
        let output = output.as_mut().ok_or(VdecError::NullPointer("output info"))?;
        check_size("input data", INPUT_DATA_SIZE, input.this_size)?;
        check_size("frame buffer", FRAME_BUFFER_SIZE, frame.this_size)?;
        check_size("output info", OUTPUT_INFO_SIZE, output.this_size)?;
        if input.au_data.is_null() || input.au_size == 0 {
            return Err(VdecError::EmptyAccessUnit);
        }

        let bytes = std::slice::from_raw_parts(input.au_data as *const u8, input.au_size as usize);
        let unit = AccessUnit {
            data: stabby::vec::Vec::from(bytes),
            pts: input.pts_data,
            dts: input.dts_data,
            attached_data: input.attached_data,
        };
        let mut slot = frame_slot(frame);
        let outcome = runtime.decode(handle, unit, &mut slot)?;
        write_output(&outcome, &slot, frame, output);
        Ok(())
    })();
    status("decode", result)
}

/// # Safety
/// Same contract as [`decode`].
pub unsafe fn flush(
    runtime: &Runtime,
    decoder: RawDecoder,
    frame: *mut FrameBuffer,
    output: *mut OutputInfo,
) -> i32 {
    let result = (|| -> Result<(), VdecError> {
        let handle = decoder_handle(runtime, decoder)?;
        let frame = frame.as_mut().ok_or(VdecError::NullPointer("frame buffer"))?;
        let output = output.as_mut().ok_or(VdecError::NullPointer("output info"))?;
        check_size("frame buffer", FRAME_BUFFER_SIZE, frame.this_size)?;
        check_size("output info", OUTPUT_INFO_SIZE, output.this_size)?;

        let mut slot = frame_slot(frame);
        let outcome = runtime.flush(handle, &mut slot)?;
        write_output(&outcome, &slot, frame, output);
        Ok(())
    })();
    status("flush", result)
}

pub fn reset(runtime: &Runtime, decoder: RawDecoder) -> i32 {
    let result = decoder_handle(runtime, decoder).and_then(|handle| runtime.reset(handle));
    status("reset", result)
}

/// # Safety
/// `output` must be null or readable; `first` null or writable for an
/// [`AvcPictureInfo`]. `_second` is never written.
pub unsafe fn get_picture_info(
    runtime: &Runtime,
    output: *const OutputInfo,
    first: *mut c_void,
    _second: *mut c_void,
) -> i32 {
    trace!("get_picture_info");
    let result = (|| -> Result<(), VdecError> {
        let output = output.as_ref().ok_or(VdecError::NullPointer("output info"))?;
        check_size("output info", OUTPUT_INFO_SIZE, output.this_size)?;
        // Nothing reported yet is a no-op regardless of what the outcome claims.
        if output.picture_count == 0 || runtime.pictures().is_empty() {
            return Ok(());
        }
        if first.is_null() && output.picture_count == 1 {
            return Ok(());
        }
        if output.codec_type != CODEC_TYPE_AVC {
            return Err(VdecError::Unimplemented("picture info for non-AVC codecs"));
        }
        if let Some(record) = runtime.picture_info(output.picture_count)? {
            (first as *mut AvcPictureInfo).write_unaligned(record.to_avc());
        }
        Ok(())
    })();
    status("get_picture_info", result)
}
