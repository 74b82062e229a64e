//! Raw structs exchanged with guest code.
//!
//! Every struct starts with `this_size`, the size the caller compiled against.
//! Layouts are `#[repr(C)]` and must stay bit-for-bit identical to the guest
//! headers; the sizes are asserted at the bottom of this file.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::null_mut;

/// Opaque decoder instance as seen by the guest.
pub type RawDecoder = *mut c_void;
/// Opaque compute queue as seen by the guest.
pub type RawComputeQueue = *mut c_void;

pub const OK: i32 = 0;
pub const ERROR_API_FAIL: i32 = 0x811D0100_u32 as i32;
pub const ERROR_STRUCT_SIZE: i32 = 0x811D0101_u32 as i32;
pub const ERROR_ARGUMENT_POINTER: i32 = 0x811D0102_u32 as i32;
pub const ERROR_DECODER_INSTANCE: i32 = 0x811D0103_u32 as i32;
pub const ERROR_CONFIG_INFO: i32 = 0x811D0109_u32 as i32;
pub const ERROR_PIPELINE_DEPTH: i32 = 0x811D010D_u32 as i32;
pub const ERROR_ACCESS_UNIT: i32 = 0x811D0114_u32 as i32;

pub const COMPUTE_MEMORY_INFO_SIZE: u64 = 0x18;
pub const COMPUTE_CONFIG_INFO_SIZE: u64 = 0x10;
pub const DECODER_CONFIG_INFO_SIZE: u64 = 0x48;
pub const DECODER_MEMORY_INFO_SIZE: u64 = 0x48;
pub const INPUT_DATA_SIZE: u64 = 0x30;
pub const FRAME_BUFFER_SIZE: u64 = 0x20;
pub const OUTPUT_INFO_SIZE: u64 = 0x30;
pub const AVC_PICTURE_INFO_SIZE: u64 = 0x50;

/// Codec identifiers accepted in `codec_type`.
pub const CODEC_TYPE_AVC: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ComputeMemoryInfo {
    pub this_size: u64,
    pub cpu_gpu_memory_size: u64,
    pub cpu_gpu_memory: *mut c_void,
}

impl Default for ComputeMemoryInfo {
    fn default() -> Self {
        Self {
            this_size: COMPUTE_MEMORY_INFO_SIZE,
            cpu_gpu_memory_size: 0,
            cpu_gpu_memory: null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ComputeConfigInfo {
    pub this_size: u64,
    pub compute_pipe_id: u16,
    pub compute_queue_id: u16,
    pub check_memory_type: bool,
    pub reserved0: u8,
    pub reserved1: u16,
}

impl Default for ComputeConfigInfo {
    fn default() -> Self {
        Self {
            this_size: COMPUTE_CONFIG_INFO_SIZE,
            compute_pipe_id: 0,
            compute_queue_id: 0,
            check_memory_type: false,
            reserved0: 0,
            reserved1: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DecoderConfigInfo {
    pub this_size: u64,
    pub resource_type: u32,
    pub codec_type: u32,
    pub profile: u32,
    pub max_level: u32,
    pub max_frame_width: i32,
    pub max_frame_height: i32,
    pub max_dpb_frame_count: i32,
    pub decode_pipeline_depth: u32,
    pub compute_queue: RawComputeQueue,
    pub cpu_affinity_mask: u64,
    pub cpu_thread_priority: i32,
    pub optimize_progressive_video: bool,
    pub check_memory_type: bool,
    pub reserved0: u8,
    pub reserved1: u8,
    pub extra_config_info: *mut c_void,
}

impl Default for DecoderConfigInfo {
    fn default() -> Self {
        Self {
            this_size: DECODER_CONFIG_INFO_SIZE,
            resource_type: 0,
            codec_type: CODEC_TYPE_AVC,
            profile: 0,
            max_level: 0,
            max_frame_width: 0,
            max_frame_height: 0,
            max_dpb_frame_count: 0,
            decode_pipeline_depth: 1,
            compute_queue: null_mut(),
            cpu_affinity_mask: 0,
            cpu_thread_priority: 0,
            optimize_progressive_video: false,
            check_memory_type: false,
            reserved0: 0,
            reserved1: 0,
            extra_config_info: null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DecoderMemoryInfo {
    pub this_size: u64,
    pub cpu_memory_size: u64,
    pub cpu_memory: *mut c_void,
    pub gpu_memory_size: u64,
    pub gpu_memory: *mut c_void,
    pub cpu_gpu_memory_size: u64,
    pub cpu_gpu_memory: *mut c_void,
    pub max_frame_buffer_size: u64,
    pub frame_buffer_alignment: u32,
    pub reserved0: u32,
}

impl Default for DecoderMemoryInfo {
    fn default() -> Self {
        Self {
            this_size: DECODER_MEMORY_INFO_SIZE,
            cpu_memory_size: 0,
            cpu_memory: null_mut(),
            gpu_memory_size: 0,
            gpu_memory: null_mut(),
            cpu_gpu_memory_size: 0,
            cpu_gpu_memory: null_mut(),
            max_frame_buffer_size: 0,
            frame_buffer_alignment: 0,
            reserved0: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    pub this_size: u64,
    pub au_data: *mut c_void,
    pub au_size: u64,
    pub pts_data: u64,
    pub dts_data: u64,
    pub attached_data: u64,
}

impl Default for InputData {
    fn default() -> Self {
        Self {
            this_size: INPUT_DATA_SIZE,
            au_data: null_mut(),
            au_size: 0,
            pts_data: 0,
            dts_data: 0,
            attached_data: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OutputInfo {
    pub this_size: u64,
    pub is_valid: bool,
    pub is_error_frame: bool,
    pub picture_count: u8,
    pub codec_type: u32,
    pub frame_width: u32,
    pub frame_pitch: u32,
    pub frame_height: u32,
    pub frame_buffer: *mut c_void,
    pub frame_buffer_size: u64,
}

impl Default for OutputInfo {
    fn default() -> Self {
        Self {
            this_size: OUTPUT_INFO_SIZE,
            is_valid: false,
            is_error_frame: false,
            picture_count: 0,
            codec_type: 0,
            frame_width: 0,
            frame_pitch: 0,
            frame_height: 0,
            frame_buffer: null_mut(),
            frame_buffer_size: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FrameBuffer {
    pub this_size: u64,
    pub frame_buffer: *mut c_void,
    pub frame_buffer_size: u64,
    pub is_accepted: bool,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self {
            this_size: FRAME_BUFFER_SIZE,
            frame_buffer: null_mut(),
            frame_buffer_size: 0,
            is_accepted: false,
        }
    }
}

/// Per-picture metadata returned by `get_picture_info` for AVC streams.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvcPictureInfo {
    pub this_size: u64,
    pub is_valid: bool,
    pub pts_data: u64,
    pub dts_data: u64,
    pub attached_data: u64,
    pub idr_picture_flag: u8,
    pub profile_idc: u8,
    pub level_idc: u8,
    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    pub frame_mbs_only_flag: u8,
    pub frame_cropping_flag: u8,
    pub frame_crop_left_offset: u32,
    pub frame_crop_right_offset: u32,
    pub frame_crop_top_offset: u32,
    pub frame_crop_bottom_offset: u32,
    pub pic_struct: u8,
    pub field_pic_flag: u8,
    pub bottom_field_flag: u8,
}

const _: () = assert!(size_of::<ComputeMemoryInfo>() as u64 == COMPUTE_MEMORY_INFO_SIZE);
const _: () = assert!(size_of::<ComputeConfigInfo>() as u64 == COMPUTE_CONFIG_INFO_SIZE);
const _: () = assert!(size_of::<DecoderConfigInfo>() as u64 == DECODER_CONFIG_INFO_SIZE);
const _: () = assert!(size_of::<DecoderMemoryInfo>() as u64 == DECODER_MEMORY_INFO_SIZE);
const _: () = assert!(size_of::<InputData>() as u64 == INPUT_DATA_SIZE);
const _: () = assert!(size_of::<FrameBuffer>() as u64 == FRAME_BUFFER_SIZE);
const _: () = assert!(size_of::<OutputInfo>() as u64 == OUTPUT_INFO_SIZE);
const _: () = assert!(size_of::<AvcPictureInfo>() as u64 == AVC_PICTURE_INFO_SIZE);
