//! Emulation of the `vdec2` video decode library.
//!
//! The exported `vdec2_*` functions follow the guest ABI in
//! [`vdec_types::abi`]: raw pointers, versioned structs and `i32` status codes.
//! They all go through the process-wide [`Runtime`].

pub mod abi;
pub mod arena;
pub mod backend;
pub mod compute_queue;
pub mod config;
pub mod error;
pub mod memory;
pub mod picture_queue;
pub mod runtime;
pub mod session;

pub use backend::{BackendFactory, SyntheticBackend, SyntheticBackendFactory};
pub use config::{LibConfig, PictureInfoRead};
pub use error::{HandleKind, VdecError};
pub use runtime::{configure, configure_with_backend, runtime, Runtime};

use log::info;
use std::ffi::c_void;
use vdec_types::abi::{
    ComputeConfigInfo, ComputeMemoryInfo, DecoderConfigInfo, DecoderMemoryInfo, FrameBuffer,
    InputData, OutputInfo, RawComputeQueue, RawDecoder,
};

#[stabby::stabby]
#[stabby::export]
pub fn vdec_init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// # Safety
/// `info` must be null or point to a writable [`ComputeMemoryInfo`].
#[no_mangle]
pub unsafe extern "C" fn vdec2_query_compute_memory_info(info: *mut ComputeMemoryInfo) -> i32 {
    info!("vdec2_query_compute_memory_info");
    abi::query_compute_memory_info(runtime(), info)
}

/// # Safety
/// Each pointer must be null or valid for its struct.
#[no_mangle]
pub unsafe extern "C" fn vdec2_allocate_compute_queue(
    config: *const ComputeConfigInfo,
    memory: *const ComputeMemoryInfo,
    queue_out: *mut RawComputeQueue,
) -> i32 {
    info!("vdec2_allocate_compute_queue");
    abi::allocate_compute_queue(runtime(), config, memory, queue_out)
}

#[no_mangle]
pub extern "C" fn vdec2_release_compute_queue(queue: RawComputeQueue) -> i32 {
    info!("vdec2_release_compute_queue: {:p}", queue);
    abi::release_compute_queue(runtime(), queue)
}

/// # Safety
/// `config` must be null or readable, `info` null or writable.
#[no_mangle]
pub unsafe extern "C" fn vdec2_query_decoder_memory_info(
    config: *const DecoderConfigInfo,
    info: *mut DecoderMemoryInfo,
) -> i32 {
    info!("vdec2_query_decoder_memory_info");
    abi::query_decoder_memory_info(runtime(), config, info)
}

/// # Safety
/// Each pointer must be null or valid for its struct.
#[no_mangle]
pub unsafe extern "C" fn vdec2_create_decoder(
    config: *const DecoderConfigInfo,
    memory: *const DecoderMemoryInfo,
    decoder_out: *mut RawDecoder,
) -> i32 {
    info!("vdec2_create_decoder");
    abi::create_decoder(runtime(), config, memory, decoder_out)
}

#[no_mangle]
pub extern "C" fn vdec2_delete_decoder(decoder: RawDecoder) -> i32 {
    info!("vdec2_delete_decoder: {:p}", decoder);
    abi::delete_decoder(runtime(), decoder)
}

/// # Safety
/// Each pointer must be null or valid for its struct; the access unit and
/// frame buffer they reference must cover their declared sizes.
#[no_mangle]
pub unsafe extern "C" fn vdec2_decode(
    decoder: RawDecoder,
    input: *const InputData,
    frame: *mut FrameBuffer,
    output: *mut OutputInfo,
) -> i32 {
    abi::decode(runtime(), decoder, input, frame, output)
}

/// # Safety
/// Same contract as [`vdec2_decode`].
#[no_mangle]
pub unsafe extern "C" fn vdec2_flush(
    decoder: RawDecoder,
    frame: *mut FrameBuffer,
    output: *mut OutputInfo,
) -> i32 {
    info!("vdec2_flush: {:p}", decoder);
    abi::flush(runtime(), decoder, frame, output)
}

#[no_mangle]
pub extern "C" fn vdec2_reset(decoder: RawDecoder) -> i32 {
    info!("vdec2_reset: {:p}", decoder);
    abi::reset(runtime(), decoder)
}

/// # Safety
/// `output` must be null or readable; `first` null or writable for the
/// picture info record of the output's codec.
#[no_mangle]
pub unsafe extern "C" fn vdec2_get_picture_info(
    output: *const OutputInfo,
    first: *mut c_void,
    second: *mut c_void,
) -> i32 {
    abi::get_picture_info(runtime(), output, first, second)
}

/// Releases every decoder, compute queue and picture record.
#[no_mangle]
pub extern "C" fn vdec_shutdown() {
    info!("vdec_shutdown");
    runtime().shutdown();
}
