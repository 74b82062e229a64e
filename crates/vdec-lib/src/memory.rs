//! Memory sizing for compute queues and decoder instances.
//!
//! Nothing here allocates: the guest owns every region and only asks how
//! large each one has to be. All sizes are a fixed floor, raised only when
//! the largest frame the config allows would not fit.

use crate::error::{check_size, VdecError};
use std::ptr::null_mut;
use vdec_types::abi::{
    ComputeMemoryInfo, DecoderConfigInfo, DecoderMemoryInfo, COMPUTE_MEMORY_INFO_SIZE,
    DECODER_CONFIG_INFO_SIZE, DECODER_MEMORY_INFO_SIZE,
};

pub const PITCH_ALIGNMENT: u32 = 256;
pub const HEIGHT_ALIGNMENT: u32 = 16;

/// Pitch and byte size of one NV12 frame at the given geometry.
pub fn nv12_frame_layout(width: u32, height: u32) -> (u32, u64) {
    let pitch = align_up(width, PITCH_ALIGNMENT);
    let rows = align_up(height, HEIGHT_ALIGNMENT) as u64;
    (pitch, pitch as u64 * rows * 3 / 2)
}

fn align_up(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub base: usize,
    pub size: u64,
}

/// Guest-owned memory a decoder was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryLayout {
    pub cpu: Region,
    pub gpu: Region,
    pub cpu_gpu: Region,
    pub max_frame_buffer_size: u64,
    pub frame_buffer_alignment: u32,
}

impl MemoryLayout {
    pub fn from_raw(info: &DecoderMemoryInfo) -> Result<Self, VdecError> {
        check_size("decoder memory info", DECODER_MEMORY_INFO_SIZE, info.this_size)?;
        Ok(Self {
            cpu: Region {
                base: info.cpu_memory as usize,
                size: info.cpu_memory_size,
            },
            gpu: Region {
                base: info.gpu_memory as usize,
                size: info.gpu_memory_size,
            },
            cpu_gpu: Region {
                base: info.cpu_gpu_memory as usize,
                size: info.cpu_gpu_memory_size,
            },
            max_frame_buffer_size: info.max_frame_buffer_size,
            frame_buffer_alignment: info.frame_buffer_alignment,
        })
    }
}

pub struct MemoryNegotiator {
    floor: u64,
    frame_buffer_alignment: u32,
}

impl MemoryNegotiator {
    pub fn new(floor: u64, frame_buffer_alignment: u32) -> Self {
        Self {
            floor,
            frame_buffer_alignment,
        }
    }

    pub fn query_compute_memory(&self, info: &mut ComputeMemoryInfo) -> Result<(), VdecError> {
        check_size("compute memory info", COMPUTE_MEMORY_INFO_SIZE, info.this_size)?;
        info.cpu_gpu_memory = null_mut();
        info.cpu_gpu_memory_size = self.floor;
        Ok(())
    }

    pub fn query_decoder_memory(
        &self,
        config: &DecoderConfigInfo,
        info: &mut DecoderMemoryInfo,
    ) -> Result<(), VdecError> {
        check_size("decoder config info", DECODER_CONFIG_INFO_SIZE, config.this_size)?;
        check_size("decoder memory info", DECODER_MEMORY_INFO_SIZE, info.this_size)?;

        let width = config.max_frame_width.max(0) as u32;
        let height = config.max_frame_height.max(0) as u32;
        let (_, frame_size) = nv12_frame_layout(width, height);

        info.cpu_memory = null_mut();
        info.gpu_memory = null_mut();
        info.cpu_gpu_memory = null_mut();
        info.cpu_memory_size = self.floor;
        info.gpu_memory_size = self.floor;
        info.cpu_gpu_memory_size = self.floor;
        info.max_frame_buffer_size = self.floor.max(frame_size);
        info.frame_buffer_alignment = self.frame_buffer_alignment;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VdecError;

    const FLOOR: u64 = 32 * 1024 * 1024;

    fn negotiator() -> MemoryNegotiator {
        MemoryNegotiator::new(FLOOR, 0x100)
    }

    #[test]
    fn test_compute_memory_reports_floor() {
        let mut info = ComputeMemoryInfo::default();
        info.cpu_gpu_memory = 0x1000 as *mut _;
        negotiator().query_compute_memory(&mut info).unwrap();
        assert_eq!(info.cpu_gpu_memory_size, FLOOR);
        assert!(info.cpu_gpu_memory.is_null());
    }

    #[test]
    fn test_compute_memory_size_mismatch_leaves_struct_untouched() {
        let mut info = ComputeMemoryInfo {
            this_size: 0x10,
            cpu_gpu_memory_size: 7,
            cpu_gpu_memory: std::ptr::null_mut(),
        };
        let err = negotiator().query_compute_memory(&mut info).unwrap_err();
        assert!(matches!(err, VdecError::VersionMismatch { .. }));
        assert_eq!(info.cpu_gpu_memory_size, 7);
    }

    #[test]
    fn test_decoder_memory_fills_every_region() {
        let config = DecoderConfigInfo {
            max_frame_width: 1920,
            max_frame_height: 1080,
            ..Default::default()
        };
        let mut info = DecoderMemoryInfo::default();
        negotiator().query_decoder_memory(&config, &mut info).unwrap();
        assert_eq!(info.cpu_memory_size, FLOOR);
        assert_eq!(info.gpu_memory_size, FLOOR);
        assert_eq!(info.cpu_gpu_memory_size, FLOOR);
        assert_eq!(info.max_frame_buffer_size, FLOOR);
        assert_eq!(info.frame_buffer_alignment, 0x100);
    }

    #[test]
    fn test_decoder_memory_grows_for_large_frames() {
        let config = DecoderConfigInfo {
            max_frame_width: 7680,
            max_frame_height: 4320,
            ..Default::default()
        };
        let mut info = DecoderMemoryInfo::default();
        negotiator().query_decoder_memory(&config, &mut info).unwrap();
        assert_eq!(info.max_frame_buffer_size, 7680 * 4320 * 3 / 2);
    }

    #[test]
    fn test_decoder_memory_rejects_either_bad_size() {
        let mut bad_config = DecoderConfigInfo::default();
        bad_config.this_size = 0x40;
        let mut info = DecoderMemoryInfo::default();
        info.cpu_memory_size = 3;
        assert!(negotiator()
            .query_decoder_memory(&bad_config, &mut info)
            .is_err());
        assert_eq!(info.cpu_memory_size, 3);

        let config = DecoderConfigInfo::default();
        let mut bad_info = DecoderMemoryInfo::default();
        bad_info.this_size = 0x50;
        assert!(negotiator()
            .query_decoder_memory(&config, &mut bad_info)
            .is_err());
        assert_eq!(bad_info.cpu_memory_size, 0);
    }

    #[test]
    fn test_nv12_layout_alignment() {
        assert_eq!(nv12_frame_layout(1920, 1080), (2048, 2048 * 1088 * 3 / 2));
        assert_eq!(nv12_frame_layout(256, 16), (256, 256 * 16 * 3 / 2));
    }
}
