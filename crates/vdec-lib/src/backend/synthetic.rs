use crate::memory::nv12_frame_layout;
use crate::session::DecoderConfig;
use log::trace;
use std::collections::VecDeque;
use vdec_types::{
    AccessUnit, BackendError, DecodeBackend, DecodedPicture, PictureInfo, PictureResult,
};

const MACROBLOCK: u32 = 16;
const CHROMA_NEUTRAL: u8 = 0x80;

/// Stand-in engine that produces blank NV12 pictures at the session's maximum
/// geometry. It never looks inside the bitstream; the luma level only varies
/// with the submission index so consecutive frames are distinguishable.
///
/// A picture becomes ready once `latency` newer units have been submitted
/// after it.
pub struct SyntheticBackend {
    width: u32,
    height: u32,
    pitch: u32,
    frame_size: u64,
    profile_idc: u8,
    level_idc: u8,
    latency: u32,
    pending: VecDeque<(u64, AccessUnit)>,
    submitted: u64,
    completed_since_reset: u64,
}

impl SyntheticBackend {
    pub fn new(config: &DecoderConfig, latency: u32) -> Self {
        let (pitch, frame_size) =
            nv12_frame_layout(config.max_frame_width, config.max_frame_height);
        Self {
            width: config.max_frame_width,
            height: config.max_frame_height,
            pitch,
            frame_size,
            profile_idc: config.profile as u8,
            level_idc: config.max_level as u8,
            latency,
            pending: VecDeque::new(),
            submitted: 0,
            completed_since_reset: 0,
        }
    }

    fn complete(&mut self, index: u64, unit: AccessUnit) -> PictureResult {
        let luma_plane = self.pitch as usize * self.height.div_ceil(MACROBLOCK) as usize * 16;
        let mut pixels = vec![CHROMA_NEUTRAL; self.frame_size as usize];
        let luma = 16 + (index % 220) as u8;
        let luma_end = luma_plane.min(pixels.len());
        pixels[..luma_end].fill(luma);

        let width_in_mbs = self.width.div_ceil(MACROBLOCK);
        let height_in_mbs = self.height.div_ceil(MACROBLOCK);
        // 4:2:0 crop offsets are expressed in units of two samples.
        let info = PictureInfo {
            is_idr: self.completed_since_reset == 0,
            profile_idc: self.profile_idc,
            level_idc: self.level_idc,
            pic_struct: 0,
            frame_mbs_only: true,
            field_pic: false,
            bottom_field: false,
            width_in_mbs,
            height_in_map_units: height_in_mbs,
            crop_left: 0,
            crop_right: (width_in_mbs * MACROBLOCK - self.width) / 2,
            crop_top: 0,
            crop_bottom: (height_in_mbs * MACROBLOCK - self.height) / 2,
        };
        self.completed_since_reset += 1;
        trace!("Synthetic picture {} completed (pts {})", index, unit.pts);

        let picture: Result<DecodedPicture, BackendError> = Ok(DecodedPicture {
            width: self.width,
            height: self.height,
            pitch: self.pitch,
            pixels: stabby::vec::Vec::from(&pixels[..]),
            pts: unit.pts,
            dts: unit.dts,
            attached_data: unit.attached_data,
            info,
        });
        picture.into()
    }
}

impl DecodeBackend for SyntheticBackend {
    extern "C" fn send_access_unit(
        &mut self,
        unit: AccessUnit,
    ) -> stabby::result::Result<(), BackendError> {
        if unit.data.is_empty() {
            let rejected: Result<(), BackendError> =
                Err(BackendError::CorruptStream("empty access unit".into()));
            return rejected.into();
        }
        self.pending.push_back((self.submitted, unit));
        self.submitted += 1;
        Result::<(), BackendError>::Ok(()).into()
    }

    extern "C" fn receive_picture(&mut self) -> stabby::option::Option<PictureResult> {
        if self.pending.len() as u64 <= self.latency as u64 {
            return Option::<PictureResult>::None.into();
        }
        self.drain_picture()
    }

    extern "C" fn drain_picture(&mut self) -> stabby::option::Option<PictureResult> {
        let next = self
            .pending
            .pop_front()
            .map(|(index, unit)| self.complete(index, unit));
        next.into()
    }

    extern "C" fn pending(&self) -> u32 {
        self.pending.len() as u32
    }

    extern "C" fn reset(&mut self) {
        self.pending.clear();
        self.completed_since_reset = 0;
    }
}
