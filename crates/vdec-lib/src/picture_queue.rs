//! Metadata of completed pictures, shared by every decoder in the process.
//!
//! Decode completions are the only producer and `get_picture_info` the only
//! consumer. The queue keeps a bounded history so peeking readers cannot make
//! it grow without limit.

use crate::config::PictureInfoRead;
use parking_lot::Mutex;
use std::collections::VecDeque;
use vdec_types::abi::{AvcPictureInfo, AVC_PICTURE_INFO_SIZE};
use vdec_types::{DecodedPicture, PictureInfo};

#[derive(Debug, Clone, Copy)]
pub struct PictureInfoRecord {
    pub pts: u64,
    pub dts: u64,
    pub attached_data: u64,
    pub info: PictureInfo,
}

impl PictureInfoRecord {
    pub fn from_picture(picture: &DecodedPicture) -> Self {
        Self {
            pts: picture.pts,
            dts: picture.dts,
            attached_data: picture.attached_data,
            info: picture.info,
        }
    }

    pub fn to_avc(&self) -> AvcPictureInfo {
        let info = &self.info;
        AvcPictureInfo {
            this_size: AVC_PICTURE_INFO_SIZE,
            is_valid: true,
            pts_data: self.pts,
            dts_data: self.dts,
            attached_data: self.attached_data,
            idr_picture_flag: info.is_idr as u8,
            profile_idc: info.profile_idc,
            level_idc: info.level_idc,
            pic_width_in_mbs_minus1: info.width_in_mbs.saturating_sub(1),
            pic_height_in_map_units_minus1: info.height_in_map_units.saturating_sub(1),
            frame_mbs_only_flag: info.frame_mbs_only as u8,
            frame_cropping_flag: (info.crop_left
                | info.crop_right
                | info.crop_top
                | info.crop_bottom
                != 0) as u8,
            frame_crop_left_offset: info.crop_left,
            frame_crop_right_offset: info.crop_right,
            frame_crop_top_offset: info.crop_top,
            frame_crop_bottom_offset: info.crop_bottom,
            pic_struct: info.pic_struct,
            field_pic_flag: info.field_pic as u8,
            bottom_field_flag: info.bottom_field as u8,
        }
    }
}

pub struct PictureInfoQueue {
    records: Mutex<VecDeque<PictureInfoRecord>>,
    history: usize,
}

impl PictureInfoQueue {
    pub fn new(history: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            history: history.max(1),
        }
    }

    pub(crate) fn push(&self, record: PictureInfoRecord) {
        let mut records = self.records.lock();
        if records.len() == self.history {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Newest record, removed or kept depending on `policy`.
    pub fn read_latest(&self, policy: PictureInfoRead) -> Option<PictureInfoRecord> {
        let mut records = self.records.lock();
        match policy {
            PictureInfoRead::Peek => records.back().copied(),
            PictureInfoRead::Pop => records.pop_back(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}
