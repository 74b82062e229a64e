pub mod abi;

use stabby::option::Option;
use stabby::result::Result;
use stabby::string::String;
use stabby::vec::Vec;

#[stabby::stabby]
#[repr(stabby)]
#[derive(Debug, Clone)]
pub enum BackendError {
    CorruptStream(String),
    Unsupported(String),
    DeviceLost(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let output = self.match_ref(
            |e| format!("corrupt stream: {}", e),
            |e| format!("unsupported: {}", e),
            |e| format!("device lost: {}", e),
        );
        write!(f, "{}", output)
    }
}

/// One compressed unit handed to a backend. The payload is copied out of guest
/// memory so the backend may hold it past the submitting call.
#[stabby::stabby]
#[derive(Debug, Clone)]
pub struct AccessUnit {
    pub data: Vec<u8>,
    pub pts: u64,
    pub dts: u64,
    pub attached_data: u64,
}

/// Codec-level description of a completed picture.
#[stabby::stabby]
#[derive(Debug, Clone, Copy, Default)]
pub struct PictureInfo {
    pub is_idr: bool,
    pub profile_idc: u8,
    pub level_idc: u8,
    pub pic_struct: u8,
    pub frame_mbs_only: bool,
    pub field_pic: bool,
    pub bottom_field: bool,
    pub width_in_mbs: u32,
    pub height_in_map_units: u32,
    pub crop_left: u32,
    pub crop_right: u32,
    pub crop_top: u32,
    pub crop_bottom: u32,
}

#[stabby::stabby]
#[derive(Debug, Clone)]
pub struct DecodedPicture {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub pixels: Vec<u8>,
    pub pts: u64,
    pub dts: u64,
    pub attached_data: u64,
    pub info: PictureInfo,
}

pub type PictureResult = Result<DecodedPicture, BackendError>;

/// Decode engine behind a session.
///
/// Completions must come back in submission order. `receive_picture` never
/// blocks; `drain_picture` forces the oldest pending unit to complete and only
/// returns `None` when nothing is pending.
#[stabby::stabby]
pub trait DecodeBackend {
    extern "C" fn send_access_unit(&mut self, unit: AccessUnit) -> Result<(), BackendError>;
    extern "C" fn receive_picture(&mut self) -> Option<PictureResult>;
    extern "C" fn drain_picture(&mut self) -> Option<PictureResult>;
    extern "C" fn pending(&self) -> u32;
    extern "C" fn reset(&mut self);
}

pub type BoxedBackend = stabby::dynptr!(stabby::boxed::Box<dyn DecodeBackend + Send>);
