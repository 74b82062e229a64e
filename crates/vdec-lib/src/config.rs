use log::warn;
use std::env;
use std::str::FromStr;

const MIB: u64 = 1024 * 1024;

/// How `get_picture_info` treats the record it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureInfoRead {
    /// Return the newest record and keep it queued.
    Peek,
    /// Return the newest record and remove it.
    Pop,
}

impl FromStr for PictureInfoRead {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "peek" => Ok(PictureInfoRead::Peek),
            "pop" => Ok(PictureInfoRead::Pop),
            other => Err(format!("unknown picture info read policy {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LibConfig {
    pub memory_floor: u64,
    pub frame_buffer_alignment: u32,
    pub max_sessions: usize,
    pub max_compute_queues: usize,
    pub picture_history: usize,
    pub picture_info_read: PictureInfoRead,
    pub backend_latency: u32,
}

impl Default for LibConfig {
    fn default() -> Self {
        Self {
            memory_floor: 32 * MIB,
            frame_buffer_alignment: 32 * MIB as u32,
            max_sessions: 64,
            max_compute_queues: 16,
            picture_history: 64,
            picture_info_read: PictureInfoRead::Peek,
            backend_latency: 0,
        }
    }
}

impl LibConfig {
    /// Reads `VDEC_*` overrides on top of the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            memory_floor: parse_or(
                &lookup,
                "VDEC_MEMORY_FLOOR_MB",
                defaults.memory_floor / MIB,
            ) * MIB,
            frame_buffer_alignment: parse_or(
                &lookup,
                "VDEC_FRAME_BUFFER_ALIGNMENT",
                defaults.frame_buffer_alignment,
            ),
            max_sessions: parse_or(&lookup, "VDEC_MAX_SESSIONS", defaults.max_sessions),
            max_compute_queues: parse_or(
                &lookup,
                "VDEC_MAX_COMPUTE_QUEUES",
                defaults.max_compute_queues,
            ),
            picture_history: parse_or(&lookup, "VDEC_PICTURE_HISTORY", defaults.picture_history),
            picture_info_read: parse_or(
                &lookup,
                "VDEC_PICTURE_INFO_READ",
                defaults.picture_info_read,
            ),
            backend_latency: parse_or(&lookup, "VDEC_BACKEND_LATENCY", defaults.backend_latency),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match parse_value::<T>(&raw) {
        Some(value) => value,
        None => {
            warn!("Ignoring malformed {}={:?}, using {:?}", key, raw, default);
            default
        }
    }
}

// Accepts hex with a 0x prefix for integer settings.
fn parse_value<T: FromStr>(raw: &str) -> Option<T> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        let value = u64::from_str_radix(hex, 16).ok()?;
        return value.to_string().parse().ok();
    }
    raw.parse().ok()
}
