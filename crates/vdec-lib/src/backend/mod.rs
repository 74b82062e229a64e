//! Decode engines a session can be bound to.
//!
//! Sessions only see [`vdec_types::DecodeBackend`] through a stabby box, so an
//! engine built in another dylib plugs in the same way as the built-in one.

mod synthetic;

pub use synthetic::SyntheticBackend;

use crate::error::VdecError;
use crate::session::DecoderConfig;
use vdec_types::BoxedBackend;

/// Builds one backend per decoder session.
pub trait BackendFactory: Send + Sync {
    fn create(&self, config: &DecoderConfig) -> Result<BoxedBackend, VdecError>;
}

impl<F> BackendFactory for F
where
    F: Fn(&DecoderConfig) -> Result<BoxedBackend, VdecError> + Send + Sync,
{
    fn create(&self, config: &DecoderConfig) -> Result<BoxedBackend, VdecError> {
        self(config)
    }
}

pub struct SyntheticBackendFactory {
    latency: u32,
}

impl SyntheticBackendFactory {
    pub fn new(latency: u32) -> Self {
        Self { latency }
    }
}

impl BackendFactory for SyntheticBackendFactory {
    fn create(&self, config: &DecoderConfig) -> Result<BoxedBackend, VdecError> {
        let backend = SyntheticBackend::new(config, self.latency);
        Ok(stabby::boxed::Box::new(backend).into())
    }
}
