//! Process-wide state behind the exported entry points.
//!
//! One [`Runtime`] owns the compute queue registry, the decoder session table
//! and the picture info queue. The exported functions reach it through
//! [`runtime`]; it is built from the environment on first use unless
//! [`configure`] installed one earlier.

use crate::arena::{Handle, HandleArena};
use crate::backend::{BackendFactory, SyntheticBackendFactory};
use crate::compute_queue::ComputeQueueRegistry;
use crate::config::LibConfig;
use crate::error::{HandleKind, VdecError};
use crate::memory::{MemoryLayout, MemoryNegotiator};
use crate::picture_queue::{PictureInfoQueue, PictureInfoRecord};
use crate::session::{DecodeOutcome, DecoderConfig, DecoderSession, FrameSlot};
use log::{error, info, warn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;
use vdec_types::abi::{
    ComputeConfigInfo, ComputeMemoryInfo, DecoderConfigInfo, DecoderMemoryInfo,
};
use vdec_types::AccessUnit;

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// The process-wide runtime, created from `VDEC_*` variables if needed.
pub fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| Runtime::new(LibConfig::from_env()))
}

/// Installs the process-wide runtime. Fails once the runtime exists.
pub fn configure(config: LibConfig) -> Result<(), VdecError> {
    install(Runtime::new(config))
}

pub fn configure_with_backend(
    config: LibConfig,
    backends: Box<dyn BackendFactory>,
) -> Result<(), VdecError> {
    install(Runtime::with_backend_factory(config, backends))
}

fn install(runtime: Runtime) -> Result<(), VdecError> {
    RUNTIME
        .set(runtime)
        .map_err(|_| VdecError::AlreadyInitialized)
}

// Each session has its own lock; the table lock only covers lookups.
type SharedSession = Arc<Mutex<DecoderSession>>;

pub struct Runtime {
    config: LibConfig,
    negotiator: MemoryNegotiator,
    compute_queues: Mutex<ComputeQueueRegistry>,
    sessions: Mutex<HandleArena<SharedSession>>,
    pictures: PictureInfoQueue,
    backends: Box<dyn BackendFactory>,
}

impl Runtime {
    pub fn new(config: LibConfig) -> Self {
        let backends = Box::new(SyntheticBackendFactory::new(config.backend_latency));
        Self::with_backend_factory(config, backends)
    }

    pub fn with_backend_factory(config: LibConfig, backends: Box<dyn BackendFactory>) -> Self {
        Self {
            negotiator: MemoryNegotiator::new(config.memory_floor, config.frame_buffer_alignment),
            compute_queues: Mutex::new(ComputeQueueRegistry::new(config.max_compute_queues)),
            sessions: Mutex::new(HandleArena::with_capacity(config.max_sessions)),
            pictures: PictureInfoQueue::new(config.picture_history),
            backends,
            config,
        }
    }

    pub fn config(&self) -> &LibConfig {
        &self.config
    }

    pub fn pictures(&self) -> &PictureInfoQueue {
        &self.pictures
    }

    pub fn query_compute_memory_info(&self, info: &mut ComputeMemoryInfo) -> Result<(), VdecError> {
        self.negotiator.query_compute_memory(info)
    }

    pub fn allocate_compute_queue(
        &self,
        config: &ComputeConfigInfo,
        memory: &ComputeMemoryInfo,
    ) -> Result<Handle, VdecError> {
        self.compute_queues.lock().allocate(config, memory)
    }

    pub fn release_compute_queue(&self, handle: Handle) -> Result<(), VdecError> {
        self.compute_queues.lock().release(handle).map(|_| ())
    }

    pub fn query_decoder_memory_info(
        &self,
        config: &DecoderConfigInfo,
        info: &mut DecoderMemoryInfo,
    ) -> Result<(), VdecError> {
        self.negotiator.query_decoder_memory(config, info)
    }

    pub fn create_decoder(
        &self,
        config: &DecoderConfigInfo,
        memory: &DecoderMemoryInfo,
    ) -> Result<Handle, VdecError> {
        let config = DecoderConfig::from_raw(config)?;
        let memory = MemoryLayout::from_raw(memory)?;

        if let Some(queue) = config.compute_queue {
            if self.compute_queues.lock().get(queue).is_none() {
                warn!("Decoder created with unknown compute queue {}", queue);
            }
        }

        let backend = self.backends.create(&config)?;
        let session = Arc::new(Mutex::new(DecoderSession::new(config, memory, backend)));
        let handle = self.sessions.lock().insert(session).map_err(|_| {
            error!(
                "Decoder limit of {} sessions reached",
                self.config.max_sessions
            );
            VdecError::AllocationFailed("decoder session")
        })?;
        info!("Created decoder {}", handle);
        Ok(handle)
    }

    pub fn delete_decoder(&self, handle: Handle) -> Result<(), VdecError> {
        let session = self
            .sessions
            .lock()
            .remove(handle)
            .ok_or(VdecError::InvalidHandle(HandleKind::Decoder))?;
        info!(
            "Deleted decoder {} with {} units in flight",
            handle,
            session.lock().occupancy()
        );
        Ok(())
    }

    pub fn has_decoder(&self, handle: Handle) -> bool {
        self.sessions.lock().get(handle).is_some()
    }

    fn session(&self, handle: Handle) -> Result<SharedSession, VdecError> {
        self.sessions
            .lock()
            .get(handle)
            .cloned()
            .ok_or(VdecError::InvalidHandle(HandleKind::Decoder))
    }

    pub fn decode(
        &self,
        handle: Handle,
        unit: AccessUnit,
        slot: &mut FrameSlot<'_>,
    ) -> Result<DecodeOutcome, VdecError> {
        let session = self.session(handle)?;
        let mut session = session.lock();
        session.decode(unit, slot, &self.pictures)
    }

    pub fn flush(
        &self,
        handle: Handle,
        slot: &mut FrameSlot<'_>,
    ) -> Result<DecodeOutcome, VdecError> {
        let session = self.session(handle)?;
        let mut session = session.lock();
        Ok(session.flush(slot, &self.pictures))
    }

    pub fn reset(&self, handle: Handle) -> Result<(), VdecError> {
        self.session(handle)?.lock().reset();
        Ok(())
    }

    /// Record to report for an outcome claiming `picture_count` pictures.
    ///
    /// Only single-picture outcomes have a defined record; more than one is
    /// reported as unimplemented rather than guessed at.
    pub fn picture_info(&self, picture_count: u8) -> Result<Option<PictureInfoRecord>, VdecError> {
        match picture_count {
            0 => Ok(None),
            1 => Ok(self.pictures.read_latest(self.config.picture_info_read)),
            _ => Err(VdecError::Unimplemented("picture info for more than one picture")),
        }
    }

    pub fn live_decoders(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn live_compute_queues(&self) -> usize {
        self.compute_queues.lock().len()
    }

    /// Drops every session, compute queue and picture record.
    pub fn shutdown(&self) {
        let decoders = {
            let mut sessions = self.sessions.lock();
            let live = sessions.len();
            sessions.clear();
            live
        };
        let queues = {
            let mut compute_queues = self.compute_queues.lock();
            let live = compute_queues.len();
            compute_queues.clear();
            live
        };
        self.pictures.clear();
        info!(
            "Runtime shut down ({} decoders, {} compute queues released)",
            decoders, queues
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PictureInfoRead;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};
    use vdec_types::{
        BackendError, BoxedBackend, DecodeBackend, DecodedPicture, PictureInfo, PictureResult,
    };

    /// Never completes on its own and takes a while to drain, announcing each
    /// drain on `draining`.
    struct SlowDrainBackend {
        pending: VecDeque<AccessUnit>,
        draining: mpsc::Sender<()>,
    }

    impl DecodeBackend for SlowDrainBackend {
        extern "C" fn send_access_unit(
            &mut self,
            unit: AccessUnit,
        ) -> stabby::result::Result<(), BackendError> {
            self.pending.push_back(unit);
            Result::<(), BackendError>::Ok(()).into()
        }

        extern "C" fn receive_picture(&mut self) -> stabby::option::Option<PictureResult> {
            Option::<PictureResult>::None.into()
        }

        extern "C" fn drain_picture(&mut self) -> stabby::option::Option<PictureResult> {
            let _ = self.draining.send(());
            thread::sleep(Duration::from_millis(500));
            let next: Option<PictureResult> = self.pending.pop_front().map(|unit| {
                let picture: Result<DecodedPicture, BackendError> = Ok(DecodedPicture {
                    width: 16,
                    height: 2,
                    pitch: 16,
                    pixels: stabby::vec::Vec::from(&[0u8; 48][..]),
                    pts: unit.pts,
                    dts: unit.dts,
                    attached_data: unit.attached_data,
                    info: PictureInfo::default(),
                });
                picture.into()
            });
            next.into()
        }

        extern "C" fn pending(&self) -> u32 {
            self.pending.len() as u32
        }

        extern "C" fn reset(&mut self) {
            self.pending.clear();
        }
    }

    fn decoder_config() -> DecoderConfigInfo {
        DecoderConfigInfo {
            max_frame_width: 64,
            max_frame_height: 32,
            decode_pipeline_depth: 2,
            ..Default::default()
        }
    }

    fn access_unit(pts: u64) -> AccessUnit {
        AccessUnit {
            data: stabby::vec::Vec::from(&[1u8, 2, 3][..]),
            pts,
            dts: pts,
            attached_data: 0,
        }
    }

    #[test]
    fn test_create_decode_delete() {
        let runtime = Runtime::new(LibConfig::default());
        let handle = runtime
            .create_decoder(&decoder_config(), &DecoderMemoryInfo::default())
            .unwrap();
        assert_eq!(runtime.live_decoders(), 1);

        let mut buffer = vec![0u8; 1 << 20];
        let mut slot = FrameSlot::new(Some(buffer.as_mut_slice()));
        let outcome = runtime.decode(handle, access_unit(3), &mut slot).unwrap();
        assert_eq!(outcome.picture_count, 1);
        assert_eq!(outcome.frame_width, 64);
        assert_eq!(outcome.frame_pitch, 256);
        assert_eq!(runtime.picture_info(1).unwrap().unwrap().pts, 3);

        runtime.delete_decoder(handle).unwrap();
        assert_eq!(runtime.live_decoders(), 0);
        assert_eq!(
            runtime.delete_decoder(handle),
            Err(VdecError::InvalidHandle(HandleKind::Decoder))
        );
    }

    #[test]
    fn test_stale_handle_has_no_side_effects() {
        let runtime = Runtime::new(LibConfig::default());
        let handle = runtime
            .create_decoder(&decoder_config(), &DecoderMemoryInfo::default())
            .unwrap();
        runtime.delete_decoder(handle).unwrap();

        let mut slot = FrameSlot::empty();
        assert_eq!(
            runtime.decode(handle, access_unit(0), &mut slot),
            Err(VdecError::InvalidHandle(HandleKind::Decoder))
        );
        assert!(runtime.flush(handle, &mut slot).is_err());
        assert!(runtime.reset(handle).is_err());
        assert!(runtime.pictures().is_empty());
    }

    #[test]
    fn test_bad_config_creates_nothing() {
        let runtime = Runtime::new(LibConfig::default());
        let mut config = decoder_config();
        config.this_size = 0x50;
        assert!(matches!(
            runtime.create_decoder(&config, &DecoderMemoryInfo::default()),
            Err(VdecError::VersionMismatch { .. })
        ));
        let mut memory = DecoderMemoryInfo::default();
        memory.this_size = 0;
        assert!(runtime.create_decoder(&decoder_config(), &memory).is_err());
        assert_eq!(runtime.live_decoders(), 0);
    }

    #[test]
    fn test_session_limit() {
        let runtime = Runtime::new(LibConfig {
            max_sessions: 1,
            ..Default::default()
        });
        runtime
            .create_decoder(&decoder_config(), &DecoderMemoryInfo::default())
            .unwrap();
        assert_eq!(
            runtime.create_decoder(&decoder_config(), &DecoderMemoryInfo::default()),
            Err(VdecError::AllocationFailed("decoder session"))
        );
    }

    #[test]
    fn test_picture_info_policies() {
        let peek = Runtime::new(LibConfig::default());
        let pop = Runtime::new(LibConfig {
            picture_info_read: PictureInfoRead::Pop,
            ..Default::default()
        });
        for runtime in [&peek, &pop] {
            let handle = runtime
                .create_decoder(&decoder_config(), &DecoderMemoryInfo::default())
                .unwrap();
            let mut buffer = vec![0u8; 1 << 20];
            let mut slot = FrameSlot::new(Some(buffer.as_mut_slice()));
            runtime.decode(handle, access_unit(9), &mut slot).unwrap();
        }

        assert_eq!(peek.picture_info(1).unwrap().unwrap().pts, 9);
        assert_eq!(peek.picture_info(1).unwrap().unwrap().pts, 9);
        assert_eq!(pop.picture_info(1).unwrap().unwrap().pts, 9);
        assert!(pop.picture_info(1).unwrap().is_none());

        assert!(peek.picture_info(0).unwrap().is_none());
        assert!(matches!(
            peek.picture_info(2),
            Err(VdecError::Unimplemented(_))
        ));
    }

    #[test]
    fn test_custom_backend_factory_errors_propagate() {
        let runtime = Runtime::with_backend_factory(
            LibConfig::default(),
            Box::new(|_: &DecoderConfig| -> Result<vdec_types::BoxedBackend, VdecError> {
                Err(VdecError::AllocationFailed("decode engine"))
            }),
        );
        assert_eq!(
            runtime.create_decoder(&decoder_config(), &DecoderMemoryInfo::default()),
            Err(VdecError::AllocationFailed("decode engine"))
        );
        assert_eq!(runtime.live_decoders(), 0);
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let runtime = Runtime::new(LibConfig::default());
        let decoder = runtime
            .create_decoder(&decoder_config(), &DecoderMemoryInfo::default())
            .unwrap();
        let queue = runtime
            .allocate_compute_queue(&ComputeConfigInfo::default(), &ComputeMemoryInfo::default())
            .unwrap();

        runtime.shutdown();
        assert_eq!(runtime.live_decoders(), 0);
        assert_eq!(runtime.live_compute_queues(), 0);
        assert!(!runtime.has_decoder(decoder));
        assert!(runtime.release_compute_queue(queue).is_err());
    }

    #[test]
    fn test_blocking_drain_does_not_stall_other_sessions() {
        let (draining, drain_started) = mpsc::channel();
        let draining = Mutex::new(draining);
        let runtime = Arc::new(Runtime::with_backend_factory(
            LibConfig::default(),
            Box::new(
                move |_: &DecoderConfig| -> Result<BoxedBackend, VdecError> {
                    let backend = SlowDrainBackend {
                        pending: VecDeque::new(),
                        draining: draining.lock().clone(),
                    };
                    Ok(stabby::boxed::Box::new(backend).into())
                },
            ),
        ));
        let config = DecoderConfigInfo {
            decode_pipeline_depth: 1,
            ..decoder_config()
        };
        let slow = runtime
            .create_decoder(&config, &DecoderMemoryInfo::default())
            .unwrap();
        let other = runtime
            .create_decoder(&config, &DecoderMemoryInfo::default())
            .unwrap();

        let worker = {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                let mut buffer = vec![0u8; 1024];
                for pts in 0..2 {
                    let mut slot = FrameSlot::new(Some(buffer.as_mut_slice()));
                    runtime.decode(slow, access_unit(pts), &mut slot).unwrap();
                }
            })
        };

        drain_started.recv_timeout(Duration::from_secs(5)).unwrap();
        let started = Instant::now();
        runtime.reset(other).unwrap();
        assert!(runtime.has_decoder(other));
        assert!(started.elapsed() < Duration::from_millis(250));
        worker.join().unwrap();
    }
}
