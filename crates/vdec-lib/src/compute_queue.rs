use crate::arena::{Handle, HandleArena};
use crate::error::{check_size, HandleKind, VdecError};
use log::info;
use vdec_types::abi::{
    ComputeConfigInfo, ComputeMemoryInfo, COMPUTE_CONFIG_INFO_SIZE, COMPUTE_MEMORY_INFO_SIZE,
};

/// Scheduling lane a guest reserved for decode work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeQueue {
    pub pipe_id: u16,
    pub queue_id: u16,
    pub check_memory_type: bool,
    pub memory_size: u64,
}

pub struct ComputeQueueRegistry {
    queues: HandleArena<ComputeQueue>,
}

impl ComputeQueueRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: HandleArena::with_capacity(capacity),
        }
    }

    pub fn allocate(
        &mut self,
        config: &ComputeConfigInfo,
        memory: &ComputeMemoryInfo,
    ) -> Result<Handle, VdecError> {
        check_size("compute config info", COMPUTE_CONFIG_INFO_SIZE, config.this_size)?;
        check_size("compute memory info", COMPUTE_MEMORY_INFO_SIZE, memory.this_size)?;

        let queue = ComputeQueue {
            pipe_id: config.compute_pipe_id,
            queue_id: config.compute_queue_id,
            check_memory_type: config.check_memory_type,
            memory_size: memory.cpu_gpu_memory_size,
        };
        let handle = self
            .queues
            .insert(queue)
            .map_err(|_| VdecError::AllocationFailed("compute queue"))?;
        info!(
            "Allocated compute queue {} (pipe {}, queue {})",
            handle, queue.pipe_id, queue.queue_id
        );
        Ok(handle)
    }

    pub fn release(&mut self, handle: Handle) -> Result<ComputeQueue, VdecError> {
        let queue = self
            .queues
            .remove(handle)
            .ok_or(VdecError::InvalidHandle(HandleKind::ComputeQueue))?;
        info!("Released compute queue {}", handle);
        Ok(queue)
    }

    pub fn get(&self, handle: Handle) -> Option<&ComputeQueue> {
        self.queues.get(handle)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }
}
