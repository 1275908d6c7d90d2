//! Management of the single device-local buffer which holds all vertex,
//! index, and uniform data.

mod main_buffer;
mod managed_buffer;
mod region_allocator;

pub use self::{
    main_buffer::{grown_capacity, grown_staging_capacity, MainBuffer},
    managed_buffer::ManagedBuffer,
    region_allocator::{align_up, MemoryRegion, RegionAllocator},
};

/// The kind of data stored in a main buffer region. Determines alignment.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferDataType {
    Vertex,
    Index,
    Uniform,
}

impl BufferDataType {
    /// Vertex and index data is aligned to 4 bytes, uniform data to the
    /// device's minimum uniform buffer offset alignment.
    pub fn alignment(&self, min_uniform_alignment: u64) -> u64 {
        match self {
            Self::Vertex | Self::Index => 4,
            Self::Uniform => min_uniform_alignment.max(1),
        }
    }
}
