use {
    crate::{pretty_wrappers::PrettySize, AllocatorError},
    indoc::indoc,
    std::collections::BTreeMap,
};

/// A contiguous range of bytes inside the main buffer.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct MemoryRegion {
    pub offset: u64,
    pub size: u64,
}

impl MemoryRegion {
    fn end(&self) -> u64 {
        self.offset + self.size
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("offset", &self.offset)
            .field("size", &PrettySize(self.size))
            .finish()
    }
}

/// Round `value` up to the next multiple of `alignment`.
///
/// Values which are already a multiple of the alignment are untouched.
pub fn align_up(value: u64, alignment: u64) -> u64 {
    num::Integer::div_ceil(&value, &alignment) * alignment
}

/// Tracks used and free regions of one large device buffer.
///
/// The allocator never touches GPU memory itself. It only hands out offsets,
/// the owner of the buffer is responsible for growing it when a request
/// cannot be satisfied.
pub struct RegionAllocator {
    capacity: u64,

    /// Free regions keyed by offset. Neighbors are always coalesced so no two
    /// entries are adjacent.
    free_regions: BTreeMap<u64, u64>,

    /// Allocated regions keyed by the offset returned to the caller.
    used_regions: BTreeMap<u64, u64>,
}

// Public API
// ----------

impl RegionAllocator {
    /// Create an allocator which manages `capacity` bytes starting at zero.
    pub fn new(capacity: u64) -> Self {
        let mut free_regions = BTreeMap::new();
        if capacity > 0 {
            free_regions.insert(0, capacity);
        }
        Self {
            capacity,
            free_regions,
            used_regions: BTreeMap::new(),
        }
    }

    /// The number of bytes managed by this allocator.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The end of the highest allocated region. Everything past this offset
    /// is free.
    pub fn high_water_mark(&self) -> u64 {
        self.used_regions
            .iter()
            .next_back()
            .map(|(offset, size)| offset + size)
            .unwrap_or(0)
    }

    /// Request a region of `size` bytes whose offset is a multiple of
    /// `alignment`.
    ///
    /// Both the size and the offset are rounded up to the alignment. The free
    /// region with the lowest offset that can hold the request is split and
    /// the remainder stays in the free list.
    pub fn request_memory(
        &mut self,
        size: u64,
        alignment: u64,
    ) -> Result<u64, AllocatorError> {
        if alignment == 0 {
            return Err(AllocatorError::ZeroAlignment);
        }
        let aligned_size = align_up(size.max(1), alignment);

        let (region_offset, region_size, aligned_offset) = self
            .free_regions
            .iter()
            .map(|(&offset, &size)| (offset, size, align_up(offset, alignment)))
            .find(|&(offset, size, aligned_offset)| {
                aligned_offset + aligned_size <= offset + size
            })
            .ok_or(AllocatorError::OutOfRegions(
                PrettySize(aligned_size),
                alignment,
            ))?;

        self.free_regions.remove(&region_offset);
        if aligned_offset > region_offset {
            self.free_regions
                .insert(region_offset, aligned_offset - region_offset);
        }
        let allocated_end = aligned_offset + aligned_size;
        let region_end = region_offset + region_size;
        if region_end > allocated_end {
            self.free_regions
                .insert(allocated_end, region_end - allocated_end);
        }
        self.used_regions.insert(aligned_offset, aligned_size);

        log::trace!(
            "Allocated {:?} for a request of {} bytes",
            MemoryRegion {
                offset: aligned_offset,
                size: aligned_size
            },
            size
        );

        Ok(aligned_offset)
    }

    /// Return the region starting at `offset` to the free list.
    ///
    /// The freed region is merged with the free regions directly before and
    /// after it.
    pub fn free_memory(&mut self, offset: u64) -> Result<(), AllocatorError> {
        let size = self
            .used_regions
            .remove(&offset)
            .ok_or(AllocatorError::UnknownRegion(offset))?;
        self.insert_free(MemoryRegion { offset, size });
        Ok(())
    }

    /// Grow the managed range to `new_capacity` bytes. The new tail is added
    /// to the free list. Shrinking is ignored.
    pub fn extend(&mut self, new_capacity: u64) {
        if new_capacity <= self.capacity {
            return;
        }
        let tail = MemoryRegion {
            offset: self.capacity,
            size: new_capacity - self.capacity,
        };
        self.capacity = new_capacity;
        self.insert_free(tail);
    }

    /// The size of the region allocated at `offset`, if any.
    pub fn region_size(&self, offset: u64) -> Option<u64> {
        self.used_regions.get(&offset).copied()
    }

    /// All currently allocated regions in offset order.
    pub fn used_regions(&self) -> Vec<MemoryRegion> {
        self.used_regions
            .iter()
            .map(|(&offset, &size)| MemoryRegion { offset, size })
            .collect()
    }

    /// All currently free regions in offset order.
    pub fn free_regions(&self) -> Vec<MemoryRegion> {
        self.free_regions
            .iter()
            .map(|(&offset, &size)| MemoryRegion { offset, size })
            .collect()
    }
}

// Private API
// -----------

impl RegionAllocator {
    fn insert_free(&mut self, region: MemoryRegion) {
        let mut merged = region;

        let previous = self
            .free_regions
            .range(..region.offset)
            .next_back()
            .map(|(&offset, &size)| MemoryRegion { offset, size });
        if let Some(previous) = previous {
            if previous.end() == merged.offset {
                self.free_regions.remove(&previous.offset);
                merged = MemoryRegion {
                    offset: previous.offset,
                    size: previous.size + merged.size,
                };
            }
        }

        if let Some(next_size) = self.free_regions.remove(&region.end()) {
            merged.size += next_size;
        }

        self.free_regions.insert(merged.offset, merged.size);
    }
}

impl std::fmt::Display for RegionAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            indoc!(
                "
                # Region Allocator

                capacity: {}
                used regions: {}
                free regions: {}
                "
            ),
            PrettySize(self.capacity),
            self.used_regions.len(),
            self.free_regions.len(),
        ))
    }
}

#[cfg(test)]
mod test {
    use {super::*, assert2::assert, pretty_assertions::assert_eq};

    fn regions(list: &[(u64, u64)]) -> Vec<MemoryRegion> {
        list.iter()
            .map(|&(offset, size)| MemoryRegion { offset, size })
            .collect()
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(128, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
        assert_eq!(align_up(7, 4), 8);
    }

    #[test]
    fn test_requests_are_rounded_to_alignment() -> Result<(), AllocatorError>
    {
        let mut allocator = RegionAllocator::new(4096);

        let offsets = [
            allocator.request_memory(128, 256)?,
            allocator.request_memory(256, 256)?,
            allocator.request_memory(64, 256)?,
        ];

        assert_eq!(offsets, [0, 256, 512]);
        assert_eq!(allocator.free_regions(), regions(&[(768, 4096 - 768)]));
        Ok(())
    }

    #[test]
    fn test_lowest_offset_region_is_reused() -> Result<(), AllocatorError> {
        let mut allocator = RegionAllocator::new(1024);
        let a = allocator.request_memory(100, 4)?;
        let b = allocator.request_memory(100, 4)?;
        let _c = allocator.request_memory(100, 4)?;

        allocator.free_memory(b)?;
        allocator.free_memory(a)?;

        assert_eq!(allocator.free_regions(), regions(&[(0, 200), (300, 724)]));
        assert_eq!(allocator.request_memory(40, 4)?, 0);
        assert_eq!(allocator.request_memory(200, 4)?, 300);
        Ok(())
    }

    #[test]
    fn test_offset_alignment_leaves_gap_free() -> Result<(), AllocatorError> {
        let mut allocator = RegionAllocator::new(1024);
        assert_eq!(allocator.request_memory(4, 4)?, 0);
        assert_eq!(allocator.request_memory(64, 64)?, 64);
        assert_eq!(allocator.free_regions(), regions(&[(4, 60), (128, 896)]));
        assert_eq!(allocator.request_memory(8, 4)?, 4);
        Ok(())
    }

    #[test]
    fn test_free_merges_both_neighbors() -> Result<(), AllocatorError> {
        let mut allocator = RegionAllocator::new(300);
        let a = allocator.request_memory(100, 1)?;
        let b = allocator.request_memory(100, 1)?;
        let c = allocator.request_memory(100, 1)?;

        allocator.free_memory(a)?;
        allocator.free_memory(c)?;
        assert_eq!(allocator.free_regions(), regions(&[(0, 100), (200, 100)]));

        allocator.free_memory(b)?;
        assert_eq!(allocator.free_regions(), regions(&[(0, 300)]));
        Ok(())
    }

    #[test]
    fn test_request_fails_when_no_region_fits() -> Result<(), AllocatorError>
    {
        let mut allocator = RegionAllocator::new(512);
        allocator.request_memory(256, 256)?;
        assert!(
            let Err(AllocatorError::OutOfRegions(_, 256)) =
                allocator.request_memory(257, 256)
        );
        Ok(())
    }

    #[test]
    fn test_free_unknown_offset_fails() {
        let mut allocator = RegionAllocator::new(512);
        assert!(
            let Err(AllocatorError::UnknownRegion(32)) =
                allocator.free_memory(32)
        );
    }

    #[test]
    fn test_zero_alignment_is_rejected() {
        let mut allocator = RegionAllocator::new(512);
        assert!(
            let Err(AllocatorError::ZeroAlignment) =
                allocator.request_memory(1, 0)
        );
    }

    #[test]
    fn test_extend_coalesces_with_free_tail() -> Result<(), AllocatorError> {
        let mut allocator = RegionAllocator::new(256);
        allocator.request_memory(128, 4)?;
        allocator.extend(512);

        assert_eq!(allocator.capacity(), 512);
        assert_eq!(allocator.free_regions(), regions(&[(128, 384)]));
        assert_eq!(allocator.request_memory(384, 4)?, 128);
        Ok(())
    }

    #[test]
    fn test_smoke_test_never_overlaps() -> Result<(), AllocatorError> {
        let mut allocator = RegionAllocator::new(64 * 1024);
        let mut live = vec![];

        for i in 0..2_000_u64 {
            let size = (i * 37) % 500 + 1;
            let alignment = [1, 4, 16, 256][(i % 4) as usize];
            if let Ok(offset) = allocator.request_memory(size, alignment) {
                assert_eq!(offset % alignment, 0);
                live.push(offset);
            }
            if i % 3 == 0 && !live.is_empty() {
                let offset = live.remove((i as usize * 7) % live.len());
                allocator.free_memory(offset)?;
            }

            let used = allocator.used_regions();
            for pair in used.windows(2) {
                assert!(pair[0].end() <= pair[1].offset);
            }
        }

        for offset in live.drain(..) {
            allocator.free_memory(offset)?;
        }

        assert_eq!(allocator.free_regions(), regions(&[(0, 64 * 1024)]));
        assert_eq!(allocator.request_memory(64 * 1024, 1)?, 0);
        Ok(())
    }
}
