use {crate::pretty_wrappers::PrettyHex, ash::vk};

/// The size in bytes of `VkPipelineCacheHeaderVersionOne`.
pub const PIPELINE_CACHE_HEADER_SIZE: usize = 32;

/// The identifiers which decide whether a pipeline cache blob may be reused.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct DeviceIdentity {
    pub vendor_id: u32,
    pub device_id: u32,
    pub pipeline_cache_uuid: [u8; vk::UUID_SIZE],
}

impl std::fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("vendor_id", &PrettyHex(self.vendor_id))
            .field("device_id", &PrettyHex(self.device_id))
            .field("pipeline_cache_uuid", &self.pipeline_cache_uuid)
            .finish()
    }
}

/// The header at the start of every pipeline cache blob, laid out exactly
/// like `VkPipelineCacheHeaderVersionOne` in native byte order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PipelineCacheHeader {
    pub header_size: u32,
    pub header_version: vk::PipelineCacheHeaderVersion,
    pub vendor_id: u32,
    pub device_id: u32,
    pub pipeline_cache_uuid: [u8; vk::UUID_SIZE],
}

impl PipelineCacheHeader {
    /// Read the header from the start of a cache blob.
    ///
    /// Returns None when the blob is too short to contain a header.
    pub fn parse(blob: &[u8]) -> Option<Self> {
        if blob.len() < PIPELINE_CACHE_HEADER_SIZE {
            return None;
        }
        let word = |index: usize| {
            let start = index * 4;
            u32::from_ne_bytes([
                blob[start],
                blob[start + 1],
                blob[start + 2],
                blob[start + 3],
            ])
        };
        let mut pipeline_cache_uuid = [0; vk::UUID_SIZE];
        pipeline_cache_uuid.copy_from_slice(&blob[16..32]);
        Some(Self {
            header_size: word(0),
            header_version: vk::PipelineCacheHeaderVersion::from_raw(
                word(1) as i32,
            ),
            vendor_id: word(2),
            device_id: word(3),
            pipeline_cache_uuid,
        })
    }

    /// Serialize the header in native byte order.
    pub fn to_bytes(&self) -> [u8; PIPELINE_CACHE_HEADER_SIZE] {
        let mut bytes = [0; PIPELINE_CACHE_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.header_size.to_ne_bytes());
        let version = self.header_version.as_raw() as u32;
        bytes[4..8].copy_from_slice(&version.to_ne_bytes());
        bytes[8..12].copy_from_slice(&self.vendor_id.to_ne_bytes());
        bytes[12..16].copy_from_slice(&self.device_id.to_ne_bytes());
        bytes[16..32].copy_from_slice(&self.pipeline_cache_uuid);
        bytes
    }

    /// True when the header was written by the given device.
    pub fn matches(&self, identity: DeviceIdentity) -> bool {
        self.vendor_id == identity.vendor_id
            && self.device_id == identity.device_id
            && self.pipeline_cache_uuid == identity.pipeline_cache_uuid
    }
}

/// Decide whether a stored blob can seed the pipeline cache for the given
/// device. Blobs which are short, have an inconsistent header, or were made
/// on another device are rejected.
pub fn validate_cache_blob(blob: &[u8], identity: DeviceIdentity) -> bool {
    let Some(header) = PipelineCacheHeader::parse(blob) else {
        log::debug!("Pipeline cache blob is too short to hold a header");
        return false;
    };
    if header.header_size as usize != PIPELINE_CACHE_HEADER_SIZE
        || header.header_version != vk::PipelineCacheHeaderVersion::ONE
    {
        log::debug!("Pipeline cache header is malformed: {:?}", header);
        return false;
    }
    if !header.matches(identity) {
        log::debug!(
            "Pipeline cache was created by vendor {} device {}, expected {:?}",
            PrettyHex(header.vendor_id),
            PrettyHex(header.device_id),
            identity
        );
        return false;
    }
    true
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    const IDENTITY: DeviceIdentity = DeviceIdentity {
        vendor_id: 0x10de,
        device_id: 0x2484,
        pipeline_cache_uuid: [7; vk::UUID_SIZE],
    };

    fn blob_for(vendor_id: u32, device_id: u32) -> Vec<u8> {
        let header = PipelineCacheHeader {
            header_size: PIPELINE_CACHE_HEADER_SIZE as u32,
            header_version: vk::PipelineCacheHeaderVersion::ONE,
            vendor_id,
            device_id,
            pipeline_cache_uuid: [7; vk::UUID_SIZE],
        };
        let mut blob = header.to_bytes().to_vec();
        blob.extend_from_slice(&[0xAB; 64]);
        blob
    }

    #[test]
    fn test_header_matches_native_layout() {
        let blob = blob_for(0x10de, 0x2484);
        let native = unsafe {
            std::ptr::read_unaligned(
                blob.as_ptr() as *const vk::PipelineCacheHeaderVersionOne
            )
        };
        assert_eq!(native.header_size, 32);
        assert_eq!(native.vendor_id, 0x10de);
        assert_eq!(native.device_id, 0x2484);
        assert_eq!(
            std::mem::size_of::<vk::PipelineCacheHeaderVersionOne>(),
            PIPELINE_CACHE_HEADER_SIZE
        );
    }

    #[test]
    fn test_parse_reads_identifiers() {
        let header = PipelineCacheHeader::parse(&blob_for(1, 2)).unwrap();
        assert_eq!(header.vendor_id, 1);
        assert_eq!(header.device_id, 2);
        assert_eq!(header.pipeline_cache_uuid, [7; vk::UUID_SIZE]);
    }

    #[test]
    fn test_matching_blob_is_valid() {
        assert!(validate_cache_blob(&blob_for(0x10de, 0x2484), IDENTITY));
    }

    #[test]
    fn test_mismatched_blob_is_rejected() {
        assert!(!validate_cache_blob(&blob_for(0x1002, 0x2484), IDENTITY));
        assert!(!validate_cache_blob(&blob_for(0x10de, 0x0001), IDENTITY));

        let other_driver = DeviceIdentity {
            pipeline_cache_uuid: [9; vk::UUID_SIZE],
            ..IDENTITY
        };
        assert!(!validate_cache_blob(&blob_for(0x10de, 0x2484), other_driver));
    }

    #[test]
    fn test_corrupt_blob_is_rejected() {
        assert!(!validate_cache_blob(&[], IDENTITY));
        assert!(!validate_cache_blob(&[1, 2, 3], IDENTITY));

        let mut blob = blob_for(0x10de, 0x2484);
        blob[0..4].copy_from_slice(&12_u32.to_ne_bytes());
        assert!(!validate_cache_blob(&blob, IDENTITY));
    }
}
