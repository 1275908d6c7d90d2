use {ash::vk, std::collections::HashMap};

/// Identifies a texture registered with the renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// The kind of image behind a registered texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureKind {
    Image2D,
    ImageCube,

    /// The color attachment of an off-screen framebuffer.
    Framebuffer2D,
}

/// The kind of image a sampler binding expects.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SamplerKind {
    Sampler2D,
    SamplerCube,
}

impl TextureKind {
    /// True when a texture of this kind may be bound to a sampler of the
    /// given kind.
    pub fn is_compatible_with(&self, sampler: SamplerKind) -> bool {
        matches!(
            (self, sampler),
            (Self::Image2D | Self::Framebuffer2D, SamplerKind::Sampler2D)
                | (Self::ImageCube, SamplerKind::SamplerCube)
        )
    }
}

/// The handles written into a combined image sampler descriptor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureHandles {
    pub image_view: vk::ImageView,
    pub sampler: vk::Sampler,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureEntry {
    pub kind: TextureKind,
    pub handles: TextureHandles,
}

/// Maps texture ids to the image handles used by descriptor writes.
///
/// Two placeholder textures are always present, one for 2D samplers and one
/// for cube samplers. Lookups that cannot be satisfied resolve to them.
pub struct TextureRegistry {
    entries: HashMap<TextureId, TextureEntry>,
    next_id: u32,
    missing_2d: (TextureId, TextureHandles),
    missing_cube: (TextureId, TextureHandles),
}

impl TextureRegistry {
    /// Create a registry with the two placeholder textures.
    pub fn new(
        missing_2d: TextureHandles,
        missing_cube: TextureHandles,
    ) -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
            next_id: 0,
            missing_2d: (TextureId(0), missing_2d),
            missing_cube: (TextureId(1), missing_cube),
        };
        registry.missing_2d.0 =
            registry.register(TextureKind::Image2D, missing_2d);
        registry.missing_cube.0 =
            registry.register(TextureKind::ImageCube, missing_cube);
        registry
    }

    pub fn register(
        &mut self,
        kind: TextureKind,
        handles: TextureHandles,
    ) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, TextureEntry { kind, handles });
        id
    }

    /// Swap the handles of an existing texture, used when a framebuffer's
    /// color image is recreated. Placeholders are never replaced.
    pub fn replace(&mut self, id: TextureId, handles: TextureHandles) -> bool {
        if self.is_placeholder(id) {
            return false;
        }
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.handles = handles;
                true
            }
            None => false,
        }
    }

    /// True for registered textures other than the placeholders and
    /// framebuffer color attachments, which belong to their framebuffer.
    pub fn is_removable(&self, id: TextureId) -> bool {
        !self.is_placeholder(id)
            && self
                .entries
                .get(&id)
                .is_some_and(|entry| entry.kind != TextureKind::Framebuffer2D)
    }

    /// Remove a texture. Returns None when the texture is not removable.
    pub fn remove(&mut self, id: TextureId) -> Option<TextureEntry> {
        if !self.is_removable(id) {
            return None;
        }
        self.entries.remove(&id)
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureEntry> {
        self.entries.get(&id)
    }

    pub fn missing_2d(&self) -> TextureId {
        self.missing_2d.0
    }

    pub fn missing_cube(&self) -> TextureId {
        self.missing_cube.0
    }

    pub fn is_placeholder(&self, id: TextureId) -> bool {
        id == self.missing_2d.0 || id == self.missing_cube.0
    }

    /// Every registered texture, placeholders included.
    pub fn iter(&self) -> impl Iterator<Item = (&TextureId, &TextureEntry)> {
        self.entries.iter()
    }

    /// The handles to bind for `id` at a sampler of kind `sampler`.
    pub fn resolve(
        &self,
        id: Option<TextureId>,
        sampler: SamplerKind,
    ) -> TextureHandles {
        let found = id
            .and_then(|id| self.entries.get(&id))
            .filter(|entry| entry.kind.is_compatible_with(sampler));
        match found {
            Some(entry) => entry.handles,
            None => self.placeholder(sampler),
        }
    }

    fn placeholder(&self, sampler: SamplerKind) -> TextureHandles {
        match sampler {
            SamplerKind::Sampler2D => self.missing_2d.1,
            SamplerKind::SamplerCube => self.missing_cube.1,
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, ash::vk::Handle, pretty_assertions::assert_eq};

    fn handles(raw: u64) -> TextureHandles {
        TextureHandles {
            image_view: vk::ImageView::from_raw(raw),
            sampler: vk::Sampler::from_raw(raw + 1000),
        }
    }

    fn registry() -> TextureRegistry {
        TextureRegistry::new(handles(1), handles(2))
    }

    #[test]
    fn test_known_texture_resolves_to_its_handles() {
        let mut registry = registry();
        let id = registry.register(TextureKind::Image2D, handles(7));
        assert_eq!(
            registry.resolve(Some(id), SamplerKind::Sampler2D),
            handles(7)
        );
    }

    #[test]
    fn test_framebuffer_textures_bind_to_2d_samplers() {
        let mut registry = registry();
        let id = registry.register(TextureKind::Framebuffer2D, handles(8));
        assert_eq!(
            registry.resolve(Some(id), SamplerKind::Sampler2D),
            handles(8)
        );
        assert_eq!(
            registry.resolve(Some(id), SamplerKind::SamplerCube),
            handles(2)
        );
    }

    #[test]
    fn test_invalid_ids_resolve_to_the_same_placeholder() {
        let mut registry = registry();
        let cube = registry.register(TextureKind::ImageCube, handles(9));

        let absent = registry.resolve(None, SamplerKind::Sampler2D);
        let unknown =
            registry.resolve(Some(TextureId(4242)), SamplerKind::Sampler2D);
        let wrong_kind = registry.resolve(Some(cube), SamplerKind::Sampler2D);

        assert_eq!(absent, handles(1));
        assert_eq!(unknown, absent);
        assert_eq!(wrong_kind, absent);
    }

    #[test]
    fn test_only_added_textures_can_be_removed() {
        let mut registry = registry();
        let missing = registry.missing_2d();
        assert_eq!(registry.remove(missing), None);
        assert!(registry.get(missing).is_some());

        let framebuffer =
            registry.register(TextureKind::Framebuffer2D, handles(4));
        assert!(!registry.is_removable(framebuffer));
        assert_eq!(registry.remove(framebuffer), None);

        let id = registry.register(TextureKind::Image2D, handles(3));
        assert!(registry.is_removable(id));
        assert!(registry.remove(id).is_some());
        assert!(!registry.is_removable(id));
        assert_eq!(
            registry.resolve(Some(id), SamplerKind::Sampler2D),
            handles(1)
        );
    }
}
