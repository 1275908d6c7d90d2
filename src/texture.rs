//! Sampled images, their staged upload, and the placeholder textures.

use {
    crate::{
        command::OneTimeCommands, descriptor::TextureHandles,
        descriptor::TextureKind, gpu_memory::ManagedBuffer,
        pretty_wrappers::PrettySize, MemoryProperties, RendererError,
    },
    anyhow::Context,
    ash::vk,
};

const BYTES_PER_PIXEL: usize = 4;

/// RGBA8 pixel data for a texture. Cube textures hold their six faces one
/// after another in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TextureResource {
    pub width: u32,
    pub height: u32,
    pub kind: TextureKind,
    pub pixels: Vec<u8>,
}

impl TextureResource {
    pub fn image_2d(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            kind: TextureKind::Image2D,
            pixels,
        }
    }

    pub fn cube(width: u32, height: u32, faces: [Vec<u8>; 6]) -> Self {
        Self {
            width,
            height,
            kind: TextureKind::ImageCube,
            pixels: faces.concat(),
        }
    }

    /// A 2x2 magenta and black checkerboard.
    pub fn missing_2d() -> Self {
        Self::image_2d(2, 2, checkerboard())
    }

    /// The 2D placeholder on every face.
    pub fn missing_cube() -> Self {
        Self::cube(2, 2, std::array::from_fn(|_| checkerboard()))
    }

    pub fn layer_count(&self) -> u32 {
        match self.kind {
            TextureKind::ImageCube => 6,
            _ => 1,
        }
    }

    /// The number of bytes `pixels` must hold.
    pub fn expected_len(&self) -> usize {
        self.width as usize
            * self.height as usize
            * BYTES_PER_PIXEL
            * self.layer_count() as usize
    }

    /// Check the dimensions against the pixel data.
    pub fn validate(&self) -> Result<(), RendererError> {
        if self.kind == TextureKind::Framebuffer2D {
            return Err(anyhow::anyhow!(
                "Framebuffer textures are created by the renderer"
            )
            .into());
        }
        if self.width == 0 || self.height == 0 {
            return Err(anyhow::anyhow!(
                "Texture has an empty extent {}x{}",
                self.width,
                self.height
            )
            .into());
        }
        if self.pixels.len() != self.expected_len() {
            return Err(anyhow::anyhow!(
                "Texture {}x{} needs {} of pixel data but has {}",
                self.width,
                self.height,
                PrettySize(self.expected_len() as u64),
                PrettySize(self.pixels.len() as u64)
            )
            .into());
        }
        Ok(())
    }
}

fn checkerboard() -> Vec<u8> {
    let magenta = [255, 0, 255, 255];
    let black = [0, 0, 0, 255];
    [magenta, black, black, magenta].concat()
}

/// Describes an image with its own dedicated memory allocation.
#[derive(Debug, Copy, Clone)]
pub struct ImageDescription {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
    pub cube: bool,
}

/// An image, its memory, and a view over every layer.
#[derive(Debug)]
pub struct ImageResource {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub description: ImageDescription,
}

impl ImageResource {
    /// Create a device local image and a view for it.
    ///
    /// # Safety
    ///
    /// Unsafe because `destroy()` must be called before the device is
    /// destroyed.
    pub unsafe fn new(
        device: &ash::Device,
        memory_properties: &MemoryProperties,
        description: ImageDescription,
    ) -> Result<Self, RendererError> {
        let layers = if description.cube { 6 } else { 1 };
        let create_info = vk::ImageCreateInfo::default()
            .flags(if description.cube {
                vk::ImageCreateFlags::CUBE_COMPATIBLE
            } else {
                vk::ImageCreateFlags::empty()
            })
            .image_type(vk::ImageType::TYPE_2D)
            .format(description.format)
            .extent(vk::Extent3D {
                width: description.extent.width,
                height: description.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(description.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = device
            .create_image(&create_info, None)
            .with_context(|| {
                format!("Unable to create image {:#?}", create_info)
            })?;

        let mut resource = Self {
            image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            description,
        };
        if let Err(error) =
            resource.allocate_and_bind(device, memory_properties, layers)
        {
            resource.destroy(device);
            return Err(error);
        }
        Ok(resource)
    }

    /// # Safety
    ///
    /// Unsafe because the image must not be in use by the device.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        device.destroy_image_view(self.view, None);
        device.destroy_image(self.image, None);
        device.free_memory(self.memory, None);
        self.view = vk::ImageView::null();
        self.image = vk::Image::null();
        self.memory = vk::DeviceMemory::null();
    }

    unsafe fn allocate_and_bind(
        &mut self,
        device: &ash::Device,
        memory_properties: &MemoryProperties,
        layers: u32,
    ) -> Result<(), RendererError> {
        let requirements = device.get_image_memory_requirements(self.image);
        let memory_type_index = memory_properties.find_type_index(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        self.memory = device
            .allocate_memory(&allocate_info, None)
            .with_context(|| {
                format!(
                    "Unable to allocate {} of image memory",
                    PrettySize(requirements.size)
                )
            })?;
        device
            .bind_image_memory(self.image, self.memory, 0)
            .context("Unable to bind image memory")?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(if self.description.cube {
                vk::ImageViewType::CUBE
            } else {
                vk::ImageViewType::TYPE_2D
            })
            .format(self.description.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.description.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: layers,
            });
        self.view = device
            .create_image_view(&view_info, None)
            .context("Unable to create an image view")?;
        Ok(())
    }
}

/// Create a linear, repeating sampler.
///
/// # Safety
///
/// Unsafe because the sampler must be destroyed before the device.
pub unsafe fn create_sampler(
    device: &ash::Device,
    max_anisotropy: f32,
) -> Result<vk::Sampler, RendererError> {
    let create_info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(max_anisotropy > 1.0)
        .max_anisotropy(max_anisotropy.max(1.0))
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .compare_op(vk::CompareOp::ALWAYS)
        .max_lod(0.0);
    let sampler = device
        .create_sampler(&create_info, None)
        .context("Unable to create a sampler")?;
    Ok(sampler)
}

/// A sampled texture living on the device.
#[derive(Debug)]
pub struct GpuTexture {
    pub image: ImageResource,
    pub sampler: vk::Sampler,
}

impl GpuTexture {
    /// Upload pixel data through a temporary staging buffer.
    ///
    /// # Safety
    ///
    /// Unsafe because `destroy()` must be called before the device is
    /// destroyed.
    pub unsafe fn upload(
        device: &ash::Device,
        memory_properties: &MemoryProperties,
        commands: &OneTimeCommands,
        resource: &TextureResource,
        max_anisotropy: f32,
    ) -> Result<Self, RendererError> {
        resource.validate()?;

        let mut staging = ManagedBuffer::new(
            device,
            memory_properties,
            resource.pixels.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let result = Self::upload_with_staging(
            device,
            memory_properties,
            commands,
            resource,
            max_anisotropy,
            &mut staging,
        );
        staging.destroy(device);

        if let Ok(texture) = &result {
            log::trace!(
                "Uploaded {:?} texture {}x{} ({})",
                resource.kind,
                resource.width,
                resource.height,
                PrettySize(resource.pixels.len() as u64)
            );
            log::trace!("{:?}", texture);
        }
        result
    }

    pub fn handles(&self) -> TextureHandles {
        TextureHandles {
            image_view: self.image.view,
            sampler: self.sampler,
        }
    }

    /// # Safety
    ///
    /// Unsafe because the texture must not be in use by the device.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        device.destroy_sampler(self.sampler, None);
        self.sampler = vk::Sampler::null();
        self.image.destroy(device);
    }

    unsafe fn upload_with_staging(
        device: &ash::Device,
        memory_properties: &MemoryProperties,
        commands: &OneTimeCommands,
        resource: &TextureResource,
        max_anisotropy: f32,
        staging: &mut ManagedBuffer,
    ) -> Result<Self, RendererError> {
        staging.write_bytes(0, &resource.pixels)?;

        let layers = resource.layer_count();
        let mut image = ImageResource::new(
            device,
            memory_properties,
            ImageDescription {
                extent: vk::Extent2D {
                    width: resource.width,
                    height: resource.height,
                },
                format: vk::Format::R8G8B8A8_SRGB,
                usage: vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                aspect: vk::ImageAspectFlags::COLOR,
                cube: layers == 6,
            },
        )?;

        let raw_image = image.image;
        let staging_buffer = staging.raw();
        let copied = commands.submit(|device, command_buffer| {
            transition_layout(
                device,
                command_buffer,
                raw_image,
                layers,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: layers,
                },
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D {
                    width: resource.width,
                    height: resource.height,
                    depth: 1,
                },
            };
            device.cmd_copy_buffer_to_image(
                command_buffer,
                staging_buffer,
                raw_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
            transition_layout(
                device,
                command_buffer,
                raw_image,
                layers,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        });
        if let Err(error) = copied {
            image.destroy(device);
            return Err(error.into());
        }

        match create_sampler(device, max_anisotropy) {
            Ok(sampler) => Ok(Self { image, sampler }),
            Err(error) => {
                image.destroy(device);
                Err(error)
            }
        }
    }
}

/// Record a layout transition for a color image used by uploads.
unsafe fn transition_layout(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    layers: u32,
    from: vk::ImageLayout,
    to: vk::ImageLayout,
) {
    let (src_access, dst_access, src_stage, dst_stage) = match (from, to) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        _ => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
    };
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(from)
        .new_layout(to)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: layers,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);
    device.cmd_pipeline_barrier(
        command_buffer,
        src_stage,
        dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
    );
}

#[cfg(test)]
mod test {
    use {super::*, assert2::assert, pretty_assertions::assert_eq};

    #[test]
    fn test_placeholders_are_valid() {
        let missing_2d = TextureResource::missing_2d();
        let missing_cube = TextureResource::missing_cube();
        assert!(missing_2d.validate().is_ok());
        assert!(missing_cube.validate().is_ok());
        assert_eq!(missing_2d.layer_count(), 1);
        assert_eq!(missing_cube.layer_count(), 6);
        assert_eq!(missing_cube.pixels.len(), 6 * missing_2d.pixels.len());
    }

    #[test]
    fn test_pixel_data_must_match_the_extent() {
        let texture = TextureResource::image_2d(4, 4, vec![0; 4 * 4 * 3]);
        assert!(let Err(RendererError::RuntimeError(_)) = texture.validate());
    }

    #[test]
    fn test_framebuffer_textures_cannot_be_uploaded() {
        let texture = TextureResource {
            kind: TextureKind::Framebuffer2D,
            ..TextureResource::missing_2d()
        };
        assert!(texture.validate().is_err());
    }
}
