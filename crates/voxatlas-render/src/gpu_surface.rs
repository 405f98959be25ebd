//! wgpu texture surface and headless device context.

use std::sync::Arc;

use glam::{IVec3, UVec2};
use voxatlas_core::{AtlasLayout, AtlasRegion, PackedAtlas, Sample, VoxelEdit};

use crate::error::{RenderError, RenderResult};
use crate::surface::RenderSurface;

/// A sample type with a matching wgpu texture format.
pub trait GpuSample: Sample {
    /// Name used in error messages.
    const NAME: &'static str;

    /// Returns the texture format holding `lanes` channels of this type.
    /// `lanes` is 1, 2 or 4.
    fn texture_format(lanes: u32) -> Option<wgpu::TextureFormat>;
}

impl GpuSample for u8 {
    const NAME: &'static str = "u8";

    fn texture_format(lanes: u32) -> Option<wgpu::TextureFormat> {
        match lanes {
            1 => Some(wgpu::TextureFormat::R8Unorm),
            2 => Some(wgpu::TextureFormat::Rg8Unorm),
            4 => Some(wgpu::TextureFormat::Rgba8Unorm),
            _ => None,
        }
    }
}

impl GpuSample for u16 {
    const NAME: &'static str = "u16";

    fn texture_format(lanes: u32) -> Option<wgpu::TextureFormat> {
        match lanes {
            1 => Some(wgpu::TextureFormat::R16Uint),
            2 => Some(wgpu::TextureFormat::Rg16Uint),
            4 => Some(wgpu::TextureFormat::Rgba16Uint),
            _ => None,
        }
    }
}

impl GpuSample for i16 {
    const NAME: &'static str = "i16";

    fn texture_format(lanes: u32) -> Option<wgpu::TextureFormat> {
        match lanes {
            1 => Some(wgpu::TextureFormat::R16Sint),
            2 => Some(wgpu::TextureFormat::Rg16Sint),
            4 => Some(wgpu::TextureFormat::Rgba16Sint),
            _ => None,
        }
    }
}

impl GpuSample for f32 {
    const NAME: &'static str = "f32";

    fn texture_format(lanes: u32) -> Option<wgpu::TextureFormat> {
        match lanes {
            1 => Some(wgpu::TextureFormat::R32Float),
            2 => Some(wgpu::TextureFormat::Rg32Float),
            4 => Some(wgpu::TextureFormat::Rgba32Float),
            _ => None,
        }
    }
}

/// Number of texture channels used to store `components`. There are no
/// three-channel texture formats, so RGB data is stored as RGBA.
fn device_lanes(components: u32) -> u32 {
    if components == 3 {
        4
    } else {
        components
    }
}

/// A wgpu device and queue shared by every surface created from it.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Creates a device without a window.
    pub async fn new_headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("voxatlas device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        Ok(Self { device, queue })
    }
}

/// An atlas texture on the GPU.
///
/// Uploads go through [`wgpu::Queue::write_texture`]; read-back copies the
/// texture into a mappable buffer and blocks until the copy completes.
pub struct GpuSurface<T: GpuSample> {
    context: Arc<GpuContext>,
    texture: wgpu::Texture,
    size: UVec2,
    components: u32,
    lanes: u32,
    _sample: std::marker::PhantomData<T>,
}

impl<T: GpuSample> GpuSurface<T> {
    /// Creates a zero-filled texture sized for `layout`.
    pub fn new(context: Arc<GpuContext>, layout: &AtlasLayout, components: u32) -> RenderResult<Self> {
        let lanes = device_lanes(components);
        let format = T::texture_format(lanes).ok_or(RenderError::UnsupportedFormat {
            components,
            sample: T::NAME,
        })?;
        let size = layout.atlas_size();
        let max = context.device.limits().max_texture_dimension_2d;
        if size.x > max || size.y > max {
            return Err(RenderError::TextureTooLarge {
                width: size.x,
                height: size.y,
                max,
            });
        }

        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas texture"),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        log::debug!("created {}x{} atlas texture ({format:?})", size.x, size.y);

        Ok(Self {
            context,
            texture,
            size,
            components,
            lanes,
            _sample: std::marker::PhantomData,
        })
    }

    /// Returns the underlying texture, e.g. for binding in a draw pass.
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    fn texel_bytes(&self) -> u32 {
        self.lanes * std::mem::size_of::<T>() as u32
    }

    /// Widens `components`-lane texels to the device lane count.
    fn widen(&self, texels: &[T]) -> Vec<T> {
        if self.lanes == self.components {
            return texels.to_vec();
        }
        let c = self.components as usize;
        let mut out = Vec::with_capacity(texels.len() / c * self.lanes as usize);
        for texel in texels.chunks_exact(c) {
            out.extend_from_slice(texel);
            out.resize(out.len() + (self.lanes as usize - c), T::default());
        }
        out
    }

    /// Narrows device texels back to `components` lanes.
    fn narrow(&self, texels: Vec<T>) -> Vec<T> {
        if self.lanes == self.components {
            return texels;
        }
        let c = self.components as usize;
        texels
            .chunks_exact(self.lanes as usize)
            .flat_map(|texel| texel[..c].iter().copied())
            .collect()
    }

    fn upload(&self, origin: UVec2, width: u32, height: u32, device_texels: &[T]) {
        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: origin.x,
                    y: origin.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(device_texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * self.texel_bytes()),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Calculates bytes per row with proper alignment for wgpu buffer copies.
    fn aligned_bytes_per_row(&self) -> u32 {
        let unaligned = self.size.x * self.texel_bytes();
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unaligned.div_ceil(align) * align
    }
}

impl<T: GpuSample> RenderSurface<T> for GpuSurface<T> {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn components(&self) -> u32 {
        self.components
    }

    fn blit(&mut self, atlas: &PackedAtlas<T>) -> RenderResult<()> {
        let expected = self.size.x as usize * self.size.y as usize * self.components as usize;
        if atlas.data().len() != expected {
            return Err(RenderError::SizeMismatch {
                expected,
                actual: atlas.data().len(),
            });
        }
        let texels = self.widen(atlas.data());
        self.upload(UVec2::ZERO, self.size.x, self.size.y, &texels);
        Ok(())
    }

    fn draw_points(&mut self, layout: &AtlasLayout, edits: &[VoxelEdit<T>]) -> RenderResult<()> {
        // Queue writes are ordered, so a later edit to the same pixel wins.
        let lanes = self.lanes as usize;
        let c = self.components as usize;
        for edit in edits {
            let mut texel = [T::default(); 4];
            texel[..c].copy_from_slice(&edit.value[..c]);
            let pixel = layout.pixel_of(edit.position.max(IVec3::ZERO).as_uvec3());
            self.upload(pixel, 1, 1, &texel[..lanes]);
        }
        Ok(())
    }

    fn write_region(&mut self, region: AtlasRegion, texels: &[T]) -> RenderResult<()> {
        let expected = region.pixel_count() * self.components as usize;
        if texels.len() != expected {
            return Err(RenderError::SizeMismatch {
                expected,
                actual: texels.len(),
            });
        }
        let device_texels = self.widen(texels);
        self.upload(
            UVec2::new(region.x, region.y),
            region.width,
            region.height,
            &device_texels,
        );
        Ok(())
    }

    fn read_pixels(&self) -> RenderResult<Vec<T>> {
        let device = &self.context.device;
        let bytes_per_row = self.aligned_bytes_per_row();
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("atlas read-back buffer"),
            size: u64::from(bytes_per_row) * u64::from(self.size.y),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("atlas read-back encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.size.y),
                },
            },
            wgpu::Extent3d {
                width: self.size.x,
                height: self.size.y,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|_| RenderError::Timeout)?;
        rx.recv()
            .map_err(|_| RenderError::BufferMapFailed)?
            .map_err(|_| RenderError::BufferMapFailed)?;

        // Copy data, removing row padding
        let data = buffer_slice.get_mapped_range();
        let row_bytes = (self.size.x * self.texel_bytes()) as usize;
        let mut bytes = Vec::with_capacity(row_bytes * self.size.y as usize);
        for row in 0..self.size.y {
            let start = (row * bytes_per_row) as usize;
            bytes.extend_from_slice(&data[start..start + row_bytes]);
        }
        drop(data);
        buffer.unmap();

        let mut texels = vec![T::default(); bytes.len() / std::mem::size_of::<T>()];
        bytemuck::cast_slice_mut::<T, u8>(&mut texels).copy_from_slice(&bytes);
        log::debug!("read back {}x{} atlas texture", self.size.x, self.size.y);
        Ok(self.narrow(texels))
    }
}
