use anyhow::{Result, anyhow};
use filmlab_core::ImageBuf;

/// A 2D GPU texture and its default view.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    fn create(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    fn write(&self, queue: &wgpu::Queue, bytes: &[u8], bytes_per_row: u32) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Upload 8-bit RGBA pixels (Rgba8Unorm, read with `textureLoad`).
    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        pixels: &[u8],
        label: &str,
    ) -> Self {
        let tex = Self::create(
            device,
            width,
            height,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label,
        );
        tex.write(queue, pixels, width * 4);
        tex
    }

    pub fn from_image_buf(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        buf: &ImageBuf,
        label: &str,
    ) -> Self {
        Self::from_rgba8(device, queue, buf.width, buf.height, &buf.data, label)
    }

    /// Upload single-channel float rows (R32Float), `width` values per row.
    pub fn from_f32_rows(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        values: &[f32],
        label: &str,
    ) -> Self {
        let height = values.len() as u32 / width.max(1);
        let tex = Self::create(
            device,
            width,
            height,
            wgpu::TextureFormat::R32Float,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label,
        );
        tex.write(queue, bytemuck::cast_slice(values), width * 4);
        tex
    }

    /// Create an empty Rgba8Unorm texture for use as the compute output.
    pub fn create_storage(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        Self::create(
            device,
            width,
            height,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            label,
        )
    }

    /// Read an Rgba8Unorm texture back to CPU as an ImageBuf (blocking).
    pub fn download(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<ImageBuf> {
        let bytes_per_row_unpadded = self.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let bytes_per_row_padded = bytes_per_row_unpadded.div_ceil(align) * align;

        let buffer_size = (bytes_per_row_padded * self.height) as u64;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture_download_staging"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("texture_download"),
        });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row_padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        queue.submit(std::iter::once(encoder.finish()));

        let (sender, receiver) = std::sync::mpsc::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| anyhow!("GPU poll error: {e}"))?;
        receiver
            .recv()
            .map_err(|_| anyhow!("buffer map cancelled"))??;

        let mapped = staging.slice(..).get_mapped_range();
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for row in 0..self.height {
            let offset = row as usize * bytes_per_row_padded as usize;
            data.extend_from_slice(&mapped[offset..offset + bytes_per_row_unpadded as usize]);
        }

        drop(mapped);
        staging.unmap();

        ImageBuf::from_data(self.width, self.height, data)
    }
}
