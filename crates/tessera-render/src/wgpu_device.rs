use std::collections::HashMap;
use std::sync::Arc;

use tessera_core::{BackendKind, Color, FrameBuffer, TesseraError, TesseraResult};
use wgpu::util::DeviceExt;

use crate::blit::BlitPipeline;
use crate::device::{BlendFactor, BlendFunc, DrawCall, RenderDevice};
use crate::gpu::{GpuContext, GpuTexture, TextureDescKey};
use crate::texture::{TextureHandle, TextureStorage};

pub(crate) const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 2],
    uv: [f32; 2],
}

const VERTICES: &[Vertex] = &[
    // Tri 1
    Vertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    Vertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    Vertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    // Tri 2
    Vertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    Vertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
];

fn wgpu_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

fn blend_state(blend: BlendFunc) -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu_factor(blend.src),
        dst_factor: wgpu_factor(blend.dst),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

/// Hardware render device on top of a shared [`GpuContext`].
///
/// Textures are pooled `Rgba8Unorm` images. Blend state is baked into wgpu
/// render pipelines, so one pipeline is built per blend function on first
/// use and cached.
pub struct WgpuDevice {
    gpu: Arc<GpuContext>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    pipelines: HashMap<(BlitPipeline, BlendFunc), wgpu::RenderPipeline>,
    draws: u64,
}

impl WgpuDevice {
    pub fn new(gpu: Arc<GpuContext>) -> Self {
        let bind_group_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("blit_bind_group_layout"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("blit_pipeline_layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("blit_vertex_buffer"),
                contents: bytemuck::cast_slice(VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

        Self {
            gpu,
            bind_group_layout,
            pipeline_layout,
            sampler,
            vertex_buffer,
            pipelines: HashMap::new(),
            draws: 0,
        }
    }

    /// Create a device on a freshly initialized GPU context.
    pub fn init() -> TesseraResult<Self> {
        let gpu = GpuContext::init().map_err(|e| TesseraError::Gpu(e.to_string()))?;
        Ok(Self::new(Arc::new(gpu)))
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }

    pub fn draw_count(&self) -> u64 {
        self.draws
    }

    fn ensure_pipeline(&mut self, blit: &BlitPipeline, blend: BlendFunc) {
        let gpu = &self.gpu;
        let layout = &self.pipeline_layout;
        self.pipelines
            .entry((blit.clone(), blend))
            .or_insert_with(|| {
                tracing::debug!(pipeline = blit.label(), ?blend, "building wgpu blit pipeline");
                let shader = gpu
                    .device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(blit.label()),
                        source: wgpu::ShaderSource::Wgsl(blit.shader_source().into()),
                    });
                gpu.device
                    .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some(blit.label()),
                        layout: Some(layout),
                        vertex: wgpu::VertexState {
                            module: &shader,
                            entry_point: blit.vertex_entry(),
                            buffers: &[wgpu::VertexBufferLayout {
                                array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                                step_mode: wgpu::VertexStepMode::Vertex,
                                attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                            }],
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &shader,
                            entry_point: blit.fragment_entry(),
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                            targets: &[Some(wgpu::ColorTargetState {
                                format: TEXTURE_FORMAT,
                                blend: Some(blend_state(blend)),
                                write_mask: wgpu::ColorWrites::ALL,
                            })],
                        }),
                        primitive: wgpu::PrimitiveState::default(),
                        depth_stencil: None,
                        multisample: wgpu::MultisampleState::default(),
                        multiview: None,
                    })
            });
    }

    fn check_size(texture: &TextureHandle, frame: &FrameBuffer) -> TesseraResult<()> {
        if texture.size() != (frame.width, frame.height) {
            return Err(TesseraError::InvalidArgument(format!(
                "cannot upload a {}x{} frame into {} ({}x{})",
                frame.width,
                frame.height,
                texture.id(),
                texture.width(),
                texture.height()
            )));
        }
        Ok(())
    }

    /// Run `encode` inside a validation error scope and submit the commands.
    fn submit<F>(&self, label: &str, encode: F) -> TesseraResult<()>
    where
        F: FnOnce(&mut wgpu::CommandEncoder),
    {
        self.gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        encode(&mut encoder);
        self.gpu.queue.submit(Some(encoder.finish()));
        match pollster::block_on(self.gpu.device.pop_error_scope()) {
            Some(err) => Err(TesseraError::Gpu(format!("{}: {}", label, err))),
            None => Ok(()),
        }
    }
}

/// Block until `buffer` is mapped and copy its bytes out.
pub(crate) fn read_buffer(gpu: &GpuContext, buffer: &wgpu::Buffer) -> TesseraResult<Vec<u8>> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |v| {
        let _ = tx.send(v);
    });
    gpu.device.poll(wgpu::Maintain::Wait);

    rx.recv()
        .map_err(|_| TesseraError::Gpu("readback callback never ran".into()))?
        .map_err(|e| TesseraError::Gpu(format!("failed to map readback buffer: {}", e)))?;
    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}

impl RenderDevice for WgpuDevice {
    fn backend(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn create_texture(&mut self, width: u32, height: u32) -> TesseraResult<TextureHandle> {
        if width == 0 || height == 0 {
            return Err(TesseraError::InvalidArgument(format!(
                "cannot create a {}x{} texture",
                width, height
            )));
        }
        let limit = self.gpu.device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(TesseraError::Gpu(format!(
                "{}x{} exceeds the device texture limit of {}",
                width, height, limit
            )));
        }

        let key = TextureDescKey {
            width,
            height,
            format: TEXTURE_FORMAT,
            usage: TEXTURE_USAGE,
        };
        let texture = self
            .gpu
            .texture_pool
            .acquire(&self.gpu.device, Some("tessera_texture"), key);

        // Pooled textures keep their previous contents.
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.submit("clear_texture", |encoder| {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        })?;

        Ok(TextureHandle::new(
            width,
            height,
            TextureStorage::Gpu(GpuTexture::new(texture, key, self.gpu.texture_pool.clone())),
        ))
    }

    fn upload(&mut self, texture: &TextureHandle, frame: &FrameBuffer) -> TesseraResult<()> {
        Self::check_size(texture, frame)?;
        let raw = texture.gpu_storage()?.raw()?;
        self.gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: raw,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.to_rgba8(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn download(&mut self, texture: &TextureHandle) -> TesseraResult<FrameBuffer> {
        let raw = texture.gpu_storage()?.raw()?;
        let (width, height) = texture.size();
        let padded_bytes_per_row = (width * 4 + 255) & !255;

        let readback = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture_readback"),
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.submit("download_texture", |encoder| {
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture: raw,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &readback,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_bytes_per_row),
                        rows_per_image: Some(height),
                    },
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        })?;

        let data = read_buffer(&self.gpu, &readback)?;
        let mut frame = FrameBuffer::new(width, height);
        for y in 0..height {
            let row_start = (y * padded_bytes_per_row) as usize;
            let row = &data[row_start..row_start + (width * 4) as usize];
            for (x, px) in row.chunks_exact(4).enumerate() {
                frame.set_pixel(x as u32, y, Color::from_rgba8([px[0], px[1], px[2], px[3]]));
            }
        }
        Ok(frame)
    }

    fn copy_texture(&mut self, texture: &TextureHandle) -> TesseraResult<TextureHandle> {
        let (width, height) = texture.size();
        let copy = self.create_texture(width, height)?;
        let src = texture.gpu_storage()?.raw()?;
        let dst = copy.gpu_storage()?.raw()?;
        self.submit("copy_texture", |encoder| {
            encoder.copy_texture_to_texture(
                src.as_image_copy(),
                dst.as_image_copy(),
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        })?;
        tracing::trace!(from = %texture.id(), to = %copy.id(), "copied texture");
        Ok(copy)
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> TesseraResult<()> {
        if call.target.ptr_eq(call.source) {
            return Err(TesseraError::render(format!(
                "{} cannot be drawn onto itself",
                call.target.id()
            )));
        }
        let view_dst = call
            .target
            .gpu_storage()?
            .raw()?
            .create_view(&wgpu::TextureViewDescriptor::default());
        let view_src = call
            .source
            .gpu_storage()?
            .raw()?
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.ensure_pipeline(call.pipeline, call.blend);
        let pipeline = &self.pipelines[&(call.pipeline.clone(), call.blend)];

        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view_src),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let vertex_buffer = &self.vertex_buffer;
        self.submit("blit", |encoder| {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view_dst,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, vertex_buffer.slice(..));
            rpass.draw(0..6, 0..1);
        })?;

        self.draws += 1;
        tracing::trace!(
            pipeline = call.pipeline.label(),
            target = %call.target.id(),
            source = %call.source.id(),
            "wgpu blit"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_state_mapping() {
        let state = blend_state(BlendFunc::ALPHA_OVER);
        assert_eq!(state.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(state.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(state.alpha, state.color);
    }

    #[test]
    fn test_vertices_cover_clip_space() {
        assert_eq!(VERTICES.len(), 6);
        assert!(VERTICES
            .iter()
            .all(|v| v.position[0].abs() == 1.0 && v.position[1].abs() == 1.0));
    }

    // Needs an adapter; skipped on machines without one.
    #[test]
    fn test_gpu_alpha_over_blit() {
        let Ok(mut device) = WgpuDevice::init() else {
            return;
        };
        let target = device.create_texture(4, 4).unwrap();
        let source = device.create_texture(4, 4).unwrap();
        device
            .upload(&target, &FrameBuffer::solid(4, 4, Color::RED))
            .unwrap();
        let blend = Color::rgba(0.0, 0.0, 1.0, 0.5).premultiplied();
        device
            .upload(&source, &FrameBuffer::solid(4, 4, blend))
            .unwrap();

        let pipeline = BlitPipeline::default();
        device
            .draw(&DrawCall {
                target: &target,
                source: &source,
                blend: BlendFunc::ALPHA_OVER,
                pipeline: &pipeline,
            })
            .unwrap();
        let out = device.download(&target).unwrap();
        let expected = Color::rgba(0.5, 0.0, 0.5, 1.0);
        assert!(out.pixels.iter().all(|p| p.approx_eq(&expected, 2.0 / 255.0)));
    }
}
