//! Executes generated kernels on the wgpu backend.

use tessera_core::{Color, FrameBuffer, TesseraError, TesseraResult};
use tessera_kernel::codegen::WORKGROUP_SIZE;
use tessera_kernel::KernelDescriptor;
use wgpu::util::DeviceExt;

use crate::wgpu_device::{read_buffer, WgpuDevice};

fn to_texels(frame: &FrameBuffer) -> Vec<[f32; 4]> {
    frame.pixels.iter().map(Color::to_array).collect()
}

impl WgpuDevice {
    /// Run `kernel` over `inputs` and read the result back.
    ///
    /// Every input must be `size`; a kernel with no inputs still produces a
    /// frame of `size`. Buffers are bound in input order followed by the
    /// output, matching the layout the kernel generator emits.
    pub fn run_kernel(
        &self,
        kernel: &KernelDescriptor,
        inputs: &[&FrameBuffer],
        size: (u32, u32),
    ) -> TesseraResult<FrameBuffer> {
        let gpu = self.gpu();
        let (width, height) = size;
        if let Some(bad) = inputs.iter().find(|f| (f.width, f.height) != size) {
            return Err(TesseraError::InvalidArgument(format!(
                "kernel {} expects {}x{} inputs, got {}x{}",
                kernel.name, width, height, bad.width, bad.height
            )));
        }

        let texel_count = width as u64 * height as u64;
        let byte_len = texel_count * std::mem::size_of::<[f32; 4]>() as u64;
        let workgroups = texel_count.div_ceil(WORKGROUP_SIZE as u64);

        let limits = gpu.device.limits();
        if texel_count == 0 {
            return Err(TesseraError::InvalidArgument(format!(
                "kernel {} cannot run on an empty frame",
                kernel.name
            )));
        }
        if workgroups > limits.max_compute_workgroups_per_dimension as u64 {
            return Err(TesseraError::Gpu(format!(
                "{}x{} needs {} workgroups, the device allows {}",
                width, height, workgroups, limits.max_compute_workgroups_per_dimension
            )));
        }
        if byte_len > limits.max_storage_buffer_binding_size as u64 {
            return Err(TesseraError::Gpu(format!(
                "{}x{} exceeds the device storage buffer limit",
                width, height
            )));
        }
        if inputs.len() + 1 > limits.max_storage_buffers_per_shader_stage as usize {
            return Err(TesseraError::Gpu(format!(
                "kernel {} binds {} buffers, the device allows {}",
                kernel.name,
                inputs.len() + 1,
                limits.max_storage_buffers_per_shader_stage
            )));
        }

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kernel.name.as_str()),
                source: wgpu::ShaderSource::Wgsl(kernel.source.as_str().into()),
            });

        // Layout is derived from the shader, whatever its input count.
        let pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel.name.as_str()),
                layout: None,
                module: &module,
                entry_point: &kernel.name,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            });

        let input_buffers: Vec<wgpu::Buffer> = inputs
            .iter()
            .map(|frame| {
                gpu.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("kernel_input"),
                        contents: bytemuck::cast_slice(&to_texels(frame)),
                        usage: wgpu::BufferUsages::STORAGE,
                    })
            })
            .collect();

        let output_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kernel_output"),
            size: byte_len,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kernel_readback"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut entries: Vec<wgpu::BindGroupEntry> = input_buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: inputs.len() as u32,
            resource: output_buffer.as_entire_binding(),
        });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_bind_group"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &entries,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
            cpass.set_pipeline(&pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(workgroups as u32, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&output_buffer, 0, &readback, 0, byte_len);
        gpu.queue.submit(Some(encoder.finish()));

        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(TesseraError::Kernel(format!(
                "kernel {} failed on the gpu: {}",
                kernel.name, err
            )));
        }

        let data = read_buffer(gpu, &readback)?;
        tracing::debug!(kernel = %kernel.name, width, height, "ran gpu kernel");
        Ok(FrameBuffer {
            pixels: data
                .chunks_exact(std::mem::size_of::<[f32; 4]>())
                .map(|texel| Color::from_array(bytemuck::pod_read_unaligned(texel)))
                .collect(),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_kernel::ast::{Channel, Expr, KernelDef};

    #[test]
    fn test_to_texels_preserves_order() {
        let mut frame = FrameBuffer::new(2, 1);
        frame.set_pixel(1, 0, Color::GREEN);
        assert_eq!(to_texels(&frame), vec![[0.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 1.0]]);
    }

    // Needs an adapter; skipped on machines without one.
    #[test]
    fn test_gpu_kernel_matches_interpreter() {
        let Ok(device) = WgpuDevice::init() else {
            return;
        };
        let def = KernelDef::new(
            "Swap",
            &["src"],
            "dst",
            [
                Expr::input("src", Channel::B),
                Expr::input("src", Channel::G),
                Expr::input("src", Channel::R),
                Expr::input("src", Channel::A),
            ],
        );
        let kernel = tessera_kernel::compile(&def).unwrap();
        let input = FrameBuffer::solid(3, 2, Color::rgba(0.25, 0.5, 0.75, 1.0));
        let out = device.run_kernel(&kernel, &[&input], (3, 2)).unwrap();
        let expected = tessera_kernel::interp::apply(&def, &[&input], (3, 2)).unwrap();
        assert_eq!(out, expected);
    }
}
