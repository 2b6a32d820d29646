use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tessera_core::{TesseraError, TesseraResult};
use wgpu::{
    Adapter, Device, Extent3d, Instance, Queue, Texture, TextureDescriptor, TextureFormat,
    TextureUsages,
};

#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy)]
pub(crate) struct TextureDescKey {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

/// Recycles wgpu textures by size, format and usage.
pub struct TexturePool {
    free_textures: Mutex<HashMap<TextureDescKey, Vec<Texture>>>,
}

impl TexturePool {
    pub fn new() -> Self {
        Self {
            free_textures: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn acquire(
        &self,
        device: &Device,
        label: Option<&str>,
        key: TextureDescKey,
    ) -> Texture {
        let mut pool = self
            .free_textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(texture) = pool.get_mut(&key).and_then(|textures| textures.pop()) {
            return texture;
        }

        device.create_texture(&TextureDescriptor {
            label,
            size: Extent3d {
                width: key.width,
                height: key.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: key.format,
            usage: key.usage,
            view_formats: &[],
        })
    }

    pub(crate) fn release(&self, texture: Texture, key: TextureDescKey) {
        let mut pool = self
            .free_textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pool.entry(key).or_default().push(texture);
    }

    /// Number of idle textures waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.free_textures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl Default for TexturePool {
    fn default() -> Self {
        Self::new()
    }
}

/// A pooled wgpu texture. Returns itself to the pool when the last
/// [`TextureHandle`](crate::TextureHandle) drops.
pub(crate) struct GpuTexture {
    texture: Option<Texture>,
    key: TextureDescKey,
    pool: Arc<TexturePool>,
}

impl GpuTexture {
    pub(crate) fn new(texture: Texture, key: TextureDescKey, pool: Arc<TexturePool>) -> Self {
        Self {
            texture: Some(texture),
            key,
            pool,
        }
    }

    pub(crate) fn raw(&self) -> TesseraResult<&Texture> {
        self.texture
            .as_ref()
            .ok_or_else(|| TesseraError::Gpu("texture was already returned to its pool".into()))
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        if let Some(texture) = self.texture.take() {
            self.pool.release(texture, self.key);
        }
    }
}

/// A shared context for all GPU-accelerated operations.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
    pub texture_pool: Arc<TexturePool>,
}

impl GpuContext {
    /// Initializes WGPU, selecting the best available backend (Metal, Vulkan, DX12, etc.)
    pub fn init() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None, // Headless rendering
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow::anyhow!("Failed to find suitable wgpu adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Tessera Headless GPU Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            },
            None,
        ))?;

        tracing::info!(adapter = ?adapter.get_info().name, "initialized wgpu context");

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            texture_pool: Arc::new(TexturePool::new()),
        })
    }
}
