use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use tessera_core::{BackendKind, FrameBuffer, RenderConfig, TesseraError, TesseraResult};

use crate::blit::BlitPipeline;
use crate::device::{BlendFunc, RenderDevice};
use crate::framebuffer::Framebuffer;
use crate::registry::WorkerId;
use crate::software::SoftwareDevice;
use crate::texture::TextureHandle;
use crate::wgpu_device::WgpuDevice;

/// Per-worker output parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    pub width: u32,
    pub height: u32,
}

impl RenderParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.width, config.height)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A GPU failure recorded while evaluating a node.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFault {
    pub worker: WorkerId,
    /// Node or subsystem that hit the failure.
    pub origin: String,
    pub message: String,
}

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// One worker's rendering context.
///
/// Holds the render device, the single reusable [`Framebuffer`], the default
/// blit pipeline and the output parameters. An instance belongs to exactly
/// one worker; it is reached through `&mut` from an evaluation context or
/// through the worker's entry in the [registry](crate::registry).
pub struct RenderInstance {
    id: u64,
    params: RenderParams,
    device: Box<dyn RenderDevice>,
    framebuffer: Framebuffer,
    default_pipeline: BlitPipeline,
    fault_tx: Option<mpsc::Sender<RenderFault>>,
    fault_count: u64,
}

impl RenderInstance {
    pub fn new(device: Box<dyn RenderDevice>, params: RenderParams) -> Self {
        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            instance = id,
            backend = %device.backend(),
            width = params.width,
            height = params.height,
            "created render instance"
        );
        Self {
            id,
            params,
            device,
            framebuffer: Framebuffer::new(),
            default_pipeline: BlitPipeline::default_blit(),
            fault_tx: None,
            fault_count: 0,
        }
    }

    pub fn software(params: RenderParams) -> Self {
        Self::new(Box::new(SoftwareDevice::new()), params)
    }

    /// Build an instance on the backend named by `config`.
    pub fn from_config(config: &RenderConfig) -> TesseraResult<Self> {
        let params = RenderParams::from_config(config);
        let device: Box<dyn RenderDevice> = match config.backend {
            BackendKind::Software => Box::new(SoftwareDevice::new()),
            BackendKind::Wgpu => Box::new(WgpuDevice::init()?),
        };
        Ok(Self::new(device, params))
    }

    /// Process-unique id. Textures cached for this instance's device are
    /// keyed by it.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn params(&self) -> RenderParams {
        self.params
    }

    pub fn backend(&self) -> BackendKind {
        self.device.backend()
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn default_pipeline(&self) -> &BlitPipeline {
        &self.default_pipeline
    }

    pub fn create_texture(&mut self, width: u32, height: u32) -> TesseraResult<TextureHandle> {
        self.device.create_texture(width, height)
    }

    /// Upload a CPU frame into a new texture of the same size.
    pub fn texture_from_frame(&mut self, frame: &FrameBuffer) -> TesseraResult<TextureHandle> {
        let texture = self.device.create_texture(frame.width, frame.height)?;
        self.device.upload(&texture, frame)?;
        Ok(texture)
    }

    pub fn upload(&mut self, texture: &TextureHandle, frame: &FrameBuffer) -> TesseraResult<()> {
        self.device.upload(texture, frame)
    }

    pub fn download(&mut self, texture: &TextureHandle) -> TesseraResult<FrameBuffer> {
        self.device.download(texture)
    }

    pub fn copy_texture(&mut self, texture: &TextureHandle) -> TesseraResult<TextureHandle> {
        self.device.copy_texture(texture)
    }

    /// Return a handle that may be written in place: `texture` itself when
    /// nobody else holds it, otherwise a fresh copy.
    pub fn make_exclusive(&mut self, texture: TextureHandle) -> TesseraResult<TextureHandle> {
        if !texture.is_shared() {
            return Ok(texture);
        }
        tracing::debug!(
            texture = %texture.id(),
            holders = texture.holders(),
            "copying shared texture before writing"
        );
        self.device.copy_texture(&texture)
    }

    /// Start receiving this instance's faults. Replaces any earlier subscriber.
    pub fn subscribe_faults(&mut self) -> mpsc::Receiver<RenderFault> {
        let (tx, rx) = mpsc::channel();
        self.fault_tx = Some(tx);
        rx
    }

    /// Record a failure on the instance's error channel.
    pub fn report(&mut self, origin: &str, error: &TesseraError) {
        self.fault_count += 1;
        let fault = RenderFault {
            worker: WorkerId::current(),
            origin: origin.to_string(),
            message: error.to_string(),
        };
        tracing::error!(worker = %fault.worker, origin, error = %error, "render fault");
        if let Some(tx) = &self.fault_tx {
            if tx.send(fault).is_err() {
                self.fault_tx = None;
            }
        }
    }

    /// Faults reported over the instance's lifetime.
    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    /// Attach `target` to the framebuffer. The returned guard detaches it
    /// when dropped.
    pub fn attach_target(&mut self, target: &TextureHandle) -> TesseraResult<AttachedTarget<'_>> {
        self.framebuffer.attach(target)?;
        Ok(AttachedTarget { instance: self })
    }
}

/// Framebuffer with a target attached. Detaches on drop.
pub struct AttachedTarget<'a> {
    instance: &'a mut RenderInstance,
}

impl AttachedTarget<'_> {
    /// Make the attached target the render target. Unbinds on drop.
    pub fn bind(&mut self) -> TesseraResult<BoundTarget<'_>> {
        self.instance.framebuffer.bind()?;
        Ok(BoundTarget {
            instance: &mut *self.instance,
        })
    }
}

impl Drop for AttachedTarget<'_> {
    fn drop(&mut self) {
        self.instance.framebuffer.detach();
    }
}

/// Framebuffer bound as the render target. Releases on drop.
pub struct BoundTarget<'a> {
    instance: &'a mut RenderInstance,
}

impl BoundTarget<'_> {
    /// Bind `source` for sampling. Releases the source on drop.
    pub fn bind_source(&mut self, source: &TextureHandle) -> TesseraResult<BoundSource<'_>> {
        self.instance.framebuffer.bind_source(source)?;
        Ok(BoundSource {
            instance: &mut *self.instance,
        })
    }
}

impl Drop for BoundTarget<'_> {
    fn drop(&mut self) {
        self.instance.framebuffer.release();
    }
}

/// Target and source both bound; ready to blit.
pub struct BoundSource<'a> {
    instance: &'a mut RenderInstance,
}

impl BoundSource<'_> {
    pub fn set_blend_func(&mut self, blend: BlendFunc) -> TesseraResult<()> {
        self.instance.framebuffer.set_blend_func(blend)
    }

    /// Draw the source over the whole target with the default pipeline.
    pub fn blit(&mut self) -> TesseraResult<()> {
        let RenderInstance {
            device,
            framebuffer,
            default_pipeline,
            ..
        } = &mut *self.instance;
        let call = framebuffer.draw_call(default_pipeline)?;
        device.draw(&call)
    }
}

impl Drop for BoundSource<'_> {
    fn drop(&mut self) {
        self.instance.framebuffer.release_source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Color;

    fn instance() -> RenderInstance {
        RenderInstance::software(RenderParams::new(2, 2))
    }

    #[test]
    fn test_make_exclusive_reuses_unique_handle() {
        let mut inst = instance();
        let tex = inst.create_texture(2, 2).unwrap();
        let id = tex.id();
        let exclusive = inst.make_exclusive(tex).unwrap();
        assert_eq!(exclusive.id(), id);
    }

    #[test]
    fn test_make_exclusive_copies_shared_handle() {
        let mut inst = instance();
        let tex = inst
            .texture_from_frame(&FrameBuffer::solid(2, 2, Color::RED))
            .unwrap();
        let held = tex.clone();
        let exclusive = inst.make_exclusive(tex).unwrap();
        assert!(!exclusive.ptr_eq(&held));
        assert_eq!(inst.download(&exclusive).unwrap(), inst.download(&held).unwrap());
    }

    #[test]
    fn test_guards_blit_and_restore_state() {
        let mut inst = instance();
        let base = inst
            .texture_from_frame(&FrameBuffer::solid(2, 2, Color::RED))
            .unwrap();
        let blend = inst
            .texture_from_frame(&FrameBuffer::solid(2, 2, Color::rgba(0.0, 0.0, 0.5, 0.5)))
            .unwrap();
        {
            let mut attached = inst.attach_target(&base).unwrap();
            let mut bound = attached.bind().unwrap();
            let mut source = bound.bind_source(&blend).unwrap();
            source.set_blend_func(BlendFunc::ALPHA_OVER).unwrap();
            source.blit().unwrap();
        }
        assert!(inst.framebuffer().is_clean());
        let out = inst.download(&base).unwrap();
        assert_eq!(out.pixels[0], Color::rgba(0.5, 0.0, 0.5, 1.0));
    }

    #[test]
    fn test_guards_restore_state_on_error() {
        let mut inst = instance();
        let base = inst.create_texture(2, 2).unwrap();
        {
            let mut attached = inst.attach_target(&base).unwrap();
            let mut bound = attached.bind().unwrap();
            assert!(bound.bind_source(&base).is_err());
        }
        assert!(inst.framebuffer().is_clean());
    }

    #[test]
    fn test_report_reaches_subscriber() {
        let mut inst = instance();
        let faults = inst.subscribe_faults();
        inst.report("test", &TesseraError::render("boom"));
        let fault = faults.try_recv().unwrap();
        assert_eq!(fault.origin, "test");
        assert_eq!(fault.worker, WorkerId::current());
        assert!(fault.message.contains("boom"));
        assert_eq!(inst.fault_count(), 1);
    }

    #[test]
    fn test_report_without_subscriber() {
        let mut inst = instance();
        drop(inst.subscribe_faults());
        inst.report("test", &TesseraError::render("first"));
        inst.report("test", &TesseraError::render("second"));
        assert_eq!(inst.fault_count(), 2);
    }
}
