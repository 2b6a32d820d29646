use tessera_core::{TesseraError, TesseraResult};

use crate::blit::BlitPipeline;
use crate::device::{BlendFunc, DrawCall};
use crate::texture::TextureHandle;

/// The reusable render-target state of a render instance.
///
/// Mirrors the classic attach → bind → bind source → draw → release source
/// → release → detach sequence. Acquisition is checked; release is
/// infallible and idempotent so it can run from drop guards.
#[derive(Debug, Default)]
pub struct Framebuffer {
    attachment: Option<TextureHandle>,
    bound: bool,
    source: Option<TextureHandle>,
    blend: BlendFunc,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `target` as the color attachment.
    pub fn attach(&mut self, target: &TextureHandle) -> TesseraResult<()> {
        if let Some(current) = &self.attachment {
            return Err(TesseraError::render(format!(
                "framebuffer already has {} attached, cannot attach {}",
                current.id(),
                target.id()
            )));
        }
        tracing::trace!(texture = %target.id(), "framebuffer attach");
        self.attachment = Some(target.clone());
        Ok(())
    }

    /// Make the attached target the active render target.
    pub fn bind(&mut self) -> TesseraResult<()> {
        if self.attachment.is_none() {
            return Err(TesseraError::render("cannot bind a framebuffer with nothing attached"));
        }
        if self.bound {
            return Err(TesseraError::render("framebuffer is already bound"));
        }
        self.bound = true;
        Ok(())
    }

    /// Bind `source` as the texture sampled by the next blit.
    pub fn bind_source(&mut self, source: &TextureHandle) -> TesseraResult<()> {
        if !self.bound {
            return Err(TesseraError::render("cannot bind a source before binding the framebuffer"));
        }
        if let Some(current) = &self.source {
            return Err(TesseraError::render(format!(
                "source {} is already bound",
                current.id()
            )));
        }
        if self
            .attachment
            .as_ref()
            .is_some_and(|target| target.ptr_eq(source))
        {
            return Err(TesseraError::render(format!(
                "{} cannot be both render target and source",
                source.id()
            )));
        }
        tracing::trace!(texture = %source.id(), "framebuffer bind source");
        self.source = Some(source.clone());
        Ok(())
    }

    pub fn set_blend_func(&mut self, blend: BlendFunc) -> TesseraResult<()> {
        if !self.bound {
            return Err(TesseraError::render("cannot set a blend function on an unbound framebuffer"));
        }
        self.blend = blend;
        Ok(())
    }

    /// Unbind the source texture and reset the blend function.
    pub fn release_source(&mut self) {
        if let Some(source) = self.source.take() {
            tracing::trace!(texture = %source.id(), "framebuffer release source");
        }
        self.blend = BlendFunc::default();
    }

    /// Unbind the framebuffer. Any source still bound is released first.
    pub fn release(&mut self) {
        if self.source.is_some() {
            tracing::warn!("framebuffer released with a source still bound");
            self.release_source();
        }
        self.bound = false;
    }

    /// Detach the target. A still-bound framebuffer is released first.
    pub fn detach(&mut self) {
        if self.bound {
            tracing::warn!("framebuffer detached while still bound");
            self.release();
        }
        if let Some(target) = self.attachment.take() {
            tracing::trace!(texture = %target.id(), "framebuffer detach");
        }
    }

    /// Build the draw for the current bindings.
    pub fn draw_call<'a>(&'a self, pipeline: &'a BlitPipeline) -> TesseraResult<DrawCall<'a>> {
        let target = self
            .attachment
            .as_ref()
            .filter(|_| self.bound)
            .ok_or_else(|| TesseraError::render("blit requires a bound framebuffer"))?;
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| TesseraError::render("blit requires a bound source texture"))?;
        Ok(DrawCall {
            target,
            source,
            blend: self.blend,
            pipeline,
        })
    }

    pub fn attachment(&self) -> Option<&TextureHandle> {
        self.attachment.as_ref()
    }

    pub fn source(&self) -> Option<&TextureHandle> {
        self.source.as_ref()
    }

    pub fn blend_func(&self) -> BlendFunc {
        self.blend
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Nothing attached, nothing bound, default blend function.
    pub fn is_clean(&self) -> bool {
        self.attachment.is_none()
            && !self.bound
            && self.source.is_none()
            && self.blend == BlendFunc::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RenderDevice;
    use crate::software::SoftwareDevice;

    fn textures() -> (TextureHandle, TextureHandle) {
        let mut device = SoftwareDevice::new();
        (
            device.create_texture(2, 2).unwrap(),
            device.create_texture(2, 2).unwrap(),
        )
    }

    #[test]
    fn test_full_sequence_returns_to_clean() {
        let (target, source) = textures();
        let pipeline = BlitPipeline::default();
        let mut fb = Framebuffer::new();
        fb.attach(&target).unwrap();
        fb.bind().unwrap();
        fb.bind_source(&source).unwrap();
        fb.set_blend_func(BlendFunc::ALPHA_OVER).unwrap();
        let call = fb.draw_call(&pipeline).unwrap();
        assert!(call.target.ptr_eq(&target));
        assert_eq!(call.blend, BlendFunc::ALPHA_OVER);
        fb.release_source();
        fb.release();
        fb.detach();
        assert!(fb.is_clean());
        // The framebuffer held clones only while attached.
        assert!(!target.is_shared());
    }

    #[test]
    fn test_bind_requires_attachment() {
        let mut fb = Framebuffer::new();
        assert!(fb.bind().is_err());
        assert!(fb.is_clean());
    }

    #[test]
    fn test_double_attach_rejected() {
        let (a, b) = textures();
        let mut fb = Framebuffer::new();
        fb.attach(&a).unwrap();
        assert!(fb.attach(&b).is_err());
        fb.detach();
        assert!(fb.is_clean());
    }

    #[test]
    fn test_source_cannot_alias_target() {
        let (a, _) = textures();
        let mut fb = Framebuffer::new();
        fb.attach(&a).unwrap();
        fb.bind().unwrap();
        assert!(fb.bind_source(&a).is_err());
    }

    #[test]
    fn test_draw_requires_source() {
        let (a, _) = textures();
        let pipeline = BlitPipeline::default();
        let mut fb = Framebuffer::new();
        fb.attach(&a).unwrap();
        fb.bind().unwrap();
        assert!(fb.draw_call(&pipeline).is_err());
    }

    #[test]
    fn test_detach_cascades_release() {
        let (a, b) = textures();
        let mut fb = Framebuffer::new();
        fb.attach(&a).unwrap();
        fb.bind().unwrap();
        fb.bind_source(&b).unwrap();
        fb.set_blend_func(BlendFunc::ALPHA_OVER).unwrap();
        fb.detach();
        assert!(fb.is_clean());
        fb.detach();
        assert!(fb.is_clean());
    }
}
