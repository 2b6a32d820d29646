//! Blend nodes and the compositing routine they share.

mod alpha_over;

pub use alpha_over::AlphaOverBlend;

use tessera_core::TesseraResult;
use tessera_render::{BlendFunc, RenderInstance, TextureHandle};

/// Composite `blend` onto `base` with `func` on the instance's framebuffer.
///
/// Missing inputs short-circuit: with one side absent the other is returned
/// as is, with both absent the result is `None`. Otherwise the result is
/// `base` itself, or a copy of it when `base` is shared. GPU failures are
/// reported on the instance under `origin` and yield `None`.
pub fn composite(
    instance: &mut RenderInstance,
    base: Option<TextureHandle>,
    blend: Option<TextureHandle>,
    func: BlendFunc,
    origin: &str,
) -> Option<TextureHandle> {
    match (base, blend) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only),
        (Some(base), Some(blend)) => match draw_over(instance, base, &blend, func) {
            Ok(result) => Some(result),
            Err(err) => {
                instance.report(origin, &err);
                None
            }
        },
    }
}

fn draw_over(
    instance: &mut RenderInstance,
    base: TextureHandle,
    blend: &TextureHandle,
    func: BlendFunc,
) -> TesseraResult<TextureHandle> {
    let target = instance.make_exclusive(base)?;
    {
        let mut attached = instance.attach_target(&target)?;
        let mut bound = attached.bind()?;
        let mut source = bound.bind_source(blend)?;
        source.set_blend_func(func)?;
        source.blit()?;
    }
    tracing::debug!(target = %target.id(), source = %blend.id(), ?func, "composited");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Color, FrameBuffer};
    use tessera_render::RenderParams;

    fn setup() -> (RenderInstance, TextureHandle, TextureHandle) {
        let mut instance = RenderInstance::software(RenderParams::new(2, 2));
        let base = instance
            .texture_from_frame(&FrameBuffer::solid(2, 2, Color::rgba(0.8, 0.2, 0.2, 1.0)))
            .unwrap();
        let blend = instance
            .texture_from_frame(&FrameBuffer::solid(2, 2, Color::rgba(0.0, 0.0, 0.5, 0.5)))
            .unwrap();
        (instance, base, blend)
    }

    #[test]
    fn test_absent_inputs() {
        let (mut instance, base, blend) = setup();
        assert!(composite(&mut instance, None, None, BlendFunc::ALPHA_OVER, "test").is_none());

        let only = composite(&mut instance, Some(base.clone()), None, BlendFunc::ALPHA_OVER, "test");
        assert!(only.unwrap().ptr_eq(&base));
        let only = composite(&mut instance, None, Some(blend.clone()), BlendFunc::ALPHA_OVER, "test");
        assert!(only.unwrap().ptr_eq(&blend));
    }

    #[test]
    fn test_composite_writes_unique_base_in_place() {
        let (mut instance, base, blend) = setup();
        let id = base.id();
        let out = composite(&mut instance, Some(base), Some(blend), BlendFunc::ALPHA_OVER, "test")
            .unwrap();
        assert_eq!(out.id(), id);
        let frame = instance.download(&out).unwrap();
        assert!(frame.pixels[0].approx_eq(&Color::rgba(0.4, 0.1, 0.6, 1.0), 1e-6));
        assert!(instance.framebuffer().is_clean());
    }

    #[test]
    fn test_composite_copies_shared_base() {
        let (mut instance, base, blend) = setup();
        let before = instance.download(&base).unwrap();
        let out = composite(
            &mut instance,
            Some(base.clone()),
            Some(blend),
            BlendFunc::ALPHA_OVER,
            "test",
        )
        .unwrap();
        assert!(!out.ptr_eq(&base));
        assert_eq!(instance.download(&base).unwrap(), before);
    }

    #[test]
    fn test_composite_onto_itself() {
        let (mut instance, base, _) = setup();
        let out = composite(
            &mut instance,
            Some(base.clone()),
            Some(base.clone()),
            BlendFunc::ALPHA_OVER,
            "test",
        );
        assert!(out.is_some());
        assert_eq!(instance.fault_count(), 0);
    }
}
