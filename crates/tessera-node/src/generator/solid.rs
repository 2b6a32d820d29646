use dashmap::DashMap;
use tessera_core::{Color, FrameBuffer, TimeRange};
use tessera_kernel::ast::{Expr, KernelDef};
use tessera_kernel::KernelDescriptor;
use tessera_render::TextureHandle;

use crate::context::EvalContext;
use crate::node::{unhandled_output, Node};
use crate::port::{Input, Output, PortKind};
use crate::value::Value;

const COLOR_INPUT: &str = "color";
const TEXTURE_OUTPUT: &str = "tex_out";

/// What a cached texture was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SolidKey {
    color: [u32; 4],
    width: u32,
    height: u32,
}

#[derive(Debug)]
struct CachedSolid {
    key: SolidKey,
    texture: TextureHandle,
}

fn color_port(default: Color) -> Input {
    Input::new(COLOR_INPUT, "Color", PortKind::Color).with_default(Value::Color(default))
}

/// Fills the output with a single color at the instance's output size.
///
/// The color input is straight alpha; the texture it produces is
/// premultiplied. Each render instance keeps at most one generated texture,
/// replaced when the color or output size changes. Cached textures are
/// handed out shared, so downstream compositing copies before writing.
/// Call [`SolidGenerator::forget_instance`] when a worker retires its
/// instance.
#[derive(Debug)]
pub struct SolidGenerator {
    inputs: [Input; 1],
    outputs: [Output; 1],
    cache: DashMap<u64, CachedSolid>,
}

impl SolidGenerator {
    pub const ID: &'static str = "org.tessera.solidgenerator";

    pub fn new() -> Self {
        Self {
            inputs: [color_port(Color::WHITE)],
            outputs: [Output::new(TEXTURE_OUTPUT, "Texture", PortKind::Texture)],
            cache: DashMap::new(),
        }
    }

    /// Generator with a direct color value.
    pub fn with_color(color: Color) -> Self {
        let mut node = Self::new();
        node.inputs[0] = color_port(color);
        node
    }

    pub fn color_input(&self) -> &Input {
        &self.inputs[0]
    }

    pub fn color_input_mut(&mut self) -> &mut Input {
        &mut self.inputs[0]
    }

    /// Number of textures currently cached.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drop the texture cached for the instance with id `instance`.
    /// Returns whether there was one.
    pub fn forget_instance(&self, instance: u64) -> bool {
        let removed = self.cache.remove(&instance).is_some();
        if removed {
            tracing::debug!(node = Self::ID, instance, "dropped cached solid for instance");
        }
        removed
    }

    fn kernel(color: Color) -> KernelDef {
        let c = color.premultiplied();
        KernelDef::new(
            "SolidColor",
            &[],
            TEXTURE_OUTPUT,
            [
                Expr::constant(c.r),
                Expr::constant(c.g),
                Expr::constant(c.b),
                Expr::constant(c.a),
            ],
        )
    }
}

impl Default for SolidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for SolidGenerator {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Solid"
    }

    fn description(&self) -> &'static str {
        "Generates a texture filled with a single color."
    }

    fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut [Input] {
        &mut self.inputs
    }

    fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    fn value(&self, cx: &mut EvalContext<'_>, output: &str, range: &TimeRange) -> Option<Value> {
        if output != TEXTURE_OUTPUT {
            return unhandled_output(self, output);
        }
        if !cx.has_instance() {
            return None;
        }

        let color = self.color_input().get_value(cx, range)?.as_color()?.premultiplied();
        let instance = cx.instance()?;
        let (width, height) = instance.params().size();
        let key = SolidKey {
            color: color.to_array().map(f32::to_bits),
            width,
            height,
        };

        if let Some(cached) = self.cache.get(&instance.id()) {
            if cached.key == key {
                return Some(Value::Texture(cached.texture.clone()));
            }
        }

        match instance.texture_from_frame(&FrameBuffer::solid(width, height, color)) {
            Ok(texture) => {
                tracing::debug!(node = Self::ID, texture = %texture.id(), %color, "generated solid");
                let cached = CachedSolid {
                    key,
                    texture: texture.clone(),
                };
                self.cache.insert(instance.id(), cached);
                Some(Value::Texture(texture))
            }
            Err(err) => {
                instance.report(Self::ID, &err);
                None
            }
        }
    }

    fn code(&self, output: &str) -> Option<KernelDescriptor> {
        if output != TEXTURE_OUTPUT || self.color_input().is_connected() {
            return None;
        }
        let color = self.color_input().direct_value()?.as_color()?;
        match tessera_kernel::compile(&Self::kernel(color)) {
            Ok(kernel) => Some(kernel),
            Err(err) => {
                tracing::error!(node = Self::ID, error = %err, "failed to generate kernel");
                None
            }
        }
    }

    fn release(&self) {
        if !self.cache.is_empty() {
            tracing::debug!(node = Self::ID, textures = self.cache.len(), "releasing cached textures");
        }
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Rational;
    use tessera_render::{RenderInstance, RenderParams};

    fn range() -> TimeRange {
        TimeRange::frame(0, Rational::from_integer(30)).unwrap()
    }

    #[test]
    fn test_fills_instance_size() {
        let node = SolidGenerator::with_color(Color::rgba(0.0, 0.0, 1.0, 0.5));
        let mut instance = RenderInstance::software(RenderParams::new(3, 2));
        let texture = {
            let mut cx = EvalContext::new(&mut instance);
            node.value(&mut cx, "tex_out", &range()).and_then(Value::into_texture).unwrap()
        };
        assert_eq!(texture.size(), (3, 2));
        let frame = instance.download(&texture).unwrap();
        assert!(frame.pixels.iter().all(|p| *p == Color::rgba(0.0, 0.0, 0.5, 0.5)));
    }

    #[test]
    fn test_cache_and_release() {
        let node = SolidGenerator::new();
        let mut instance = RenderInstance::software(RenderParams::new(2, 2));
        let mut cx = EvalContext::new(&mut instance);
        let a = node.value(&mut cx, "tex_out", &range()).and_then(Value::into_texture).unwrap();
        let b = node.value(&mut cx, "tex_out", &range()).and_then(Value::into_texture).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(node.cached(), 1);

        node.release();
        node.release();
        assert_eq!(node.cached(), 0);
        drop(b);
        assert!(!a.is_shared());
        let c = node.value(&mut cx, "tex_out", &range()).and_then(Value::into_texture).unwrap();
        assert!(!c.ptr_eq(&a));
    }

    #[test]
    fn test_detached_context() {
        let node = SolidGenerator::new();
        assert!(node.value(&mut EvalContext::detached(), "tex_out", &range()).is_none());
        assert_eq!(node.cached(), 0);
    }

    #[test]
    fn test_code_for_direct_color() {
        let node = SolidGenerator::with_color(Color::RED);
        let kernel = node.code("tex_out").unwrap();
        assert_eq!(kernel.name, "SolidColor");
        assert!(!kernel.source.contains("var<storage, read>"));
        assert!(node.code("other").is_none());
    }

    #[test]
    fn test_no_code_when_connected() {
        let upstream: std::sync::Arc<dyn Node> = std::sync::Arc::new(ConstColor);
        let mut node = SolidGenerator::new();
        node.color_input_mut().connect(upstream, "color").unwrap();
        assert!(node.code("tex_out").is_none());
    }

    #[test]
    fn test_cache_holds_one_texture_per_instance() {
        let upstream: std::sync::Arc<dyn Node> = std::sync::Arc::new(RampColor);
        let mut node = SolidGenerator::new();
        node.color_input_mut().connect(upstream, "color").unwrap();
        let rate = Rational::from_integer(100);

        let mut retired = Vec::new();
        for _ in 0..3 {
            let mut instance = RenderInstance::software(RenderParams::new(2, 2));
            let mut cx = EvalContext::new(&mut instance);
            let mut previous: Option<TextureHandle> = None;
            for index in 0..100 {
                let range = TimeRange::frame(index, rate).unwrap();
                let texture = node
                    .value(&mut cx, "tex_out", &range)
                    .and_then(Value::into_texture)
                    .unwrap();
                if let Some(previous) = &previous {
                    assert!(!texture.ptr_eq(previous));
                }
                previous = Some(texture);
            }
            retired.push(instance.id());
        }
        assert_eq!(node.cached(), 3);

        for id in retired {
            assert!(node.forget_instance(id));
            assert!(!node.forget_instance(id));
        }
        assert_eq!(node.cached(), 0);
    }

    #[test]
    fn test_cache_entry_replaced_when_color_changes() {
        let mut node = SolidGenerator::with_color(Color::BLUE);
        let mut instance = RenderInstance::software(RenderParams::new(2, 2));
        let blue = {
            let mut cx = EvalContext::new(&mut instance);
            node.value(&mut cx, "tex_out", &range()).and_then(Value::into_texture).unwrap()
        };
        assert!(blue.is_shared());

        node.color_input_mut().set_value(Some(Value::Color(Color::RED))).unwrap();
        let red = {
            let mut cx = EvalContext::new(&mut instance);
            node.value(&mut cx, "tex_out", &range()).and_then(Value::into_texture).unwrap()
        };
        assert!(!red.ptr_eq(&blue));
        assert!(!blue.is_shared());
        assert_eq!(node.cached(), 1);
        assert!(instance.download(&blue).unwrap().pixels.iter().all(|p| *p == Color::BLUE));
    }

    /// Red channel follows the window's in point.
    struct RampColor;

    impl Node for RampColor {
        fn id(&self) -> &'static str {
            "test.rampcolor"
        }
        fn name(&self) -> &'static str {
            "Ramp Color"
        }
        fn description(&self) -> &'static str {
            ""
        }
        fn inputs(&self) -> &[Input] {
            &[]
        }
        fn inputs_mut(&mut self) -> &mut [Input] {
            &mut []
        }
        fn outputs(&self) -> &[Output] {
            static OUTPUTS: std::sync::OnceLock<[Output; 1]> = std::sync::OnceLock::new();
            OUTPUTS.get_or_init(|| [Output::new("color", "Color", PortKind::Color)])
        }
        fn value(&self, _: &mut EvalContext<'_>, _: &str, range: &TimeRange) -> Option<Value> {
            Some(Value::Color(Color::rgba(range.in_point().to_f64() as f32, 0.0, 0.0, 1.0)))
        }
    }

    struct ConstColor;

    impl Node for ConstColor {
        fn id(&self) -> &'static str {
            "test.constcolor"
        }
        fn name(&self) -> &'static str {
            "Const Color"
        }
        fn description(&self) -> &'static str {
            ""
        }
        fn inputs(&self) -> &[Input] {
            &[]
        }
        fn inputs_mut(&mut self) -> &mut [Input] {
            &mut []
        }
        fn outputs(&self) -> &[Output] {
            static OUTPUTS: std::sync::OnceLock<[Output; 1]> = std::sync::OnceLock::new();
            OUTPUTS.get_or_init(|| [Output::new("color", "Color", PortKind::Color)])
        }
        fn value(&self, _: &mut EvalContext<'_>, _: &str, _: &TimeRange) -> Option<Value> {
            Some(Value::Color(Color::GREEN))
        }
    }
}
