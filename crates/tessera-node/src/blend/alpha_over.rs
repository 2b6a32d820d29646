use tessera_core::TimeRange;
use tessera_kernel::ast::{Channel, Expr, KernelDef};
use tessera_kernel::KernelDescriptor;
use tessera_render::BlendFunc;

use super::composite;
use crate::context::EvalContext;
use crate::node::{unhandled_output, Node};
use crate::port::{Input, Output, PortKind};
use crate::value::Value;

const BASE_INPUT: &str = "base";
const BLEND_INPUT: &str = "blend";
const TEXTURE_OUTPUT: &str = "tex_out";

/// Composites the `blend` texture over the `base` texture using the blend
/// texture's alpha ("over" on premultiplied colors).
#[derive(Debug)]
pub struct AlphaOverBlend {
    inputs: [Input; 2],
    outputs: [Output; 1],
}

impl AlphaOverBlend {
    pub const ID: &'static str = "org.tessera.alphaoverblend";

    pub fn new() -> Self {
        Self {
            inputs: [
                Input::new(BASE_INPUT, "Base", PortKind::Texture),
                Input::new(BLEND_INPUT, "Blend", PortKind::Texture),
            ],
            outputs: [Output::new(TEXTURE_OUTPUT, "Texture", PortKind::Texture)],
        }
    }

    pub fn base_input(&self) -> &Input {
        &self.inputs[0]
    }

    pub fn base_input_mut(&mut self) -> &mut Input {
        &mut self.inputs[0]
    }

    pub fn blend_input(&self) -> &Input {
        &self.inputs[1]
    }

    pub fn blend_input_mut(&mut self) -> &mut Input {
        &mut self.inputs[1]
    }

    pub fn texture_output(&self) -> &Output {
        &self.outputs[0]
    }

    /// `out = base * (1 - blend.a) + blend` on every channel, alpha included.
    pub fn kernel() -> KernelDef {
        let over = |c: Channel| {
            Expr::input(BASE_INPUT, c) * (Expr::constant(1.0) - Expr::input(BLEND_INPUT, Channel::A))
                + Expr::input(BLEND_INPUT, c)
        };
        KernelDef::new(
            "AlphaOver",
            &[BASE_INPUT, BLEND_INPUT],
            TEXTURE_OUTPUT,
            [over(Channel::R), over(Channel::G), over(Channel::B), over(Channel::A)],
        )
    }
}

impl Default for AlphaOverBlend {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for AlphaOverBlend {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Alpha Over"
    }

    fn description(&self) -> &'static str {
        "A blending node that composites one texture over another using its alpha channel."
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
            tracing::debug!(node = Self::ID, "no render instance, skipping");
            return None;
        }

        let base = self.base_input().get_texture(cx, range);
        let blend = self.blend_input().get_texture(cx, range);
        tracing::debug!(
            node = Self::ID,
            %range,
            base = base.is_some(),
            blend = blend.is_some(),
            "evaluating alpha over"
        );

        let instance = cx.instance()?;
        composite(instance, base, blend, BlendFunc::ALPHA_OVER, Self::ID).map(Value::Texture)
    }

    fn code(&self, output: &str) -> Option<KernelDescriptor> {
        if output != TEXTURE_OUTPUT {
            return None;
        }
        match tessera_kernel::compile(&Self::kernel()) {
            Ok(kernel) => Some(kernel),
            Err(err) => {
                tracing::error!(node = Self::ID, error = %err, "failed to generate kernel");
                None
            }
        }
    }

    fn release(&self) {
        // Holds no textures between calls.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Color, Rational};
    use tessera_kernel::interp;

    #[test]
    fn test_ports() {
        let node = AlphaOverBlend::new();
        assert_eq!(node.id(), "org.tessera.alphaoverblend");
        assert_eq!(node.name(), "Alpha Over");
        assert_eq!(node.base_input().kind, PortKind::Texture);
        assert_eq!(node.blend_input().id, "blend");
        assert_eq!(node.texture_output().id, "tex_out");
        assert!(node.output("tex_out").is_some());
        assert!(node.input("missing").is_none());
    }

    #[test]
    fn test_code_is_pure() {
        let node = AlphaOverBlend::new();
        let a = node.code("tex_out").unwrap();
        let b = AlphaOverBlend::new().code("tex_out").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, "AlphaOver");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.source.contains("fn AlphaOver("));
        assert!(a.source.contains("var<storage, read> base_in"));
        assert!(a.source.contains("var<storage, read> blend_in"));
        assert!(a.source.contains("var<storage, read_write> tex_out"));
    }

    #[test]
    fn test_code_unknown_output() {
        assert!(AlphaOverBlend::new().code("other").is_none());
    }

    #[test]
    fn test_value_without_instance() {
        let node = AlphaOverBlend::new();
        let mut cx = EvalContext::detached();
        let range = TimeRange::frame(0, Rational::from_integer(24)).unwrap();
        assert!(node.value(&mut cx, "tex_out", &range).is_none());
    }

    #[test]
    fn test_kernel_example_pixel() {
        let base = Color::rgba(0.8, 0.2, 0.2, 1.0);
        let blend = Color::rgba(0.0, 0.0, 1.0, 0.5).premultiplied();
        let out = interp::evaluate_pixel(&AlphaOverBlend::kernel(), &[base, blend]).unwrap();
        assert!(out.approx_eq(&Color::rgba(0.4, 0.1, 0.6, 1.0), 1e-6));
    }

    #[test]
    fn test_kernel_matches_blend_equation() {
        let samples = [
            (Color::rgba(0.3, 0.6, 0.9, 0.75), Color::rgba(0.1, 0.05, 0.2, 0.25)),
            (Color::TRANSPARENT, Color::rgba(0.5, 0.5, 0.5, 0.5)),
            (Color::WHITE, Color::TRANSPARENT),
        ];
        for (base, blend) in samples {
            let kernel = interp::evaluate_pixel(&AlphaOverBlend::kernel(), &[base, blend]).unwrap();
            assert_eq!(kernel, BlendFunc::ALPHA_OVER.apply(blend, base));
        }
    }

    #[test]
    fn test_release_is_idempotent() {
        let node = AlphaOverBlend::new();
        node.release();
        node.release();
    }
}
