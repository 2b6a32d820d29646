use tessera_core::{FrameBuffer, TesseraError, TesseraResult, TimeRange};
use tessera_render::RenderInstance;

use crate::context::EvalContext;
use crate::node::Node;
use crate::value::Value;

/// Evaluate `output` of `node` over `range` and read the image back.
///
/// `Ok(None)` when the output produced nothing. A framebuffer left bound by
/// evaluation is an error.
pub fn render_frame(
    node: &dyn Node,
    output: &str,
    range: &TimeRange,
    instance: &mut RenderInstance,
) -> TesseraResult<Option<FrameBuffer>> {
    tracing::debug!(node = node.id(), output, %range, "rendering frame");
    let value = {
        let mut cx = EvalContext::new(instance);
        node.value(&mut cx, output, range)
    };

    if !instance.framebuffer().is_clean() {
        return Err(TesseraError::render(format!(
            "{} left the framebuffer bound after evaluating {}",
            node.id(),
            range
        )));
    }

    match value {
        None => Ok(None),
        Some(Value::Texture(texture)) => instance.download(&texture).map(Some),
        Some(other) => Err(TesseraError::InvalidArgument(format!(
            "output '{}' of {} is a {}, not a texture",
            output,
            node.id(),
            other.kind()
        ))),
    }
}
