use tessera_core::TimeRange;
use tessera_kernel::KernelDescriptor;

use crate::context::EvalContext;
use crate::port::{Input, Output};
use crate::value::Value;

/// A processing node in the compositing graph.
///
/// Nodes are shared as `Arc<dyn Node>` once wired up, so evaluation takes
/// `&self`; any cache a node keeps needs interior mutability.
pub trait Node: Send + Sync {
    /// Stable identifier of the node type, e.g. `org.tessera.alphaoverblend`.
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn inputs(&self) -> &[Input];

    /// Mutable access to the inputs, for wiring before the node is shared.
    fn inputs_mut(&mut self) -> &mut [Input];

    fn outputs(&self) -> &[Output];

    /// Evaluate `output` over `range`.
    ///
    /// `None` means "no image" (or no value), which is not an error.
    /// Outputs the node does not produce should go through
    /// [`unhandled_output`].
    fn value(&self, cx: &mut EvalContext<'_>, output: &str, range: &TimeRange) -> Option<Value>;

    /// A compute kernel equivalent to `output`, if it has one.
    fn code(&self, output: &str) -> Option<KernelDescriptor> {
        let _ = output;
        None
    }

    /// Drop cached GPU resources nobody else holds. Idempotent.
    fn release(&self) {}

    fn input(&self, id: &str) -> Option<&Input> {
        self.inputs().iter().find(|input| input.id == id)
    }

    fn input_mut(&mut self, id: &str) -> Option<&mut Input> {
        self.inputs_mut().iter_mut().find(|input| input.id == id)
    }

    fn output(&self, id: &str) -> Option<&Output> {
        self.outputs().iter().find(|output| output.id == id)
    }
}

/// Shared fallback for an output a node does not produce.
pub fn unhandled_output(node: &dyn Node, output: &str) -> Option<Value> {
    tracing::debug!(node = node.id(), output, "output not produced by node");
    None
}
