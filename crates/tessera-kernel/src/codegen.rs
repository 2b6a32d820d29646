use crate::ast::*;
use tessera_core::TesseraError;

/// Invocations per workgroup along x in generated kernels.
pub const WORKGROUP_SIZE: u32 = 64;

/// Emits a WGSL compute shader for a [`KernelDef`].
///
/// Binding layout: input `k` is a read-only `array<vec4<f32>>` storage buffer
/// at `@binding(k)`, the output is a read-write buffer of the same type at
/// `@binding(inputs.len())`. One invocation handles one pixel; the entry
/// point carries the kernel's name.
pub struct Codegen {
    wgsl: String,
}

impl Codegen {
    pub fn new() -> Self {
        Self {
            wgsl: String::new(),
        }
    }

    pub fn generate(&mut self, def: &KernelDef) -> Result<String, TesseraError> {
        self.wgsl.clear();
        self.wgsl
            .push_str(&format!("// Tessera generated kernel: {}\n", def.name));

        for (binding, input) in def.inputs.iter().enumerate() {
            self.wgsl.push_str(&format!(
                "@group(0) @binding({}) var<storage, read> {}_in: array<vec4<f32>>;\n",
                binding, input
            ));
        }
        self.wgsl.push_str(&format!(
            "@group(0) @binding({}) var<storage, read_write> {}: array<vec4<f32>>;\n\n",
            def.inputs.len(),
            def.output
        ));

        self.wgsl.push_str(&format!(
            "@compute @workgroup_size({})\nfn {}(@builtin(global_invocation_id) global_id: vec3<u32>) {{\n",
            WORKGROUP_SIZE, def.name
        ));
        self.wgsl.push_str("    let i = global_id.x;\n");
        self.wgsl.push_str(&format!(
            "    if (i >= arrayLength(&{})) {{\n        return;\n    }}\n",
            def.output
        ));
        for input in &def.inputs {
            self.wgsl
                .push_str(&format!("    let {} = {}_in[i];\n", input, input));
        }

        let mut channels = Vec::with_capacity(4);
        for channel in Channel::ALL {
            channels.push(self.gen_expr(def.channel(channel))?);
        }
        self.wgsl.push_str(&format!(
            "    {}[i] = vec4<f32>(\n        {},\n        {},\n        {},\n        {}\n    );\n",
            def.output, channels[0], channels[1], channels[2], channels[3]
        ));
        self.wgsl.push_str("}\n");

        Ok(self.wgsl.clone())
    }

    fn gen_expr(&self, expr: &Expr) -> Result<String, TesseraError> {
        match expr {
            Expr::Const(value) => format_number(*value),
            Expr::Input { input, channel } => Ok(format!("{}.{}", input, channel.swizzle())),
            Expr::BinOp { op, left, right } => {
                let left_str = self.gen_expr(left)?;
                let right_str = self.gen_expr(right)?;
                let op_str = match op {
                    Op::Add => "+",
                    Op::Sub => "-",
                    Op::Mul => "*",
                };
                Ok(format!("({} {} {})", left_str, op_str, right_str))
            }
        }
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

fn format_number(value: f32) -> Result<String, TesseraError> {
    if !value.is_finite() {
        return Err(TesseraError::Kernel(format!(
            "constant {} cannot be expressed in WGSL",
            value
        )));
    }
    let s = format!("{}", value);
    let s = if s.contains('.') { s } else { format!("{}.0", s) };
    if value.is_sign_negative() {
        Ok(format!("({})", s))
    } else {
        Ok(s)
    }
}
