//! CPU reference executor for kernel definitions.

use rayon::prelude::*;
use tessera_core::{Color, FrameBuffer, TesseraError, TesseraResult};

use crate::ast::*;

/// Evaluate a kernel for one pixel. `pixels[k]` is the value of
/// `def.inputs[k]` at the current coordinate.
pub fn evaluate_pixel(def: &KernelDef, pixels: &[Color]) -> TesseraResult<Color> {
    if pixels.len() != def.inputs.len() {
        return Err(TesseraError::Kernel(format!(
            "kernel {} expects {} inputs, got {}",
            def.name,
            def.inputs.len(),
            pixels.len()
        )));
    }
    let mut out = [0.0f32; 4];
    for channel in Channel::ALL {
        out[channel.index()] = eval_expr(def, def.channel(channel), pixels)?;
    }
    Ok(Color::from_array(out))
}

fn eval_expr(def: &KernelDef, expr: &Expr, pixels: &[Color]) -> TesseraResult<f32> {
    match expr {
        Expr::Const(value) => Ok(*value),
        Expr::Input { input, channel } => {
            let index = def
                .inputs
                .iter()
                .position(|name| name == input)
                .ok_or_else(|| {
                    TesseraError::Kernel(format!(
                        "kernel {} references unknown input '{}'",
                        def.name, input
                    ))
                })?;
            Ok(pixels[index].to_array()[channel.index()])
        }
        Expr::BinOp { op, left, right } => {
            let l = eval_expr(def, left, pixels)?;
            let r = eval_expr(def, right, pixels)?;
            Ok(match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
            })
        }
    }
}

/// Run a kernel over whole frame buffers of identical size.
///
/// A zero-input kernel needs an explicit output size, so `size` is used when
/// `inputs` is empty and ignored otherwise.
pub fn apply(
    def: &KernelDef,
    inputs: &[&FrameBuffer],
    size: (u32, u32),
) -> TesseraResult<FrameBuffer> {
    let (width, height) = match inputs.first() {
        Some(first) => {
            if let Some(other) = inputs.iter().find(|fb| !fb.same_size(first)) {
                return Err(TesseraError::Kernel(format!(
                    "kernel {} inputs differ in size: {}x{} vs {}x{}",
                    def.name, first.width, first.height, other.width, other.height
                )));
            }
            (first.width, first.height)
        }
        None => size,
    };

    let count = (width as usize) * (height as usize);
    let pixels = (0..count)
        .into_par_iter()
        .map(|i| {
            let sample: Vec<Color> = inputs.iter().map(|fb| fb.pixels[i]).collect();
            evaluate_pixel(def, &sample)
        })
        .collect::<TesseraResult<Vec<Color>>>()?;

    tracing::debug!(kernel = %def.name, width, height, "applied kernel on cpu");
    Ok(FrameBuffer {
        pixels,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_kernel() -> KernelDef {
        let sum = |c| Expr::input("a", c) + Expr::input("b", c);
        KernelDef::new(
            "Add",
            &["a", "b"],
            "out",
            [sum(Channel::R), sum(Channel::G), sum(Channel::B), sum(Channel::A)],
        )
    }

    #[test]
    fn test_evaluate_pixel() {
        let c = evaluate_pixel(
            &add_kernel(),
            &[Color::rgba(0.25, 0.0, 0.5, 0.5), Color::rgba(0.25, 0.5, 0.0, 0.25)],
        )
        .unwrap();
        assert_eq!(c, Color::rgba(0.5, 0.5, 0.5, 0.75));
    }

    #[test]
    fn test_evaluate_pixel_arity_mismatch() {
        assert!(evaluate_pixel(&add_kernel(), &[Color::RED]).is_err());
    }

    #[test]
    fn test_apply_frames() {
        let a = FrameBuffer::solid(3, 2, Color::rgba(0.25, 0.0, 0.0, 0.25));
        let b = FrameBuffer::solid(3, 2, Color::rgba(0.0, 0.25, 0.0, 0.25));
        let out = apply(&add_kernel(), &[&a, &b], (0, 0)).unwrap();
        assert_eq!(out.width, 3);
        assert!(out.pixels.iter().all(|p| *p == Color::rgba(0.25, 0.25, 0.0, 0.5)));
    }

    #[test]
    fn test_apply_size_mismatch() {
        let a = FrameBuffer::new(3, 2);
        let b = FrameBuffer::new(2, 3);
        assert!(apply(&add_kernel(), &[&a, &b], (0, 0)).is_err());
    }

    #[test]
    fn test_apply_zero_inputs_uses_size() {
        let fill = KernelDef::new(
            "Fill",
            &[],
            "out",
            [
                Expr::constant(1.0),
                Expr::constant(0.0),
                Expr::constant(0.0),
                Expr::constant(1.0),
            ],
        );
        let out = apply(&fill, &[], (2, 2)).unwrap();
        assert_eq!(out, FrameBuffer::solid(2, 2, Color::RED));
    }
}
