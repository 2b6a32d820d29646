use std::ops::{Add, Mul, Sub};

/// A color channel of an RGBA pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    R,
    G,
    B,
    A,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::R, Channel::G, Channel::B, Channel::A];

    /// WGSL swizzle component.
    pub fn swizzle(&self) -> &'static str {
        match self {
            Channel::R => "r",
            Channel::G => "g",
            Channel::B => "b",
            Channel::A => "a",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Channel::R => 0,
            Channel::G => 1,
            Channel::B => 2,
            Channel::A => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
}

/// A scalar per-pixel expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f32),
    /// One channel of a named input pixel at the current coordinate.
    Input { input: String, channel: Channel },
    BinOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn constant(value: f32) -> Self {
        Expr::Const(value)
    }

    pub fn input(input: impl Into<String>, channel: Channel) -> Self {
        Expr::Input {
            input: input.into(),
            channel,
        }
    }

    fn binop(op: Op, left: Expr, right: Expr) -> Self {
        Expr::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Visit every input reference in the expression.
    pub fn for_each_input<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Expr::Const(_) => {}
            Expr::Input { input, .. } => f(input),
            Expr::BinOp { left, right, .. } => {
                left.for_each_input(f);
                right.for_each_input(f);
            }
        }
    }
}

impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::binop(Op::Add, self, rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::binop(Op::Sub, self, rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::binop(Op::Mul, self, rhs)
    }
}

/// A parameterless per-pixel kernel: every output channel is an expression
/// over the input pixels at the same coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelDef {
    pub name: String,
    pub inputs: Vec<String>,
    pub output: String,
    /// Output expressions in RGBA order.
    pub channels: [Expr; 4],
}

impl KernelDef {
    pub fn new(
        name: impl Into<String>,
        inputs: &[&str],
        output: impl Into<String>,
        channels: [Expr; 4],
    ) -> Self {
        Self {
            name: name.into(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            output: output.into(),
            channels,
        }
    }

    pub fn channel(&self, channel: Channel) -> &Expr {
        &self.channels[channel.index()]
    }
}
