use tessera_core::{BackendKind, Color, FrameBuffer, TesseraResult};

use crate::blit::BlitPipeline;
use crate::texture::TextureHandle;

/// Weight applied to one side of the blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

impl BlendFactor {
    pub fn weight(&self, src: &Color, dst: &Color) -> f32 {
        match self {
            BlendFactor::Zero => 0.0,
            BlendFactor::One => 1.0,
            BlendFactor::SrcAlpha => src.a,
            BlendFactor::OneMinusSrcAlpha => 1.0 - src.a,
            BlendFactor::DstAlpha => dst.a,
            BlendFactor::OneMinusDstAlpha => 1.0 - dst.a,
        }
    }
}

/// Fixed-function blend equation `result = src * src_factor + dst * dst_factor`,
/// applied identically to color and alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    /// Source overwrites the destination.
    pub const REPLACE: BlendFunc = BlendFunc {
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
    };

    /// Porter-Duff "over" for premultiplied colors.
    pub const ALPHA_OVER: BlendFunc = BlendFunc {
        src: BlendFactor::One,
        dst: BlendFactor::OneMinusSrcAlpha,
    };

    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self { src, dst }
    }

    /// Evaluate the equation for one pixel.
    pub fn apply(&self, src: Color, dst: Color) -> Color {
        let sf = self.src.weight(&src, &dst);
        let df = self.dst.weight(&src, &dst);
        Color {
            r: src.r * sf + dst.r * df,
            g: src.g * sf + dst.g * df,
            b: src.b * sf + dst.b * df,
            a: src.a * sf + dst.a * df,
        }
    }
}

impl Default for BlendFunc {
    fn default() -> Self {
        BlendFunc::REPLACE
    }
}

/// One full-screen draw: `source` blended over every pixel of `target`.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub target: &'a TextureHandle,
    pub source: &'a TextureHandle,
    pub blend: BlendFunc,
    pub pipeline: &'a BlitPipeline,
}

/// The GPU-context collaborator a [`RenderInstance`](crate::RenderInstance)
/// drives. Devices are stateless between calls; binding state lives in the
/// instance's [`Framebuffer`](crate::Framebuffer).
pub trait RenderDevice: Send {
    fn backend(&self) -> BackendKind;

    /// Allocate a texture cleared to transparent black.
    fn create_texture(&mut self, width: u32, height: u32) -> TesseraResult<TextureHandle>;

    /// Replace a texture's contents. `frame` must match the texture size.
    fn upload(&mut self, texture: &TextureHandle, frame: &FrameBuffer) -> TesseraResult<()>;

    /// Read a texture back to the CPU.
    fn download(&mut self, texture: &TextureHandle) -> TesseraResult<FrameBuffer>;

    /// Allocate a new texture holding a copy of `texture`.
    fn copy_texture(&mut self, texture: &TextureHandle) -> TesseraResult<TextureHandle>;

    /// Execute a full-screen blit.
    fn draw(&mut self, call: &DrawCall<'_>) -> TesseraResult<()>;
}
