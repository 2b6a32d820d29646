use std::sync::RwLock;

use rayon::prelude::*;
use tessera_core::{BackendKind, FrameBuffer, TesseraError, TesseraResult};

use crate::device::{DrawCall, RenderDevice};
use crate::texture::{TextureHandle, TextureStorage};

/// CPU render device. Textures are f32 frame buffers and blits run the
/// blend equation per pixel, in parallel over rows.
#[derive(Debug, Default)]
pub struct SoftwareDevice {
    draws: u64,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blits executed so far.
    pub fn draw_count(&self) -> u64 {
        self.draws
    }
}

fn poisoned(texture: &TextureHandle) -> TesseraError {
    TesseraError::render(format!("{} lock poisoned", texture.id()))
}

impl RenderDevice for SoftwareDevice {
    fn backend(&self) -> BackendKind {
        BackendKind::Software
    }

    fn create_texture(&mut self, width: u32, height: u32) -> TesseraResult<TextureHandle> {
        if width == 0 || height == 0 {
            return Err(TesseraError::InvalidArgument(format!(
                "cannot create a {}x{} texture",
                width, height
            )));
        }
        Ok(TextureHandle::new(
            width,
            height,
            TextureStorage::Cpu(RwLock::new(FrameBuffer::new(width, height))),
        ))
    }

    fn upload(&mut self, texture: &TextureHandle, frame: &FrameBuffer) -> TesseraResult<()> {
        if texture.size() != (frame.width, frame.height) {
            return Err(TesseraError::InvalidArgument(format!(
                "cannot upload a {}x{} frame into {} ({}x{})",
                frame.width,
                frame.height,
                texture.id(),
                texture.width(),
                texture.height()
            )));
        }
        let mut pixels = texture
            .cpu_storage()?
            .write()
            .map_err(|_| poisoned(texture))?;
        pixels.pixels.copy_from_slice(&frame.pixels);
        Ok(())
    }

    fn download(&mut self, texture: &TextureHandle) -> TesseraResult<FrameBuffer> {
        let pixels = texture
            .cpu_storage()?
            .read()
            .map_err(|_| poisoned(texture))?;
        Ok(pixels.clone())
    }

    fn copy_texture(&mut self, texture: &TextureHandle) -> TesseraResult<TextureHandle> {
        let frame = self.download(texture)?;
        let copy = self.create_texture(frame.width, frame.height)?;
        self.upload(&copy, &frame)?;
        tracing::trace!(from = %texture.id(), to = %copy.id(), "copied texture");
        Ok(copy)
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> TesseraResult<()> {
        if call.target.ptr_eq(call.source) {
            return Err(TesseraError::render(format!(
                "{} cannot be drawn onto itself",
                call.target.id()
            )));
        }
        let source = call
            .source
            .cpu_storage()?
            .read()
            .map_err(|_| poisoned(call.source))?;
        let mut target = call
            .target
            .cpu_storage()?
            .write()
            .map_err(|_| poisoned(call.target))?;

        let (tw, th) = (target.width as u64, target.height as u64);
        let (sw, sh) = (source.width as u64, source.height as u64);
        let blend = call.blend;
        let row_len = target.width as usize;

        // Full-screen quad: the source is stretched over the whole target and
        // sampled nearest at texel centers.
        target
            .pixels
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                let sy = ((2 * y as u64 + 1) * sh / (2 * th)) as usize;
                for (x, dst) in row.iter_mut().enumerate() {
                    let sx = ((2 * x as u64 + 1) * sw / (2 * tw)) as usize;
                    let src = source.pixels[sy * sw as usize + sx];
                    *dst = blend.apply(src, *dst);
                }
            });

        self.draws += 1;
        tracing::trace!(
            pipeline = call.pipeline.label(),
            target = %call.target.id(),
            source = %call.source.id(),
            "software blit"
        );
        Ok(())
    }
}
