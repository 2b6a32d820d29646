use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tessera_core::{BackendKind, FrameBuffer, TesseraError, TesseraResult};

use crate::gpu::GpuTexture;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique texture identity, used for logging and fault reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        TextureId(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

/// Backing store of a texture; which variant depends on the device that
/// created it.
pub(crate) enum TextureStorage {
    Cpu(RwLock<FrameBuffer>),
    Gpu(GpuTexture),
}

/// A device-resident image.
pub struct RenderTexture {
    id: TextureId,
    width: u32,
    height: u32,
    storage: TextureStorage,
}

/// Shared-ownership handle to a [`RenderTexture`].
///
/// Cloning is cheap and the texture lives as long as its longest-lived
/// holder. "No image" is represented as `Option::<TextureHandle>::None`, never
/// as a special handle.
#[derive(Clone)]
pub struct TextureHandle(Arc<RenderTexture>);

impl TextureHandle {
    pub(crate) fn new(width: u32, height: u32, storage: TextureStorage) -> Self {
        TextureHandle(Arc::new(RenderTexture {
            id: TextureId::next(),
            width,
            height,
            storage,
        }))
    }

    pub fn id(&self) -> TextureId {
        self.0.id
    }

    pub fn width(&self) -> u32 {
        self.0.width
    }

    pub fn height(&self) -> u32 {
        self.0.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.0.width, self.0.height)
    }

    pub fn backend(&self) -> BackendKind {
        match self.0.storage {
            TextureStorage::Cpu(_) => BackendKind::Software,
            TextureStorage::Gpu(_) => BackendKind::Wgpu,
        }
    }

    /// True when another handle to the same texture exists. A shared texture
    /// must not be written in place.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.0) > 1
    }

    /// Number of live handles, including this one.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn ptr_eq(&self, other: &TextureHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn storage(&self) -> &TextureStorage {
        &self.0.storage
    }

    pub(crate) fn cpu_storage(&self) -> TesseraResult<&RwLock<FrameBuffer>> {
        match &self.0.storage {
            TextureStorage::Cpu(frame) => Ok(frame),
            TextureStorage::Gpu(_) => Err(TesseraError::render(format!(
                "{} lives on the wgpu backend, not the software backend",
                self.id()
            ))),
        }
    }

    pub(crate) fn gpu_storage(&self) -> TesseraResult<&GpuTexture> {
        match &self.0.storage {
            TextureStorage::Gpu(texture) => Ok(texture),
            TextureStorage::Cpu(_) => Err(TesseraError::render(format!(
                "{} lives on the software backend, not the wgpu backend",
                self.id()
            ))),
        }
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("id", &self.id())
            .field("size", &self.size())
            .field("backend", &self.backend())
            .field("holders", &self.holders())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_texture(width: u32, height: u32) -> TextureHandle {
        TextureHandle::new(
            width,
            height,
            TextureStorage::Cpu(RwLock::new(FrameBuffer::new(width, height))),
        )
    }

    #[test]
    fn test_ids_are_unique() {
        let a = cpu_texture(1, 1);
        let b = cpu_texture(1, 1);
        assert_ne!(a.id(), b.id());
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_sharing_tracks_clones() {
        let a = cpu_texture(2, 2);
        assert!(!a.is_shared());
        let b = a.clone();
        assert!(a.is_shared());
        assert!(a.ptr_eq(&b));
        drop(b);
        assert!(!a.is_shared());
    }

    #[test]
    fn test_backend_storage_checks() {
        let a = cpu_texture(2, 2);
        assert_eq!(a.backend(), BackendKind::Software);
        assert!(a.cpu_storage().is_ok());
        assert!(a.gpu_storage().is_err());
    }
}
