//! # tessera-render
//!
//! The accelerated half of Tessera's dual execution model. A
//! [`RenderInstance`] is one worker's rendering context: a render device, a
//! single reusable [`Framebuffer`] and the default full-screen
//! [`BlitPipeline`]. Nodes composite textures through the instance's scoped
//! bind guards so no attachment or binding outlives a node call.

pub mod blit;
pub mod device;
pub mod framebuffer;
pub mod gpu;
pub mod instance;
pub mod kernel_runner;
pub mod registry;
pub mod software;
pub mod texture;
pub mod wgpu_device;

pub use blit::BlitPipeline;
pub use device::{BlendFactor, BlendFunc, DrawCall, RenderDevice};
pub use framebuffer::Framebuffer;
pub use gpu::GpuContext;
pub use instance::{AttachedTarget, BoundSource, BoundTarget, RenderFault, RenderInstance, RenderParams};
pub use registry::{SharedInstance, WorkerBinding, WorkerId};
pub use software::SoftwareDevice;
pub use texture::{TextureHandle, TextureId};
pub use wgpu_device::WgpuDevice;
