/// WGSL source of the default full-screen blit.
pub const BLIT_SHADER: &str = include_str!("blit.wgsl");

/// Description of a full-screen draw program: a quad covering the whole
/// target that samples the bound source texture.
///
/// The blend equation is not part of the pipeline description; devices
/// combine it with the framebuffer's current blend function at draw time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlitPipeline {
    label: &'static str,
    shader_source: &'static str,
    vertex_entry: &'static str,
    fragment_entry: &'static str,
}

impl BlitPipeline {
    /// The pipeline every render instance is created with.
    pub fn default_blit() -> Self {
        Self {
            label: "default_blit",
            shader_source: BLIT_SHADER,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn shader_source(&self) -> &'static str {
        self.shader_source
    }

    pub fn vertex_entry(&self) -> &'static str {
        self.vertex_entry
    }

    pub fn fragment_entry(&self) -> &'static str {
        self.fragment_entry
    }
}

impl Default for BlitPipeline {
    fn default() -> Self {
        Self::default_blit()
    }
}
