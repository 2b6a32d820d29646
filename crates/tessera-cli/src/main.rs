use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tessera_core::{BackendKind, Color, FrameBuffer, Rational, TesseraConfig, TimeRange};
use tessera_node::{render_frame, AlphaOverBlend, Node, NodeCatalog, SolidGenerator};
use tessera_render::RenderInstance;

const DEFAULT_CONFIG: &str = "tessera.toml";

#[derive(Parser)]
#[command(
    name = "tessera",
    version,
    about = "Tessera: node-based GPU compositing",
    long_about = "Tessera evaluates compositing node graphs on a render device.\nEvery node has an accelerated path and a portable per-pixel kernel."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a solid-over-solid composite to a PNG
    Render {
        /// Config file (default: ./tessera.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Base color as hex (#RRGGBB or #RRGGBBAA)
        #[arg(long, default_value = "#CC3333")]
        base: String,

        /// Blend color as hex, composited over the base
        #[arg(long, default_value = "#0000FF80")]
        blend: String,

        /// Start of the rendered frame in seconds, as "n" or "num/den"
        #[arg(long, default_value = "0")]
        time: Rational,

        /// Render device: software or wgpu (overrides the config)
        #[arg(long)]
        backend: Option<BackendKind>,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the generated alpha-over kernel
    Kernel {
        /// Print the descriptor as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in node types
    Nodes,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Render { config, .. } => load_config(config.as_deref())?,
        _ => TesseraConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter)),
        )
        .init();

    match cli.command {
        Commands::Render {
            base,
            blend,
            time,
            backend,
            output,
            ..
        } => cmd_render(config, &base, &blend, time, backend, &output),
        Commands::Kernel { json } => cmd_kernel(json),
        Commands::Nodes => cmd_nodes(),
    }
}

/// An explicit path must load; the default path is optional.
fn load_config(path: Option<&Path>) -> Result<TesseraConfig> {
    match path {
        Some(path) => TesseraConfig::load_from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                TesseraConfig::load_from_file(default)
                    .with_context(|| format!("failed to load config: {}", default.display()))
            } else {
                Ok(TesseraConfig::default())
            }
        }
    }
}

fn cmd_render(
    mut config: TesseraConfig,
    base: &str,
    blend: &str,
    time: Rational,
    backend: Option<BackendKind>,
    output: &Path,
) -> Result<()> {
    let start = Instant::now();
    if let Some(backend) = backend {
        config.render.backend = backend;
    }

    let base = Color::from_hex(base).with_context(|| format!("invalid base color: {}", base))?;
    let blend = Color::from_hex(blend).with_context(|| format!("invalid blend color: {}", blend))?;
    let range = TimeRange::starting_at(time, config.timeline.frame_rate)
        .context("invalid frame window")?;

    let mut graph = AlphaOverBlend::new();
    graph
        .base_input_mut()
        .connect(Arc::new(SolidGenerator::with_color(base)), "tex_out")?;
    graph
        .blend_input_mut()
        .connect(Arc::new(SolidGenerator::with_color(blend)), "tex_out")?;

    let mut instance =
        RenderInstance::from_config(&config.render).context("failed to create render instance")?;
    let faults = instance.subscribe_faults();

    tracing::info!(
        backend = %instance.backend(),
        width = config.render.width,
        height = config.render.height,
        %range,
        "rendering"
    );
    let frame = render_frame(&graph, "tex_out", &range, &mut instance)?;
    graph.release();

    let Some(frame) = frame else {
        let reasons: Vec<String> = faults.try_iter().map(|f| f.message).collect();
        anyhow::bail!("composite produced no image: {}", reasons.join("; "));
    };

    write_png(&frame, output)?;
    let hash = tessera_core::hash::hash_frame(&frame);
    tracing::info!(
        output = %output.display(),
        hash = %hash.to_hex(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "wrote frame"
    );
    println!("✓ Rendered {} ({}x{})", output.display(), frame.width, frame.height);
    println!("   Content hash: {}", hash.to_hex());
    Ok(())
}

/// Convert a premultiplied frame to the straight-alpha image PNG expects.
fn to_image(frame: &FrameBuffer) -> Result<image::RgbaImage> {
    image::RgbaImage::from_raw(frame.width, frame.height, frame.to_straight_rgba8())
        .context("frame buffer size does not match its dimensions")
}

fn write_png(frame: &FrameBuffer, output: &Path) -> Result<()> {
    let image = to_image(frame)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))
}

fn cmd_kernel(json: bool) -> Result<()> {
    let node = AlphaOverBlend::new();
    let kernel = node
        .code("tex_out")
        .context("alpha over produced no kernel")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&kernel)?);
    } else {
        println!("// {} ({})", kernel.name, kernel.fingerprint().to_hex());
        println!("{}", kernel.source);
    }
    Ok(())
}

fn cmd_nodes() -> Result<()> {
    let catalog = NodeCatalog::builtin();
    println!("Tessera nodes ({})", catalog.len());
    for descriptor in catalog.list() {
        println!("   {:<28} {}", descriptor.id, descriptor.name);
        println!("   {:<28} {}", "", descriptor.description);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render_args() {
        let cli = Cli::try_parse_from([
            "tessera", "render", "--time", "1001/30000", "--backend", "wgpu", "-o", "out.png",
        ])
        .unwrap();
        match cli.command {
            Commands::Render { time, backend, output, .. } => {
                assert_eq!(time, Rational::new(1001, 30000).unwrap());
                assert_eq!(backend, Some(BackendKind::Wgpu));
                assert_eq!(output, PathBuf::from("out.png"));
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        assert!(load_config(Some(Path::new("does/not/exist.toml"))).is_err());
    }

    #[test]
    fn test_png_image_is_straight_alpha() {
        let frame = FrameBuffer::solid(2, 1, Color::rgba(0.5, 0.0, 0.0, 0.5));
        let image = to_image(&frame).unwrap();
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(1, 0).0, [255, 0, 0, 128]);
    }
}
