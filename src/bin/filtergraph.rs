use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use filtergraph::{
    Affine, ColorSpace, GraphBuilder, GraphDesc, Interpolation, PixelRect, Quality, Raster,
    RasterSurface, RenderContext, RenderHints,
};

#[derive(Parser, Debug)]
#[command(name = "filtergraph", version)]
struct Cli {
    /// Log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the output node of a graph description as a PNG.
    Render(RenderArgs),
    /// Print the user-space bounds of every node as JSON.
    Bounds(BoundsArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input graph JSON. Image paths resolve against its directory.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Uniform scale applied to user space.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Rotation in degrees, applied after scaling.
    #[arg(long, default_value_t = 0.0)]
    rotate: f64,

    /// Device-space translation `X,Y`, applied last.
    #[arg(long, value_parser = parse_pair, default_value = "0,0")]
    translate: (f64, f64),

    /// Canvas width; the rendered extent of the output node otherwise.
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Canvas height.
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Speed/quality preference.
    #[arg(long, value_enum, default_value_t = QualityChoice::Default)]
    quality: QualityChoice,

    /// Resampling filter for residual transforms.
    #[arg(long, value_enum, default_value_t = InterpolationChoice::Bilinear)]
    interpolation: InterpolationChoice,
}

#[derive(Parser, Debug)]
struct BoundsArgs {
    /// Input graph JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityChoice {
    Speed,
    Default,
    Quality,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InterpolationChoice {
    Nearest,
    Bilinear,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Bounds(args) => cmd_bounds(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x '{x}': {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y '{y}': {e}"))?;
    Ok((x, y))
}

fn load_graph(path: &Path) -> anyhow::Result<filtergraph::BuiltGraph> {
    let desc = GraphDesc::load(path)?;
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    let graph = GraphBuilder::new(root)
        .build(&desc)
        .with_context(|| format!("build graph '{}'", path.display()))?;
    Ok(graph)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let graph = load_graph(&args.in_path)?;
    let transform = Affine::translate(args.translate)
        * Affine::rotate(args.rotate.to_radians())
        * Affine::scale(args.scale);
    let hints = RenderHints {
        quality: match args.quality {
            QualityChoice::Speed => Quality::Speed,
            QualityChoice::Default => Quality::Default,
            QualityChoice::Quality => Quality::Quality,
        },
        interpolation: match args.interpolation {
            InterpolationChoice::Nearest => Interpolation::Nearest,
            InterpolationChoice::Bilinear => Interpolation::Bilinear,
        },
        ..RenderHints::default()
    };

    let raster = match (args.width, args.height) {
        (Some(w), Some(h)) => {
            let mut surface =
                RasterSurface::new(PixelRect::new(0, 0, w, h)).with_transform(transform);
            filtergraph::draw_filter_with_hints(&mut surface, &graph.output, hints)?;
            surface.into_raster()
        }
        _ => {
            let ctx = RenderContext::new(transform).with_hints(hints);
            let rendered = graph
                .output
                .render(&ctx)?
                .context("output node draws nothing at this transform")?;
            (*rendered).clone()
        }
    };
    tracing::debug!(rect = ?raster.rect(), "rendered output");
    write_png(&raster, &args.out)
}

fn write_png(raster: &Raster, out: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let straight = raster.to_color_space(ColorSpace::Srgb).to_unpremultiplied();
    image::save_buffer_with_format(
        out,
        straight.data(),
        straight.width(),
        straight.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))?;
    Ok(())
}

fn cmd_bounds(args: BoundsArgs) -> anyhow::Result<()> {
    let graph = load_graph(&args.in_path)?;
    let rect = |r: filtergraph::Rect| serde_json::json!([r.x0, r.y0, r.x1, r.y1]);
    let nodes: serde_json::Map<String, serde_json::Value> = graph
        .nodes
        .iter()
        .map(|(id, node)| (id.clone(), rect(node.bounds())))
        .collect();
    let out = serde_json::json!({
        "output": rect(graph.output.bounds()),
        "nodes": nodes,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
