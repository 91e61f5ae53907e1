use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use serde_json::json;
use sha2::Digest as _;

use filtergraph::{
    Affine, Filter, GraphBuilder, Quality, RenderContext, RenderHints, TileCache, TileCacheOpts,
};

#[derive(Clone, Debug)]
struct BenchArgs {
    size: u32,
    scale: f64,
    rotate: f64,
    warmup: u32,
    repeats: u32,
    blur: f64,
    quality: Quality,
    shared_cache: bool,
}

#[derive(Clone, Debug, Default)]
struct RunMetrics {
    build: Duration,
    render_cold: Duration,
    render_warm: Duration,
    wall_total: Duration,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = parse_args()?;
    if args.size == 0 {
        anyhow::bail!("--size must be > 0");
    }
    if !(args.scale.is_finite() && args.scale > 0.0) {
        anyhow::bail!("--scale must be finite and > 0");
    }
    if !(args.blur.is_finite() && args.blur >= 0.0) {
        anyhow::bail!("--blur must be finite and >= 0");
    }

    let desc = benchmark_graph(&args);
    if args.warmup > 0 {
        eprintln!("warmup: {} run(s)", args.warmup);
        for _ in 0..args.warmup {
            run_once(&args, &desc)?;
        }
    }

    eprintln!(
        "bench: {repeats} run(s) ({profile} build), {size}x{size} user units, scale={scale}, rotate={rotate}deg, blur={blur}, quality={quality:?}, cache={cache}",
        repeats = args.repeats,
        profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
        size = args.size,
        scale = args.scale,
        rotate = args.rotate,
        blur = args.blur,
        quality = args.quality,
        cache = if args.shared_cache { "shared" } else { "per-run" },
    );

    let mut runs = Vec::<RunMetrics>::with_capacity(args.repeats as usize);
    let mut digest = None;
    for _ in 0..args.repeats {
        let (metrics, hash) = run_once(&args, &desc)?;
        if let Some(prev) = &digest
            && prev != &hash
        {
            anyhow::bail!("output changed between runs ({prev} vs {hash})");
        }
        digest = Some(hash);
        runs.push(metrics);
    }
    if let Some(d) = digest {
        eprintln!("output sha256: {d}");
    }
    report_percentiles(&runs);
    Ok(())
}

fn benchmark_graph(args: &BenchArgs) -> String {
    let n = f64::from(args.size);
    let region = json!({"x0": 0.0, "y0": 0.0, "x1": n, "y1": n});
    json!({
        "nodes": [
            {"id": "noise", "op": "turbulence", "region": region,
             "base_frequency": [0.04, 0.04], "octaves": 3, "kind": "fractal_noise", "seed": 7},
            {"id": "bump", "op": "gaussian_blur", "std_dev": [args.blur, args.blur],
             "inputs": ["noise"]},
            {"id": "lit", "op": "diffuse_lighting", "surface_scale": 4.0,
             "light": {"type": "distant", "azimuth": 225.0, "elevation": 40.0},
             "inputs": ["bump"]},
            {"id": "paper", "op": "flood", "region": region, "color": "#f4ecd8"},
            {"id": "shaded", "op": "composite",
             "rule": {"arithmetic": {"k1": 1.0, "k2": 0.0, "k3": 0.0, "k4": 0.0}},
             "inputs": ["lit", "paper"]},
            {"id": "warped", "op": "displacement_map", "scale": 6.0, "x_channel": "r",
             "y_channel": "g", "inputs": ["shaded", "noise"]},
            {"id": "tiled", "op": "tile",
             "tile_region": {"x0": 0.0, "y0": 0.0, "x1": n / 2.0, "y1": n / 2.0},
             "tiled_region": region, "inputs": ["warped"]}
        ],
        "output": "tiled"
    })
    .to_string()
}

fn run_once(args: &BenchArgs, desc: &str) -> anyhow::Result<(RunMetrics, String)> {
    let t_wall = Instant::now();
    let mut m = RunMetrics::default();

    let t0 = Instant::now();
    let graph = GraphBuilder::default()
        .build_json(desc)
        .context("build benchmark graph")?;
    m.build = t0.elapsed();

    let at = Affine::rotate(args.rotate.to_radians()) * Affine::scale(args.scale);
    let hints = RenderHints {
        quality: args.quality,
        ..RenderHints::default()
    };
    let mut ctx = RenderContext::new(at).with_hints(hints);
    if !args.shared_cache {
        ctx = ctx.with_tile_cache(Arc::new(TileCache::new(TileCacheOpts::default())));
    }

    let t0 = Instant::now();
    let first = render(&graph.output, &ctx)?;
    m.render_cold = t0.elapsed();

    let t0 = Instant::now();
    let second = render(&graph.output, &ctx)?;
    m.render_warm = t0.elapsed();
    if first != second {
        anyhow::bail!("warm render differs from cold render");
    }

    m.wall_total = t_wall.elapsed();
    Ok((m, second))
}

fn render(filter: &Filter, ctx: &RenderContext) -> anyhow::Result<String> {
    let raster = filter
        .render(ctx)?
        .context("benchmark graph rendered nothing")?;
    Ok(sha256_hex(raster.data()))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn parse_args() -> anyhow::Result<BenchArgs> {
    let mut args = std::env::args().skip(1);

    let mut out = BenchArgs {
        size: 256,
        scale: 1.0,
        rotate: 0.0,
        warmup: 1,
        repeats: 20,
        blur: 1.5,
        quality: Quality::Default,
        shared_cache: false,
    };

    while let Some(a) = args.next() {
        match a.as_str() {
            "--size" => out.size = parse_num(args.next(), "--size")?,
            "--scale" => out.scale = parse_num(args.next(), "--scale")?,
            "--rotate" => out.rotate = parse_num(args.next(), "--rotate")?,
            "--warmup" => out.warmup = parse_num(args.next(), "--warmup")?,
            "--repeats" => out.repeats = parse_num(args.next(), "--repeats")?,
            "--blur" => out.blur = parse_num(args.next(), "--blur")?,
            "--quality" => {
                let v = args.next().ok_or_else(|| {
                    anyhow::anyhow!("missing value for --quality (speed|default|quality)")
                })?;
                out.quality = match v.as_str() {
                    "speed" => Quality::Speed,
                    "default" => Quality::Default,
                    "quality" => Quality::Quality,
                    _ => anyhow::bail!("unknown --quality '{v}' (expected speed|default|quality)"),
                };
            }
            "--shared-cache" => out.shared_cache = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => anyhow::bail!("unknown arg '{a}' (try --help)"),
        }
    }

    Ok(out)
}

fn print_help() {
    eprintln!(
        r#"filtergraph-bench

Builds a noise/lighting/displacement/tile graph and renders it repeatedly, reporting
p50/p90/p99 for graph construction and cold/warm renders.

Usage:
  cargo run -q --release
  cargo run -q --release -- --size 512 --scale 2 --rotate 15
  cargo run -q --release -- --quality speed --shared-cache

Args:
  --size N         (default 256; user-space edge length of the graph)
  --scale S        (default 1)
  --rotate DEG     (default 0)
  --warmup N       (default 1)
  --repeats N      (default 20)
  --blur S         (default 1.5; std-dev of the bump-map blur)
  --quality Q      speed|default|quality (default default)
  --shared-cache   use the process-wide tile cache instead of one per run
"#
    );
}

fn parse_num<T>(v: Option<String>, flag: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<T>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn report_percentiles(runs: &[RunMetrics]) {
    type Getter = fn(&RunMetrics) -> Duration;
    type Field = (&'static str, Getter);

    fn collect(runs: &[RunMetrics], f: fn(&RunMetrics) -> Duration) -> Vec<Duration> {
        let mut v = runs.iter().map(f).collect::<Vec<_>>();
        v.sort_by_key(|d| d.as_nanos());
        v
    }

    fn p(v: &[Duration], p: f64) -> Duration {
        if v.is_empty() {
            return Duration::ZERO;
        }
        let n = v.len();
        let rank = (p * (n as f64)).ceil().clamp(1.0, n as f64) as usize;
        v[rank - 1]
    }

    fn fmt_ms(d: Duration) -> String {
        format!("{:.3}ms", d.as_secs_f64() * 1000.0)
    }

    let fields: &[Field] = &[
        ("build", |m| m.build),
        ("render_cold", |m| m.render_cold),
        ("render_warm", |m| m.render_warm),
        ("wall_total", |m| m.wall_total),
    ];

    eprintln!("\npercentiles across runs (p50/p90/p99):");
    for (name, getter) in fields {
        let v = collect(runs, *getter);
        eprintln!(
            "  {name:12} p50={p50:>10}  p90={p90:>10}  p99={p99:>10}",
            name = *name,
            p50 = fmt_ms(p(&v, 0.50)),
            p90 = fmt_ms(p(&v, 0.90)),
            p99 = fmt_ms(p(&v, 0.99))
        );
    }
}
