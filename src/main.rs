use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use svg_raster::options::{ExportArea, Options};
use svg_raster::process::{self, BatchDirs};
use svg_raster::transform::{Rasterizer, ResourceTransformation, TransformCtx};
use svg_raster::{bridge, config, output};

#[derive(Parser)]
#[command(name = "svg-raster")]
#[command(about = "Rasterize SVG files to PNG through Inkscape")]
#[command(long_about = "\
Rasterize SVG files to PNG through Inkscape

The tool is driven as a subprocess, either streaming through stdin/stdout
(Inkscape 0.x) or through temp files (Inkscape 1.x and unknown versions).
When the tool is not installed, `build` copies pre-built PNGs from a
fallback directory instead of failing.

Output names follow the options:

  logo.svg  --width 100 --height 50     → logo-100x50.png
  logo.svg  --element-id mark --width 16 → logo-mark-16.png
  logo.svg  --export-area drawing        → logo-drawing.png
  logo.svg  --target-path brand.png      → brand.png

Run 'svg-raster gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Rasterization options shared by every command that renders.
#[derive(clap::Args, Clone)]
struct OptionArgs {
    /// Output width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Export only the element with this id
    #[arg(long)]
    element_id: Option<String>,

    /// `page`, `drawing`, or an explicit `x0:y0:x1:y1` region
    #[arg(long)]
    export_area: Option<String>,

    /// Snap the export area outward to whole pixels
    #[arg(long)]
    export_area_snap: bool,

    /// Output path, overriding the derived name
    #[arg(long)]
    target_path: Option<String>,

    /// Raw option entry, decoded leniently (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,
}

impl OptionArgs {
    /// `--set` entries first, explicit flags on top.
    fn to_options(&self) -> Result<Options, Box<dyn std::error::Error>> {
        let map: Map<String, Value> = self
            .set
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let mut options = Options::decode(Some(&map))?;
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        if let Some(id) = &self.element_id {
            options.element_id = id.clone();
        }
        if let Some(area) = &self.export_area {
            options.export_area = ExportArea::parse(area);
        }
        if self.export_area_snap {
            options.export_area_snap = true;
        }
        if let Some(target) = &self.target_path {
            options.target_path = target.clone();
        }
        Ok(options)
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))
}

#[derive(Subcommand)]
enum Command {
    /// Rasterize a single SVG file
    Convert {
        input: PathBuf,
        /// Output file (default: derived from the input name)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Rasterize every SVG under a directory
    Build {
        /// Source directory
        #[arg(long, default_value = "svg")]
        source: PathBuf,
        /// Output directory
        #[arg(long, default_value = "dist")]
        output: PathBuf,
        /// Pre-built PNGs used when the tool is not installed
        #[arg(long)]
        fallback: Option<PathBuf>,
        /// Disable the result cache and re-render everything
        #[arg(long)]
        no_cache: bool,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print the cache key for a set of options
    Key {
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print the tool command line for a set of options
    Args {
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Report the tool, its version and the exchange strategy
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_dir = cli.config_dir;
    let load = || config::load_config(&config_dir);

    match cli.command {
        Command::Convert {
            input,
            output: dest,
            options,
        } => {
            let rasterizer = Rasterizer::new(load()?);
            let options = options.to_options()?;
            convert(&rasterizer, options, &input, dest.as_deref())?;
        }
        Command::Build {
            source,
            output: output_dir,
            fallback,
            no_cache,
            options,
        } => {
            let raster_config = load()?;
            init_thread_pool(&raster_config.processing);
            let rasterizer = Rasterizer::new(raster_config);
            let options = options.to_options()?;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::process(
                BatchDirs {
                    source: &source,
                    output: &output_dir,
                    fallback: fallback.as_deref(),
                },
                &rasterizer,
                &options,
                !no_cache,
                Some(tx),
            );
            printer.join().ok();
            let result = result?;
            println!("Files: {}", result.cache_stats);
        }
        Command::Key { options } => {
            let rasterizer = Rasterizer::new(load()?);
            println!("{}", rasterizer.process(options.to_options()?).key());
        }
        Command::Args { options } => {
            let rasterizer = Rasterizer::new(load()?);
            let options = options.to_options()?;
            let tool = rasterizer
                .locate_tool()
                .unwrap_or_else(|_| PathBuf::from(&rasterizer.config().tool.binary));
            let args = rasterizer.exchange(&tool).describe_args(&options.to_args());
            println!(
                "{}",
                output::format_command_line(&tool.to_string_lossy(), &args)
            );
        }
        Command::Check => {
            let rasterizer = Rasterizer::new(load()?);
            let cfg = rasterizer.config();
            let tool = rasterizer.locate_tool().ok();
            let version = tool.as_deref().and_then(bridge::probe_version);
            let exchange = tool.as_deref().map(|t| rasterizer.exchange(t).name());
            let staging_dir = cfg.staging.dir();
            output::print_check(&output::CheckReport {
                binary: &cfg.tool.binary,
                tool: tool.as_deref(),
                version,
                exchange,
                staging_dir: &staging_dir,
                staging_prefix: &cfg.staging.prefix,
            });
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn convert(
    rasterizer: &Rasterizer,
    options: Options,
    input: &Path,
    dest: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut from = std::fs::File::open(input)?;
    let mut rendered = Vec::new();
    let source_path = input.to_string_lossy().into_owned();
    let mut ctx = TransformCtx::new(&source_path, &mut from, &mut rendered);
    rasterizer.process(options).transform(&mut ctx)?;
    let derived = PathBuf::from(&ctx.out_path);
    drop(ctx);

    let dest = dest.map(Path::to_path_buf).unwrap_or(derived);
    std::fs::write(&dest, &rendered)?;
    println!("{} → {}", input.display(), dest.display());
    Ok(())
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the config can constrain
/// down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
