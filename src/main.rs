use clap::{Parser, Subcommand, ValueEnum};
use dip_lab::analysis::{self, CHAIN_LINE_WIDTH};
use dip_lab::cache::SweepCache;
use dip_lab::capture::{CaptureSession, CaptureSettings, DirectoryFrames, RustfaceDetector};
use dip_lab::color::{self, ColorSpace};
use dip_lab::config::{self, LabConfig};
use dip_lab::filters::{self, FilterKind, Kernel};
use dip_lab::imaging::{Family, RustCodec, load_image};
use dip_lab::output;
use dip_lab::report::{self, ReportInput};
use dip_lab::sweep::{self, SweepRequest};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dip-lab")]
#[command(about = "Classical digital image processing demos")]
#[command(long_about = "\
Classical digital image processing demos

Every command takes an image, applies one technique and writes its results
to files, with a short summary on stdout.

  compress   JPEG quality and PNG level sweep with PSNR/SSIM, HTML report
  convert    Color space conversion with per-channel planes
  filter     Convolution, padding, low/high/band pass, Fourier spectrum
  analyze    Canny edges, Freeman chain code, integral projections
  capture    Build a face dataset from a folder of camera frames

Scratch layout for compress:

  scratch/
  ├── report.html
  ├── results.json
  ├── Image_jpeg/<name>_jpeg_<quality>.jpg
  └── Image_png/<name>_compressed_level<level>.png

Set RUST_LOG=debug for per-candidate logging.
Run 'dip-lab gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file merged over the stock defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep JPEG qualities and PNG levels, measure PSNR and SSIM
    Compress {
        image: PathBuf,
        /// Scratch directory for artifacts and the report
        #[arg(long)]
        scratch: Option<PathBuf>,
        /// Comma-separated JPEG qualities, e.g. 95,50,10
        #[arg(long, value_delimiter = ',')]
        jpeg_qualities: Option<Vec<u8>>,
        /// Comma-separated PNG levels, e.g. 0,6,9
        #[arg(long, value_delimiter = ',')]
        png_levels: Option<Vec<u8>>,
    },
    /// Convert to another color space
    Convert {
        image: PathBuf,
        /// rgb, xyz, lab, ycbcr, yiq, yuv, hsi or luv
        #[arg(long)]
        space: ColorSpace,
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
    /// Apply a spatial or frequency-domain filter
    Filter {
        image: PathBuf,
        operation: FilterOp,
        #[arg(long)]
        out: PathBuf,
        /// Kernel for `convolve`: average, sharpen or edge
        #[arg(long, default_value = "average")]
        kernel: Kernel,
        /// Border width for `pad`
        #[arg(long)]
        padding: Option<u32>,
    },
    /// Edges, chain code and projections
    Analyze {
        image: PathBuf,
        #[arg(long, default_value = "out")]
        out: PathBuf,
        /// Canny low threshold
        #[arg(long)]
        low: Option<f32>,
        /// Canny high threshold
        #[arg(long)]
        high: Option<f32>,
    },
    /// Capture face crops for one person from a folder of frames
    Capture {
        name: String,
        /// Directory of frames standing in for the camera
        #[arg(long)]
        frames: PathBuf,
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterOp {
    Convolve,
    Pad,
    Low,
    High,
    Band,
    Fourier,
    Denoise,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Compress {
            image,
            scratch,
            jpeg_qualities,
            png_levels,
        } => {
            let scratch =
                scratch.unwrap_or_else(|| PathBuf::from(&cfg.compression.scratch_dir));
            let jpeg = jpeg_qualities.unwrap_or_else(|| cfg.compression.jpeg_qualities.clone());
            let png = png_levels.unwrap_or_else(|| cfg.compression.png_levels.clone());
            run_compress(&image, &scratch, &[(Family::Jpeg, jpeg), (Family::Png, png)])?;
        }
        Command::Convert { image, space, out } => {
            let rgb = load_rgb(&image)?;
            let conversion = color::convert(&rgb, space)?;
            fs::create_dir_all(&out)?;
            let stem = file_stem(&image);
            let slug = space.name().to_ascii_lowercase();

            let mut written = Vec::new();
            let composite = out.join(format!("{}_{}.png", stem, slug));
            conversion.composite.save(&composite)?;
            written.push(composite);
            for plane in &conversion.channels {
                let label = plane
                    .label
                    .split_whitespace()
                    .next()
                    .unwrap_or("channel")
                    .to_ascii_lowercase();
                let path = out.join(format!("{}_{}_{}.png", stem, slug, label));
                plane.image.save(&path)?;
                written.push(path);
            }
            output::print_conversion_output(space, &written);
        }
        Command::Filter {
            image,
            operation,
            out,
            kernel,
            padding,
        } => {
            let rgb = load_rgb(&image)?;
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let name = match operation {
                FilterOp::Convolve => {
                    filters::convolve(&rgb, kernel)?.save(&out)?;
                    format!("convolve {}", kernel)
                }
                FilterOp::Pad => {
                    let padding = padding.unwrap_or(cfg.filters.padding);
                    filters::zero_pad(&rgb, padding)?.save(&out)?;
                    format!("pad {}px", padding)
                }
                FilterOp::Low => filter_kind(&rgb, FilterKind::Low, &out)?,
                FilterOp::High => filter_kind(&rgb, FilterKind::High, &out)?,
                FilterOp::Band => filter_kind(&rgb, FilterKind::Band, &out)?,
                FilterOp::Fourier => {
                    filters::magnitude_spectrum(&rgb)?.save(&out)?;
                    "fourier spectrum".to_string()
                }
                FilterOp::Denoise => {
                    filters::reduce_periodic_noise(&rgb, cfg.filters.noise_radius)?.save(&out)?;
                    format!("denoise radius {}", cfg.filters.noise_radius)
                }
            };
            output::print_filter_output(&name, &out);
        }
        Command::Analyze {
            image,
            out,
            low,
            high,
        } => run_analyze(&image, &out, low, high, &cfg)?,
        Command::Capture {
            name,
            frames,
            dataset,
        } => {
            let source = DirectoryFrames::open(&frames)?;
            let detector = RustfaceDetector::load(
                Path::new(&cfg.capture.model_path),
                cfg.capture.detector_settings(),
            )?;
            let settings = CaptureSettings {
                dataset_dir: dataset.unwrap_or_else(|| PathBuf::from(&cfg.capture.dataset_dir)),
                max_images: cfg.capture.max_images,
                max_attempts: cfg.capture.max_attempts,
                poll_delay: cfg.capture.poll_delay(),
            };
            let mut session = CaptureSession::start(&name, settings, source, detector)?;
            let max_images = session.max_images();
            for event in session.by_ref() {
                output::print_capture_event(&event?, max_images);
            }
            output::print_capture_summary(&name, session.saved(), session.person_dir());
        }
        Command::GenConfig => {}
    }

    Ok(())
}

fn run_compress(
    image: &Path,
    scratch: &Path,
    sweeps: &[(Family, Vec<u8>)],
) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_image(image)?;
    let codec = RustCodec::new();
    let mut cache = SweepCache::new();

    let mut sets = Vec::new();
    for (family, candidates) in sweeps {
        let request = SweepRequest {
            grid: &loaded.grid,
            original_size: loaded.original_size,
            base_name: &loaded.base_name,
            family: *family,
            candidates,
            scratch_root: scratch,
        };
        sets.push(sweep::run_sweep_cached(&codec, &request, &mut cache)?);
    }

    let input = ReportInput {
        base_name: &loaded.base_name,
        original: &loaded.path,
        scratch_root: scratch,
        sets: &sets,
    };
    let report_path = report::write_report(&input)?;
    let json_path = report::write_results_json(&input)?;
    output::print_compress_output(&sets, cache.stats(), &report_path, &json_path);
    Ok(())
}

fn run_analyze(
    image: &Path,
    out: &Path,
    low: Option<f32>,
    high: Option<f32>,
    cfg: &LabConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let rgb = load_rgb(image)?;
    let low = low.unwrap_or(cfg.analysis.canny_low);
    let high = high.unwrap_or(cfg.analysis.canny_high);

    let edges = analysis::detect_edges(&rgb, low, high)?;
    let chain = analysis::freeman_chain(&rgb, cfg.analysis.chain_threshold)?;
    let wrapped = analysis::wrap_chain_code(&chain.code, CHAIN_LINE_WIDTH);
    let projection = analysis::integral_projection(&rgb)?;

    fs::create_dir_all(out)?;
    let stem = file_stem(image);
    let path = |suffix: &str| out.join(format!("{}_{}", stem, suffix));
    let written = vec![
        path("blurred.png"),
        path("edges.png"),
        path("binary.png"),
        path("contour.png"),
        path("chain_code.txt"),
        path("projection_binary.png"),
        path("projection_horizontal.csv"),
        path("projection_vertical.csv"),
    ];
    edges.blurred.save(&written[0])?;
    edges.edges.save(&written[1])?;
    chain.binary.save(&written[2])?;
    chain.overlay.save(&written[3])?;
    fs::write(&written[4], format!("{}\n", wrapped))?;
    projection.binary.save(&written[5])?;
    fs::write(
        &written[6],
        analysis::projection_csv("column", &projection.horizontal),
    )?;
    fs::write(
        &written[7],
        analysis::projection_csv("row", &projection.vertical),
    )?;

    output::print_analysis_output(&output::AnalysisSummary {
        edges: &edges,
        chain: &chain,
        wrapped_code: &wrapped,
        projection: &projection,
        written: &written,
    });
    Ok(())
}

fn filter_kind(
    rgb: &RgbImage,
    kind: FilterKind,
    out: &Path,
) -> Result<String, Box<dyn std::error::Error>> {
    filters::apply_filter(rgb, kind)?.save(out)?;
    let name = match kind {
        FilterKind::Low => "low pass",
        FilterKind::High => "high pass",
        FilterKind::Band => "band pass",
    };
    Ok(name.to_string())
}

fn load_rgb(path: &Path) -> Result<RgbImage, Box<dyn std::error::Error>> {
    Ok(load_image(path)?.grid.to_rgb())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
