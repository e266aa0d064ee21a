use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rust_codescan::config::ScanConfig;
use rust_codescan::detector::RegionDetector;
use rust_codescan::enhance::UpscalePolicy;
use rust_codescan::pipeline::{JsonLinesSink, LogSink, Pipeline, Sink};
use rust_codescan::tools::{binary_stats, grayscale_stats, image_files_in, load_frame};
use rust_codescan::{Frame, scan_image};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "codescan", version, about = "Optical code scanning pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect and decode codes in still images
    Scan {
        /// Image file or directory of images
        image: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the annotated frame here (single image only)
        #[arg(long)]
        annotated: Option<PathBuf>,
        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print binarization stats and candidate regions for an image
    Regions {
        image: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the live pipeline until the source ends or Ctrl-C
    Run {
        /// Camera index, /dev/videoN, image file or directory
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        stack_size: Option<usize>,
        #[arg(long)]
        min_area: Option<f32>,
        /// Fixed crop upscale factor
        #[arg(long)]
        scale: Option<u32>,
        /// Append results as JSON lines to this file
        #[arg(long)]
        jsonl: Option<PathBuf>,
        /// Decode the regions of a cycle concurrently
        #[arg(long)]
        parallel: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Scan {
            image,
            config,
            annotated,
            json,
        } => scan_cmd(&image, config.as_deref(), annotated.as_deref(), json),
        Command::Regions { image, config } => regions_cmd(&image, config.as_deref()),
        Command::Run {
            device,
            config,
            stack_size,
            min_area,
            scale,
            jsonl,
            parallel,
        } => {
            let mut config = ScanConfig::load(config.as_deref())?;
            if let Some(device) = device {
                config.source.device = device;
            }
            if let Some(stack_size) = stack_size {
                config.stack_size = stack_size;
            }
            if let Some(min_area) = min_area {
                config.detector.min_area = min_area;
            }
            if let Some(factor) = scale {
                config.upscale = UpscalePolicy::Fixed { factor };
            }
            config.parallel_regions |= parallel;
            run_cmd(config, jsonl.as_deref())
        }
    }
}

fn scan_cmd(
    image: &Path,
    config: Option<&Path>,
    annotated: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let config = ScanConfig::load(config)?;
    let paths = if image.is_dir() {
        image_files_in(image)
    } else {
        vec![image.to_path_buf()]
    };
    if paths.is_empty() {
        bail!("no images found in {}", image.display());
    }
    if annotated.is_some() && paths.len() > 1 {
        bail!("--annotated needs a single image");
    }

    let mut json_sink = json.then(|| JsonLinesSink::new(std::io::stdout().lock()));
    let mut decoded_images = 0usize;
    for path in &paths {
        let frame =
            load_frame(path).with_context(|| format!("failed to load {}", path.display()))?;
        let start = Instant::now();
        let output = scan_image(&frame, &config)?;
        let elapsed = start.elapsed();

        if let Some(out) = annotated {
            output
                .annotated
                .save(out)
                .with_context(|| format!("failed to write {}", out.display()))?;
        }
        if !output.results.is_empty() {
            decoded_images += 1;
        }

        match json_sink.as_mut() {
            Some(sink) => {
                sink.consume(output);
            }
            None => {
                println!(
                    "{} ({}x{}): {} regions, {} codes in {:.1}ms",
                    path.display(),
                    frame.width(),
                    frame.height(),
                    output.regions.len(),
                    output.results.len(),
                    elapsed.as_secs_f64() * 1000.0
                );
                for r in &output.results {
                    println!("  region {}: {}", r.region_id, r.result.label());
                }
            }
        }
    }

    if paths.len() > 1 && !json {
        println!(
            "Decoded {}/{} images ({:.1}%)",
            decoded_images,
            paths.len(),
            decoded_images as f64 * 100.0 / paths.len() as f64
        );
    }
    Ok(())
}

fn regions_cmd(image: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = ScanConfig::load(config)?;
    config.validate()?;
    let frame: Frame =
        load_frame(image).with_context(|| format!("failed to load {}", image.display()))?;
    println!("Image: {} ({}x{})", image.display(), frame.width(), frame.height());

    let gray = frame.to_gray();
    let gray_stats = grayscale_stats(gray.data());
    println!(
        "Grayscale range: {}-{}, average: {}",
        gray_stats.min, gray_stats.max, gray_stats.avg
    );

    let detector = RegionDetector::new(config.detector.clone());
    let stats = binary_stats(&detector.binarize(&frame));
    println!(
        "Binary: foreground_pixels={} total={} foreground_ratio={:.2}%",
        stats.foreground_pixels,
        stats.total_pixels,
        stats.foreground_ratio * 100.0
    );

    let regions = detector.detect(&frame);
    println!("Found {} candidate regions", regions.len());
    for region in &regions {
        let b = region.bbox;
        println!(
            "  Region {}: bbox=({}, {}) {}x{} area={:.0} aspect={:.2}",
            region.id, b.x, b.y, b.width, b.height, region.area, region.aspect_ratio
        );
    }
    Ok(())
}

fn run_cmd(config: ScanConfig, jsonl: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config)?;
    let handle = pipeline.handle();
    ctrlc::set_handler(move || {
        info!("interrupt received, draining");
        handle.stop();
    })
    .context("failed to install Ctrl-C handler")?;

    let mut sink: Box<dyn Sink> = match jsonl {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Box::new(JsonLinesSink::new(BufWriter::new(file)))
        }
        None => Box::new(LogSink),
    };

    let report = pipeline.run(sink.as_mut())?;
    println!(
        "{} cycles, {} frames captured, {} evicted, {} results ({:?})",
        report.cycles,
        report.frames_captured,
        report.frames_evicted,
        report.results_emitted,
        report.stop_reason
    );
    Ok(())
}
