use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use visreg::{
    CaptureOptions, ComparisonResult, DiffOptions, IgnoreMode, LauncherOptions, LocalCompare,
    Raster, ScreenshotContext, ScreenshotMeta, ServiceOptions, SuiteInfo, TestInfo, Verdict,
    VisregConfig, decode_image, diff_images,
};

/// Visreg - visual regression testing for element screenshots
#[derive(Parser, Debug)]
#[command(
    name = "visreg",
    about = "Compare screenshots against stored baselines",
    after_help = "ENVIRONMENT VARIABLES:\n\
        VISREG_BASELINE_DIR          Root of the screenshot tree\n\
        VISREG_LOCALE                Locale under test\n\
        VISREG_THEME                 Theme under test\n\
        VISREG_MISMATCH_TOLERANCE    Default mismatch tolerance (percent)\n\
        VISREG_IGNORE_COMPARISON     Default comparison mode\n\
        VISREG_UPDATE_SCREENSHOTS    Overwrite baselines instead of comparing\n\
        RUST_LOG                     Log filter (default: info)"
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Diff two image files
    Compare {
        /// Reference image
        baseline: PathBuf,

        /// Image to check against the reference
        actual: PathBuf,

        /// Write the diff image here
        #[arg(short, long)]
        diff: Option<PathBuf>,

        /// Comparison mode: nothing, less, antialiasing, colors, alpha
        #[arg(short, long, default_value = "nothing")]
        ignore: IgnoreMode,

        /// Mismatch tolerance in percent
        #[arg(short, long, default_value = "0.2")]
        tolerance: f64,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a screenshot against the baseline tree
    Check {
        /// Captured screenshot
        screenshot: PathBuf,

        /// Root of the screenshot tree
        #[arg(long, env = "VISREG_BASELINE_DIR")]
        baseline_dir: Option<PathBuf>,

        /// Locale under test
        #[arg(long)]
        locale: Option<String>,

        /// Theme under test
        #[arg(long)]
        theme: Option<String>,

        /// Form factor, e.g. a breakpoint name or orientation
        #[arg(long)]
        form_factor: Option<String>,

        /// Suite title
        #[arg(long)]
        suite: Option<String>,

        /// Test title
        #[arg(long)]
        test: Option<String>,

        /// Screenshot name
        #[arg(short, long)]
        name: Option<String>,

        /// Comparison mode override
        #[arg(short, long)]
        ignore: Option<IgnoreMode>,

        /// Mismatch tolerance override (percent)
        #[arg(short, long)]
        tolerance: Option<f64>,

        /// Overwrite the baseline instead of comparing
        #[arg(short, long)]
        update: bool,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a solid-colour PNG fixture
    Mock {
        /// Width in pixels
        #[arg(short = 'W', long, default_value = "100")]
        width: u32,

        /// Height in pixels
        #[arg(short = 'H', long, default_value = "100")]
        height: u32,

        /// Output file path
        #[arg(short, long, default_value = "./mock_screenshot.png")]
        output: PathBuf,

        /// Fill color as hex (e.g., "ff0000" for red)
        #[arg(short, long, default_value = "000000")]
        color: String,

        /// Draw a block as X,Y,W,H
        #[arg(long, value_delimiter = ',', num_args = 4)]
        block: Option<Vec<u32>>,

        /// Block color as hex
        #[arg(long, default_value = "ffffff")]
        block_color: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(args.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run one command; `Ok(false)` means a comparison failed
fn run(command: Commands) -> Result<bool, Box<dyn Error>> {
    match command {
        Commands::Compare {
            baseline,
            actual,
            diff,
            ignore,
            tolerance,
            json,
        } => {
            let tolerance = visreg::config::validate_tolerance(tolerance)?;
            let baseline = decode_image(&std::fs::read(&baseline)?)?;
            let actual = decode_image(&std::fs::read(&actual)?)?;

            let result = diff_images(&baseline, &actual, &DiffOptions::new(ignore, tolerance));
            if let Some(path) = diff {
                std::fs::write(&path, result.image_png()?)?;
                if !json {
                    println!("Diff image: {}", path.display());
                }
            }
            report(&result, json)
        }

        Commands::Check {
            screenshot,
            baseline_dir,
            locale,
            theme,
            form_factor,
            suite,
            test,
            name,
            ignore,
            tolerance,
            update,
            json,
        } => {
            let mut service = ServiceOptions::from_env()?;
            if baseline_dir.is_some() {
                service.baseline_dir = baseline_dir;
            }
            let launcher = LauncherOptions { locale, theme };
            let config = VisregConfig::resolve(&service, Some(&launcher))?;

            let options = CaptureOptions {
                name,
                ignore_comparison: ignore,
                mismatch_tolerance: tolerance,
                update_screenshots: update.then_some(true),
                ..Default::default()
            };
            let context = ScreenshotContext {
                capabilities: None,
                suite: suite.map(SuiteInfo::new),
                test: test.map(TestInfo::new),
                meta: form_factor.map(ScreenshotMeta::with_form_factor),
                options: Some(options),
            }
            .compact();

            let compare = LocalCompare::new(config);
            let key = compare.resolve_key(&context);
            let result = compare.process_screenshot(&context, &std::fs::read(&screenshot)?)?;
            if !json {
                println!("Baseline: {}", key);
            }
            report(&result, json)
        }

        Commands::Mock {
            width,
            height,
            output,
            color,
            block,
            block_color,
        } => {
            let mut raster = Raster::with_color(width, height, parse_hex_color(&color)?);
            if let Some(&[x, y, w, h]) = block.as_deref() {
                raster.draw_rect(x, y, w, h, parse_hex_color(&block_color)?);
            }
            std::fs::write(&output, raster.to_png()?)?;

            println!("Created mock screenshot: {}", output.display());
            println!("  Size: {}x{}", raster.width(), raster.height());
            Ok(true)
        }
    }
}

fn report(result: &ComparisonResult, json: bool) -> Result<bool, Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", result.summary());
    }
    Ok(result.verdict() != Verdict::Fail)
}

fn parse_hex_color(hex: &str) -> Result<[u8; 4], Box<dyn Error>> {
    let hex = hex.trim_start_matches('#');
    if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
        return Err("Color must be 6 or 8 hex digits (e.g., 'ff0000')".into());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok([channel(0)?, channel(2)?, channel(4)?, alpha])
}
