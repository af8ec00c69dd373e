use anyhow::Context;
use glob::glob;
use std::path::PathBuf;

use spica::orchestrator::{Config, Pipeline, PathSource};
use spica::{coarse_align::brut, coarse_align::small_change, png_io, siww, star_finder, star_matcher};

const DEFAULT_OUTPUT: &str = "output.png";

/// Entry point of the program.
fn main() -> anyhow::Result<()> {
    // CLI arguments related to the star finder.
    let finder_args = vec![
        clap::Arg::with_name("sigma")
            .short("s")
            .value_name("x")
            .help("Gaussian width (sigma) of the star profile to search for"),
        clap::Arg::with_name("brightness-threshold")
            .short("b")
            .value_name("x")
            .help("Minimum fit brightness for a candidate to be kept as a star"),
        clap::Arg::with_name("candidate-threshold")
            .short("c")
            .value_name("x")
            .help("Fraction of brightness-threshold a local maximum must clear to become a candidate"),
        clap::Arg::with_name("min-dist")
            .short("m")
            .value_name("x")
            .help("Minimum separation between accepted stars, in units of sigma"),
        clap::Arg::with_name("fit-steps")
            .short("F")
            .value_name("N")
            .help("Number of Gaussian fit refinement iterations per candidate"),
    ];
    // CLI arguments related to the small-change (prior-transform) aligner.
    let small_change_args = vec![
        clap::Arg::with_name("small-change-threshold")
            .short("t")
            .value_name("x")
            .help("Small-change aligner: max sigma-weighted squared distance to accept a correspondence"),
        clap::Arg::with_name("small-change-min-stars")
            .short("n")
            .value_name("N")
            .help("Small-change aligner: minimum surviving correspondences before falling back to brut"),
    ];
    // CLI arguments related to the brut (exhaustive) aligner.
    let brut_args = vec![
        clap::Arg::with_name("brut-star-n")
            .short("S")
            .value_name("N")
            .help("Brut aligner: number of brightest current-frame stars to search over (negative: all)"),
        clap::Arg::with_name("brut-ref-star-n")
            .short("R")
            .value_name("N")
            .help("Brut aligner: number of reference stars to search over (negative: all)"),
        clap::Arg::with_name("brut-rank-star-n")
            .short("r")
            .value_name("N")
            .help("Brut aligner: number of stars used to rank a candidate transform (negative: all)"),
        clap::Arg::with_name("brut-dist-tol")
            .short("D")
            .value_name("x")
            .help("Brut aligner: distance tolerance used when ranking a candidate transform"),
        clap::Arg::with_name("brut-scale-tol")
            .short("O")
            .value_name("x")
            .help("Brut aligner: fractional scale tolerance"),
        clap::Arg::with_name("brut-rot-tol")
            .short("T")
            .value_name("x")
            .help("Brut aligner: rotation tolerance; values > 2 accept any rotation"),
    ];
    // CLI arguments related to the fine (reference-set) matcher.
    let matcher_args = vec![clap::Arg::with_name("matcher-threshold")
        .short("M")
        .value_name("x")
        .help("Fine matcher: max sigma-weighted squared distance to a reference star")];
    // CLI arguments related to input, output and the rest.
    let input_output_args = vec![
        clap::Arg::with_name("dark")
            .short("d")
            .value_name("FILE")
            .help("SIWW dark frame subtracted from every loaded image"),
        clap::Arg::with_name("output")
            .short("o")
            .value_name("FILE")
            .default_value(DEFAULT_OUTPUT)
            .help("Output PNG path"),
        clap::Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .help("Multiple levels of verbosity (up to -vvv)"),
        clap::Arg::with_name("IMAGE or GLOB")
            .multiple(true)
            .required(true)
            .help("Paths to input images, or glob patterns such as \"frames/*.png\""),
    ];
    let matches = clap::App::new("align")
        .version(std::env!("CARGO_PKG_VERSION"))
        .about("Register and stack a sequence of star-field images")
        .args(&finder_args)
        .args(&small_change_args)
        .args(&brut_args)
        .args(&matcher_args)
        .args(&input_output_args)
        .get_matches();

    let verbosity = 1 + matches.occurrences_of("verbose");
    stderrlog::new()
        .quiet(false)
        .verbosity(verbosity as usize)
        .show_level(false)
        .color(stderrlog::ColorChoice::Never)
        .init()
        .context("Failed to initialize log verbosity")?;

    run(get_args(&matches)?)
}

/// Command line arguments, parsed into the pipeline's own config types.
struct Args {
    config: Config,
    dark_path: Option<PathBuf>,
    output: PathBuf,
    images_paths: Vec<PathBuf>,
}

/// Parse `name`'s string value with clap, falling back to `default` when
/// absent.
fn parse_or<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match matches.value_of(name) {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse -{} value \"{}\": {}", name, s, e)),
    }
}

fn get_args(matches: &clap::ArgMatches) -> anyhow::Result<Args> {
    let finder_default = star_finder::Config::default();
    let small_change_default = small_change::Config::default();
    let brut_default = brut::Config::default();
    let matcher_default = star_matcher::Config::default();

    let config = Config {
        star_finder: star_finder::Config {
            sigma: parse_or(matches, "sigma", finder_default.sigma)?,
            brightness_threshold: parse_or(matches, "brightness-threshold", finder_default.brightness_threshold)?,
            candidate_threshold: parse_or(matches, "candidate-threshold", finder_default.candidate_threshold)?,
            min_dist: parse_or(matches, "min-dist", finder_default.min_dist)?,
            fit_steps: parse_or(matches, "fit-steps", finder_default.fit_steps)?,
        },
        small_change: small_change::Config {
            dist_threshold: parse_or(matches, "small-change-threshold", small_change_default.dist_threshold)?,
            min_star_n: parse_or(matches, "small-change-min-stars", small_change_default.min_star_n)?,
        },
        brut: brut::Config {
            star_n: parse_or(matches, "brut-star-n", brut_default.star_n)?,
            ref_star_n: parse_or(matches, "brut-ref-star-n", brut_default.ref_star_n)?,
            rank_star_n: parse_or(matches, "brut-rank-star-n", brut_default.rank_star_n)?,
            dist_tol: parse_or(matches, "brut-dist-tol", brut_default.dist_tol)?,
            scale_tol: parse_or(matches, "brut-scale-tol", brut_default.scale_tol)?,
            rot_tol: parse_or(matches, "brut-rot-tol", brut_default.rot_tol)?,
        },
        star_matcher: star_matcher::Config {
            dist_threshold: parse_or(matches, "matcher-threshold", matcher_default.dist_threshold)?,
        },
    };

    Ok(Args {
        config,
        dark_path: matches.value_of("dark").map(PathBuf::from),
        output: PathBuf::from(matches.value_of("output").unwrap()),
        images_paths: absolute_file_paths(matches.values_of("IMAGE or GLOB").unwrap())?,
    })
}

/// Retrieve the absolute paths of all files matching the arguments.
fn absolute_file_paths<S: AsRef<str>, Paths: Iterator<Item = S>>(args: Paths) -> anyhow::Result<Vec<PathBuf>> {
    let mut abs_paths = Vec::new();
    for path_glob in args {
        let mut paths = paths_from_glob(path_glob.as_ref())?;
        abs_paths.append(&mut paths);
    }
    abs_paths.iter().map(|p| p.canonicalize().map_err(|e| e.into())).collect()
}

/// Retrieve the paths of files matching the glob pattern.
fn paths_from_glob(p: &str) -> anyhow::Result<Vec<PathBuf>> {
    let paths = glob(p)?;
    Ok(paths.into_iter().filter_map(|x| x.ok()).collect())
}

/// Start the actual program with command line arguments successfully parsed.
fn run(args: Args) -> anyhow::Result<()> {
    if args.images_paths.is_empty() {
        anyhow::bail!("No input images found. Use --help to know how to use this program.");
    }

    let dark = match &args.dark_path {
        None => None,
        Some(path) => {
            log::info!("Loading dark frame {}", path.display());
            let dark = siww::load(path).context("Failed to load dark frame")?;
            if dark.format == spica::PixelFormat::Invalid {
                anyhow::bail!("Dark frame {} is not a valid SIWW file", path.display());
            }
            Some(dark)
        }
    };

    log::info!("Aligning and stacking {} frames", args.images_paths.len());
    let pb = if log::log_enabled!(log::Level::Info) {
        indicatif::ProgressBar::new_spinner()
    } else {
        indicatif::ProgressBar::hidden()
    };
    pb.set_message("finding stars, aligning, and stacking ...");
    pb.enable_steady_tick(120);

    let source = PathSource::new(args.images_paths, dark);
    let pipeline = Pipeline::new(args.config);
    let output = pipeline.run(&source).context("Failed to align and stack frames")?;
    pb.finish_and_clear();

    log::info!("Saving output to {}", args.output.display());
    png_io::save(&args.output, &output).context("Failed to save output image")?;
    Ok(())
}
