extern crate clap;
extern crate env_logger;
extern crate image;
#[macro_use]
extern crate log;
extern crate mandelzoom;
extern crate num;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches};
use image::ColorType;
use mandelzoom::{
    Framebuffer, HostShader, Palette, PerformanceTier, RenderError, RenderSettings, Renderer,
    Viewport,
};
use num::Complex;
use std::path::Path;
use std::str::FromStr;

/// Split `s` once at `separator` and parse both halves.  Whitespace
/// around either half is ignored, so "-0.5, 0.1" parses.
fn parse_pair<T: FromStr>(s: &str, separator: char) -> Option<(T, T)> {
    let mut halves = s.splitn(2, separator);
    let left = halves.next()?.trim().parse().ok()?;
    let right = halves.next()?.trim().parse().ok()?;
    Some((left, right))
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    parse_pair(s, ',').map(|(re, im)| Complex::new(re, im))
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    parse_pair::<T>(s, separator)
        .map(|_| ())
        .ok_or_else(|| err.to_string())
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const CENTER: &str = "center";
const ZOOM: &str = "zoom";
const PALETTE: &str = "palette";
const THREADS: &str = "threads";
const TIER: &str = "tier";
const NO_SMOOTH: &str = "no-smooth";
const ANTIALIAS: &str = "antialias";
const SHADER: &str = "shader";

const PALETTES: [&str; 6] = [
    "classic",
    "fire",
    "ocean",
    "psychedelic",
    "monochrome",
    "ultra-smooth",
];

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get().max(1);

    App::new("mandelzoom")
        .version("0.1.0")
        .about("Mandelbrot renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output PNG file"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("800x600")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(CENTER)
                .required(false)
                .long(CENTER)
                .short("c")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-0.5,0.0")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse center point"))
                .help("Point of the complex plane at the center of the image"),
        )
        .arg(
            Arg::with_name(ZOOM)
                .required(false)
                .long(ZOOM)
                .short("z")
                .takes_value(true)
                .default_value("1.0")
                .validator(|s| {
                    validate_range(
                        &s,
                        std::f64::MIN_POSITIVE,
                        std::f64::MAX,
                        "Could not parse zoom",
                        "Zoom must be greater than zero",
                    )
                })
                .help("Magnification; 1.0 shows four units across"),
        )
        .arg(
            Arg::with_name(PALETTE)
                .required(false)
                .long(PALETTE)
                .short("p")
                .takes_value(true)
                .possible_values(&PALETTES)
                .default_value("classic")
                .help("Color palette"),
        )
        .arg(
            Arg::with_name(THREADS)
                .required(false)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of bands to render in parallel (default: one per core)"),
        )
        .arg(
            Arg::with_name(TIER)
                .required(false)
                .long(TIER)
                .takes_value(true)
                .possible_values(&["1000", "2000", "4000", "8000"])
                .help("Per-frame iteration ceiling (default: probed from this machine)"),
        )
        .arg(
            Arg::with_name(NO_SMOOTH)
                .long(NO_SMOOTH)
                .help("Use the integer escape count"),
        )
        .arg(
            Arg::with_name(ANTIALIAS)
                .long(ANTIALIAS)
                .short("a")
                .help("Average four samples per pixel"),
        )
        .arg(
            Arg::with_name(SHADER)
                .long(SHADER)
                .help("Render through the per-pixel shader program"),
        )
        .get_matches()
}

fn write_image(outfile: &str, frame: &Framebuffer) -> Result<(), RenderError> {
    let path = Path::new(outfile);
    image::save_buffer(
        path,
        frame.pixels(),
        frame.width() as u32,
        frame.height() as u32,
        ColorType::RGBA(8),
    )
    .map_err(|e| RenderError::Export(e.to_string()))
}

fn run(matches: &ArgMatches) -> Result<(), RenderError> {
    let (width, height) = parse_pair::<usize>(matches.value_of(SIZE).unwrap_or("800x600"), 'x')
        .ok_or_else(|| RenderError::InvalidDimensions {
            width: 0,
            height: 0,
        })?;
    let center = parse_complex(matches.value_of(CENTER).unwrap_or("-0.5,0.0"))
        .ok_or_else(|| RenderError::InvalidViewport("Error parsing center point".to_string()))?;
    let zoom = f64::from_str(matches.value_of(ZOOM).unwrap_or("1.0"))
        .map_err(|e| RenderError::InvalidViewport(e.to_string()))?;
    let viewport = Viewport::new(center, zoom)?;
    let palette = Palette::from_str(matches.value_of(PALETTE).unwrap_or("classic"))
        .unwrap_or_default();
    let threads = matches
        .value_of(THREADS)
        .and_then(|t| usize::from_str(t).ok())
        .unwrap_or_else(num_cpus::get);
    let tier = matches
        .value_of(TIER)
        .and_then(|t| usize::from_str(t).ok())
        .and_then(PerformanceTier::from_ceiling)
        .unwrap_or_else(|| PerformanceTier::detect(None));
    let settings = RenderSettings {
        palette,
        smoothing: !matches.is_present(NO_SMOOTH),
        antialiasing: matches.is_present(ANTIALIAS),
    };

    let mut renderer = Renderer::new(tier, threads);
    if matches.is_present(SHADER) {
        renderer = renderer.with_accelerator(Box::new(HostShader));
    }
    info!(
        "Rendering {}x{} around {} at zoom {} on the {:?} backend",
        width,
        height,
        viewport.center,
        viewport.zoom(),
        renderer.backend_for(viewport.zoom())
    );

    let mut reported = 0;
    let frame = renderer.render(viewport, width, height, settings, &mut |progress| {
        let decile = (progress * 10.0) as usize;
        if decile > reported {
            reported = decile;
            info!("{}% done", decile * 10);
        }
    })?;
    let frame = frame.ok_or_else(|| RenderError::Export("frame was superseded".to_string()))?;
    write_image(matches.value_of(OUTPUT).unwrap_or("mandelzoom.png"), &frame)
}

fn main() {
    env_logger::init();
    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_centers_parse() {
        assert_eq!(parse_pair::<u16>("640x480", 'x'), Some((640, 480)));
        assert_eq!(parse_pair::<u16>("640", 'x'), None);
        assert_eq!(parse_pair::<u16>("640x", 'x'), None);
        assert_eq!(parse_pair::<u16>("70000x10", 'x'), None);
        assert_eq!(parse_complex("-0.75, 0.1"), Some(Complex::new(-0.75, 0.1)));
        assert_eq!(parse_complex("-0.75;0.1"), None);
    }

    #[test]
    fn validators_report_their_message() {
        assert_eq!(validate_pair::<f64>("1,2", ',', "bad"), Ok(()));
        assert_eq!(validate_pair::<f64>("1", ',', "bad"), Err("bad".to_string()));
        assert_eq!(validate_range::<i32>("0", 1, 8, "nan", "range"), Err("range".to_string()));
        assert_eq!(validate_range::<usize>("x", 1, 8, "nan", "range"), Err("nan".to_string()));
    }
}
