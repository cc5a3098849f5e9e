//! wavetrace - headless renderer for exported scene files.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use wavetrace::prelude::*;

struct Options {
    scene: PathBuf,
    width: u32,
    height: u32,
    frames: u32,
    output: PathBuf,
    verbose: bool,
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_help();
            return;
        }
        Err(message) => {
            eprintln!("Error: {message}");
            eprintln!("Usage: wavetrace <scene.json> [--size WxH] [--frames N] [--output frame.exr]");
            std::process::exit(2);
        }
    };

    let _trace_guard = wavetrace::logging::init(options.verbose);
    tracing::debug!(
        date = wavetrace::BUILD_DATE,
        time = wavetrace::BUILD_TIME,
        "wavetrace build"
    );

    if let Err(e) = run(&options) {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn parse_size(text: &str) -> Option<(u32, u32)> {
    let (w, h) = text.split_once(['x', 'X'])?;
    let w = w.parse().ok().filter(|w| *w > 0)?;
    let h = h.parse().ok().filter(|h| *h > 0)?;
    Some((w, h))
}

fn parse_args(args: &[String]) -> std::result::Result<Option<Options>, String> {
    let mut scene = None;
    let mut size = (1280, 720);
    let mut frames = 64;
    let mut output = PathBuf::from("frame.exr");
    let mut verbose = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-v" | "--verbose" => verbose = true,
            "-s" | "--size" => {
                let value = iter.next().ok_or("--size needs a value")?;
                size = parse_size(value).ok_or_else(|| format!("invalid size '{value}', expected WxH"))?;
            }
            "-n" | "--frames" => {
                let value = iter.next().ok_or("--frames needs a value")?;
                frames = value
                    .parse()
                    .map_err(|_| format!("invalid frame count '{value}'"))?;
            }
            "-o" | "--output" => {
                output = iter.next().ok_or("--output needs a value")?.into();
            }
            other if other.starts_with('-') => return Err(format!("unknown option '{other}'")),
            other => {
                if scene.replace(PathBuf::from(other)).is_some() {
                    return Err("more than one scene file given".into());
                }
            }
        }
    }

    let Some(scene) = scene else {
        return Ok(None);
    };
    Ok(Some(Options {
        scene,
        width: size.0,
        height: size.1,
        frames: frames.max(1),
        output,
        verbose,
    }))
}

fn run(options: &Options) -> wavetrace::Result<()> {
    let settings = RenderSettings::load();
    let ctx = GpuContext::new_headless()?;

    let start = Instant::now();
    let records = SceneDescription::from_path(&options.scene)?;
    let base = options.scene.parent().unwrap_or(Path::new("."));
    let scene = SceneLoader::new(base).load(&ctx, &records, &settings)?;
    tracing::info!(
        instances = scene.instance_count(),
        lights = scene.light_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "scene loaded"
    );

    let mut renderer = Renderer::new(&ctx, scene, settings, options.width, options.height)?;
    let start = Instant::now();
    for frame in 0..options.frames {
        // a failed frame is skipped, accumulation continues with the next one
        if let Err(e) = renderer.execute(&ctx) {
            tracing::warn!(frame, "frame not rendered: {e}");
        }
    }
    let image = renderer.save_frame(&ctx)?;
    tracing::info!(
        frames = renderer.frame_index(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        mean = ?image.mean(),
        "render finished"
    );
    image.write_exr(&options.output)
}

fn print_help() {
    println!("wavetrace - GPU wavefront path tracer");
    println!();
    println!("USAGE:");
    println!("    wavetrace [OPTIONS] <scene.json>");
    println!();
    println!("OPTIONS:");
    println!("    -s, --size <WxH>       Output resolution (default 1280x720)");
    println!("    -n, --frames <N>       Frames to accumulate (default 64)");
    println!("    -o, --output <file>    EXR file to write (default frame.exr)");
    println!("    -v, --verbose          Show debug output");
    println!("    -h, --help             Show this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG               Log filter, overrides -v");
    println!("    WAVETRACE_TRACE=1      Write a Chrome trace to trace.json");
    println!();
    println!("Render settings are read from the user config directory (wavetrace/settings.json).");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("800x600"), Some((800, 600)));
        assert_eq!(parse_size("0x600"), None);
        assert_eq!(parse_size("800"), None);
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(&args(&["scene.json", "--size", "64x32", "-n", "4", "-v"]))
            .unwrap()
            .unwrap();
        assert_eq!(options.scene, PathBuf::from("scene.json"));
        assert_eq!((options.width, options.height), (64, 32));
        assert_eq!(options.frames, 4);
        assert!(options.verbose);
        assert_eq!(options.output, PathBuf::from("frame.exr"));

        assert!(parse_args(&args(&[])).unwrap().is_none());
        assert!(parse_args(&args(&["a.json", "b.json"])).is_err());
        assert!(parse_args(&args(&["a.json", "--bogus"])).is_err());
    }
}
