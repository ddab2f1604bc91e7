//! pifs - Inspect and decode PIFS fractal-compressed images
//!
//! A command-line tool for turning fjord containers into PNG files.

use clap::{Parser, Subcommand};
use pifs::{Decoder, PixelFormat, Size};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pifs")]
#[command(version)]
#[command(about = "Inspect and decode PIFS fractal images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a container to PNG
    Decode {
        /// Input container file, defaults to stdin
        input: Option<PathBuf>,

        /// Output PNG file (required when reading from stdin)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target size WxH to fit the image into (downscale only)
        #[arg(short, long, default_value = "1920x1080", value_parser = parse_size)]
        size: Size,

        /// Number of refinement iterations (default: as encoded)
        #[arg(short, long)]
        iterations: Option<u32>,
    },

    /// Print the header fields of a container
    Info {
        /// Input container file, defaults to stdin
        input: Option<PathBuf>,
    },
}

fn parse_size(arg: &str) -> Result<Size, String> {
    let (w, h) = arg
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{arg}'"))?;
    let w: i32 = w.parse().map_err(|_| format!("bad width '{w}'"))?;
    let h: i32 = h.parse().map_err(|_| format!("bad height '{h}'"))?;
    if w <= 0 || h <= 0 {
        return Err("size must be positive".into());
    }
    Ok(Size::new(w, h))
}

fn read_input(input: Option<&PathBuf>) -> io::Result<Vec<u8>> {
    match input {
        Some(path) => fs::read(path),
        None => {
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data)?;
            Ok(data)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            input,
            output,
            size,
            iterations,
        } => {
            let data = read_input(input.as_ref())?;

            let output_path = match (&output, &input) {
                (Some(path), _) => path.clone(),
                (None, Some(path)) => path.with_extension("png"),
                (None, None) => return Err("--output is required when reading from stdin".into()),
            };

            let mut decoder = Decoder::new();
            let info = decoder.load(&data, size)?;

            let out = decoder.output_size();
            let pitch = out.w as usize * 3;
            let mut frame = vec![0u8; pitch * out.h as usize];
            decoder.decode(
                iterations.unwrap_or(info.iteration_count),
                PixelFormat::Rgb888,
                &mut frame,
                out.w,
                out.h,
                pitch,
            )?;

            let image = image::RgbImage::from_raw(out.w as u32, out.h as u32, frame)
                .ok_or("frame size mismatch")?;
            image.save(&output_path)?;

            eprintln!(
                "{}x{} -> {}x{}, {} iterations, saved to {}",
                info.source_size.w,
                info.source_size.h,
                out.w,
                out.h,
                iterations.unwrap_or(info.iteration_count),
                output_path.display()
            );
        }

        Commands::Info { input } => {
            let data = read_input(input.as_ref())?;
            let info = pifs::inspect(&data)?;

            println!("image:      {}x{}", info.width, info.height);
            println!("channels:   {} (YUV420)", info.channel_count);
            println!("gamma:      {}", info.gamma);
            println!("grid:       {}x{} blocks of {}px", info.cols, info.rows, info.block_size);
            println!("depth:      {}", info.depth);
            println!("iterations: {}", info.iteration_count);
            println!("regions:    {}", info.region_count);
            println!("blocks:     {}", info.block_count);
            println!("nodes:      {}", info.node_count);
        }
    }

    Ok(())
}
