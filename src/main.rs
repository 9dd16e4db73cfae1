//! CLI batch driver for the `volren` path tracer.
//!
//! Builds a small procedural volume (volume file loading is out of scope,
//! per the core's external-collaborator boundary), renders it, and writes
//! the tonemapped result as a PNG.

use std::sync::atomic::AtomicBool;

use glam::{Mat3, Mat4, Vec3};
use volren::engine::VolRenderer;
use volren::options::RenderOptions;
use volren::volume::{FrameChannels, Grid, Volume, DENSITY_CHANNEL};

struct Args {
    output: String,
    width: u32,
    height: u32,
    sppx: u32,
    bounces: u32,
    seed: u32,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            output: "render.png".to_string(),
            width: 512,
            height: 512,
            sppx: 64,
            bounces: 32,
            seed: 0,
        }
    }
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut positional_taken = false;
    for arg in std::env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--width=") {
            args.width = value.parse().map_err(|_| format!("invalid --width: {value}"))?;
        } else if let Some(value) = arg.strip_prefix("--height=") {
            args.height = value.parse().map_err(|_| format!("invalid --height: {value}"))?;
        } else if let Some(value) = arg.strip_prefix("--sppx=") {
            args.sppx = value.parse().map_err(|_| format!("invalid --sppx: {value}"))?;
        } else if let Some(value) = arg.strip_prefix("--bounces=") {
            args.bounces = value.parse().map_err(|_| format!("invalid --bounces: {value}"))?;
        } else if let Some(value) = arg.strip_prefix("--seed=") {
            args.seed = value.parse().map_err(|_| format!("invalid --seed: {value}"))?;
        } else if !positional_taken {
            args.output = arg;
            positional_taken = true;
        } else {
            return Err(format!("unrecognized argument: {arg}"));
        }
    }
    Ok(args)
}

/// A filled sphere of unit density centered in a `res^3` index-space cube,
/// mapped onto the unit cube in world space.
fn sphere_volume(res: u32) -> Result<Volume, volren::error::VolRenError> {
    let n = res as usize;
    let mut data = Vec::with_capacity(n * n * n);
    let center = (res as f32 - 1.0) * 0.5;
    let radius = res as f32 * 0.4;
    for z in 0..res {
        for y in 0..res {
            for x in 0..res {
                let d = Vec3::new(x as f32 - center, y as f32 - center, z as f32 - center).length();
                data.push(if d < radius { 1.0 - d / radius } else { 0.0 });
            }
        }
    }
    let transform = Mat4::from_scale(Vec3::splat(1.0 / res as f32));
    let grid = Grid::new(transform, [res, res, res], data)?;
    let mut frame = FrameChannels::default();
    frame.insert(DENSITY_CHANNEL.to_string(), grid);
    Volume::new(vec![frame])
}

fn run(args: &Args) -> Result<(), volren::error::VolRenError> {
    let mut renderer = VolRenderer::new();
    renderer.init(args.width, args.height)?;
    renderer.set_volume(sphere_volume(64)?);
    renderer.set_environment(volren::environment::Environment::white(1.0));
    renderer.set_camera(Vec3::new(0.0, 0.0, -2.5), Mat3::IDENTITY, 45.0)?;

    let options = RenderOptions {
        sppx: args.sppx,
        bounces: args.bounces,
        seed: args.seed,
        ..RenderOptions::default()
    };
    renderer.set_options(options);

    log::info!(
        "rendering {}x{} at {} spp, {} bounces",
        args.width,
        args.height,
        args.sppx,
        args.bounces
    );
    renderer.commit()?;

    let cancel = AtomicBool::new(false);
    renderer.render(&cancel)?;

    let framebuffer = renderer.framebuffer()?;
    let mut image = image::RgbImage::new(args.width, args.height);
    for (pixel, rgba) in image.pixels_mut().zip(framebuffer.iter()) {
        let tonemap = |c: f32| (c.max(0.0).powf(1.0 / 2.2).min(1.0) * 255.0) as u8;
        *pixel = image::Rgb([tonemap(rgba[0]), tonemap(rgba[1]), tonemap(rgba[2])]);
    }
    image.save(&args.output)?;
    log::info!("wrote {}", args.output);
    Ok(())
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args) {
        log::error!("render failed: {e}");
        std::process::exit(1);
    }
}
