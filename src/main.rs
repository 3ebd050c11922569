//! GPU Life CLI - Run the widget headless from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use gpu_life::compute::gpu::{GpuContext, Screen};
use gpu_life::compute::{TargetRect, Viewport};
use gpu_life::{Life, LifeConfig, Seed};

/// Offscreen viewport used for headless runs.
const VIEWPORT: Viewport = Viewport {
    width: 512,
    height: 512,
};

/// Share of the viewport covered by the target region.
const TARGET_FRACTION: f32 = 0.5;

fn usage(program: &str) {
    eprintln!("Usage: {program} <config.json> [generations] [--snapshot out.ppm]");
    eprintln!();
    eprintln!("Run the Life widget headless from JSON configuration.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json   Path to widget configuration file");
    eprintln!("  generations   Number of generations to run (default: 100)");
    eprintln!("  --snapshot    Write the final presented frame as a binary PPM");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let mut generations: u64 = 100;
    let mut snapshot: Option<PathBuf> = None;
    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--snapshot" => match rest.next() {
                Some(path) => snapshot = Some(PathBuf::from(path)),
                None => {
                    usage(&args[0]);
                    std::process::exit(1);
                }
            },
            other => {
                generations = other.parse().unwrap_or_else(|_| {
                    eprintln!("Invalid generation count: {other}");
                    std::process::exit(1);
                });
            }
        }
    }

    // Load configuration
    let config = LifeConfig::from_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    // Load or create seed
    let seed_path = config_path.with_extension("seed.json");
    let seed: Seed = if seed_path.exists() {
        let seed_str = fs::read_to_string(&seed_path).unwrap_or_else(|e| {
            eprintln!("Error reading seed file: {}", e);
            std::process::exit(1);
        });
        serde_json::from_str(&seed_str).unwrap_or_else(|e| {
            eprintln!("Error parsing seed: {}", e);
            std::process::exit(1);
        })
    } else {
        Seed::default()
    };

    println!("GPU Life");
    println!("========");
    println!("Grid: {}x{}", config.width, config.height);
    println!("Cell size: {}px", config.cellsize);
    println!("Warm-up steps: {}", config.init_steps);
    println!("Generations: {}", generations);
    println!();

    let ctx = pollster::block_on(GpuContext::headless()).unwrap_or_else(|e| {
        eprintln!("Error acquiring GPU: {}", e);
        std::process::exit(1);
    });
    let screen = Screen::offscreen(&ctx, VIEWPORT).unwrap_or_else(|e| {
        eprintln!("Error creating offscreen target: {}", e);
        std::process::exit(1);
    });
    let target = TargetRect::centered(VIEWPORT, TARGET_FRACTION);
    let total_cells = config.grid_size();

    let mut life = Life::new(&ctx, screen, config, &seed, VIEWPORT, target).unwrap_or_else(|e| {
        eprintln!("Error initializing widget: {}", e);
        std::process::exit(1);
    });

    let initial = life.engine().stats().unwrap_or_else(|e| {
        eprintln!("Error reading state: {}", e);
        std::process::exit(1);
    });
    println!("Initial state:");
    println!("  {}", initial);
    println!(
        "  Live fraction: {:.4}",
        initial.live_fraction(total_cells)
    );
    println!();

    println!("Running simulation...");
    let start = Instant::now();

    for i in 0..generations {
        life.step();

        // Print progress every 10%
        if (i + 1) % (generations / 10).max(1) == 0 {
            let elapsed = start.elapsed().as_secs_f32();
            match life.engine().stats() {
                Ok(stats) => println!(
                    "  Step {}/{}: live={}, decaying={}, {:.1} steps/s",
                    i + 1,
                    generations,
                    stats.live_cells,
                    stats.decaying_cells,
                    (i + 1) as f32 / elapsed
                ),
                Err(e) => log::warn!("stats readback failed: {e}"),
            }
        }
    }

    let elapsed = start.elapsed();
    let final_stats = life.engine().stats().unwrap_or_else(|e| {
        eprintln!("Error reading state: {}", e);
        std::process::exit(1);
    });

    println!();
    println!("Final state:");
    println!("  {}", final_stats);
    println!(
        "  Live fraction: {:.4}",
        final_stats.live_fraction(total_cells)
    );
    println!(
        "Time: {:.2}s ({:.1} steps/s)",
        elapsed.as_secs_f32(),
        generations as f32 / elapsed.as_secs_f32()
    );

    if let Some(path) = snapshot {
        if let Err(e) = write_snapshot(&life, &path) {
            eprintln!("Error writing snapshot: {}", e);
            std::process::exit(1);
        }
        println!("Snapshot written to {}", path.display());
    }
}

/// Write the presented frame as a binary PPM, composited over a white page.
fn write_snapshot(life: &Life, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let Some((width, height, pixels)) = life.renderer().read_screen()? else {
        return Err("renderer is not presenting offscreen".into());
    };

    let mut out = format!("P6\n{width} {height}\n255\n").into_bytes();
    out.reserve((width * height * 3) as usize);
    for texel in pixels.chunks_exact(4) {
        // Premultiplied alpha
        let cover = 255 - texel[3];
        out.extend(texel[..3].iter().map(|&c| c.saturating_add(cover)));
    }
    fs::write(path, out)?;
    Ok(())
}

fn print_example_config() {
    let config = LifeConfig::default();
    let seed = Seed::default();

    let render = |value: serde_json::Result<String>| {
        value.unwrap_or_else(|e| {
            eprintln!("Error serializing example: {}", e);
            std::process::exit(1);
        })
    };

    println!("Example configuration (config.json):");
    println!("{}", render(serde_json::to_string_pretty(&config)));
    println!();
    println!("Example seed (config.seed.json):");
    println!("{}", render(serde_json::to_string_pretty(&seed)));
}
