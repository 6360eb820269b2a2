//! Galaxy3D transfer demo
//!
//! Creates a headless Vulkan device, drives the copy scene through its
//! lifecycle and reports whether the host -> device -> host round trip held.

use std::process::ExitCode;

use colored::*;
use galaxy_3d_transfer::galaxy3d::{Engine, Result};
use galaxy_3d_transfer::galaxy3d::render::Config;
use galaxy_3d_transfer::galaxy3d::scene::{CopyScene, Scene};
use galaxy_3d_transfer::galaxy3d::transfer::VerificationReport;
use galaxy_3d_transfer::{engine_error, engine_info};
use galaxy_3d_transfer_vulkan::galaxy3d::{print_validation_stats_report, VulkanGraphicsDevice};

/// Number of driver loop iterations between setup and teardown
const UPDATE_FRAMES: u32 = 3;

fn run_scene() -> Result<Option<VerificationReport>> {
    let config = Config {
        app_name: "Galaxy3D Transfer Demo".to_string(),
        ..Config::default()
    };
    let device = Engine::create_graphics_device(VulkanGraphicsDevice::new(config)?)?;

    let mut scene = CopyScene::new();
    engine_info!("galaxy3d::scene", "Running scene '{}'", scene.name());

    let result = scene.setup(device, &[]).and_then(|()| {
        for _ in 0..UPDATE_FRAMES {
            scene.update()?;
        }
        Ok(())
    });
    // Teardown runs even after a failed setup so the device is idle before destruction
    let teardown = scene.teardown();
    result?;
    teardown?;

    Ok(scene.report().cloned())
}

fn print_report(report: &VerificationReport) {
    println!("\n{}", "=== Copy Verification ===".bright_blue().bold());
    println!("  Buffer size: {} bytes", report.buffer_size);
    println!("  Final state: {:?}", report.state);
    if let Some(self_check) = &report.self_check {
        let status = if self_check.is_match() { "ok".green() } else { "MISMATCH".red().bold() };
        println!("  Source self-check: {}", status);
    }
    if report.passed() {
        println!("  {}", "PASSED".green().bold());
    } else {
        println!("  {} ({} mismatched bytes)", "FAILED".red().bold(), report.mismatch_count);
    }
}

fn main() -> ExitCode {
    if let Err(e) = Engine::initialize() {
        eprintln!("Engine initialization failed: {}", e);
        return ExitCode::FAILURE;
    }

    let outcome = run_scene();

    print_validation_stats_report();
    if let Err(e) = Engine::destroy_graphics_device() {
        engine_error!("galaxy3d::Engine", "Failed to destroy graphics device: {}", e);
    }
    Engine::shutdown();

    match outcome {
        Ok(Some(report)) => {
            print_report(&report);
            if report.passed() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Ok(None) => {
            eprintln!("Copy scene produced no report");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{} {}", "Fatal error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
