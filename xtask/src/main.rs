//! Build automation tasks for the ir-stepper project.
//!
//! Run with: `cargo xtask <command>`

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::process::{Command, ExitCode};

const TARGET: &str = "thumbv6m-none-eabi";
const BOARD_FEATURES: &str = "defmt,pico1,arm";
const DEMOS: [&str; 1] = ["remote_arm"];

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for the ir-stepper project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: build lib and demos, run host tests, generate docs
    CheckAll,
    /// Build the library for the Pico 1
    Build,
    /// Build a demo
    Demo {
        /// Demo name (e.g., remote_arm)
        name: String,
    },
    /// Run the host tests
    Test,
    /// Build UF2 firmware file for flashing to Pico
    Uf2 {
        /// Demo name (e.g., remote_arm)
        name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckAll => check_all(),
        Commands::Build => report(build_lib()),
        Commands::Demo { name } => report(build_demo(&name, false)),
        Commands::Test => report(run_host_tests()),
        Commands::Uf2 { name } => build_uf2(&name),
    }
}

fn check_all() -> ExitCode {
    println!("{}", "==> Building library...".cyan());
    if !build_lib() {
        return ExitCode::FAILURE;
    }

    println!("\n{}", "==> Building demos...".cyan());
    for demo in DEMOS {
        println!("  {}", format!("- {demo}").bright_black());
        if !build_demo(demo, false) {
            return ExitCode::FAILURE;
        }
    }

    println!("\n{}", "==> Running host tests...".cyan());
    if !run_host_tests() {
        return ExitCode::FAILURE;
    }

    println!("\n{}", "==> Building documentation...".cyan());
    if !run_command(Command::new("cargo").current_dir(workspace_root()).args([
        "doc",
        "--target",
        TARGET,
        "--no-deps",
        "--features",
        BOARD_FEATURES,
        "--no-default-features",
    ])) {
        return ExitCode::FAILURE;
    }

    println!("\n{}", "==> All checks passed!".green().bold());
    ExitCode::SUCCESS
}

fn build_lib() -> bool {
    println!(
        "{}",
        format!("Building library with features: {BOARD_FEATURES}").cyan()
    );
    run_command(Command::new("cargo").current_dir(workspace_root()).args([
        "build",
        "--lib",
        "--target",
        TARGET,
        "--features",
        BOARD_FEATURES,
        "--no-default-features",
    ]))
}

fn build_demo(name: &str, release: bool) -> bool {
    println!(
        "{}",
        format!("Building demo '{name}' with features: {BOARD_FEATURES}").cyan()
    );
    let mut cmd = Command::new("cargo");
    cmd.current_dir(workspace_root())
        .args(["build", "--example", name, "--target", TARGET]);
    if release {
        cmd.arg("--release");
    }
    cmd.args(["--features", BOARD_FEATURES, "--no-default-features"]);
    run_command(&mut cmd)
}

fn run_host_tests() -> bool {
    let mut cmd = Command::new("cargo");
    cmd.current_dir(workspace_root()).args(["test", "--tests"]);

    match host_target() {
        Some(target) => {
            println!(
                "  {}",
                format!("Using host target: {target}").bright_black()
            );
            cmd.arg("--target").arg(target);
        }
        None => {
            println!(
                "{}",
                "  Unable to detect host target; relying on cargo default.".bright_black()
            );
        }
    }

    cmd.args(["--no-default-features", "--features", "host"]);
    run_command(&mut cmd)
}

fn build_uf2(name: &str) -> ExitCode {
    println!("{}", format!("Building UF2 for demo '{name}'").cyan());
    println!("  Target: {}", TARGET.bright_black());

    // Build in release mode for UF2
    if !build_demo(name, true) {
        return ExitCode::FAILURE;
    }

    let elf_path = format!("target/{TARGET}/release/examples/{name}");
    let uf2_path = format!("{name}.uf2");

    println!("\n{}", "Converting to UF2 format...".cyan());

    if run_command(
        Command::new("elf2uf2-rs")
            .current_dir(workspace_root())
            .args([&elf_path, &uf2_path]),
    ) {
        println!("{}", format!("UF2 created: {uf2_path}").green().bold());
        println!("{}", "Ready to drag-and-drop to your Pico!".bright_black());
        ExitCode::SUCCESS
    } else {
        println!(
            "{}",
            "Note: Install elf2uf2-rs with: cargo install elf2uf2-rs".yellow()
        );
        ExitCode::FAILURE
    }
}

fn report(ok: bool) -> ExitCode {
    if ok {
        println!("{}", "Done!".green());
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn workspace_root() -> std::path::PathBuf {
    // `cargo xtask` runs from the workspace root
    std::env::current_dir().expect("Failed to get current directory")
}

fn host_target() -> Option<String> {
    let output = Command::new("rustc").arg("-vV").output().ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("host: "))
        .map(|host| host.trim().to_string())
}

fn run_command(cmd: &mut Command) -> bool {
    match cmd.status() {
        Ok(status) => status.success(),
        Err(e) => {
            eprintln!("{}", format!("Failed to execute command: {e}").red());
            false
        }
    }
}
