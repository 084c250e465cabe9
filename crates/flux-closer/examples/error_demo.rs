use flux_closer::{init_tracing, CloserError};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), CloserError> {
    init_tracing("info");

    flux_closer::bind(cleanup)?;
    flux_closer::run_guarded(run, true)
}

fn run() -> Result<(), String> {
    println!("Will throw an error in 10 seconds...");
    thread::sleep(Duration::from_secs(10));
    Err("KAWABANGA!".to_string())
}

fn cleanup() {
    print!("Hang on! I'm closing some DBs, wiping some trails...");
    thread::sleep(Duration::from_secs(3));
    println!("  Done.");
}
