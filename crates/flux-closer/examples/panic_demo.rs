use flux_closer::{init_tracing, CloserError, ExitSignal};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), CloserError> {
    init_tracing("info");

    // 调试信号集不包含 SIGABRT
    flux_closer::init(flux_closer::CloserConfig {
        signals: ExitSignal::DEBUG_SET.to_vec(),
        ..Default::default()
    })?;

    flux_closer::bind(cleanup)?;
    flux_closer::run_guarded(run, true)
}

fn run() -> Result<(), String> {
    println!("Will panic in 10 seconds...");
    thread::sleep(Duration::from_secs(10));
    panic!("KAWABANGA!");
}

fn cleanup() {
    print!("Hang on! I'm closing some DBs, wiping some trails...");
    thread::sleep(Duration::from_secs(3));
    println!("  Done.");
}
