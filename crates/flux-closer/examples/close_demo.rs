use flux_closer::{init_tracing, CloserError};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), CloserError> {
    init_tracing("info");

    flux_closer::bind(cleanup)?;

    thread::spawn(|| {
        // 模拟后台任务
        println!("10 seconds to go...");
        thread::sleep(Duration::from_secs(10));
        if let Err(e) = flux_closer::close() {
            eprintln!("close failed: {}", e);
        }
    });

    flux_closer::hold()
}

fn cleanup() {
    print!("Hang on! I'm closing some DBs, wiping some trails...");
    thread::sleep(Duration::from_secs(3));
    println!("  Done.");
}
