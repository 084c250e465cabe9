use flux_closer::{init_tracing, Closer, CloserConfig, CloserError};
use std::thread;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), CloserError> {
    init_tracing("info");

    let config = match std::env::args().nth(1) {
        Some(path) => CloserConfig::load(path)?,
        None => CloserConfig::default(),
    };
    let closer = Closer::new(config)?;

    closer.bind_named("database", cleanup)?;
    closer.run_guarded_async(run(&closer), true).await;
    Ok(())
}

async fn run(closer: &Closer) -> Result<(), String> {
    println!("Will fatal in 10 seconds...");
    tokio::time::sleep(Duration::from_secs(10)).await;
    closer.fatal_async("KAWABANGA!").await;
    Ok(())
}

fn cleanup() {
    print!("Hang on! I'm closing some DBs, wiping some trails...");
    thread::sleep(Duration::from_secs(3));
    println!("  Done.");
}
