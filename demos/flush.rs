use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use debounce::duration_bounded;
use tokio::time::sleep;

// Buffers log lines and flushes them at most every 100ms of quiet, but never
// lets a steady stream of writes hold a flush back for more than 400ms.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let flush = duration_bounded(Duration::from_millis(100), Duration::from_millis(400));

    for i in 0..40 {
        buffer.lock().unwrap().push(format!("line {i}"));
        let buffer = Arc::clone(&buffer);
        flush(Box::new(move || {
            let lines: Vec<_> = buffer.lock().unwrap().drain(..).collect();
            println!("flushed {} lines", lines.len());
        }));
        sleep(Duration::from_millis(25)).await;
    }
    sleep(Duration::from_millis(200)).await;
}
