use std::time::Duration;

use debounce::CountLimited;
use tokio::time::sleep;

// Simulates a user typing into a search box: the query is only sent once
// typing pauses, or after every 20 keystrokes during a long stretch.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let search = CountLimited::new(Duration::from_millis(150), 20);
    let text = "debouncing coalesces bursts of calls into one";

    let mut typed = String::new();
    for ch in text.chars() {
        typed.push(ch);
        let query = typed.clone();
        search.call(move || println!("searching for {query:?}"));
        sleep(Duration::from_millis(30)).await;
        if ch == ' ' {
            // Pause between words long enough for the quiet period to pass.
            sleep(Duration::from_millis(200)).await;
        }
    }
    sleep(Duration::from_millis(300)).await;
}
