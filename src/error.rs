use std::io;

/// Errors raised while setting up the timer machinery.
///
/// The debouncers themselves never fail; only building a dedicated
/// [`PoolTimer`](crate::timer::PoolTimer) can.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A timer pool was requested with no worker threads.
    #[error("timer pool needs at least one thread")]
    ZeroPoolSize,

    /// The operating system refused to spawn the pool's worker threads.
    #[error("failed to create timer thread pool: {0}")]
    ThreadPool(#[source] io::Error),

    /// The operating system refused to spawn the thread that tracks deadlines.
    #[error("failed to spawn timer thread: {0}")]
    TimerThread(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
