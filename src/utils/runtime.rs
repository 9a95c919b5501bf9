use anyhow::Result;

/// Everything in daytally runs on a single thread, including the rollover timer.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
