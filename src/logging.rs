use anyhow::Result;
use tracing_subscriber::fmt;

/// Installs the fmt subscriber when `verbose` is set; otherwise events are
/// dropped and the run summary is the only output.
pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let _ = fmt()
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}
