mod executor;
pub mod store;
#[cfg(test)]
mod testing;
pub mod types;
mod worker;

pub use executor::Pipeline;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use types::UploadJobDefaults;

pub fn start_background(
    pipeline: Pipeline,
    defaults: UploadJobDefaults,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    worker::start_worker(pipeline, defaults, shutdown)
}
