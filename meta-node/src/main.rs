mod config;

use std::sync::Arc;

use clap::Parser;
use meta_sub::events::service::{EventService, ServiceConfig};
use meta_sub::log_buffer::file::FileLogReader;
use meta_sub::log_buffer::ring::RingLogBuffer;

use crate::config::Opt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    meta_util::setup_logger();

    let opt = Opt::parse();
    let config = opt.resolve()?;

    std::fs::create_dir_all(&config.persisted_log_dir).map_err(|e| {
        anyhow::anyhow!(
            "creating persisted log directory {}: {}",
            config.persisted_log_dir.display(),
            e
        )
    })?;

    let persisted = Arc::new(FileLogReader::new(config.persisted_log_dir.clone()));
    let local_memory = RingLogBuffer::new(config.ring_buffer_capacity);
    let aggregated_memory = RingLogBuffer::new(config.ring_buffer_capacity);

    let service_config = ServiceConfig {
        unsynced_event_threshold: config.unsynced_event_threshold,
        idle_poll_interval: config.idle_poll_interval(),
    };
    let event_service = EventService::new(persisted, local_memory, aggregated_memory, config.local_signature)
        .with_config(config.system_log_dir.clone(), service_config);

    let routes = meta_sub::routes(event_service);
    tracing::info!(bind_address = %config.bind_address, "meta-node listening");
    warp::serve(routes).run(config.bind_address).await;

    Ok(())
}
