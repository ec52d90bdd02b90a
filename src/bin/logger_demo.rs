use sessiongate::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "sessiongate=debug".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!(target: "sessiongate", "application trace log");
    debug!(target: "sessiongate", user_id = "1", "session evicted");
    info!(target: "sessiongate", user_id = "1", "login");

    Ok(())
}
