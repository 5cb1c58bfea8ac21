use std::net::TcpListener;

use anyhow::Context;
use env_logger::Env;
use maplead::{
    configuration::get_configuration,
    services::{ChromeFactory, ContactFetcher},
    startup::run,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().context("Failed to read configuration.")?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener =
        TcpListener::bind(&address).with_context(|| format!("Failed to bind {}", address))?;

    let factory = ChromeFactory::new(configuration.browser.clone());
    let fetcher = ContactFetcher::new(configuration.enrichment.clone())
        .context("Failed to build the website HTTP client.")?;

    log::info!("Listening on {}", address);
    run(listener, configuration, factory, fetcher)?.await?;
    Ok(())
}
