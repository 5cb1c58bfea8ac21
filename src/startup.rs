use std::net::TcpListener;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::{
    configuration::Settings,
    routes::{
        default_route,
        lead_route::{self, ExtractionGate, LastRun},
    },
    services::{ChromeFactory, ContactFetcher},
};

pub fn run(
    listener: TcpListener,
    settings: Settings,
    factory: ChromeFactory,
    fetcher: ContactFetcher,
) -> Result<Server, std::io::Error> {
    let settings = web::Data::new(settings);
    let factory = web::Data::new(factory);
    let fetcher = web::Data::new(fetcher);
    let gate = web::Data::new(ExtractionGate::default());
    let last_run = web::Data::new(LastRun::default());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::health)
            .service(
                web::scope("/leads")
                    .service(lead_route::extract_leads)
                    .service(lead_route::export_leads),
            )
            .app_data(settings.clone())
            .app_data(factory.clone())
            .app_data(fetcher.clone())
            .app_data(gate.clone())
            .app_data(last_run.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
