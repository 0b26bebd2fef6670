use actix_web::{
    get, middleware, web::Data, App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use clap::Parser;
pub use controller::{self, api::cluster::Cluster, config::ControllerConfig, telemetry, State};
use kube::CustomResourceExt;
use prometheus::{Encoder, TextEncoder};

#[get("/metrics")]
async fn metrics(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    match encoder.encode(&metrics, &mut buffer) {
        Ok(()) => HttpResponse::Ok().body(buffer),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ControllerConfig::parse();
    if config.crd {
        print!("{}", serde_yaml::to_string(&Cluster::crd())?);
        return Ok(());
    }

    telemetry::init(config.log_format);

    // Init k8s controller state
    let state = State::default();
    let cluster_status_controller = controller::run(state.clone(), config.clone());

    // Start web server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .bind(&config.bind_address)?
    .shutdown_timeout(5)
    .run();

    let (controller, server) = tokio::join!(cluster_status_controller, server);
    controller?;
    server?;
    Ok(())
}
