use actix_web::{
    HttpResponse, get, post,
    web::{self, Data, Path, ServiceConfig, scope},
};
use actix_web_validator::Query;

use super::models::{ExecutionsQuery, ReadingsQuery};
use super::service::{JobService, ServiceError};

#[get("/metrics")]
async fn get_metrics(service: Data<JobService>) -> Result<HttpResponse, ServiceError> {
    let metrics = service.summary().await?;
    Ok(HttpResponse::Ok().json(metrics))
}

// Served at both /readings and /weather.
async fn get_readings(
    service: Data<JobService>,
    query: Query<ReadingsQuery>,
) -> Result<HttpResponse, ServiceError> {
    let readings = service.readings(query.hours).await?;
    Ok(HttpResponse::Ok().json(readings))
}

#[get("/storage/info")]
async fn get_storage_info(service: Data<JobService>) -> Result<HttpResponse, ServiceError> {
    let info = service.storage_info().await?;
    Ok(HttpResponse::Ok().json(info))
}

#[get("")]
async fn list_executions(
    service: Data<JobService>,
    query: Query<ExecutionsQuery>,
) -> Result<HttpResponse, ServiceError> {
    let page = service.list_executions(query.page, query.per_page).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[post("/trigger/{job_name}")]
async fn trigger_job(
    service: Data<JobService>,
    job_name: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let response = service.trigger(&job_name).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub fn job_config(config: &mut ServiceConfig) {
    config.service(
        scope("/api")
            .service(get_metrics)
            .service(get_storage_info)
            .route("/readings", web::get().to(get_readings))
            .route("/weather", web::get().to(get_readings))
            .service(scope("/jobs").service(list_executions).service(trigger_job)),
    );
}
