use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

/// Creates a configured QueryConfig with standardized error handling for the entire project
pub fn query_config() -> actix_web_validator::QueryConfig {
    actix_web_validator::QueryConfig::default()
        .error_handler(|err, _req| {
            let mut fields = serde_json::Map::new();

            let error = match err {
                actix_web_validator::Error::Validate(validation_errors) => {
                    for (field, errors) in validation_errors.field_errors() {
                        let messages: Vec<String> = errors
                            .iter()
                            .map(|e| {
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| format!("Validation error in field: {}", field))
                            })
                            .collect();
                        fields.insert(
                            field.to_string(),
                            serde_json::json!({"errors": messages})
                        );
                    }
                    "Validation failed"
                }
                actix_web_validator::Error::Deserialize(de_err) => {
                    fields.insert(
                        "message".to_string(),
                        serde_json::json!(format!("Invalid query parameters: {}", de_err))
                    );
                    "Request validation failed"
                }
                _ => {
                    fields.insert(
                        "message".to_string(),
                        serde_json::json!("Validation error")
                    );
                    "Validation failed"
                }
            };

            let error_response = ErrorResponse {
                error: error.to_string(),
                fields: serde_json::Value::Object(fields),
            };
            actix_web::error::InternalError::from_response(
                "",
                HttpResponse::BadRequest().json(error_response)
            ).into()
        })
}
