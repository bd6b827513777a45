use crate::tabix::INDEX_SUFFIX;
use crate::types::ServiceInfo;
use axum::Json;

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        id: "org.example.tabixr".to_string(),
        name: "tabixr".to_string(),
        description: Some("Region queries over tabix-indexed BGZF files".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        index_suffix: INDEX_SUFFIX.to_string(),
    })
}
