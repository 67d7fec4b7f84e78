use async_trait::async_trait;
use serde_json::json;

use crate::error::{PricingError, PricingResult};
use crate::models::{Template, TemplateCategory};

/// Source of infrastructure templates
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Active templates, optionally restricted to one category
    async fn list(&self, category: Option<TemplateCategory>) -> PricingResult<Vec<Template>>;

    /// Template by id; `TemplateNotFound` when unknown
    async fn get(&self, id: i64) -> PricingResult<Template>;
}

/// Fixed set of templates held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateStore {
    templates: Vec<Template>,
}

impl InMemoryTemplateStore {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    /// The four built-in templates, ids 1 to 4
    pub fn builtin() -> Self {
        Self::new(vec![
            Template {
                id: 1,
                name: "Web Application".to_string(),
                description: "Scalable web application with load balancer, compute instances, \
                              managed database, object storage, and CDN"
                    .to_string(),
                category: TemplateCategory::WebApp,
                config: json!({
                    "compute": {
                        "type": "vm",
                        "defaultVcpus": 2,
                        "defaultMemoryGb": 4,
                        "minVcpus": 1,
                        "maxVcpus": 16,
                        "minMemoryGb": 2,
                        "maxMemoryGb": 64
                    },
                    "database": {
                        "engine": "postgres",
                        "defaultStorageGb": 100,
                        "minStorageGb": 20,
                        "maxStorageGb": 1000
                    },
                    "storage": {
                        "defaultSizeGb": 500,
                        "minSizeGb": 10,
                        "maxSizeGb": 10000
                    },
                    "loadBalancer": true,
                    "cdn": true
                }),
                active: true,
            },
            Template {
                id: 2,
                name: "Data Pipeline".to_string(),
                description: "Complete data pipeline with object storage, ETL processing, and \
                              data warehouse for analytics"
                    .to_string(),
                category: TemplateCategory::DataPipeline,
                config: json!({
                    "storage": {
                        "defaultSizeGb": 1000,
                        "minSizeGb": 100,
                        "maxSizeGb": 100000
                    },
                    "etl": {
                        "service": "managed_etl",
                        "defaultWorkers": 2,
                        "minWorkers": 1,
                        "maxWorkers": 10
                    },
                    "dataWarehouse": {
                        "defaultStorageGb": 500,
                        "minStorageGb": 100,
                        "maxStorageGb": 10000
                    }
                }),
                active: true,
            },
            Template {
                id: 3,
                name: "Serverless API".to_string(),
                description: "Serverless REST API with functions, API gateway, and NoSQL database"
                    .to_string(),
                category: TemplateCategory::Serverless,
                config: json!({
                    "functions": {
                        "defaultMemoryMb": 512,
                        "minMemoryMb": 128,
                        "maxMemoryMb": 10240,
                        "estimatedRequestsPerMonth": 1000000
                    },
                    "apiGateway": {
                        "enabled": true,
                        "estimatedRequestsPerMonth": 1000000
                    },
                    "database": {
                        "type": "nosql",
                        "defaultStorageGb": 25
                    }
                }),
                active: true,
            },
            Template {
                id: 4,
                name: "ML Inference".to_string(),
                description: "Machine learning model inference with GPU instances, model storage, \
                              and managed endpoints"
                    .to_string(),
                category: TemplateCategory::MlInference,
                config: json!({
                    "compute": {
                        "type": "gpu",
                        "defaultGpus": 1,
                        "minGpus": 1,
                        "maxGpus": 8,
                        "defaultVcpus": 4,
                        "defaultMemoryGb": 16
                    },
                    "storage": {
                        "defaultSizeGb": 500,
                        "minSizeGb": 100,
                        "maxSizeGb": 5000
                    },
                    "endpoint": {
                        "enabled": true,
                        "autoScaling": true
                    }
                }),
                active: true,
            },
        ])
    }

    pub fn find(&self, id: i64) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn list(&self, category: Option<TemplateCategory>) -> PricingResult<Vec<Template>> {
        Ok(self
            .templates
            .iter()
            .filter(|t| t.active)
            .filter(|t| category.is_none_or(|c| t.category == c))
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> PricingResult<Template> {
        self.find(id)
            .cloned()
            .ok_or(PricingError::TemplateNotFound(id))
    }
}
