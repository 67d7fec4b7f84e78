//! Template config + user overrides → validated [`ResourceRequirement`].
//!
//! Template sections look like
//!
//! ```json
//! "compute": {"type": "vm", "defaultVcpus": 2, "minVcpus": 1, "maxVcpus": 16}
//! ```
//!
//! `default<Dim>`/`estimated<Dim>` declare a default, `min<Dim>`/`max<Dim>`
//! bounds. Overrides are either nested (`{"compute": {"vcpus": 4}}`) or flat
//! (`{"vcpus": 4}`); nested wins.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{PricingError, PricingResult};
use crate::models::{
    Dimension, ResourceRequirement, ServiceRequirement, ServiceType, Violation, ViolationKind,
};

#[derive(Debug, Default, Clone, Copy)]
struct Declared {
    default: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

fn section_service_type(name: &str, section: &Map<String, Value>) -> Option<ServiceType> {
    let service_type = match name {
        "compute" => ServiceType::Compute,
        "database" if section.get("type").and_then(Value::as_str) == Some("nosql") => {
            ServiceType::NosqlDatabase
        }
        "database" => ServiceType::Database,
        "storage" => ServiceType::Storage,
        "functions" => ServiceType::ServerlessFunction,
        "apiGateway" => ServiceType::ApiGateway,
        "etl" => ServiceType::Etl,
        "dataWarehouse" => ServiceType::DataWarehouse,
        _ => return None,
    };
    Some(service_type)
}

fn split_key(key: &str) -> Option<(&str, Dimension)> {
    ["default", "estimated", "min", "max"]
        .into_iter()
        .find_map(|prefix| {
            let suffix = key.strip_prefix(prefix)?;
            Dimension::from_key_suffix(suffix).map(|dim| (prefix, dim))
        })
}

fn declarations(
    name: &str,
    section: &Map<String, Value>,
) -> PricingResult<BTreeMap<Dimension, Declared>> {
    let mut declared: BTreeMap<Dimension, Declared> = BTreeMap::new();

    for (key, value) in section {
        let Some((prefix, dimension)) = split_key(key) else {
            continue;
        };
        let number = value.as_f64().ok_or_else(|| {
            PricingError::InvalidTemplate(format!("{}.{} is not a number: {}", name, key, value))
        })?;

        let slot = declared.entry(dimension).or_default();
        match prefix {
            "min" => slot.min = Some(number),
            "max" => slot.max = Some(number),
            _ => slot.default = Some(number),
        }
    }

    for (dimension, bounds) in &declared {
        let out_of_bounds = bounds.default.is_some_and(|d| {
            bounds.min.is_some_and(|min| d < min) || bounds.max.is_some_and(|max| d > max)
        });
        if out_of_bounds {
            return Err(PricingError::InvalidTemplate(format!(
                "{}.{} default lies outside its bounds",
                name, dimension
            )));
        }
    }

    Ok(declared)
}

/// Override for one dimension of one section, nested before flat.
/// `null` counts as absent.
fn override_for<'a>(
    overrides: &'a Map<String, Value>,
    section: &str,
    service_type: ServiceType,
    dimension: Dimension,
) -> Option<&'a Value> {
    let field = dimension.to_string();
    let nested = [section.to_string(), service_type.to_string()]
        .into_iter()
        .find_map(|name| overrides.get(&name)?.as_object()?.get(&field))
        .filter(|v| !v.is_null());

    nested.or_else(|| overrides.get(&field).filter(|v| !v.is_null()))
}

fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

struct Check<'a> {
    service_type: ServiceType,
    dimension: Dimension,
    raw: &'a Value,
    bounds: Declared,
}

impl Check<'_> {
    fn violation(&self, kind: ViolationKind, message: String) -> Violation {
        Violation {
            service_type: self.service_type,
            dimension: self.dimension,
            kind,
            value: self.raw.clone(),
            min: self.bounds.min,
            max: self.bounds.max,
            message,
        }
    }

    fn run(&self) -> Result<f64, Violation> {
        let label = format!("{}.{}", self.service_type, self.dimension);
        let Some(value) = numeric(self.raw) else {
            return Err(self.violation(
                ViolationKind::NotNumeric,
                format!("{} must be a number, got {}", label, self.raw),
            ));
        };

        if value < 0.0 {
            return Err(self.violation(
                ViolationKind::Negative,
                format!("{} must not be negative, got {}", label, value),
            ));
        }
        if let Some(min) = self.bounds.min.filter(|min| value < *min) {
            return Err(self.violation(
                ViolationKind::BelowMin,
                format!("{} must be at least {}, got {}", label, min, value),
            ));
        }
        if let Some(max) = self.bounds.max.filter(|max| value > *max) {
            return Err(self.violation(
                ViolationKind::AboveMax,
                format!("{} must be at most {}, got {}", label, max, value),
            ));
        }

        Ok(value)
    }
}

/// Merge overrides into the template defaults and check every bound.
///
/// All violations are collected into one `ValidationFailed`. Overrides for
/// dimensions the template does not declare are ignored, as are sections
/// with `enabled: false` and sections that resolve to no dimensions.
pub fn resolve(
    template_config: &Value,
    overrides: &Map<String, Value>,
) -> PricingResult<ResourceRequirement> {
    let sections = template_config.as_object().ok_or_else(|| {
        PricingError::InvalidTemplate("template config must be a JSON object".to_string())
    })?;

    let mut requirement = ResourceRequirement::default();
    let mut violations = Vec::new();

    for (name, section) in sections {
        // Scalar flags such as `loadBalancer: true` carry nothing to price
        let Some(section) = section.as_object() else {
            continue;
        };
        if section.get("enabled").and_then(Value::as_bool) == Some(false) {
            continue;
        }
        let Some(service_type) = section_service_type(name, section) else {
            continue;
        };

        let mut service = ServiceRequirement::default();
        for (dimension, bounds) in declarations(name, section)? {
            let value = match override_for(overrides, name, service_type, dimension) {
                Some(raw) => {
                    let check = Check {
                        service_type,
                        dimension,
                        raw,
                        bounds,
                    };
                    match check.run() {
                        Ok(value) => value,
                        Err(violation) => {
                            violations.push(violation);
                            continue;
                        }
                    }
                }
                None => match bounds.default {
                    Some(default) => default,
                    // Bounds without a default: optional dimension
                    None => continue,
                },
            };
            service.dimensions.insert(dimension, value);
        }

        if !service.dimensions.is_empty() {
            requirement.services.insert(service_type, service);
        }
    }

    if violations.is_empty() {
        Ok(requirement)
    } else {
        Err(PricingError::ValidationFailed(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::InMemoryTemplateStore;
    use serde_json::json;

    fn template(id: i64) -> Value {
        InMemoryTemplateStore::builtin()
            .find(id)
            .map(|t| t.config.clone())
            .unwrap()
    }

    fn overrides(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn violations(result: PricingResult<ResourceRequirement>) -> Vec<Violation> {
        match result {
            Err(PricingError::ValidationFailed(v)) => v,
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_web_app_defaults() {
        let requirement = resolve(&template(1), &Map::new()).unwrap();

        let compute = requirement.service(ServiceType::Compute).unwrap();
        assert_eq!(compute.get(Dimension::Vcpus), Some(2.0));
        assert_eq!(compute.get(Dimension::MemoryGb), Some(4.0));
        let database = requirement.service(ServiceType::Database).unwrap();
        assert_eq!(database.get(Dimension::StorageGb), Some(100.0));
        assert_eq!(database.get(Dimension::Vcpus), None);
        let storage = requirement.service(ServiceType::Storage).unwrap();
        assert_eq!(storage.get(Dimension::SizeGb), Some(500.0));

        // loadBalancer / cdn flags are not priced
        assert_eq!(requirement.services.len(), 3);
    }

    #[test]
    fn test_overrides_nested_beat_flat() {
        let requirement = resolve(
            &template(1),
            &overrides(json!({
                "vcpus": 8,
                "memoryGb": "16",
                "compute": {"vcpus": 4},
            })),
        )
        .unwrap();

        let compute = requirement.service(ServiceType::Compute).unwrap();
        assert_eq!(compute.get(Dimension::Vcpus), Some(4.0));
        assert_eq!(compute.get(Dimension::MemoryGb), Some(16.0));
    }

    #[test]
    fn test_flat_override_applies_to_every_declaring_section() {
        let requirement =
            resolve(&template(2), &overrides(json!({"storageGb": 2000}))).unwrap();

        let warehouse = requirement.service(ServiceType::DataWarehouse).unwrap();
        assert_eq!(warehouse.get(Dimension::StorageGb), Some(2000.0));
        // storage declares sizeGb, not storageGb
        let storage = requirement.service(ServiceType::Storage).unwrap();
        assert_eq!(storage.get(Dimension::SizeGb), Some(1000.0));
    }

    #[test]
    fn test_single_violation_above_max() {
        let found = violations(resolve(&template(1), &overrides(json!({"vcpus": 999}))));

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dimension, Dimension::Vcpus);
        assert_eq!(found[0].kind, ViolationKind::AboveMax);
        assert_eq!(found[0].max, Some(16.0));
        assert_eq!(found[0].value, json!(999));
    }

    #[test]
    fn test_all_violations_are_collected() {
        let found = violations(resolve(
            &template(1),
            &overrides(json!({
                "vcpus": 999,
                "memoryGb": 1,
                "database": {"storageGb": -5},
                "storage": {"sizeGb": "lots"},
            })),
        ));

        let kinds: Vec<_> = found.iter().map(|v| (v.dimension, v.kind)).collect();
        assert_eq!(kinds.len(), 4);
        assert!(kinds.contains(&(Dimension::Vcpus, ViolationKind::AboveMax)));
        assert!(kinds.contains(&(Dimension::MemoryGb, ViolationKind::BelowMin)));
        assert!(kinds.contains(&(Dimension::StorageGb, ViolationKind::Negative)));
        assert!(kinds.contains(&(Dimension::SizeGb, ViolationKind::NotNumeric)));
    }

    #[test]
    fn test_undeclared_override_is_ignored() {
        let requirement =
            resolve(&template(1), &overrides(json!({"workers": 40, "gpus": 2}))).unwrap();
        let compute = requirement.service(ServiceType::Compute).unwrap();
        assert_eq!(compute.get(Dimension::Gpus), None);
    }

    #[test]
    fn test_null_override_falls_back_to_default() {
        let requirement =
            resolve(&template(1), &overrides(json!({"compute": {"vcpus": null}}))).unwrap();
        let compute = requirement.service(ServiceType::Compute).unwrap();
        assert_eq!(compute.get(Dimension::Vcpus), Some(2.0));
    }

    #[test]
    fn test_serverless_sections() {
        let requirement = resolve(&template(3), &Map::new()).unwrap();

        let functions = requirement.service(ServiceType::ServerlessFunction).unwrap();
        assert_eq!(functions.get(Dimension::MemoryMb), Some(512.0));
        assert_eq!(functions.get(Dimension::RequestsPerMonth), Some(1_000_000.0));
        assert!(requirement.service(ServiceType::ApiGateway).is_some());
        let nosql = requirement.service(ServiceType::NosqlDatabase).unwrap();
        assert_eq!(nosql.get(Dimension::StorageGb), Some(25.0));
    }

    #[test]
    fn test_disabled_section_is_skipped() {
        let config = json!({
            "compute": {"defaultVcpus": 2, "defaultMemoryGb": 4},
            "apiGateway": {"enabled": false, "estimatedRequestsPerMonth": 1000000},
        });
        let requirement = resolve(&config, &Map::new()).unwrap();
        assert!(requirement.service(ServiceType::ApiGateway).is_none());
    }

    #[test]
    fn test_bounds_without_default_need_an_override() {
        let config = json!({"compute": {"defaultVcpus": 2, "minGpus": 0, "maxGpus": 4}});

        let plain = resolve(&config, &Map::new()).unwrap();
        assert_eq!(plain.service(ServiceType::Compute).unwrap().get(Dimension::Gpus), None);

        let with_gpu = resolve(&config, &overrides(json!({"gpus": 1}))).unwrap();
        assert_eq!(
            with_gpu.service(ServiceType::Compute).unwrap().get(Dimension::Gpus),
            Some(1.0)
        );
    }

    #[test]
    fn test_malformed_template() {
        assert!(matches!(
            resolve(&json!([1, 2]), &Map::new()),
            Err(PricingError::InvalidTemplate(_))
        ));
        assert!(matches!(
            resolve(&json!({"compute": {"defaultVcpus": "two"}}), &Map::new()),
            Err(PricingError::InvalidTemplate(_))
        ));
        assert!(matches!(
            resolve(
                &json!({"compute": {"defaultVcpus": 32, "maxVcpus": 16}}),
                &Map::new()
            ),
            Err(PricingError::InvalidTemplate(_))
        ));
    }
}
