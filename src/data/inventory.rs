//! RDS inventory helpers.

use crate::api::RdsInstance;

/// Tag marking instances scraped by the real-time slow query monitor.
pub const REAL_TIME_TAG: &str = "real_time_slow_sql";

/// Whether the instance carries `real_time_slow_sql=true`.
pub fn has_real_time_tag(instance: &RdsInstance) -> bool {
    instance
        .tags
        .as_ref()
        .and_then(|tags| tags.get(REAL_TIME_TAG))
        .is_some_and(|value| value == "true")
}

/// Most recent `updateTime` across the inventory.
///
/// Timestamps are ISO strings from the same backend clock, so the
/// lexicographic maximum is the latest one.
pub fn latest_update(instances: &[RdsInstance]) -> Option<&str> {
    instances
        .iter()
        .map(|i| i.update_time.as_str())
        .filter(|t| !t.is_empty())
        .max()
}

/// `address:port`, or `-` while the instance has no endpoint yet.
pub fn endpoint_text(instance: &RdsInstance) -> String {
    match &instance.endpoint {
        Some(endpoint) => format!("{}:{}", endpoint.address, endpoint.port),
        None => "-".to_string(),
    }
}

/// Number of instances watched in real time.
pub fn real_time_count(instances: &[RdsInstance]) -> usize {
    instances.iter().filter(|i| has_real_time_tag(i)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RdsEndpoint;
    use std::collections::BTreeMap;

    fn instance(id: &str, update_time: &str, tags: Option<&[(&str, &str)]>) -> RdsInstance {
        RdsInstance {
            identifier: id.to_string(),
            engine: "aurora-mysql".to_string(),
            engine_version: "8.0".to_string(),
            status: "available".to_string(),
            endpoint: None,
            instance_create_time: String::new(),
            update_time: update_time.to_string(),
            tags: tags.map(|pairs| {
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>()
            }),
        }
    }

    #[test]
    fn test_real_time_tag() {
        assert!(has_real_time_tag(&instance("a", "", Some(&[(REAL_TIME_TAG, "true")]))));
        assert!(!has_real_time_tag(&instance("b", "", Some(&[(REAL_TIME_TAG, "false")]))));
        assert!(!has_real_time_tag(&instance("c", "", Some(&[("env", "prod")]))));
        assert!(!has_real_time_tag(&instance("d", "", None)));
    }

    #[test]
    fn test_latest_update() {
        let instances = vec![
            instance("a", "2025-01-03T10:00:00", None),
            instance("b", "2025-02-01T09:00:00", None),
            instance("c", "", None),
        ];
        assert_eq!(latest_update(&instances), Some("2025-02-01T09:00:00"));
        assert_eq!(latest_update(&[]), None);
        assert_eq!(real_time_count(&instances), 0);
    }

    #[test]
    fn test_endpoint_text() {
        let mut with_endpoint = instance("a", "", None);
        with_endpoint.endpoint = Some(RdsEndpoint {
            address: "a.rds.amazonaws.com".to_string(),
            port: 3306,
        });
        assert_eq!(endpoint_text(&with_endpoint), "a.rds.amazonaws.com:3306");
        assert_eq!(endpoint_text(&instance("b", "", None)), "-");
    }
}
