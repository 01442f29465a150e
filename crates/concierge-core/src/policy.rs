//! IAM document fragments shared by the unit builders.

use concierge_types::resource::PropertyValue;
use serde_json::json;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Trust policy letting `service` assume a role.
pub fn assume_role_document(service: &str) -> PropertyValue {
    PropertyValue::literal(json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole"
        }]
    }))
}

/// One `Allow` statement over `resources`, which may hold references.
pub fn allow(actions: &[&str], resources: impl IntoIterator<Item = PropertyValue>) -> PropertyValue {
    PropertyValue::map([
        ("Effect", PropertyValue::from("Allow")),
        (
            "Action",
            PropertyValue::list(actions.iter().map(|a| PropertyValue::from(*a))),
        ),
        ("Resource", PropertyValue::list(resources)),
    ])
}

pub fn policy_document(statements: impl IntoIterator<Item = PropertyValue>) -> PropertyValue {
    PropertyValue::map([
        ("Version", PropertyValue::from(POLICY_VERSION)),
        ("Statement", PropertyValue::list(statements)),
    ])
}
