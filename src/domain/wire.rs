//! Flat JSON representations sent to other services. Passwords never leave
//! the service.

use crate::domain::model::{
    Age, Application, Child, ChildrenGroup, Educator, Family, HealthProfessional, Institution,
    UserType,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

fn timestamp(value: &Option<DateTime<Utc>>) -> Value {
    value
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .unwrap_or(Value::Null)
}

/// Drops null members so the wire object only carries known values.
fn compact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

pub fn child(child: &Child) -> Value {
    let age = match &child.age {
        Some(Age::Years(n)) => json!(n),
        Some(Age::Text(s)) => json!(s),
        None => Value::Null,
    };
    compact(json!({
        "id": child.id,
        "username": child.username,
        "type": UserType::Child.as_str(),
        "institution_id": child.institution,
        "gender": child.gender,
        "age": age,
        "age_calc_date": child.age_calc_date,
        "last_login": timestamp(&child.last_login),
        "last_sync": timestamp(&child.last_sync),
    }))
}

pub fn family(family: &Family, children: &[Child]) -> Value {
    compact(json!({
        "id": family.id,
        "username": family.username,
        "type": UserType::Family.as_str(),
        "institution_id": family.institution,
        "children": children.iter().map(child).collect::<Vec<_>>(),
        "last_login": timestamp(&family.last_login),
    }))
}

pub fn children_group(group: &ChildrenGroup, children: &[Child]) -> Value {
    compact(json!({
        "id": group.id,
        "name": group.name,
        "children": children.iter().map(child).collect::<Vec<_>>(),
        "school_class": group.school_class,
        "user_id": group.user,
    }))
}

pub fn educator(educator: &Educator, groups: Vec<Value>) -> Value {
    compact(json!({
        "id": educator.id,
        "username": educator.username,
        "type": UserType::Educator.as_str(),
        "institution_id": educator.institution,
        "children_groups": groups,
        "last_login": timestamp(&educator.last_login),
    }))
}

pub fn health_professional(professional: &HealthProfessional, groups: Vec<Value>) -> Value {
    compact(json!({
        "id": professional.id,
        "username": professional.username,
        "type": UserType::HealthProfessional.as_str(),
        "institution_id": professional.institution,
        "children_groups": groups,
        "last_login": timestamp(&professional.last_login),
    }))
}

pub fn application(application: &Application) -> Value {
    compact(json!({
        "id": application.id,
        "username": application.username,
        "type": UserType::Application.as_str(),
        "institution_id": application.institution,
        "application_name": application.application_name,
        "last_login": timestamp(&application.last_login),
    }))
}

pub fn institution(institution: &Institution) -> Value {
    compact(json!({
        "id": institution.id,
        "type": institution.institution_type,
        "name": institution.name,
        "address": institution.address,
        "latitude": institution.latitude,
        "longitude": institution.longitude,
    }))
}
