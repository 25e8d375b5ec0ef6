//! Resources exposed to sibling services and the handler serving each one.

use crate::core::query::{translate, Pagination, Predicate, Query, QueryDefaults, QueryValue};
use crate::core::validation::query::{validate_protected_fields, validate_references};
use crate::core::validation::{child, family, professional};
use crate::domain::model::{
    Application, Child, ChildrenGroup, Educator, Family, HealthProfessional, Institution,
};
use crate::domain::ports::{Repository, ResourceHandler};
use crate::domain::rpc::{RpcPayload, RpcReply};
use crate::domain::wire;
use crate::utils::error::{Result, ValidationCode, ValidationFailure};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Upper bound on related documents loaded for one parent.
const RELATIONSHIP_LIMIT: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Children,
    Families,
    FamilyChildren,
    Educators,
    EducatorChildrenGroups,
    HealthProfessionals,
    HealthProfessionalChildrenGroups,
    Applications,
    Institutions,
    ChildEducators,
    ChildHealthProfessionals,
}

impl Resource {
    pub const ALL: [Resource; 11] = [
        Resource::Children,
        Resource::Families,
        Resource::FamilyChildren,
        Resource::Educators,
        Resource::EducatorChildrenGroups,
        Resource::HealthProfessionals,
        Resource::HealthProfessionalChildrenGroups,
        Resource::Applications,
        Resource::Institutions,
        Resource::ChildEducators,
        Resource::ChildHealthProfessionals,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Children => "children",
            Resource::Families => "families",
            Resource::FamilyChildren => "family.children",
            Resource::Educators => "educators",
            Resource::EducatorChildrenGroups => "educator.childrenGroups",
            Resource::HealthProfessionals => "healthProfessionals",
            Resource::HealthProfessionalChildrenGroups => "healthProfessional.childrenGroups",
            Resource::Applications => "applications",
            Resource::Institutions => "institutions",
            Resource::ChildEducators => "child.educators",
            Resource::ChildHealthProfessionals => "child.healthProfessionals",
        }
    }

    pub fn from_name(name: &str) -> Option<Resource> {
        Resource::ALL.into_iter().find(|r| r.name() == name)
    }

    /// List resources take a query string, relationship resources a parent id.
    pub fn takes_query(&self) -> bool {
        matches!(
            self,
            Resource::Children
                | Resource::Families
                | Resource::Educators
                | Resource::HealthProfessionals
                | Resource::Applications
                | Resource::Institutions
        )
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Repository ports the providers read from.
#[derive(Clone)]
pub struct Repositories {
    pub children: Arc<dyn Repository<Child>>,
    pub families: Arc<dyn Repository<Family>>,
    pub educators: Arc<dyn Repository<Educator>>,
    pub health_professionals: Arc<dyn Repository<HealthProfessional>>,
    pub applications: Arc<dyn Repository<Application>>,
    pub institutions: Arc<dyn Repository<Institution>>,
    pub children_groups: Arc<dyn Repository<ChildrenGroup>>,
}

/// Stateless handler for one resource; every call is independent.
pub struct ResourceProvider {
    resource: Resource,
    repositories: Repositories,
    defaults: QueryDefaults,
}

impl ResourceProvider {
    pub fn new(resource: Resource, repositories: Repositories, defaults: QueryDefaults) -> Self {
        Self {
            resource,
            repositories,
            defaults,
        }
    }

    async fn dispatch(&self, payload: RpcPayload) -> Result<Value> {
        match (self.resource.takes_query(), payload) {
            (true, RpcPayload::Query(raw)) => {
                let query = self.list_query(&raw)?;
                let mut items = self.list(&query).await?;
                for item in items.iter_mut() {
                    query.projection().apply(item);
                }
                Ok(Value::Array(items))
            }
            (false, RpcPayload::Id(id)) => self.related(&id).await.map(Value::Array),
            (takes_query, _) => Err(ValidationFailure::new(
                ValidationCode::ValueInvalid,
                format!(
                    "Resource {} expects {}.",
                    self.resource,
                    if takes_query { "a query string" } else { "an id" }
                ),
                "Check the payload kind sent with the request.",
            )
            .into()),
        }
    }

    fn list_query(&self, raw: &str) -> Result<Query> {
        let query = translate(raw, &self.defaults)?;
        validate_references(&query)?;
        validate_protected_fields(&query)?;
        Ok(query)
    }

    async fn list(&self, query: &Query) -> Result<Vec<Value>> {
        let repos = &self.repositories;
        match self.resource {
            Resource::Children => Ok(repos.children.find(query).await?.iter().map(wire::child).collect()),
            Resource::Families => {
                let mut items = Vec::new();
                for family in repos.families.find(query).await? {
                    let children = self.load_children(&family.children).await?;
                    items.push(wire::family(&family, &children));
                }
                Ok(items)
            }
            Resource::Educators => {
                let mut items = Vec::new();
                for educator in repos.educators.find(query).await? {
                    let groups = self.groups_of(educator.id.as_deref()).await?;
                    items.push(wire::educator(&educator, groups));
                }
                Ok(items)
            }
            Resource::HealthProfessionals => {
                let mut items = Vec::new();
                for professional in repos.health_professionals.find(query).await? {
                    let groups = self.groups_of(professional.id.as_deref()).await?;
                    items.push(wire::health_professional(&professional, groups));
                }
                Ok(items)
            }
            Resource::Applications => Ok(repos
                .applications
                .find(query)
                .await?
                .iter()
                .map(wire::application)
                .collect()),
            Resource::Institutions => Ok(repos
                .institutions
                .find(query)
                .await?
                .iter()
                .map(wire::institution)
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn related(&self, id: &str) -> Result<Vec<Value>> {
        let repos = &self.repositories;
        match self.resource {
            Resource::FamilyChildren => {
                family::validate_id(id)?;
                match repos.families.find_by_id(id).await? {
                    Some(found) => Ok(self
                        .load_children(&found.children)
                        .await?
                        .iter()
                        .map(wire::child)
                        .collect()),
                    None => Ok(Vec::new()),
                }
            }
            Resource::EducatorChildrenGroups => {
                professional::validate_educator_id(id)?;
                self.groups_of(Some(id)).await
            }
            Resource::HealthProfessionalChildrenGroups => {
                professional::validate_health_professional_id(id)?;
                self.groups_of(Some(id)).await
            }
            Resource::ChildEducators => {
                child::validate_id(id)?;
                let mut items = Vec::new();
                for owner in self.group_owners_of(id).await? {
                    if let Some(educator) = repos.educators.find_by_id(&owner).await? {
                        let groups = self.groups_of(Some(&owner)).await?;
                        items.push(wire::educator(&educator, groups));
                    }
                }
                Ok(items)
            }
            Resource::ChildHealthProfessionals => {
                child::validate_id(id)?;
                let mut items = Vec::new();
                for owner in self.group_owners_of(id).await? {
                    if let Some(professional) = repos.health_professionals.find_by_id(&owner).await? {
                        let groups = self.groups_of(Some(&owner)).await?;
                        items.push(wire::health_professional(&professional, groups));
                    }
                }
                Ok(items)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn relationship_query(field: &str, id: &str) -> Result<Query> {
        Ok(Query::builder()
            .filter(field, Predicate::Eq(QueryValue::Text(id.to_string())))
            .pagination(Pagination::new(1, RELATIONSHIP_LIMIT)?)
            .build())
    }

    /// Children referenced by id; dangling references are skipped.
    async fn load_children(&self, ids: &[String]) -> Result<Vec<Child>> {
        let mut children = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(found) = self.repositories.children.find_by_id(id).await? {
                children.push(found);
            }
        }
        Ok(children)
    }

    async fn groups_of(&self, owner: Option<&str>) -> Result<Vec<Value>> {
        let Some(owner) = owner else {
            return Ok(Vec::new());
        };
        let query = Self::relationship_query("user", owner)?;
        let mut groups = Vec::new();
        for group in self.repositories.children_groups.find(&query).await? {
            let children = self.load_children(&group.children).await?;
            groups.push(wire::children_group(&group, &children));
        }
        Ok(groups)
    }

    /// Distinct owners of the groups containing `child_id`, in group order.
    async fn group_owners_of(&self, child_id: &str) -> Result<Vec<String>> {
        let query = Self::relationship_query("children", child_id)?;
        let mut owners: Vec<String> = Vec::new();
        for group in self.repositories.children_groups.find(&query).await? {
            if let Some(owner) = group.user {
                if !owners.contains(&owner) {
                    owners.push(owner);
                }
            }
        }
        Ok(owners)
    }
}

#[async_trait]
impl ResourceHandler for ResourceProvider {
    async fn handle(&self, payload: RpcPayload) -> RpcReply {
        tracing::debug!(resource = %self.resource, ?payload, "handling rpc request");
        let result = self.dispatch(payload).await;
        if let Err(e) = &result {
            tracing::warn!(resource = %self.resource, error = %e, "rpc request failed");
        }
        RpcReply::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_names_round_trip() {
        for resource in Resource::ALL {
            assert_eq!(Resource::from_name(resource.name()), Some(resource));
        }
        assert_eq!(Resource::from_name("unknown"), None);
    }

    #[test]
    fn test_payload_kinds() {
        assert!(Resource::Children.takes_query());
        assert!(Resource::Institutions.takes_query());
        assert!(!Resource::FamilyChildren.takes_query());
        assert!(!Resource::ChildEducators.takes_query());
    }
}
