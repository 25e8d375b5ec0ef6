use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Common surface of every stored entity.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name of the collection the entity lives in.
    const COLLECTION: &'static str;

    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);

    /// Stamps the creation time unless one is already set.
    fn stamp_created_at(&mut self, at: DateTime<Utc>);

    /// Field/value pair that must be unique inside the collection.
    fn unique_key(&self) -> Option<(&'static str, &str)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Child,
    Educator,
    HealthProfessional,
    Family,
    Application,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Child => "child",
            UserType::Educator => "educator",
            UserType::HealthProfessional => "healthprofessional",
            UserType::Family => "family",
            UserType::Application => "application",
        }
    }
}

/// Age as received from a caller: a raw number of years, or its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Age {
    Years(u32),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub institution: Option<String>,
    pub gender: Option<String>,
    pub age: Option<Age>,
    pub age_calc_date: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub institution: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Educator {
    pub id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub institution: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthProfessional {
    pub id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub institution: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub institution: Option<String>,
    pub application_name: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub institution_type: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Group of children owned by an educator or health professional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildrenGroup {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    pub school_class: Option<String>,
    /// Owner id.
    pub user: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

macro_rules! impl_entity {
    ($ty:ty, $collection:literal, $unique:literal, $field:ident) => {
        impl Entity for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }

            fn set_id(&mut self, id: String) {
                self.id = Some(id);
            }

            fn stamp_created_at(&mut self, at: DateTime<Utc>) {
                self.created_at.get_or_insert(at);
            }

            fn unique_key(&self) -> Option<(&'static str, &str)> {
                self.$field.as_deref().map(|value| ($unique, value))
            }
        }
    };
}

impl_entity!(Child, "children", "username", username);
impl_entity!(Family, "families", "username", username);
impl_entity!(Educator, "educators", "username", username);
impl_entity!(HealthProfessional, "health_professionals", "username", username);
impl_entity!(Application, "applications", "username", username);
impl_entity!(Institution, "institutions", "name", name);
impl_entity!(ChildrenGroup, "children_groups", "name", name);
