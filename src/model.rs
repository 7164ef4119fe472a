//! Person and customer records.

use serde::{Deserialize, Serialize};

/// Which kind of profile a person has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Customer,
    Employee,
    Owner,
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Employee => write!(f, "employee"),
            Self::Owner => write!(f, "owner"),
        }
    }
}

impl std::str::FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "employee" => Ok(Self::Employee),
            "owner" => Ok(Self::Owner),
            other => Err(format!("unknown profile kind: {other}")),
        }
    }
}

/// Lifecycle tag carried by customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Registered,
    Approved,
    Rejected,
}

impl std::fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for CustomerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(Self::Registered),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown customer status: {other}")),
        }
    }
}

/// A registered (or about to be registered) person.
///
/// `id` is empty until the identity store assigns one; `photo_address` is
/// empty until the photo upload succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: String,
    pub profile_kind: ProfileKind,
    pub given_name: String,
    pub surname: String,
    pub national_id: u64,
    #[serde(default)]
    pub photo_address: String,
    pub email: String,
    /// Only customers carry a status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CustomerStatus>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.surname)
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }
}

/// A person with the customer profile kind and a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer(Person);

impl Customer {
    pub fn new(
        given_name: impl Into<String>,
        surname: impl Into<String>,
        national_id: u64,
        email: impl Into<String>,
        photo_address: impl Into<String>,
        status: CustomerStatus,
    ) -> Self {
        Self(Person {
            id: String::new(),
            profile_kind: ProfileKind::Customer,
            given_name: given_name.into(),
            surname: surname.into(),
            national_id,
            photo_address: photo_address.into(),
            email: email.into(),
            status: Some(status),
        })
    }

    pub fn status(&self) -> CustomerStatus {
        self.0.status.unwrap_or(CustomerStatus::Registered)
    }

    pub fn person(&self) -> &Person {
        &self.0
    }

    pub fn into_person(self) -> Person {
        self.0
    }

    /// Record the id the identity store assigned.
    pub(crate) fn assign_id(&mut self, id: String) {
        self.0.id = id;
    }
}

impl TryFrom<Person> for Customer {
    type Error = Person;

    fn try_from(person: Person) -> Result<Self, Self::Error> {
        if person.profile_kind == ProfileKind::Customer && person.status.is_some() {
            Ok(Self(person))
        } else {
            Err(person)
        }
    }
}
