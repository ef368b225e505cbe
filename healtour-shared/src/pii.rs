use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Contact data captured on a booking (email, phone, passport number).
///
/// `Debug` and `Display` never print the wrapped value, so a traveler's
/// details cannot leak through `tracing::info!("{:?}", booking)`. Serialization
/// is transparent because the storage adapters need the real value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl Masked<String> {
    /// Short hint suitable for logs: first character plus the domain for
    /// emails, last two characters otherwise.
    pub fn hint(&self) -> String {
        let value = self.0.as_str();
        match value.split_once('@') {
            Some((local, domain)) => {
                let first = local.chars().next().map(String::from).unwrap_or_default();
                format!("{}***@{}", first, domain)
            }
            None => {
                let count = value.chars().count();
                if count <= 2 {
                    "**".to_string()
                } else {
                    let tail: String = value.chars().skip(count - 2).collect();
                    format!("***{}", tail)
                }
            }
        }
    }
}

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Masked<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Masked)
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}
