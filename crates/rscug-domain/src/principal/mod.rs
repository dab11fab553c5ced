//! Users, groups and principal resolution.
//!
//! Every authorizable has an id and a principal name. Groups hold members by
//! id; membership is transitive. The `everyone` principal is held implicitly
//! by every accessor.

mod config;
mod directory;
mod traits;

pub use config::ResolverConfig;
pub use directory::PrincipalDirectory;
pub use traits::PrincipalProvider;

use std::collections::BTreeSet;

/// Principal implicitly held by every accessor.
pub const EVERYONE: &str = "everyone";

/// Kind of an authorizable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizableKind {
    User,
    Group,
}

/// A user or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorizable {
    pub id: String,
    pub principal_name: String,
    pub kind: AuthorizableKind,
    /// Ids of direct members; always empty for users.
    pub members: BTreeSet<String>,
}

impl Authorizable {
    pub fn is_group(&self) -> bool {
        self.kind == AuthorizableKind::Group
    }
}
