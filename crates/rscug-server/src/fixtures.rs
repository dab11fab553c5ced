//! YAML repository fixtures.
//!
//! A fixture describes users, groups, content nodes, ACLs and CUG policies.
//! Applying it creates the authorizables and commits the content in a single
//! commit.
//!
//! ```yaml
//! users:
//!   - id: user1
//! groups:
//!   - id: group1
//!     members: [user1]
//! nodes:
//!   - /content/a/b1
//! acls:
//!   - path: /content
//!     read: [user1]
//! cugs:
//!   - path: /content/a
//!     principals: [group1]
//! ```

use std::path::Path;

use rscug_domain::DomainError;
use rscug_storage::Snapshot;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::repository::CugRepository;

/// Errors raised while loading or applying a fixture.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to apply fixture: {0}")]
    Domain(#[from] DomainError),
}

/// A user entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UserFixture {
    pub id: String,
    /// Principal name; defaults to the id.
    #[serde(default)]
    pub principal: Option<String>,
}

/// A group entry. Members are user or group ids.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GroupFixture {
    pub id: String,
    #[serde(default)]
    pub principal: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AclFixture {
    pub path: String,
    #[serde(default)]
    pub read: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CugFixture {
    pub path: String,
    #[serde(default)]
    pub principals: Vec<String>,
}

/// Repository content to load at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<UserFixture>,
    #[serde(default)]
    pub groups: Vec<GroupFixture>,
    /// Node paths; intermediate nodes are created as needed.
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub acls: Vec<AclFixture>,
    #[serde(default)]
    pub cugs: Vec<CugFixture>,
}

impl Fixture {
    pub fn from_yaml(source: &str) -> Result<Self, FixtureError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    /// Creates the authorizables and commits the content.
    ///
    /// Groups are created before any membership is added, so members may
    /// refer to groups declared later in the file.
    pub async fn apply(&self, repo: &CugRepository) -> Result<Snapshot, FixtureError> {
        let directory = repo.directory();
        for user in &self.users {
            directory.create_user(&user.id, user.principal.as_deref().unwrap_or(&user.id))?;
        }
        for group in &self.groups {
            directory.create_group(&group.id, group.principal.as_deref().unwrap_or(&group.id))?;
        }
        for group in &self.groups {
            for member in &group.members {
                directory.add_member(&group.id, member)?;
            }
        }

        let mut root = repo.login().await;
        for node in &self.nodes {
            root.ensure_path(node).map_err(DomainError::from)?;
        }
        for acl in &self.acls {
            repo.acl()
                .set_read_entries(&mut root, &acl.path, acl.read.iter().cloned())?;
        }
        for cug in &self.cugs {
            repo.policies()
                .set_policy(&mut root, &cug.path, cug.principals.iter().cloned())?;
        }
        let head = repo.commit(&mut root, "fixture").await?;

        info!(
            users = self.users.len(),
            groups = self.groups.len(),
            cugs = self.cugs.len(),
            revision = head.revision(),
            "fixture applied"
        );
        Ok(head)
    }
}
