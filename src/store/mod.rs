#[cfg(test)]
pub mod memory;
pub mod sparql;
pub mod vocab;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::authz::{Rank, Resource};

#[cfg(test)]
use memory::MemoryStore;
use sparql::SparqlStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    Public,
    Token,
}

/// A policy that applies to the queried resource (its target is the resource
/// itself or, for nodes, an ancestor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRecord {
    pub policy_type: PolicyType,
    pub level: Rank,
    /// Hex digest of the grantee token, present only on token policies.
    pub grantee_hash: Option<String>,
}

impl PolicyRecord {
    /// Exactly one of public-without-grantee or token-with-grantee.
    pub fn is_well_formed(&self) -> bool {
        match self.policy_type {
            PolicyType::Public => self.grantee_hash.is_none(),
            PolicyType::Token => self.grantee_hash.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsNode {
    pub id: Uuid,
    pub kind: NodeKind,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsEntry {
    pub uuid: Uuid,
    pub label: String,
    pub kind: NodeKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Metadata record of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: Uuid,
    pub label: String,
    pub size: u64,
    pub mime: String,
    pub created: DateTime<Utc>,
    pub stored_as: String,
}

/// Everything the gateway itself reads from or writes to the graph store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Policies whose target is the resource, or for node resources any node
    /// that reaches it through zero or more inclusion edges.
    async fn list_policies(&self, resource: &Resource) -> Result<Vec<PolicyRecord>>;

    /// Walk labels from the root directory. Empty segments resolve to the root.
    async fn resolve_path(&self, segments: &[String]) -> Result<Option<FsNode>>;

    async fn list_children(&self, dir: &Uuid) -> Result<Vec<FsEntry>>;

    async fn get_file(&self, id: &Uuid) -> Result<Option<FileRecord>>;

    /// Insert a file record plus the inclusion edge from its parent.
    async fn insert_file(&self, parent: &Uuid, file: &FileRecord) -> Result<()>;

    async fn update_file_size(&self, id: &Uuid, size: u64) -> Result<()>;
}

pub enum UnionStore {
    Sparql(SparqlStore),
    #[cfg(test)]
    Memory(MemoryStore),
}

#[async_trait]
impl GraphStore for UnionStore {
    async fn list_policies(&self, resource: &Resource) -> Result<Vec<PolicyRecord>> {
        match self {
            UnionStore::Sparql(store) => store.list_policies(resource).await,
            #[cfg(test)]
            UnionStore::Memory(store) => store.list_policies(resource).await,
        }
    }

    async fn resolve_path(&self, segments: &[String]) -> Result<Option<FsNode>> {
        match self {
            UnionStore::Sparql(store) => store.resolve_path(segments).await,
            #[cfg(test)]
            UnionStore::Memory(store) => store.resolve_path(segments).await,
        }
    }

    async fn list_children(&self, dir: &Uuid) -> Result<Vec<FsEntry>> {
        match self {
            UnionStore::Sparql(store) => store.list_children(dir).await,
            #[cfg(test)]
            UnionStore::Memory(store) => store.list_children(dir).await,
        }
    }

    async fn get_file(&self, id: &Uuid) -> Result<Option<FileRecord>> {
        match self {
            UnionStore::Sparql(store) => store.get_file(id).await,
            #[cfg(test)]
            UnionStore::Memory(store) => store.get_file(id).await,
        }
    }

    async fn insert_file(&self, parent: &Uuid, file: &FileRecord) -> Result<()> {
        match self {
            UnionStore::Sparql(store) => store.insert_file(parent, file).await,
            #[cfg(test)]
            UnionStore::Memory(store) => store.insert_file(parent, file).await,
        }
    }

    async fn update_file_size(&self, id: &Uuid, size: u64) -> Result<()> {
        match self {
            UnionStore::Sparql(store) => store.update_file_size(id, size).await,
            #[cfg(test)]
            UnionStore::Memory(store) => store.update_file_size(id, size).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_well_formed() {
        let public = PolicyRecord {
            policy_type: PolicyType::Public,
            level: Rank::View,
            grantee_hash: None,
        };
        assert!(public.is_well_formed());

        let token = PolicyRecord {
            policy_type: PolicyType::Token,
            level: Rank::Edit,
            grantee_hash: Some(String::from("abc")),
        };
        assert!(token.is_well_formed());

        let public_with_grantee = PolicyRecord {
            grantee_hash: Some(String::from("abc")),
            ..public.clone()
        };
        assert!(!public_with_grantee.is_well_formed());

        let token_without_grantee = PolicyRecord {
            grantee_hash: None,
            ..token
        };
        assert!(!token_without_grantee.is_well_formed());
    }
}
