mod policy;

pub mod route;

use std::fmt::{self, Display};
use std::sync::Arc;

use log::{error, warn};
use uuid::Uuid;

use crate::authn::Credential;
use crate::error::GateError;
use crate::store::vocab;
use crate::store::{GraphStore, UnionStore};

use policy::effective_rank;

/// Access rank, totally ordered: none < view < comment < edit < admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Rank {
    #[default]
    None = 0,
    View = 1,
    Comment = 2,
    Edit = 3,
    Admin = 4,
}

impl Rank {
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Parse a policy level, either a bare name (`edit`) or an IRI whose local
    /// name is the level (`liqk:edit`).
    pub fn from_level(level: &str) -> Option<Self> {
        match vocab::local_name(level).to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "view" => Some(Self::View),
            "comment" => Some(Self::Comment),
            "edit" => Some(Self::Edit),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A protectable entity: a fixed store/action identifier or a UUID-scoped node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    StoreRoot,
    UploadAction,
    Node(Uuid),
}

impl Resource {
    pub fn iri(&self) -> String {
        match self {
            Resource::StoreRoot => vocab::STORE_ROOT_GRAPH.to_string(),
            Resource::UploadAction => vocab::UPLOAD_ACTION.to_string(),
            Resource::Node(id) => node_iri(id),
        }
    }

    /// Fixed resources match policies by exact target only; nodes inherit
    /// along inclusion edges.
    pub fn is_fixed(&self) -> bool {
        !matches!(self, Resource::Node(_))
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iri())
    }
}

pub fn node_iri(id: &Uuid) -> String {
    format!("urn:uuid:{}", id.hyphenated())
}

pub fn parse_node_iri(iri: &str) -> Option<Uuid> {
    let raw = iri.strip_prefix("urn:uuid:")?;
    parse_canonical_uuid(raw)
}

/// Accept only the 36-character hyphenated form; braced, simple and urn
/// spellings are rejected.
pub fn parse_canonical_uuid(raw: &str) -> Option<Uuid> {
    if raw.len() != 36 {
        return None;
    }
    let id = Uuid::try_parse(raw).ok()?;
    if !id.hyphenated().to_string().eq_ignore_ascii_case(raw) {
        return None;
    }
    Some(id)
}

/// Decides access by evaluating policies against the current graph contents.
/// Nothing is cached: every call reads the store afresh.
pub struct Authorizer {
    store: Arc<UnionStore>,
}

impl Authorizer {
    pub fn new(store: Arc<UnionStore>) -> Self {
        Self { store }
    }

    /// Maximum rank the credential holds on the resource. Store failures
    /// resolve to [`Rank::None`].
    pub async fn resolve_rank(&self, resource: &Resource, credential: Option<&Credential>) -> Rank {
        let policies = match self.store.list_policies(resource).await {
            Ok(policies) => policies,
            Err(e) => {
                error!("Failed to load policies for {resource}, denying: {e:#}");
                return Rank::None;
            }
        };

        let digest = credential.map(|c| c.digest());
        effective_rank(&policies, digest.as_ref())
    }

    /// `action` names the request in the denial log, e.g. `PUT /res/{uuid}`.
    pub async fn authorize(
        &self,
        action: &str,
        resource: &Resource,
        credential: Option<&Credential>,
        min_rank: Rank,
    ) -> Result<Rank, GateError> {
        let rank = self.resolve_rank(resource, credential).await;
        if rank < min_rank {
            warn!(
                "Denied {action} on {resource}: rank {rank}, required {min_rank}, credential: {}",
                credential.is_some()
            );
            return Err(GateError::Denied);
        }
        Ok(rank)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::memory::MemoryStore;
    use crate::store::NodeKind;

    use super::*;

    const SECRET_A: &str = "0123456789abcdef0123456789abcdef";
    const SECRET_B: &str = "fedcba9876543210fedcba9876543210";

    fn credential(secret: &str) -> Credential {
        Credential::new(secret).unwrap()
    }

    #[test]
    fn test_rank_order() {
        assert!(Rank::None < Rank::View);
        assert!(Rank::View < Rank::Comment);
        assert!(Rank::Comment < Rank::Edit);
        assert!(Rank::Edit < Rank::Admin);
        assert_eq!(Rank::Admin.value(), 4);
        assert_eq!(Rank::from_level("http://liqk.org/schema#comment"), Some(Rank::Comment));
        assert_eq!(Rank::from_level("EDIT"), Some(Rank::Edit));
        assert_eq!(Rank::from_level("owner"), None);
    }

    #[test]
    fn test_resource_iri() {
        let id = Uuid::new_v4();
        let iri = Resource::Node(id).iri();
        assert_eq!(iri, format!("urn:uuid:{}", id.hyphenated()));
        assert_eq!(parse_node_iri(&iri), Some(id));
        assert_eq!(Resource::StoreRoot.iri(), vocab::STORE_ROOT_GRAPH);
        assert_eq!(parse_node_iri("urn:uuid:not-a-uuid"), None);
        assert_eq!(parse_node_iri(&format!("urn:uuid:{}", id.simple())), None);
        assert_eq!(parse_node_iri("http://example.org/other"), None);
        assert!(Resource::UploadAction.is_fixed());
        assert!(!Resource::Node(id).is_fixed());
    }

    #[test]
    fn test_parse_canonical_uuid() {
        let id = Uuid::new_v4();
        let upper = id.hyphenated().to_string().to_uppercase();
        assert_eq!(parse_canonical_uuid(&upper), Some(id));
        assert_eq!(parse_canonical_uuid(&id.hyphenated().to_string()), Some(id));
        assert!(parse_canonical_uuid(&id.simple().to_string()).is_none());
        assert!(parse_canonical_uuid(&format!("{{{}}}", id.hyphenated())).is_none());
        assert!(parse_canonical_uuid("\"; DROP ALL; #").is_none());
    }

    #[actix_web::test]
    async fn test_no_policy_denies() {
        let store = Arc::new(UnionStore::Memory(MemoryStore::new()));
        let authz = Authorizer::new(store);

        let id = Uuid::new_v4();
        let cred = credential(SECRET_A);
        assert_eq!(authz.resolve_rank(&Resource::StoreRoot, None).await, Rank::None);
        assert_eq!(
            authz.resolve_rank(&Resource::Node(id), Some(&cred)).await,
            Rank::None
        );
        assert!(matches!(
            authz.authorize("GET /query", &Resource::StoreRoot, Some(&cred), Rank::View).await,
            Err(GateError::Denied)
        ));
        // Rank none is always satisfied.
        assert!(authz
            .authorize("GET /query", &Resource::StoreRoot, None, Rank::None)
            .await
            .is_ok());
    }

    #[actix_web::test]
    async fn test_public_policy_applies_to_everyone() {
        let memory = MemoryStore::new();
        memory.add_public_policy(Resource::StoreRoot, Rank::View);
        let authz = Authorizer::new(Arc::new(UnionStore::Memory(memory)));

        assert_eq!(authz.resolve_rank(&Resource::StoreRoot, None).await, Rank::View);
        let cred = credential(SECRET_A);
        assert_eq!(
            authz.resolve_rank(&Resource::StoreRoot, Some(&cred)).await,
            Rank::View
        );
        // Fixed resources never inherit.
        assert_eq!(
            authz.resolve_rank(&Resource::UploadAction, None).await,
            Rank::None
        );
    }

    #[actix_web::test]
    async fn test_token_policy_inherits_to_descendants_only() {
        let memory = MemoryStore::new();
        let root = memory.add_root();
        let projects = memory.add_dir(root, "projects");
        let alpha = memory.add_dir(projects, "alpha");
        let doc = memory.add_node(alpha, "notes.txt", NodeKind::File);
        let sibling = memory.add_dir(root, "private");
        memory.add_token_policy(Resource::Node(projects), Rank::Edit, SECRET_A);

        let authz = Authorizer::new(Arc::new(UnionStore::Memory(memory)));
        let holder = credential(SECRET_A);
        let other = credential(SECRET_B);

        for node in [projects, alpha, doc] {
            assert_eq!(
                authz.resolve_rank(&Resource::Node(node), Some(&holder)).await,
                Rank::Edit
            );
            assert_eq!(
                authz.resolve_rank(&Resource::Node(node), Some(&other)).await,
                Rank::None
            );
            assert_eq!(authz.resolve_rank(&Resource::Node(node), None).await, Rank::None);
        }

        assert_eq!(
            authz.resolve_rank(&Resource::Node(sibling), Some(&holder)).await,
            Rank::None
        );
        assert_eq!(
            authz.resolve_rank(&Resource::Node(root), Some(&holder)).await,
            Rank::None
        );
    }

    #[actix_web::test]
    async fn test_public_and_token_take_maximum() {
        let memory = MemoryStore::new();
        let root = memory.add_root();
        let shared = memory.add_dir(root, "shared");
        memory.add_public_policy(Resource::Node(root), Rank::Comment);
        memory.add_token_policy(Resource::Node(shared), Rank::View, SECRET_A);
        memory.add_token_policy(Resource::Node(root), Rank::Admin, SECRET_B);

        let authz = Authorizer::new(Arc::new(UnionStore::Memory(memory)));
        let a = credential(SECRET_A);
        let b = credential(SECRET_B);

        // Public comment beats the token's view grant.
        assert_eq!(
            authz.resolve_rank(&Resource::Node(shared), Some(&a)).await,
            Rank::Comment
        );
        assert_eq!(
            authz.resolve_rank(&Resource::Node(shared), Some(&b)).await,
            Rank::Admin
        );
        assert_eq!(
            authz.resolve_rank(&Resource::Node(shared), None).await,
            Rank::Comment
        );
    }

    #[actix_web::test]
    async fn test_store_failure_denies() {
        let memory = MemoryStore::new();
        memory.add_public_policy(Resource::StoreRoot, Rank::Admin);
        memory.fail_reads(true);
        let authz = Authorizer::new(Arc::new(UnionStore::Memory(memory)));

        assert_eq!(authz.resolve_rank(&Resource::StoreRoot, None).await, Rank::None);
        assert!(matches!(
            authz.authorize("GET /query", &Resource::StoreRoot, None, Rank::View).await,
            Err(GateError::Denied)
        ));
    }
}
