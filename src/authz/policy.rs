use crate::authn::TokenDigest;
use crate::store::{PolicyRecord, PolicyType};

use super::Rank;

/// Highest level granted by well-formed public policies.
pub fn public_rank(policies: &[PolicyRecord]) -> Rank {
    policies
        .iter()
        .filter(|p| p.is_well_formed() && p.policy_type == PolicyType::Public)
        .map(|p| p.level)
        .max()
        .unwrap_or_default()
}

/// Highest level granted by token policies whose grantee digest equals the
/// presented one. Without a credential this is always [`Rank::None`].
pub fn token_rank(policies: &[PolicyRecord], digest: Option<&TokenDigest>) -> Rank {
    let digest = match digest {
        Some(digest) => digest,
        None => return Rank::None,
    };

    let mut rank = Rank::None;
    for policy in policies {
        if !policy.is_well_formed() || policy.policy_type != PolicyType::Token {
            continue;
        }
        let hash = match policy.grantee_hash.as_deref() {
            Some(hash) => hash,
            None => continue,
        };
        // No early exit: every grantee digest gets compared.
        if digest.matches(hash) && policy.level > rank {
            rank = policy.level;
        }
    }
    rank
}

/// `max(public, token)`. Neither kind overrides the other and ranks never add.
pub fn effective_rank(policies: &[PolicyRecord], digest: Option<&TokenDigest>) -> Rank {
    public_rank(policies).max(token_rank(policies, digest))
}
