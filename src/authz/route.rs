use actix_web::http::Method;
use uuid::Uuid;

use crate::error::GateError;
use crate::files::path::parse_fs_path;

use super::{parse_canonical_uuid, Rank, Resource};

/// What a matched request is going to do once authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Query,
    Update,
    Store,
    /// Any other read of the store's own pages, such as its query UI.
    StoreUi,
    Upload,
    ReadResource,
    ReplaceResource,
    Browse,
    LoginPage,
    LoginSubmit,
    Healthz,
}

/// The protected resource, or how to find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Fixed(Resource),
    Node(Uuid),
    /// Resolved against the filesystem graph by the handler; the terminal
    /// node's own id is what gets authorized.
    FsPath(Vec<String>),
    /// No credential required.
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub endpoint: Endpoint,
    pub target: Target,
    pub min_rank: Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Get,
    Post,
    Put,
    Any,
}

impl Verb {
    fn allows(&self, method: &Method) -> bool {
        match self {
            Verb::Get => method == Method::GET || method == Method::HEAD,
            Verb::Post => method == Method::POST,
            Verb::Put => method == Method::PUT,
            Verb::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    /// The path itself.
    Exact(&'static str),
    /// The path itself or anything below it.
    Subtree(&'static str),
    /// One canonical UUID segment below the prefix.
    UuidParam(&'static str),
    /// Zero or more label segments below the prefix.
    RestPath(&'static str),
    /// Anything outside the paths the gateway itself owns.
    Fallback,
}

/// Never served by the fallback, whatever the method.
const RESERVED_PREFIXES: &[&str] = &[
    "/query", "/update", "/store", "/res", "/file", "/gate", "/healthz",
];

fn is_reserved(path: &str) -> bool {
    RESERVED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

#[derive(Debug, Clone, Copy)]
enum Resolver {
    StoreRoot,
    UploadAction,
    PathUuid,
    FsPath,
    Open,
}

struct Route {
    verbs: &'static [Verb],
    pattern: Pattern,
    resolver: Resolver,
    min_rank: Rank,
    endpoint: Endpoint,
}

const ROUTES: &[Route] = &[
    Route {
        verbs: &[Verb::Get, Verb::Post],
        pattern: Pattern::Exact("/query"),
        resolver: Resolver::StoreRoot,
        min_rank: Rank::View,
        endpoint: Endpoint::Query,
    },
    Route {
        verbs: &[Verb::Post],
        pattern: Pattern::Exact("/update"),
        resolver: Resolver::StoreRoot,
        min_rank: Rank::Edit,
        endpoint: Endpoint::Update,
    },
    Route {
        verbs: &[Verb::Any],
        pattern: Pattern::Subtree("/store"),
        resolver: Resolver::StoreRoot,
        min_rank: Rank::Edit,
        endpoint: Endpoint::Store,
    },
    Route {
        verbs: &[Verb::Post],
        pattern: Pattern::Exact("/res"),
        resolver: Resolver::UploadAction,
        min_rank: Rank::Edit,
        endpoint: Endpoint::Upload,
    },
    Route {
        verbs: &[Verb::Get],
        pattern: Pattern::UuidParam("/res"),
        resolver: Resolver::PathUuid,
        min_rank: Rank::View,
        endpoint: Endpoint::ReadResource,
    },
    Route {
        verbs: &[Verb::Put],
        pattern: Pattern::UuidParam("/res"),
        resolver: Resolver::PathUuid,
        min_rank: Rank::Edit,
        endpoint: Endpoint::ReplaceResource,
    },
    Route {
        verbs: &[Verb::Get],
        pattern: Pattern::RestPath("/file"),
        resolver: Resolver::FsPath,
        min_rank: Rank::View,
        endpoint: Endpoint::Browse,
    },
    Route {
        verbs: &[Verb::Get],
        pattern: Pattern::Exact("/gate/login"),
        resolver: Resolver::Open,
        min_rank: Rank::None,
        endpoint: Endpoint::LoginPage,
    },
    Route {
        verbs: &[Verb::Post],
        pattern: Pattern::Exact("/gate/login"),
        resolver: Resolver::Open,
        min_rank: Rank::None,
        endpoint: Endpoint::LoginSubmit,
    },
    Route {
        verbs: &[Verb::Get],
        pattern: Pattern::Exact("/healthz"),
        resolver: Resolver::Open,
        min_rank: Rank::None,
        endpoint: Endpoint::Healthz,
    },
    Route {
        verbs: &[Verb::Get],
        pattern: Pattern::Fallback,
        resolver: Resolver::StoreRoot,
        min_rank: Rank::View,
        endpoint: Endpoint::StoreUi,
    },
];

impl Pattern {
    /// The captured remainder when the path fits the pattern.
    fn capture<'a>(&self, path: &'a str) -> Option<&'a str> {
        match self {
            Pattern::Exact(prefix) => {
                if path.trim_end_matches('/') == *prefix {
                    Some("")
                } else {
                    None
                }
            }
            Pattern::Subtree(prefix) | Pattern::RestPath(prefix) => {
                let rest = path.strip_prefix(prefix)?;
                if rest.is_empty() || rest.starts_with('/') {
                    Some(rest)
                } else {
                    None
                }
            }
            Pattern::Fallback => {
                if is_reserved(path) {
                    None
                } else {
                    Some(path)
                }
            }
            Pattern::UuidParam(prefix) => {
                let rest = path.strip_prefix(prefix)?.strip_prefix('/')?;
                let rest = rest.trim_end_matches('/');
                if rest.is_empty() {
                    None
                } else {
                    Some(rest)
                }
            }
        }
    }
}

impl Resolver {
    fn resolve(&self, captured: &str) -> Result<Target, GateError> {
        match self {
            Resolver::StoreRoot => Ok(Target::Fixed(Resource::StoreRoot)),
            Resolver::UploadAction => Ok(Target::Fixed(Resource::UploadAction)),
            Resolver::PathUuid => match parse_canonical_uuid(captured) {
                Some(id) => Ok(Target::Node(id)),
                None => Err(GateError::validation("invalid resource id")),
            },
            Resolver::FsPath => Ok(Target::FsPath(parse_fs_path(captured)?)),
            Resolver::Open => Ok(Target::Open),
        }
    }
}

/// Look up the route for a request. `Ok(None)` means no route exists and
/// nothing downstream may be contacted; a route whose path variable fails
/// validation is an error before any rank check happens. Reads outside the
/// gateway's own paths fall through to the store at view rank.
pub fn match_route(method: &Method, path: &str) -> Result<Option<RouteMatch>, GateError> {
    for route in ROUTES {
        let captured = match route.pattern.capture(path) {
            Some(captured) => captured,
            None => continue,
        };
        if !route.verbs.iter().any(|v| v.allows(method)) {
            continue;
        }

        let target = route.resolver.resolve(captured)?;
        return Ok(Some(RouteMatch {
            endpoint: route.endpoint,
            target,
            min_rank: route.min_rank,
        }));
    }
    Ok(None)
}
