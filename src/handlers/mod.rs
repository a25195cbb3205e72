pub mod file;
pub mod healthz;
pub mod login;
pub mod res;
pub mod store;

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::{Data, Payload};
use actix_web::{HttpRequest, HttpResponse};
use log::{debug, error, warn};

use crate::authn::{self, Credential};
use crate::authz::route::{match_route, Endpoint, RouteMatch, Target};
use crate::authz::{Rank, Resource};
use crate::context::GateContext;
use crate::error::GateError;
use crate::response::CommonResponse;

/// Single entry point for every request: match the route table, resolve
/// the credential, authorize, then hand over to the endpoint.
pub async fn dispatch(
    req: HttpRequest,
    payload: Payload,
    ctx: Data<Arc<GateContext>>,
) -> HttpResponse {
    let route = match match_route(req.method(), req.path()) {
        Ok(Some(route)) => route,
        Ok(None) => return no_route(&req),
        Err(e) => return failed(&req, e),
    };

    let credential = authn::extract(&req).map(|(credential, source)| {
        debug!("{} {}: credential from {source:?}", req.method(), req.path());
        credential
    });

    match handle(&req, payload, route, credential.as_ref(), &ctx).await {
        Ok(resp) => resp,
        Err(e) => failed(&req, e),
    }
}

async fn handle(
    req: &HttpRequest,
    payload: Payload,
    route: RouteMatch,
    credential: Option<&Credential>,
    ctx: &GateContext,
) -> Result<HttpResponse, GateError> {
    let RouteMatch {
        endpoint,
        target,
        min_rank,
    } = route;

    match (endpoint, target) {
        (Endpoint::Healthz, Target::Open) => Ok(healthz::get_healthz()),
        (Endpoint::LoginPage, Target::Open) => Ok(login::get_login()),
        (Endpoint::LoginSubmit, Target::Open) => login::post_login(req, payload, ctx).await,

        (
            Endpoint::Query | Endpoint::Update | Endpoint::Store | Endpoint::StoreUi,
            Target::Fixed(resource),
        ) => {
            authorize(req, ctx, &resource, credential, min_rank).await?;
            store::forward_store(req, payload, ctx).await
        }

        (Endpoint::Upload, Target::Fixed(resource)) => {
            authorize(req, ctx, &resource, credential, min_rank).await?;
            res::post_upload(req, payload, ctx).await
        }

        (Endpoint::ReadResource, Target::Node(id)) => {
            authorize(req, ctx, &Resource::Node(id), credential, min_rank).await?;
            res::get_resource(&id, ctx).await
        }

        (Endpoint::ReplaceResource, Target::Node(id)) => {
            authorize(req, ctx, &Resource::Node(id), credential, min_rank).await?;
            res::put_resource(req, &id, payload, ctx).await
        }

        (Endpoint::Browse, Target::FsPath(segments)) => {
            let node = ctx.files.resolve(&segments).await?;
            authorize(req, ctx, &Resource::Node(node.id), credential, min_rank).await?;
            file::get_browse(node, ctx).await
        }

        (endpoint, target) => {
            error!("Endpoint {endpoint:?} cannot serve target {target:?}");
            Err(GateError::NotFound)
        }
    }
}

async fn authorize(
    req: &HttpRequest,
    ctx: &GateContext,
    resource: &Resource,
    credential: Option<&Credential>,
    min_rank: Rank,
) -> Result<Rank, GateError> {
    let action = format!("{} {}", req.method(), req.path());
    ctx.authorizer
        .authorize(&action, resource, credential, min_rank)
        .await
}

fn no_route(req: &HttpRequest) -> HttpResponse {
    let message = format!("No route to {} {}", req.method(), req.path());
    debug!("{message}");
    let ret = CommonResponse {
        code: StatusCode::NOT_FOUND.into(),
        message: Some(message),
    };
    HttpResponse::NotFound().json(ret)
}

fn failed(req: &HttpRequest, err: GateError) -> HttpResponse {
    let method = req.method();
    let path = req.path();
    match &err {
        GateError::Denied | GateError::NotFound | GateError::Validation(_) => {
            debug!("{method} {path}: {err}")
        }
        GateError::PayloadTooLarge { .. } => warn!("{method} {path}: {err}"),
        GateError::Upstream(_) | GateError::Storage(_) | GateError::PartialIndex(_) => {
            error!("{method} {path}: {err}")
        }
    }
    err.into()
}
