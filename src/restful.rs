use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::http::Method;
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use anyhow::{Context, Result};
use log::info;
use sd_notify::NotifyState;

use crate::context::GateContext;
use crate::handlers;

pub struct RestfulServer {
    ctx: Arc<GateContext>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,
}

impl RestfulServer {
    pub fn new(bind: String, ctx: Arc<GateContext>) -> Self {
        Self {
            ctx,
            keep_alive_secs: None,
            workers: None,
            bind,
        }
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    pub async fn run(self) -> Result<()> {
        let ctx = self.ctx.clone();
        let mut srv = HttpServer::new(move || {
            App::new()
                .wrap(Self::cors())
                .app_data(Data::new(ctx.clone()))
                .default_service(web::to(handlers::dispatch))
        });

        info!("Binding to http://{}", self.bind);
        srv = srv.bind(&self.bind).context("bind restful server")?;

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting restful server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }

    /// Cross-origin callers may read responses but never send cookies along,
    /// so browser sessions only work same-origin.
    fn cors() -> Cors {
        Cors::default()
            .allow_any_origin()
            .allowed_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_any_header()
            .max_age(3600)
    }
}
