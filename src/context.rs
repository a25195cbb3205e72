use std::sync::Arc;

use anyhow::Result;

use crate::authn::session::SessionManager;
use crate::authz::Authorizer;
use crate::config::GateConfig;
use crate::files::FileStore;
use crate::proxy::QueryProxy;
use crate::store::sparql::SparqlStore;
use crate::store::UnionStore;

/// Everything a request handler needs, built once at start-up from the
/// completed configuration and never mutated afterwards.
pub struct GateContext {
    pub cfg: GateConfig,

    pub authorizer: Authorizer,
    pub files: FileStore,
    pub proxy: QueryProxy,
    pub sessions: SessionManager,
}

impl GateContext {
    pub fn new(cfg: GateConfig) -> Result<Self> {
        let store = SparqlStore::new(&cfg.upstream_url, cfg.upstream_timeout())?;
        Self::with_store(cfg, Arc::new(UnionStore::Sparql(store)))
    }

    fn with_store(cfg: GateConfig, store: Arc<UnionStore>) -> Result<Self> {
        let proxy = QueryProxy::new(&cfg.upstream_url, cfg.upstream_timeout())?;
        let files = FileStore::new(
            &cfg.files_dir,
            store.clone(),
            &cfg.upload_dir,
            cfg.max_upload_bytes(),
        );
        files.sweep_temp_files();
        Ok(Self {
            authorizer: Authorizer::new(store),
            files,
            proxy,
            sessions: SessionManager::new(cfg.secure_cookies),
            cfg,
        })
    }

    /// A context over an in-memory graph. `files_dir` and `upstream_url`
    /// come from the caller so tests can point them at throwaway targets.
    #[cfg(test)]
    pub fn new_test(
        store: crate::store::memory::MemoryStore,
        files_dir: &std::path::Path,
        upstream_url: &str,
    ) -> Self {
        let cfg = GateConfig {
            upstream_url: upstream_url.to_string(),
            files_dir: files_dir.display().to_string(),
            secure_cookies: false,
            upstream_timeout_secs: 5,
            max_upload_mib: 1,
            payload_limit_mib: 1,
            ..Default::default()
        };
        Self::with_store(cfg, Arc::new(UnionStore::Memory(store))).unwrap()
    }
}
