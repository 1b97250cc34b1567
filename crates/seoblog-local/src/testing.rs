//! Test double for the rewriting capability.

use seoblog_core::{Error, Result, RewriteRequest, Rewriter};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&RewriteRequest) -> Result<String> + Send + Sync;

#[derive(Clone)]
pub struct ScriptedRewriter {
    script: Arc<Mutex<VecDeque<Result<String>>>>,
    responder: Option<Arc<Responder>>,
    seen: Arc<Mutex<Vec<RewriteRequest>>>,
}

impl ScriptedRewriter {
    /// Replies in order; once exhausted every call fails.
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            responder: None,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn from_fn(f: impl Fn(&RewriteRequest) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            responder: Some(Arc::new(f)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RewriteRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Rewriter for ScriptedRewriter {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn rewrite(&self, req: &RewriteRequest) -> Result<String> {
        self.seen.lock().unwrap().push(req.clone());
        if let Some(f) = &self.responder {
            return f(req);
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Llm("script exhausted".to_string())))
    }
}

// Env vars are process-global; serialize tests that mutate them.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

pub struct EnvGuard {
    k: &'static str,
    prev: Option<String>,
}

impl EnvGuard {
    pub fn set(k: &'static str, v: &str) -> Self {
        let prev = std::env::var(k).ok();
        std::env::set_var(k, v);
        Self { k, prev }
    }

    pub fn unset(k: &'static str) -> Self {
        let prev = std::env::var(k).ok();
        std::env::remove_var(k);
        Self { k, prev }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        if let Some(v) = self.prev.take() {
            std::env::set_var(self.k, v);
        } else {
            std::env::remove_var(self.k);
        }
    }
}
