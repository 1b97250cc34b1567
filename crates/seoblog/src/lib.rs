//! `seoblog`: data model and the rewriting seam for Korean SEO blog optimization.
//!
//! Analysis, the repair loop and HTTP providers live in `seoblog-local`; this crate only
//! re-exports the backend-agnostic reports, requests and the [`Rewriter`] trait so callers can
//! plug in their own text-rewriting service.
//!
//! ```
//! use seoblog::CountBand;
//!
//! let band = CountBand::new(15, 17);
//! assert!(band.contains(16));
//! assert_eq!(band.deficit(12), 3);
//! assert_eq!(band.to_string(), "15-17");
//! ```

pub use seoblog_core::*;

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait::async_trait]
    impl Rewriter for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        async fn rewrite(&self, req: &RewriteRequest) -> Result<String> {
            Ok(req.instruction.to_uppercase())
        }
    }

    #[tokio::test]
    async fn custom_rewriters_plug_in_behind_arc() {
        let r: std::sync::Arc<dyn Rewriter> = std::sync::Arc::new(Upper);
        let out = r.rewrite(&RewriteRequest::new("bmw")).await.unwrap();
        assert_eq!(out, "BMW");
        assert_eq!(r.name(), "upper");
    }
}
