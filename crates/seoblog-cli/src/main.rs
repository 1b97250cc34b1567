use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use seoblog_core::{BusinessInfo, GenerationRequest, ResearchData, Rewriter};
use seoblog_local::perplexity::PerplexityClient;
use seoblog_local::{
    check_terms, http_client, provider_status, rewriter_from_env, Analyzer, EngineConfig,
    IncrementalOptimizer, Orchestrator, OveruseResolver,
};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "seoblog")]
#[command(about = "Korean blog SEO frequency analysis and LLM-driven optimization", long_about = None)]
struct Cli {
    /// Engine config (json). Default: <config dir>/seoblog/config.json when present.
    #[arg(long, global = true, env = "SEOBLOG_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze content against the keyword/length/term targets (json).
    Analyze(AnalyzeCmd),
    /// Check which mandatory terms appear in the content (json).
    CheckTerms(CheckTermsCmd),
    /// Re-optimize existing content with the bounded fix loop (json).
    Optimize(RewriteCmd),
    /// Bring keyword components above the band ceiling back down (json).
    ResolveOveruse(RewriteCmd),
    /// Generate a new post from a request file (json).
    Generate(GenerateCmd),
    /// Fetch background research for a keyword via Perplexity (json).
    Research(ResearchCmd),
    /// Diagnose configuration (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct Input {
    /// Content file (default: stdin).
    #[arg(long)]
    file: Option<PathBuf>,
}

impl Input {
    fn read(&self) -> Result<String> {
        match &self.file {
            Some(p) => std::fs::read_to_string(p).with_context(|| format!("read {}", p.display())),
            None => {
                let mut s = String::new();
                std::io::stdin().read_to_string(&mut s).context("read stdin")?;
                Ok(s)
            }
        }
    }
}

#[derive(clap::Args, Debug)]
struct AnalyzeCmd {
    #[arg(long)]
    keyword: String,
    /// Space-separated mandatory terms.
    #[arg(long)]
    terms: Option<String>,
    /// Use the generation character band instead of the analyzer band.
    #[arg(long)]
    generation_band: bool,
    #[command(flatten)]
    input: Input,
}

#[derive(clap::Args, Debug)]
struct CheckTermsCmd {
    /// Space-separated mandatory terms.
    #[arg(long)]
    terms: String,
    #[command(flatten)]
    input: Input,
}

#[derive(clap::Args, Debug)]
struct RewriteCmd {
    #[arg(long)]
    keyword: String,
    /// Space-separated mandatory terms.
    #[arg(long)]
    terms: Option<String>,
    /// claude|gemini|openai_compat|perplexity|auto
    #[arg(long, default_value = "auto", env = "SEOBLOG_PROVIDER")]
    provider: String,
    #[command(flatten)]
    input: Input,
}

#[derive(clap::Args, Debug)]
struct GenerateCmd {
    /// Generation request (json): keyword, subtitles, research, business, reference_links, custom_terms.
    #[arg(long)]
    request: PathBuf,
    /// Research (json `{content, citations}` or plain text) overriding the request's research.
    #[arg(long)]
    research_file: Option<PathBuf>,
    /// Skip automatic Perplexity research when the request carries none.
    #[arg(long)]
    no_research: bool,
    /// claude|gemini|openai_compat|perplexity|auto
    #[arg(long, default_value = "auto", env = "SEOBLOG_PROVIDER")]
    provider: String,
}

#[derive(clap::Args, Debug)]
struct ResearchCmd {
    #[arg(long)]
    keyword: String,
    #[arg(long, default_value = "")]
    business_type: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

/// Opt-in env file (SEOBLOG_ENV_FILE). Never overrides the process env; never logs values.
fn load_env_file() {
    let Ok(p) = std::env::var("SEOBLOG_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("SEOBLOG_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn print_json<T: Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

fn read_research(path: &Path) -> Result<ResearchData> {
    let txt = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(serde_json::from_str::<ResearchData>(&txt).unwrap_or(ResearchData {
        content: txt,
        citations: Vec::new(),
    }))
}

async fn auto_research(keyword: &str, business: &BusinessInfo) -> Option<ResearchData> {
    let client = http_client().ok()?;
    let pplx = match PerplexityClient::from_env(client) {
        Ok(c) => c,
        Err(e) => {
            tracing::info!(error = %e, "skipping research");
            return None;
        }
    };
    match pplx.research(keyword, business).await {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::warn!(error = %e, "research failed; generating without it");
            None
        }
    }
}

#[derive(Serialize)]
struct Check {
    name: &'static str,
    ok: bool,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    init_logging();

    let cli = Cli::parse();
    let load_config = || EngineConfig::load(cli.config.as_deref()).context("load engine config");

    match &cli.command {
        Commands::Analyze(args) => {
            let cfg = load_config()?;
            let content = args.input.read()?;
            let analyzer = if args.generation_band {
                Analyzer::new(cfg.generation_analyzer())
            } else {
                Analyzer::new(cfg.analyzer)
            };
            print_json(&analyzer.analyze(&content, &args.keyword, args.terms.as_deref()))?;
        }
        Commands::CheckTerms(args) => {
            let content = args.input.read()?;
            print_json(&check_terms(&content, Some(args.terms.as_str())))?;
        }
        Commands::Optimize(args) => {
            let cfg = load_config()?;
            let content = args.input.read()?;
            let rewriter = rewriter_from_env(&args.provider, cfg.retry)?;
            let out = IncrementalOptimizer::from_config(rewriter, &cfg)
                .optimize(&content, &args.keyword, args.terms.as_deref())
                .await;
            print_json(&out)?;
        }
        Commands::ResolveOveruse(args) => {
            let cfg = load_config()?;
            let content = args.input.read()?;
            let rewriter = rewriter_from_env(&args.provider, cfg.retry)?;
            let out = OveruseResolver::new(rewriter, Analyzer::new(cfg.analyzer))
                .with_sampling(cfg.fix_temperature, cfg.max_tokens)
                .resolve(&content, &args.keyword)
                .await;
            print_json(&out)?;
        }
        Commands::Generate(args) => {
            let cfg = load_config()?;
            let txt = std::fs::read_to_string(&args.request)
                .with_context(|| format!("read {}", args.request.display()))?;
            let mut req: GenerationRequest =
                serde_json::from_str(&txt).context("parse generation request")?;
            if req.keyword.trim().is_empty() {
                anyhow::bail!("generation request has an empty keyword");
            }
            if let Some(p) = &args.research_file {
                req.research = read_research(p)?;
            } else if req.research.content.trim().is_empty() && !args.no_research {
                if let Some(r) = auto_research(&req.keyword, &req.business).await {
                    req.research = r;
                }
            }
            let rewriter = rewriter_from_env(&args.provider, cfg.retry)?;
            tracing::info!(provider = rewriter.name(), keyword = %req.keyword, "generating");
            let out = Orchestrator::new(rewriter, cfg).generate(&req).await;
            print_json(&out)?;
        }
        Commands::Research(args) => {
            let pplx = PerplexityClient::from_env(http_client()?)?;
            let business = BusinessInfo {
                business_type: args.business_type.clone(),
                ..Default::default()
            };
            print_json(&pplx.research(&args.keyword, &business).await?)?;
        }
        Commands::Doctor(args) => {
            let t0 = std::time::Instant::now();
            let providers = provider_status();
            let auto = providers.iter().find(|(_, ok)| *ok).map(|(n, _)| *n);
            let config_path = cli.config.clone().or_else(EngineConfig::default_path);

            let mut checks = Vec::new();
            let config_result = load_config();
            checks.push(Check {
                name: "engine_config",
                ok: config_result.is_ok(),
                error: config_result.as_ref().err().map(|e| format!("{e:#}")),
            });
            checks.push(Check {
                name: "http_client",
                ok: http_client().is_ok(),
                error: http_client().err().map(|e| e.to_string()),
            });
            let ok = checks.iter().all(|c| c.ok);

            let provider_map: serde_json::Map<String, serde_json::Value> = providers
                .iter()
                .map(|(n, ok)| (n.to_string(), serde_json::Value::Bool(*ok)))
                .collect();
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "ok": ok,
                "name": "seoblog",
                "version": env!("CARGO_PKG_VERSION"),
                "elapsed_ms": t0.elapsed().as_millis() as u64,
                "configured": {
                    "providers": provider_map,
                    "auto_provider": auto,
                    "config_path": config_path.as_ref().map(|p| p.display().to_string()),
                    "config_file_exists": config_path.as_ref().is_some_and(|p| p.exists()),
                },
                "engine": config_result.ok(),
                "checks": checks,
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("seoblog {} ok={ok}", env!("CARGO_PKG_VERSION"));
                    for (n, configured) in &providers {
                        println!("  {n}: {}", if *configured { "configured" } else { "missing" });
                    }
                }
                _ => print_json(&v)?,
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "seoblog",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("seoblog {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }
    Ok(())
}
