use anyhow::Result;
use clap::{Parser, Subcommand};
use docpipe_core::SourceRegistry;
use docpipe_local::aggregate::DocsPipeline;
use docpipe_local::search::SerperSearchProvider;
use docpipe_local::LocalFetcher;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "docpipe")]
#[command(about = "Scoped docs search/fetch/extract plumbing (MCP stdio server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (for Cursor / MCP clients).
    #[cfg(feature = "stdio")]
    McpStdio,
    /// Run one search->fetch->extract pass and print the composed result.
    Query(QueryCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct QueryCmd {
    /// Free-text query.
    #[arg(long)]
    query: String,
    /// Library (source name) to scope the search to.
    #[arg(long)]
    library: String,
    /// Output format. Allowed: text, json
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format. Allowed: json, text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn has_env(k: &str) -> bool {
    std::env::var(k).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

#[cfg(feature = "stdio")]
mod mcp {
    use docpipe_core::{AggregationOutcome, FailureReason, SourceRegistry};
    use docpipe_local::aggregate::DocsPipeline;
    use docpipe_local::search::SerperSearchProvider;
    use docpipe_local::LocalFetcher;
    use rmcp::{
        handler::server::router::tool::ToolRouter as RmcpToolRouter,
        handler::server::wrapper::Parameters,
        model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
        tool, tool_handler, tool_router,
        transport::stdio,
        ErrorData as McpError, ServiceExt,
    };
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Arc;

    const SCHEMA_VERSION: u64 = 1;

    fn tool_result(payload: serde_json::Value) -> CallToolResult {
        // Structured content for machine consumers, plus a text fallback for
        // clients that only read `content[0].text`.
        let mut r = CallToolResult::structured(payload.clone());
        r.content = vec![Content::text(payload.to_string())];
        r
    }

    fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
        payload["schema_version"] = serde_json::json!(SCHEMA_VERSION);
        payload["kind"] = serde_json::json!(kind);
        payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
    }

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    struct GetDocsArgs {
        /// The query to search for (e.g. "what are two political parties in USA").
        #[serde(default)]
        query: Option<String>,
        /// The library to search in (e.g. "wikipedia").
        #[serde(default)]
        library: Option<String>,
    }

    pub(crate) struct DocpipeMcp {
        tool_router: RmcpToolRouter<Self>,
        registry: SourceRegistry,
        fetcher: Arc<LocalFetcher>,
        http: reqwest::Client,
    }

    #[tool_router]
    impl DocpipeMcp {
        pub(crate) fn new() -> Result<Self, McpError> {
            let fetcher =
                LocalFetcher::new().map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(Self {
                tool_router: Self::tool_router(),
                registry: SourceRegistry::builtin(),
                fetcher: Arc::new(fetcher),
                http: reqwest::Client::builder()
                    .user_agent("docpipe-mcp/0.1")
                    .build()
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?,
            })
        }

        #[tool(
            description = "Search one configured library for a query and return cleaned page text with source URLs"
        )]
        async fn get_docs(
            &self,
            params: Parameters<Option<GetDocsArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            let args = params.0.unwrap_or_default();
            let query = args.query.unwrap_or_default();
            let query = query.trim();
            if query.is_empty() {
                return Err(McpError::invalid_params(
                    "query must be a non-empty string",
                    None,
                ));
            }
            let library = args.library.unwrap_or_default();
            let library = library.trim();

            // Caller misuse is a protocol error, never a DOCS_FETCH_FAILED payload.
            if let Err(e) = self.registry.resolve(library) {
                return Err(McpError::invalid_params(e.to_string(), None));
            }

            let provider = SerperSearchProvider::from_env(self.http.clone())
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            let pipeline = DocsPipeline::new(
                self.registry.clone(),
                Arc::new(provider),
                self.fetcher.clone(),
            );

            let outcome = pipeline
                .run(query, library)
                .await
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;

            let failure = match &outcome {
                AggregationOutcome::Composed { .. } => serde_json::Value::Null,
                AggregationOutcome::Failed { reason, last_error } => serde_json::json!({
                    "reason": match reason {
                        FailureReason::NoSearchResults => "no_search_results",
                        FailureReason::AllCandidatesUnusable => "all_candidates_unusable",
                    },
                    "last_error": last_error,
                }),
            };
            let chunks = match &outcome {
                AggregationOutcome::Composed { chunks } => chunks
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "url": c.source_url,
                            "chars": c.text.chars().count(),
                        })
                    })
                    .collect::<Vec<_>>(),
                AggregationOutcome::Failed { .. } => Vec::new(),
            };

            let mut payload = serde_json::json!({
                "ok": outcome.is_composed(),
                "library": library,
                "query": query,
                "text": outcome.render(),
                "chunks": chunks,
                "failure": failure,
            });
            add_envelope_fields(&mut payload, "get_docs", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }
    }

    #[tool_handler]
    impl rmcp::ServerHandler for DocpipeMcp {
        fn get_info(&self) -> ServerInfo {
            ServerInfo {
                instructions: Some(
                    "Scoped documentation retrieval: get_docs(query, library) searches one \
                     configured source site and returns cleaned page text with source URLs. \
                     Outputs are JSON and schema-versioned."
                        .to_string(),
                ),
                capabilities: ServerCapabilities::builder().enable_tools().build(),
                ..Default::default()
            }
        }
    }

    pub(crate) async fn serve_stdio() -> Result<(), McpError> {
        let svc = DocpipeMcp::new()?;
        let running = svc
            .serve(stdio())
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        // Keep the stdio server alive until the client closes.
        running
            .waiting()
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(())
    }

}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional env-file loader (opt-in).
    //
    // MCP server environments often aren't interactive shells, so users want a
    // single place to keep keys without exporting them manually.
    //
    // Safety:
    // - opt-in only (DOCPIPE_ENV_FILE)
    // - sets vars only if not already set in the process environment
    // - does not log values
    if let Ok(p) = std::env::var("DOCPIPE_ENV_FILE") {
        let p = p.trim();
        if !p.is_empty() {
            if let Ok(txt) = std::fs::read_to_string(p) {
                for raw in txt.lines() {
                    let s = raw.trim();
                    if s.is_empty() || s.starts_with('#') {
                        continue;
                    }
                    let Some((k, v)) = s.split_once('=') else {
                        continue;
                    };
                    let k = k.trim();
                    let v = v.trim();
                    if k.is_empty() {
                        continue;
                    }
                    // Don't override explicit process env.
                    if std::env::var_os(k).is_none() {
                        std::env::set_var(k, v);
                    }
                }
            }
        }
    }

    // Logs go to stderr; stdout is reserved for the MCP transport / command output.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "stdio")]
        Commands::McpStdio => {
            tracing::info!("starting MCP stdio server");
            mcp::serve_stdio()
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        Commands::Query(args) => {
            let http = reqwest::Client::builder()
                .user_agent("docpipe-mcp/0.1")
                .build()?;
            let provider = SerperSearchProvider::from_env(http)?;
            let pipeline = DocsPipeline::new(
                SourceRegistry::builtin(),
                Arc::new(provider),
                Arc::new(LocalFetcher::new()?),
            );
            let outcome = pipeline.run(&args.query, &args.library).await?;
            match args.output.to_ascii_lowercase().as_str() {
                "json" => {
                    let v = serde_json::json!({
                        "schema_version": 1,
                        "kind": "query",
                        "ok": outcome.is_composed(),
                        "library": args.library,
                        "query": args.query,
                        "text": outcome.render(),
                    });
                    println!("{v}");
                }
                _ => println!("{}", outcome.render()),
            }
        }
        Commands::Doctor(_) => {
            let registry = SourceRegistry::builtin();
            // Only report booleans / names, never values.
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "ok": true,
                "serper_api_key_configured":
                    has_env("DOCPIPE_SERPER_API_KEY") || has_env("SERPER_API_KEY"),
                "serper_endpoint_override": has_env("DOCPIPE_SERPER_ENDPOINT"),
                "libraries": registry.names(),
            });
            println!("{v}");
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "docpipe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("docpipe {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }

    Ok(())
}
