//! Dispatch Resolve CLI - ask which handler a node would get
//!
//! Loads handler manifests, builds a node context, and prints the handler
//! that resolves for a key (or every applicable candidate, in order).
//!
//! Usage:
//!     dispatch-resolve --manifest handlers/ --attr os=linux --action create file
//!     dispatch-resolve --manifest core.json --kind resource --context node.json package
//!     dispatch-resolve --manifest handlers/ --list --json
//!
//! Exit status is 1 when nothing resolves and 2 on load or usage errors.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_core::{
    Attributes, DispatchError, Dispatcher, Handler, ManifestLoader, NodeContext, ProviderHandler,
    ProviderQuery, Registry,
};

#[derive(Parser, Debug)]
#[command(name = "dispatch-resolve")]
#[command(about = "Resolve handlers declared in dispatch manifests")]
#[command(version)]
struct Args {
    /// Handler key to resolve (not needed with --list)
    #[arg(required_unless_present = "list")]
    key: Option<String>,

    /// Manifest file or directory of manifests (repeatable)
    #[arg(short, long, required = true)]
    manifest: Vec<PathBuf>,

    /// JSON file with node attributes
    #[arg(short, long)]
    context: Option<PathBuf>,

    /// Node attribute as name=value (repeatable, overrides --context)
    #[arg(short, long = "attr", value_parser = parse_attr)]
    attrs: Vec<(String, String)>,

    /// Which registry to query
    #[arg(short, long, value_enum, default_value_t = Kind::Provider)]
    kind: Kind,

    /// Subject type presented to providers (defaults to the key)
    #[arg(long)]
    subject_type: Option<String>,

    /// Action presented to providers
    #[arg(long)]
    action: Option<String>,

    /// Show every applicable candidate, not just the winner
    #[arg(long)]
    all: bool,

    /// Dump every registered bucket instead of resolving
    #[arg(long)]
    list: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output (debug logging to stderr)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Resource,
    Provider,
}

/// One handler as shown to the user
#[derive(Debug, Serialize)]
struct HandlerView {
    implementation: String,
    specificity: String,
    filters: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Resolution {
    key: String,
    kind: &'static str,
    selected: Option<String>,
    candidates: Vec<HandlerView>,
}

#[derive(Debug, Serialize)]
struct Bucket {
    kind: &'static str,
    key: String,
    handlers: Vec<HandlerView>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let dispatcher = match load_dispatcher(&args.manifest) {
        Ok(d) => d,
        Err(e) => return fail(&e, args.json),
    };

    if args.list {
        output_list(&dispatcher, args.json);
        return ExitCode::SUCCESS;
    }

    let Some(key) = args.key.as_deref() else {
        eprintln!("Error: a handler key is required");
        return ExitCode::from(2);
    };

    let context = match build_context(args.context.as_ref(), &args.attrs) {
        Ok(c) => c,
        Err(e) => return fail(&e, args.json),
    };

    let result = match args.kind {
        Kind::Resource => resolve_in(
            dispatcher.resources(),
            key,
            &context as &dyn Attributes,
            args.all,
            view,
        ),
        Kind::Provider => {
            let Some(action) = args.action.as_deref() else {
                eprintln!("Error: --action is required when resolving providers");
                return ExitCode::from(2);
            };
            let subject = args.subject_type.clone().unwrap_or_else(|| key.to_string());
            resolve_in(
                dispatcher.providers(),
                key,
                ProviderQuery::new(&context, &subject, action),
                args.all,
                provider_view,
            )
        }
    };

    let candidates = match result {
        Ok(c) => c,
        Err(e) => return fail(&e, args.json),
    };

    let resolution = Resolution {
        key: key.to_string(),
        kind: kind_name(args.kind),
        selected: candidates.first().map(|c| c.implementation.clone()),
        candidates,
    };

    if args.json {
        output_json(&resolution);
    } else {
        output_rendered(&resolution, args.all, args.verbose);
    }

    if resolution.selected.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "dispatch_core=debug" } else { "dispatch_core=warn" };

    // Logs go to stderr so they never mix with results on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_attr(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("attribute name is empty in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn load_dispatcher(paths: &[PathBuf]) -> Result<Dispatcher, DispatchError> {
    let mut loader = ManifestLoader::new();
    for path in paths {
        loader.load_path(path)?;
    }

    let dispatcher = Dispatcher::new();
    loader.apply(&dispatcher)?;
    dispatcher.lock();
    Ok(dispatcher)
}

fn build_context(
    path: Option<&PathBuf>,
    attrs: &[(String, String)],
) -> Result<NodeContext, DispatchError> {
    let mut context = match path {
        Some(p) => {
            let content =
                std::fs::read_to_string(p).map_err(|e| DispatchError::ManifestLoadError {
                    path: p.display().to_string(),
                    reason: e.to_string(),
                })?;
            serde_json::from_str(&content)?
        }
        None => NodeContext::new(),
    };

    for (name, value) in attrs {
        context.set(name.clone(), value.clone());
    }
    Ok(context)
}

fn resolve_in<H: Handler>(
    registry: &Registry<H>,
    key: &str,
    query: H::Query<'_>,
    all: bool,
    render: fn(&H) -> HandlerView,
) -> Result<Vec<HandlerView>, DispatchError> {
    let handlers = if all {
        registry.candidates(key, query)?
    } else {
        registry.resolve(key, query)?.into_iter().collect()
    };

    Ok(handlers.iter().map(|h| render(h)).collect())
}

fn view<H: Handler>(handler: &H) -> HandlerView {
    let mut filters: Vec<String> = handler
        .criteria()
        .filters()
        .map(|(attribute, filter)| format!("{attribute}={filter}"))
        .collect();
    if handler.criteria().has_custom_predicate() {
        filters.push("custom_predicate".to_string());
    }

    HandlerView {
        implementation: handler.implementation_name().to_string(),
        specificity: handler.specificity().to_string(),
        filters,
    }
}

fn provider_view(handler: &ProviderHandler) -> HandlerView {
    let mut shown = view(handler);
    let extra = [
        ("subject_type", handler.subject_type_filter()),
        ("action", handler.action_filter()),
    ];
    for (name, filter) in extra.into_iter().rev() {
        if let Some(filter) = filter {
            shown.filters.insert(0, format!("{name}={filter}"));
        }
    }
    shown
}

fn kind_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Resource => "resource",
        Kind::Provider => "provider",
    }
}

fn fail(error: &DispatchError, json: bool) -> ExitCode {
    if json {
        if let Ok(body) = serde_json::to_string_pretty(&error.to_error_response()) {
            println!("{body}");
        }
    } else {
        eprintln!("Error: {error}");
    }
    ExitCode::from(2)
}

fn output_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(body) => println!("{body}"),
        Err(e) => eprintln!("Error serializing output: {e}"),
    }
}

fn output_rendered(resolution: &Resolution, all: bool, verbose: bool) {
    if resolution.candidates.is_empty() {
        println!("No {} handler applies for '{}'", resolution.kind, resolution.key);
        return;
    }

    if !all {
        let winner = &resolution.candidates[0];
        println!("{}", winner.implementation);
        if verbose {
            eprintln!("  specificity: {}", winner.specificity);
            for filter in &winner.filters {
                eprintln!("  filter: {filter}");
            }
        }
        return;
    }

    for (rank, candidate) in resolution.candidates.iter().enumerate() {
        if verbose {
            println!(
                "{}. {} [{}] {}",
                rank + 1,
                candidate.implementation,
                candidate.specificity,
                candidate.filters.join(" ")
            );
        } else {
            println!("{}. {}", rank + 1, candidate.implementation);
        }
    }
}

fn output_list(dispatcher: &Dispatcher, json: bool) {
    let mut buckets = Vec::new();
    for (key, handlers) in dispatcher.resources().list() {
        buckets.push(Bucket {
            kind: "resource",
            key,
            handlers: handlers.iter().map(|h| view(h.as_ref())).collect(),
        });
    }
    for (key, handlers) in dispatcher.providers().list() {
        buckets.push(Bucket {
            kind: "provider",
            key,
            handlers: handlers.iter().map(|h| provider_view(h)).collect(),
        });
    }

    if json {
        output_json(&buckets);
        return;
    }

    for bucket in &buckets {
        println!("{} {}:", bucket.kind, bucket.key);
        for handler in &bucket.handlers {
            println!(
                "  {} [{}] {}",
                handler.implementation,
                handler.specificity,
                handler.filters.join(" ")
            );
        }
    }
}
