//! End-to-end dispatch scenarios
//!
//! Exercises registration order, specificity ranking, bulk registration and
//! hook propagation through the public API only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use dispatch_core::{
    Attributes, AttributeFilter, DispatchError, Dispatcher, FilterOptions, Handler, HookResult,
    Implementation, MatchCriteria, NamedImplementation, NodeContext, Normalizer, ProviderHandler,
    ProviderQuery, ProvidesCheck, Registry, ResourceHandler, Subject, SupportsCheck,
};

fn named(name: &str) -> Arc<dyn Implementation> {
    Arc::new(NamedImplementation::new(name))
}

fn node(pairs: &[(&str, &str)]) -> NodeContext {
    pairs.iter().copied().collect()
}

fn names<H: Handler>(handlers: &[Arc<H>]) -> Vec<String> {
    handlers
        .iter()
        .map(|h| h.implementation_name().to_string())
        .collect()
}

/// Applicability hook that counts calls and fails on demand
#[derive(Debug, Default)]
struct CountingHook {
    calls: AtomicUsize,
    fail: bool,
}

impl ProvidesCheck for CountingHook {
    fn provides(&self, context: &dyn Attributes, _subject: &dyn Subject) -> HookResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("node attributes unavailable".into());
        }
        Ok(context.attribute("init") == Some("systemd"))
    }
}

impl Implementation for CountingHook {
    fn name(&self) -> &str {
        "CountingHook"
    }

    fn as_provides_check(&self) -> Option<&dyn ProvidesCheck> {
        Some(self)
    }
}

/// Capability hook that only accepts the listed actions
#[derive(Debug)]
struct Actions(&'static str, &'static [&'static str]);

impl SupportsCheck for Actions {
    fn supports(&self, _subject: &dyn Subject, action: &str) -> HookResult {
        Ok(self.1.contains(&action))
    }
}

impl Implementation for Actions {
    fn name(&self) -> &str {
        self.0
    }

    fn as_supports_check(&self) -> Option<&dyn SupportsCheck> {
        Some(self)
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn equal_specificity_later_registration_first() {
    let registry: Registry<ResourceHandler> = Registry::new();
    let options = FilterOptions::new().os("linux");

    registry.register_with("file", named("A"), &options).unwrap();
    registry.register_with("file", named("B"), &options).unwrap();

    let ctx = node(&[("os", "linux")]);
    let found = registry.candidates("file", &ctx).unwrap();
    assert_eq!(names(&found), ["B", "A"]);
}

#[test]
fn more_specific_precedes_regardless_of_order() {
    let general_first: Registry<ResourceHandler> = Registry::new();
    general_first.register_with("pkg", named("Generic"), &FilterOptions::new()).unwrap();
    general_first
        .register_with("pkg", named("Debian"), &FilterOptions::new().platform_family("debian"))
        .unwrap();

    let specific_first: Registry<ResourceHandler> = Registry::new();
    specific_first
        .register_with("pkg", named("Debian"), &FilterOptions::new().platform_family("debian"))
        .unwrap();
    specific_first.register_with("pkg", named("Generic"), &FilterOptions::new()).unwrap();

    let ctx = node(&[("platform_family", "debian")]);
    for registry in [&general_first, &specific_first] {
        let found = registry.candidates("pkg", &ctx).unwrap();
        assert_eq!(names(&found), ["Debian", "Generic"]);
    }
}

#[test]
fn criteria_rank_by_significance() {
    let registry: Registry<ResourceHandler> = Registry::new();
    registry.register_with("svc", named("Os"), &FilterOptions::new().os("linux")).unwrap();
    registry
        .register_with("svc", named("Family"), &FilterOptions::new().platform_family("debian"))
        .unwrap();
    registry
        .register_with("svc", named("Version"), &FilterOptions::new().platform_version(">= 9"))
        .unwrap();
    registry
        .register_with("svc", named("Platform"), &FilterOptions::new().platform("ubuntu"))
        .unwrap();

    assert_eq!(
        names(&registry.each("svc")),
        ["Version", "Platform", "Family", "Os"]
    );
}

#[test]
fn least_specific_is_appended() {
    let registry: Registry<ResourceHandler> = Registry::new();
    registry
        .register_with("svc", named("Platform"), &FilterOptions::new().platform("ubuntu"))
        .unwrap();
    registry.register_with("svc", named("Os"), &FilterOptions::new().os("linux")).unwrap();
    registry.register_with("svc", named("Plain"), &FilterOptions::new()).unwrap();

    assert_eq!(names(&registry.each("svc")), ["Platform", "Os", "Plain"]);
}

#[test]
fn provider_action_outranks_platform() {
    let registry: Registry<ProviderHandler> = Registry::new();
    registry
        .register_with(
            "service",
            named("PlatformOnly"),
            &FilterOptions::new().platform("ubuntu").platform_version("~> 20.04"),
        )
        .unwrap();
    registry
        .register_with("service", named("ActionOnly"), &FilterOptions::new().action("reload"))
        .unwrap();

    assert_eq!(names(&registry.each("service")), ["ActionOnly", "PlatformOnly"]);
}

// ============================================================================
// Bulk registration
// ============================================================================

#[test]
fn priority_array_keeps_declared_order() {
    let dispatcher = Dispatcher::new();
    dispatcher
        .resource_priority()
        .apply_implementations(
            "file",
            [named("H1"), named("H2"), named("H3")],
            &FilterOptions::new(),
        )
        .unwrap();

    assert_eq!(names(&dispatcher.resources().each("file")), ["H1", "H2", "H3"]);
}

#[test]
fn priority_array_prefers_custom_file() {
    let dispatcher = Dispatcher::new();
    dispatcher
        .resource_priority()
        .apply_implementations("file", [named("CustomFile"), named("File")], &FilterOptions::new())
        .unwrap();

    let chosen = dispatcher
        .resolve_resource("file", &NodeContext::new())
        .unwrap()
        .unwrap();
    assert_eq!(chosen.implementation_name(), "CustomFile");
}

#[test]
fn priority_array_with_bad_filter_registers_nothing() {
    let dispatcher = Dispatcher::new();
    let err = dispatcher
        .provider_priority()
        .apply_implementations(
            "service",
            [named("Systemd"), named("Upstart")],
            &FilterOptions::new().platform_version("latest"),
        )
        .unwrap_err();

    assert!(matches!(err, DispatchError::InvalidVersionConstraint { .. }));
    assert!(!dispatcher.providers().contains_key("service"));
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn provider_scenario_by_os() {
    let dispatcher = Dispatcher::new();
    let base = FilterOptions::new().subject_type("File").action("create");
    dispatcher
        .providers()
        .register_with("File", named("P1"), &base.clone().os("linux"))
        .unwrap();
    dispatcher.providers().register_with("File", named("P2"), &base).unwrap();

    let subject = "File".to_string();
    let pick = |ctx: &NodeContext| {
        dispatcher
            .resolve_provider("File", ctx, &subject, "create")
            .unwrap()
            .map(|h| h.implementation_name().to_string())
    };

    assert_eq!(pick(&node(&[("os", "linux")])).as_deref(), Some("P1"));
    assert_eq!(pick(&node(&[("os", "windows")])).as_deref(), Some("P2"));
}

#[test]
fn exclusion_rejects_listed_platform() {
    let registry: Registry<ResourceHandler> = Registry::new();
    registry
        .register_with(
            "apt_package",
            named("AptPackage"),
            &FilterOptions::new().platform(["!debian"]),
        )
        .unwrap();

    let debian = node(&[("platform", "debian")]);
    let centos = node(&[("platform", "centos")]);
    assert!(registry.resolve("apt_package", &debian).unwrap().is_none());
    assert!(registry.resolve("apt_package", &centos).unwrap().is_some());
}

#[test]
fn resolve_is_first_candidate() {
    let registry: Registry<ProviderHandler> = Registry::new();
    registry.register_with("pkg", named("Any"), &FilterOptions::new()).unwrap();
    registry
        .register_with(
            "pkg",
            named("Rhel"),
            &FilterOptions::new().platform_family(["rhel", "fedora"]),
        )
        .unwrap();
    registry
        .register_with("pkg", named("NotWin"), &FilterOptions::new().os("!windows"))
        .unwrap();

    let subject = "pkg".to_string();
    let contexts = [
        node(&[("platform_family", "rhel"), ("os", "linux")]),
        node(&[("os", "windows")]),
        node(&[("os", "darwin")]),
        NodeContext::new(),
    ];

    for ctx in &contexts {
        let query = ProviderQuery::new(ctx, &subject, "install");
        let first = registry.candidates("pkg", query).unwrap().first().cloned();
        let resolved = registry.resolve("pkg", query).unwrap();
        assert_eq!(
            first.map(|h| h.implementation_name().to_string()),
            resolved.map(|h| h.implementation_name().to_string())
        );
    }
    assert!(registry.resolve("missing", ProviderQuery::new(&contexts[0], &subject, "install"))
        .unwrap()
        .is_none());
}

#[test]
fn unknown_key_and_no_match_are_not_errors() {
    let registry: Registry<ResourceHandler> = Registry::new();
    let ctx = node(&[("os", "linux")]);
    assert!(registry.resolve("nothing", &ctx).unwrap().is_none());
    assert!(registry.candidates("nothing", &ctx).unwrap().is_empty());

    registry.register_with("file", named("Win"), &FilterOptions::new().os("windows")).unwrap();
    assert!(registry.resolve("file", &ctx).unwrap().is_none());
    assert!(registry.candidates("file", &ctx).unwrap().is_empty());
}

#[test]
fn version_constraints_select_by_release() {
    let registry: Registry<ResourceHandler> = Registry::new();
    registry
        .register_with(
            "service",
            named("Upstart"),
            &FilterOptions::new().platform_version(["~> 14.04", "!14.10"]),
        )
        .unwrap();
    registry
        .register_with(
            "service",
            named("Systemd"),
            &FilterOptions::new().platform_version(">= 15.04"),
        )
        .unwrap();
    registry.register_with("service", named("Sysvinit"), &FilterOptions::new()).unwrap();

    let pick = |version: &str| {
        registry
            .resolve("service", &node(&[("platform_version", version)]))
            .unwrap()
            .map(|h| h.implementation_name().to_string())
    };

    assert_eq!(pick("14.04").as_deref(), Some("Upstart"));
    assert_eq!(pick("14.10").as_deref(), Some("Sysvinit"));
    assert_eq!(pick("18.04").as_deref(), Some("Systemd"));
    assert_eq!(pick("rolling").as_deref(), Some("Sysvinit"));
}

#[test]
fn pessimistic_constraint_at_u64_limit_resolves() {
    let max = u64::MAX.to_string();
    let registry: Registry<ResourceHandler> = Registry::new();
    registry
        .register_with(
            "service",
            named("Edge"),
            &FilterOptions::new().platform_version(format!("~> {max}")),
        )
        .unwrap();

    let ctx = node(&[("platform_version", max.as_str())]);
    let chosen = registry.resolve("service", &ctx).unwrap().unwrap();
    assert_eq!(chosen.implementation_name(), "Edge");
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn blacklist_beats_whitelist() {
    let filter = AttributeFilter::parse("os", ["linux", "!linux"], Normalizer::Exact)
        .unwrap()
        .unwrap();
    assert!(!filter.matches(Some("linux")));
}

#[test]
fn empty_filter_is_absent() {
    let filter = AttributeFilter::parse("os", Vec::<String>::new(), Normalizer::Exact).unwrap();
    assert!(filter.is_none());

    let plain = ResourceHandler::from_options("file", named("A"), &FilterOptions::new()).unwrap();
    let with_empty = ResourceHandler::from_options(
        "file",
        named("B"),
        &FilterOptions::new().os(Vec::<String>::new()),
    )
    .unwrap();

    assert!(!with_empty.criteria().has_filter("os"));
    assert_eq!(plain.specificity(), with_empty.specificity());
    assert!(with_empty.applies(&node(&[("os", "plan9")])).unwrap());
}

#[test]
fn malformed_filters_fail_registration() {
    let registry: Registry<ResourceHandler> = Registry::new();
    let bad = [
        FilterOptions::new().os("!"),
        FilterOptions::new().platform(["ubuntu", ""]),
        FilterOptions::new().platform_family("!all"),
        FilterOptions::new().platform_version(">> 3"),
        FilterOptions::new().action("create"),
    ];

    for options in &bad {
        assert!(registry.register_with("file", named("File"), options).is_err());
    }
    assert!(registry.is_empty());
}

#[test]
fn criteria_built_by_hand() {
    let criteria = MatchCriteria::new().with_filter(
        "platform",
        AttributeFilter::parse("platform", ["all"], Normalizer::Exact).unwrap(),
    );
    let handler = ResourceHandler::new("file", named("File"), criteria);

    assert!(handler.applies(&NodeContext::new()).unwrap());
    assert_eq!(handler.specificity().to_string(), "010000");
}

// ============================================================================
// Hooks
// ============================================================================

#[test]
fn custom_predicate_filters_contexts() {
    let registry: Registry<ResourceHandler> = Registry::new();
    registry
        .register_with(
            "service",
            named("Container"),
            &FilterOptions::new().when(|ctx| ctx.attribute("virtualization") == Some("docker")),
        )
        .unwrap();
    registry.register_with("service", named("Host"), &FilterOptions::new()).unwrap();

    let docker = node(&[("virtualization", "docker")]);
    let metal = NodeContext::new();
    assert_eq!(
        registry.resolve("service", &docker).unwrap().unwrap().implementation_name(),
        "Container"
    );
    assert_eq!(
        registry.resolve("service", &metal).unwrap().unwrap().implementation_name(),
        "Host"
    );
}

#[test]
fn provides_hook_consulted_and_errors_propagate() {
    let ok_hook = Arc::new(CountingHook::default());
    let registry: Registry<ProviderHandler> = Registry::new();
    registry
        .register_with("service", ok_hook.clone(), &FilterOptions::new())
        .unwrap();
    registry.register_with("service", named("Fallback"), &FilterOptions::new()).unwrap();

    let subject = "service".to_string();
    let systemd = node(&[("init", "systemd")]);
    let chosen = registry
        .resolve("service", ProviderQuery::new(&systemd, &subject, "start"))
        .unwrap()
        .unwrap();
    assert_eq!(chosen.implementation_name(), "CountingHook");
    assert_eq!(ok_hook.calls.load(Ordering::SeqCst), 1);

    let failing = Arc::new(CountingHook {
        calls: AtomicUsize::new(0),
        fail: true,
    });
    let broken: Registry<ProviderHandler> = Registry::new();
    broken.register_with("service", failing, &FilterOptions::new()).unwrap();

    let err = broken
        .candidates("service", ProviderQuery::new(&systemd, &subject, "start"))
        .unwrap_err();
    assert!(err.is_hook_failure());
    assert!(err.to_string().contains("node attributes unavailable"));
}

#[test]
fn supports_hook_gates_actions() {
    let registry: Registry<ProviderHandler> = Registry::new();
    registry
        .register_with(
            "service",
            Arc::new(Actions("Limited", &["start", "stop"])),
            &FilterOptions::new(),
        )
        .unwrap();
    registry.register_with("service", named("Full"), &FilterOptions::new()).unwrap();

    let subject = "service".to_string();
    let ctx = NodeContext::new();
    let pick = |action: &str| {
        registry
            .resolve("service", ProviderQuery::new(&ctx, &subject, action))
            .unwrap()
            .map(|h| h.implementation_name().to_string())
    };

    assert_eq!(pick("start").as_deref(), Some("Limited"));
    assert_eq!(pick("reload").as_deref(), Some("Full"));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn concurrent_readers_see_whole_buckets() {
    let registry = Arc::new(Registry::<ResourceHandler>::new());
    let writer = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for i in 0..200 {
                registry
                    .register_with("file", named(&format!("F{i}")), &FilterOptions::new())
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let ctx = NodeContext::new();
                for _ in 0..200 {
                    let found = registry.candidates("file", &ctx).unwrap();
                    // latest registration always leads an equal-specificity bucket
                    if let Some(first) = found.first() {
                        let leading = format!("F{}", found.len() - 1);
                        assert_eq!(first.implementation_name(), leading);
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(registry.len(), 200);
}

#[test]
fn locked_registry_still_resolves() {
    let dispatcher = Dispatcher::new();
    dispatcher.resources().register_with("file", named("File"), &FilterOptions::new()).unwrap();
    dispatcher.lock();

    let err = dispatcher
        .resources()
        .register_with("file", named("Other"), &FilterOptions::new())
        .unwrap_err();
    assert!(matches!(err, DispatchError::RegistryLocked { .. }));

    assert!(dispatcher.resolve_resource("file", &NodeContext::new()).unwrap().is_some());
    assert_eq!(dispatcher.resources().stats().handlers, 1);
}
