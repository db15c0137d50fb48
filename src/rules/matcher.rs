//! Ordered rule evaluation.
//!
//! # Responsibilities
//! - Hold the compiled rules of one environment in definition order
//! - Find the first rule matching a request (host, API reservation, path)
//! - Substitute captures into the target and classify the outcome
//!
//! # Design Decisions
//! - First match wins; authors control precedence by list order
//! - Paths under the API prefix are only matched by rules written for the API
//! - No I/O and no locking: safe to call from any number of request tasks

use thiserror::Error;
use url::{Position, Url};

use crate::rules::pattern::{self, Captures, CompiledPattern, PatternError};
use crate::rules::types::{MatchResult, Outcome, RedirectRule};

/// A rule that failed to compile, with its definition index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule #{index} ({from}): {source}")]
pub struct RuleError {
    pub index: usize,
    pub from: String,
    #[source]
    pub source: PatternError,
}

/// Host restriction attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostConstraint {
    Exact(String),
    /// `*.example.org`, stored as `.example.org`.
    Subdomain(String),
}

impl HostConstraint {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_ascii_lowercase();
        match raw.strip_prefix('*') {
            Some(suffix) if suffix.starts_with('.') => HostConstraint::Subdomain(suffix.to_string()),
            _ => HostConstraint::Exact(raw),
        }
    }

    fn matches(&self, host: &str) -> bool {
        match self {
            HostConstraint::Exact(expected) => host.eq_ignore_ascii_case(expected),
            HostConstraint::Subdomain(suffix) => {
                host.len() > suffix.len()
                    && host.to_ascii_lowercase().ends_with(suffix.as_str())
            }
        }
    }
}

/// A rule paired with its compiled matcher.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    index: usize,
    rule: RedirectRule,
    pattern: CompiledPattern,
    host: Option<HostConstraint>,
}

impl CompiledRule {
    pub fn compile(index: usize, rule: RedirectRule) -> Result<Self, RuleError> {
        let pattern = pattern::compile(&rule.from).map_err(|source| RuleError {
            index,
            from: rule.from.clone(),
            source,
        })?;
        let host = rule.host.as_deref().map(HostConstraint::parse);
        Ok(Self {
            index,
            rule,
            pattern,
            host,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rule(&self) -> &RedirectRule {
        &self.rule
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    fn matches_host(&self, hostname: &str) -> bool {
        self.host.as_ref().map_or(true, |h| h.matches(hostname))
    }

    fn targets_api(&self, api_prefix: &str) -> bool {
        path_under(self.pattern.static_prefix(), api_prefix)
    }
}

/// The compiled, ordered rules of one environment.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile every rule, failing on the first invalid one.
    pub fn compile(rules: &[RedirectRule]) -> Result<Self, RuleError> {
        let rules = rules
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, r)| CompiledRule::compile(i, r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Compile the rules that are valid and report the rest.
    ///
    /// Skipped rules keep their neighbours' definition indices intact.
    pub fn compile_lenient(rules: &[RedirectRule]) -> (Self, Vec<RuleError>) {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();
        for (i, rule) in rules.iter().cloned().enumerate() {
            match CompiledRule::compile(i, rule) {
                Ok(r) => compiled.push(r),
                Err(e) => errors.push(e),
            }
        }
        (Self { rules: compiled }, errors)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }
}

/// Everything the matcher needs to evaluate one request.
#[derive(Debug, Clone, Copy)]
pub struct MatchArgs<'a> {
    /// Absolute request URL.
    pub url: &'a Url,
    /// Effective hostname (may differ from the URL host behind a proxy).
    pub hostname: &'a str,
    /// Path prefix reserved for backend functions.
    pub api_prefix: Option<&'a str>,
    /// Origin serving backend functions.
    pub api_location: Option<&'a Url>,
    pub rules: &'a RuleSet,
}

/// Return the outcome of the first rule matching the request.
pub fn match_request(args: &MatchArgs<'_>) -> Option<MatchResult> {
    let path = args.url.path();
    let api_prefix = args.api_prefix.filter(|p| !p.trim_end_matches('/').is_empty());
    let reserved = api_prefix.is_some_and(|p| path_under(path, p));

    for rule in args.rules.iter() {
        if !rule.matches_host(args.hostname) {
            continue;
        }
        if reserved && !api_prefix.is_some_and(|p| rule.targets_api(p)) {
            continue;
        }
        let Some(caps) = rule.pattern.captures(path) else {
            continue;
        };

        let target = substitute(&rule.rule.to, &caps);
        let outcome = classify(rule, &target, args);

        tracing::debug!(
            rule = rule.index,
            pattern = %rule.pattern.as_str(),
            kind = outcome.kind(),
            "Rule matched"
        );

        return Some(MatchResult {
            pattern: rule.pattern.as_str().to_string(),
            rule_index: rule.index,
            outcome,
        });
    }
    None
}

/// Replace `:name`, `:splat` and `*` references in a target template.
fn substitute(template: &str, caps: &Captures) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(pos) = rest.find(&[':', '*'][..]) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix('*') {
            match caps.splat.as_deref() {
                Some(splat) => out.push_str(splat),
                None => out.push('*'),
            }
            rest = after;
            continue;
        }

        let name_len = tail[1..]
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        let name = &tail[1..1 + name_len];
        match caps.get(name).filter(|_| name_len > 0) {
            Some(value) => out.push_str(value),
            None => out.push_str(&tail[..1 + name_len]),
        }
        rest = &tail[1 + name_len..];
    }
    out.push_str(rest);
    out
}

fn classify(rule: &CompiledRule, target: &str, args: &MatchArgs<'_>) -> Outcome {
    let status = rule.rule.status;
    let redirect = rule.rule.is_redirect_status();

    match Url::parse(target) {
        Ok(abs) if matches!(abs.scheme(), "http" | "https") && abs.host_str().is_some() => {
            if rule.rule.proxy {
                return Outcome::Proxy {
                    target: with_request_query(abs.to_string(), args.url),
                };
            }
            if !is_foreign(&abs, args) {
                return same_origin(rule, &abs[Position::BeforePath..], args);
            }
            if redirect {
                Outcome::Redirect {
                    location: with_request_query(abs.to_string(), args.url),
                    status,
                }
            } else {
                Outcome::Proxy {
                    target: with_request_query(abs.to_string(), args.url),
                }
            }
        }
        // Non-web schemes (mailto:, tel:) can only be redirected to.
        Ok(abs) => Outcome::Redirect {
            location: abs.to_string(),
            status: if redirect { status } else { 302 },
        },
        Err(_) => same_origin(rule, target, args),
    }
}

fn same_origin(rule: &CompiledRule, target: &str, args: &MatchArgs<'_>) -> Outcome {
    let status = rule.rule.status;
    let path = rooted(target);

    if let Some(api) = args.api_location {
        let into_api = args.api_prefix.is_some_and(|p| path_under(strip_query(&path), p));
        if rule.rule.proxy || (into_api && !rule.rule.is_redirect_status()) {
            return Outcome::Proxy {
                target: with_request_query(join_origin(api, &path), args.url),
            };
        }
    } else if rule.rule.proxy {
        tracing::debug!(rule = rule.index, "Proxy rule without API location, serving as rewrite");
    }

    if rule.rule.is_redirect_status() {
        return Outcome::Redirect {
            location: relocate(args.url, &path).to_string(),
            status,
        };
    }

    Outcome::Rewrite {
        path,
        status: match status {
            0 | 200 => None,
            s => Some(s),
        },
    }
}

/// A target on another origin: scheme, port or host differ from the request.
fn is_foreign(target: &Url, args: &MatchArgs<'_>) -> bool {
    let Some(host) = target.host_str() else {
        return false;
    };
    let same_host = host.eq_ignore_ascii_case(args.hostname)
        || args.url.host_str().is_some_and(|h| h.eq_ignore_ascii_case(host));
    !(same_host
        && target.scheme() == args.url.scheme()
        && target.port_or_known_default() == args.url.port_or_known_default())
}

/// The request URL with its path replaced by `path` (which may carry a
/// query and fragment). The authority is never taken from `path`.
fn relocate(request: &Url, path: &str) -> Url {
    let (rest, fragment) = match path.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (path, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, request.query().filter(|q| !q.is_empty())),
    };

    let mut location = request.clone();
    location.set_path(path);
    location.set_query(query);
    location.set_fragment(fragment);
    location
}

/// `path` with any run of leading slashes collapsed to one.
///
/// `//host/x` would otherwise read as a protocol-relative URL.
pub(crate) fn rooted(path: &str) -> String {
    format!("/{}", path.trim_start_matches(&['/', '\\'][..]))
}

/// True when `path` equals `prefix` or lives below it.
pub(crate) fn path_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn strip_query(path: &str) -> &str {
    path.split(&['?', '#'][..]).next().unwrap_or(path)
}

fn join_origin(origin: &Url, path: &str) -> String {
    format!("{}{}", origin.as_str().trim_end_matches('/'), path)
}

/// Carry the request's query string over when the target has none.
pub(crate) fn with_request_query(target: String, request: &Url) -> String {
    match request.query() {
        Some(q) if !q.is_empty() && !target.contains('?') => format!("{target}?{q}"),
        _ => target,
    }
}
