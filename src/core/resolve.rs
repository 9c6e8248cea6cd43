//! Purpose: Expand user-supplied path strings before staging.
//! Exports: `Resolver`, `ResolverChain`, `expand_vars`, `expand_user`, `unravel_path`.
//! Role: PathResolver; the only place environment and `~` expansion happen.
//! Invariants: Order is always expand_vars -> expand_user -> resolvers left to right.
//! Invariants: No canonicalisation happens here unless a resolver does it.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\w+|\{[^}]*\})").expect("valid env var pattern"));

type ResolveFn = dyn Fn(&str) -> String + Send + Sync;

/// A named `string -> string` step applied after expansion.
#[derive(Clone)]
pub struct Resolver {
    name: String,
    func: Arc<ResolveFn>,
}

impl Resolver {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, input: &str) -> String {
        (self.func)(input)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Resolver").field(&self.name).finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolverChain {
    resolvers: Vec<Resolver>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Resolver) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(Resolver::name).collect()
    }

    pub fn apply(&self, input: &str) -> String {
        self.resolvers
            .iter()
            .fold(input.to_string(), |acc, resolver| resolver.apply(&acc))
    }
}

impl FromIterator<Resolver> for ResolverChain {
    fn from_iter<I: IntoIterator<Item = Resolver>>(iter: I) -> Self {
        Self {
            resolvers: iter.into_iter().collect(),
        }
    }
}

/// Replaces `$NAME` and `${NAME}` with their environment values. Unknown
/// names are left untouched.
pub fn expand_vars(path: &str) -> String {
    if !path.contains('$') {
        return path.to_string();
    }
    ENV_VAR
        .replace_all(path, |caps: &Captures<'_>| {
            let raw = &caps[1];
            let name = raw
                .strip_prefix('{')
                .and_then(|inner| inner.strip_suffix('}'))
                .unwrap_or(raw);
            match std::env::var(name) {
                Ok(value) => value,
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Replaces a leading `~` with `$HOME`. `~user` and an unset `HOME` leave the
/// path as given.
pub fn expand_user(path: &str) -> String {
    let Some(rest) = path.strip_prefix('~') else {
        return path.to_string();
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return path.to_string();
    }
    let Some(home) = std::env::var_os("HOME") else {
        return path.to_string();
    };
    let home = home.to_string_lossy();
    let home = home.trim_end_matches('/');
    let expanded = format!("{home}{rest}");
    if expanded.is_empty() {
        "/".to_string()
    } else {
        expanded
    }
}

pub fn unravel_path(path: &str, resolvers: &ResolverChain) -> String {
    let expanded = expand_user(&expand_vars(path));
    resolvers.apply(&expanded)
}

#[cfg(test)]
mod tests {
    use super::{Resolver, ResolverChain, expand_user, expand_vars, unravel_path};
    use std::sync::{Arc, Mutex};

    fn set_env(key: &str, value: &str) {
        // SAFETY: each test uses a variable name no other test touches.
        unsafe { std::env::set_var(key, value) };
    }

    fn home() -> String {
        std::env::var("HOME")
            .expect("HOME set for tests")
            .trim_end_matches('/')
            .to_string()
    }

    #[test]
    fn unravel_without_resolvers() {
        set_env("SIGPLOT_TEST_UNRAVEL", "1700000000.5");
        let home = home();
        let cases = [
            ("", "".to_string()),
            (".", ".".to_string()),
            ("~", home.clone()),
            ("$SIGPLOT_TEST_UNRAVEL", "1700000000.5".to_string()),
            ("${SIGPLOT_TEST_UNRAVEL}", "1700000000.5".to_string()),
            ("/$SIGPLOT_TEST_UNRAVEL", "/1700000000.5".to_string()),
            ("~/$SIGPLOT_TEST_UNRAVEL", format!("{home}/1700000000.5")),
        ];
        for (input, expected) in cases {
            assert_eq!(unravel_path(input, &ResolverChain::new()), expected, "{input}");
        }
    }

    #[test]
    fn unknown_vars_and_named_users_are_left_alone() {
        assert_eq!(
            expand_vars("/data/$SIGPLOT_TEST_DEFINITELY_UNSET/x"),
            "/data/$SIGPLOT_TEST_DEFINITELY_UNSET/x"
        );
        assert_eq!(expand_vars("cost$"), "cost$");
        assert_eq!(expand_user("~someone/foo"), "~someone/foo");
        assert_eq!(expand_user("a/~/b"), "a/~/b");
    }

    #[test]
    fn vars_expand_before_user_directory() {
        set_env("SIGPLOT_TEST_TILDE", "~");
        assert_eq!(
            unravel_path("$SIGPLOT_TEST_TILDE/x.tmp", &ResolverChain::new()),
            format!("{}/x.tmp", home())
        );
    }

    #[test]
    fn resolvers_compose_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let make = |suffix: &'static str| {
            let calls = Arc::clone(&calls);
            Resolver::new(suffix, move |input: &str| {
                calls.lock().expect("calls").push(suffix);
                format!("{input}{suffix}")
            })
        };
        let (one, two, three) = (make("1"), make("2"), make("3"));

        let cases = [
            (vec![], ""),
            (vec![one.clone()], "1"),
            (vec![one.clone(), two.clone()], "12"),
            (vec![two.clone(), one.clone()], "21"),
            (vec![one.clone(), two.clone(), three.clone()], "123"),
            (vec![three.clone(), two.clone(), one.clone(), one.clone()], "3211"),
        ];
        for (resolvers, expected) in cases {
            calls.lock().expect("calls").clear();
            let chain: ResolverChain = resolvers.into_iter().collect();
            let names: Vec<String> = chain.names().into_iter().map(str::to_string).collect();
            assert_eq!(unravel_path("", &chain), expected);
            let recorded: Vec<String> = calls
                .lock()
                .expect("calls")
                .iter()
                .map(|name| name.to_string())
                .collect();
            assert_eq!(recorded, names);
        }
    }
}
