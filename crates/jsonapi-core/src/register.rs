//! Registering handlers to a mux.
//!
//! A [`Mux`] maps URL patterns to handlers. [`register`] adds a list of
//! [`Api`]s to it; [`register_all`] derives the patterns from the names in a
//! [`HandlerSet`]:
//!
//! ```
//! use jsonapi_core::{register_all, convert_camel_to_snake, Handler, HandlerSet, Mux, Reply};
//!
//! struct Users;
//!
//! impl HandlerSet for Users {
//!     fn handlers(&self) -> Vec<(&'static str, Handler)> {
//!         vec![
//!             ("GetUser", Handler::new(|_, _| async { Ok(Reply::Empty) })),
//!             ("ListUsers", Handler::new(|_, _| async { Ok(Reply::Empty) })),
//!         ]
//!     }
//! }
//!
//! let mut patterns = Vec::new();
//! let mut mux = |pattern: &str, _h: Handler| patterns.push(pattern.to_string());
//! register_all(&mut mux, "/api", &Users, Some(convert_camel_to_snake));
//! assert_eq!(patterns, ["/api/get_user", "/api/list_users"]);
//! ```

use std::sync::OnceLock;

use regex::Regex;

use crate::handler::Handler;

/// Anything handlers can be registered to.
pub trait Mux {
    /// Serves `pattern` with `handler`.
    fn handle(&mut self, pattern: &str, handler: Handler);
}

impl<F> Mux for F
where
    F: FnMut(&str, Handler),
{
    fn handle(&mut self, pattern: &str, handler: Handler) {
        self(pattern, handler);
    }
}

/// A handler bound to a URL pattern.
#[derive(Debug, Clone)]
pub struct Api {
    /// URL pattern, in the syntax of the target mux.
    pub pattern: String,
    /// The handler.
    pub handler: Handler,
}

impl Api {
    /// Creates an API entry.
    pub fn new(pattern: impl Into<String>, handler: Handler) -> Self {
        Self {
            pattern: pattern.into(),
            handler,
        }
    }
}

/// A named group of handlers, e.g. all operations of one resource.
pub trait HandlerSet {
    /// Returns `(name, handler)` pairs. Names are usually CamelCase.
    fn handlers(&self) -> Vec<(&'static str, Handler)>;
}

/// Converts a handler name into a URL segment.
pub type NameConverter = fn(&str) -> String;

/// Registers every API to `mux`.
pub fn register<M: Mux + ?Sized>(mux: &mut M, apis: Vec<Api>) {
    for api in apis {
        tracing::debug!(pattern = %api.pattern, "registering handler");
        mux.handle(&api.pattern, api.handler);
    }
}

/// Builds the API list of a handler set: each handler is bound to
/// `prefix + "/" + converter(name)`. Names are kept unchanged without a
/// converter.
pub fn apis_of<S: HandlerSet + ?Sized>(
    prefix: &str,
    set: &S,
    converter: Option<NameConverter>,
) -> Vec<Api> {
    set.handlers()
        .into_iter()
        .map(|(name, handler)| {
            let name = converter.map_or_else(|| name.to_string(), |conv| conv(name));
            Api::new(format!("{prefix}/{name}"), handler)
        })
        .collect()
}

/// Registers every handler of `set` under `prefix`, see [`apis_of`].
pub fn register_all<M, S>(mux: &mut M, prefix: &str, set: &S, converter: Option<NameConverter>)
where
    M: Mux + ?Sized,
    S: HandlerSet + ?Sized,
{
    register(mux, apis_of(prefix, set, converter));
}

static CAMEL_BOUNDARY: OnceLock<Regex> = OnceLock::new();
static ALL_UPPER: OnceLock<Regex> = OnceLock::new();

fn convert_camel(name: &str, sep: &str) -> String {
    let all_upper = ALL_UPPER.get_or_init(|| Regex::new(r"^[A-Z0-9]*$").expect("valid regex"));
    if all_upper.is_match(name) {
        return name.to_lowercase();
    }

    CAMEL_BOUNDARY
        .get_or_init(|| {
            Regex::new(r"([^A-Z])([A-Z])|([A-Z0-9]+)([A-Z])").expect("valid regex")
        })
        .replace_all(name, format!("${{1}}${{3}}{sep}${{2}}${{4}}").as_str())
        .to_lowercase()
}

/// Converts `CamelCase` to `camel_case`.
///
/// Runs of capitals are treated as one word: `TestIDGetter` becomes
/// `test_id_getter`.
#[must_use]
pub fn convert_camel_to_snake(name: &str) -> String {
    convert_camel(name, "_")
}

/// Converts `CamelCase` to `camel/case`.
#[must_use]
pub fn convert_camel_to_slash(name: &str) -> String {
    convert_camel(name, "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reply;

    const CASES: [(&str, &str, &str); 5] = [
        ("CamelCase", "camel_case", "camel/case"),
        ("URL123", "url123", "url123"),
        ("TestIdGetter", "test_id_getter", "test/id/getter"),
        ("TestIDGetter", "test_id_getter", "test/id/getter"),
        ("TestID3Getter", "test_id3_getter", "test/id3/getter"),
    ];

    #[test]
    fn test_camel_to_snake() {
        for (name, snake, _) in CASES {
            assert_eq!(convert_camel_to_snake(name), snake, "converting {name}");
        }
    }

    #[test]
    fn test_camel_to_slash() {
        for (name, _, slash) in CASES {
            assert_eq!(convert_camel_to_slash(name), slash, "converting {name}");
        }
    }

    struct Set;

    impl HandlerSet for Set {
        fn handlers(&self) -> Vec<(&'static str, Handler)> {
            vec![("DoIt", Handler::new(|_, _| async { Ok(Reply::Empty) }))]
        }
    }

    #[test]
    fn test_apis_of_without_converter() {
        let apis = apis_of("/x", &Set, None);
        assert_eq!(apis.len(), 1);
        assert_eq!(apis[0].pattern, "/x/DoIt");
    }

    #[test]
    fn test_register_to_closure_mux() {
        let mut seen = Vec::new();
        let mut mux = |p: &str, _: Handler| seen.push(p.to_string());
        register(
            &mut mux,
            vec![
                Api::new("/a", Handler::new(|_, _| async { Ok(Reply::Empty) })),
                Api::new("/b", Handler::new(|_, _| async { Ok(Reply::Empty) })),
            ],
        );
        assert_eq!(seen, ["/a", "/b"]);
    }
}
