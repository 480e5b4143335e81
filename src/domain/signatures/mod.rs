//! Builtin signature registry.
//!
//! Every builtin callable from script code has an entry here describing its
//! argument list. The semantic checker validates call arity against these
//! entries, and `generate_docs` renders the whole table for the `docs` CLI
//! command. Implementations live in `domain::builtins`; this module is the
//! single source of truth for their shapes.

mod arrays;
mod common;
mod datetime;
mod indicators;
mod market;
mod math;
mod strings;
mod terminal;
mod trading;

use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: &'static str,
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub struct BuiltinSignature {
    pub name: &'static str,
    pub args: Vec<ArgSpec>,
    pub variadic: bool,
    pub return_type: &'static str,
    pub description: &'static str,
    /// Alternate argument lists for overloaded names. A call is valid if
    /// the main list or any alternative accepts its arity.
    pub alternatives: Vec<Vec<ArgSpec>>,
}

impl BuiltinSignature {
    pub fn required(&self) -> usize {
        self.args.iter().filter(|a| !a.optional).count()
    }

    pub fn accepts(&self, count: usize) -> bool {
        let fits = |args: &[ArgSpec], variadic: bool| {
            let required = args.iter().filter(|a| !a.optional).count();
            count >= required && (variadic || count <= args.len())
        };
        if fits(&self.args, self.variadic) {
            return true;
        }
        self.alternatives.iter().any(|alt| fits(alt, false))
    }

    /// One human-readable line: `name(type, [type], ...) -> ret - description`.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                if a.optional {
                    format!("[{}]", a.ty)
                } else {
                    a.ty.to_string()
                }
            })
            .collect();
        if self.variadic {
            parts.push("...".to_string());
        }
        format!(
            "{}({}) -> {} - {}",
            self.name,
            parts.join(", "),
            self.return_type,
            self.description
        )
    }
}

pub type SignatureMap = BTreeMap<&'static str, BuiltinSignature>;

/// Row format used by the category modules: `(name, args, ret, doc)` where
/// `args` is a comma list of `ty name` items, `[ty name]` when optional,
/// with a trailing `...` marking a variadic tail.
type Row = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
);

fn parse_args(spec: &'static str) -> (Vec<ArgSpec>, bool) {
    let mut args = Vec::new();
    let mut variadic = false;
    for raw in spec.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        if raw == "..." {
            variadic = true;
            continue;
        }
        let (body, optional) = match raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            Some(inner) => (inner.trim(), true),
            None => (raw, false),
        };
        let mut words = body.split_whitespace();
        let ty = words.next().unwrap_or("");
        let name = words.next().unwrap_or("");
        args.push(ArgSpec { name, ty, optional });
    }
    (args, variadic)
}

fn install(map: &mut SignatureMap, rows: &[Row]) {
    for &(name, arg_spec, return_type, description) in rows {
        let (args, variadic) = parse_args(arg_spec);
        map.insert(
            name,
            BuiltinSignature {
                name,
                args,
                variadic,
                return_type,
                description,
                alternatives: Vec::new(),
            },
        );
    }
}

pub fn registry() -> &'static SignatureMap {
    static REGISTRY: OnceLock<SignatureMap> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = SignatureMap::new();
        install(&mut map, common::ROWS);
        install(&mut map, math::ROWS);
        install(&mut map, strings::ROWS);
        install(&mut map, datetime::ROWS);
        install(&mut map, arrays::ROWS);
        install(&mut map, market::ROWS);
        install(&mut map, trading::ROWS);
        install(&mut map, terminal::ROWS);
        install(&mut map, indicators::ROWS);
        map
    })
}

/// Render the full signature table, one line per builtin, sorted by name.
pub fn generate_docs() -> String {
    let mut out = String::new();
    for sig in registry().values() {
        out.push_str(&sig.render());
        out.push('\n');
    }
    out
}
