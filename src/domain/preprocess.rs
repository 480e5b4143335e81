//! Preprocessor: macro expansion, conditional inclusion, `#property`
//! collection, includes, and warning pragmas.
//!
//! Runs line-oriented before lexing. Directive lines and inactive
//! conditional regions still count toward line numbering so diagnostics on
//! the expanded stream point at the original source.

use std::collections::{BTreeMap, HashMap};

use super::error::{LexError, ParseError};
use super::lexer::{Token, TokenKind, lex};

#[derive(Debug, Clone)]
struct Macro {
    params: Option<Vec<String>>,
    body: String,
}

/// A `#pragma warning` directive and the line it takes effect on.
#[derive(Debug, Clone, PartialEq)]
pub struct PragmaDirective {
    pub line: usize,
    pub enable: bool,
    pub codes: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PreprocessOutput {
    pub tokens: Vec<Token>,
    pub properties: BTreeMap<String, Vec<String>>,
    pub errors: Vec<LexError>,
    pub pragmas: Vec<PragmaDirective>,
}

/// Resolves `#include`/`#import` paths to file contents.
pub type FileProvider<'a> = &'a dyn Fn(&str) -> Option<String>;

const MAX_EXPANSION_DEPTH: usize = 32;

pub fn preprocess(source: &str) -> Result<PreprocessOutput, ParseError> {
    preprocess_with(source, None)
}

pub fn preprocess_with(
    source: &str,
    provider: Option<FileProvider<'_>>,
) -> Result<PreprocessOutput, ParseError> {
    let mut macros: HashMap<String, Macro> = HashMap::new();
    run(source, provider, &mut macros)
}

struct CondFrame {
    parent_active: bool,
    condition: bool,
    active: bool,
    else_seen: bool,
}

fn run(
    source: &str,
    provider: Option<FileProvider<'_>>,
    macros: &mut HashMap<String, Macro>,
) -> Result<PreprocessOutput, ParseError> {
    let mut out = PreprocessOutput::default();
    let mut cond_stack: Vec<CondFrame> = Vec::new();
    let mut code_lines: Vec<String> = Vec::new();
    let mut emitted_lines = 0usize;

    let is_active =
        |stack: &[CondFrame]| stack.last().map(|f| f.active).unwrap_or(true);

    // lex and macro-expand the accumulated chunk, offsetting positions by
    // the number of source lines already consumed
    macro_rules! flush {
        () => {{
            if !code_lines.is_empty() {
                let chunk = code_lines.join("\n");
                let res = lex(&chunk);
                let mut expanded = Vec::new();
                expand(&res.tokens, macros, &mut expanded, &mut out.errors, 0);
                for t in &mut expanded {
                    t.line += emitted_lines;
                }
                let mut errors = res.errors;
                for e in &mut errors {
                    e.line += emitted_lines;
                }
                out.tokens.append(&mut expanded);
                out.errors.append(&mut errors);
                emitted_lines += code_lines.len();
                code_lines.clear();
            }
        }};
    }

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("#ifdef") {
            flush!();
            emitted_lines += 1;
            let id = first_word(rest);
            let parent_active = is_active(&cond_stack);
            let condition = macros.contains_key(id);
            cond_stack.push(CondFrame {
                parent_active,
                condition,
                active: parent_active && condition,
                else_seen: false,
            });
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#ifndef") {
            flush!();
            emitted_lines += 1;
            let id = first_word(rest);
            let parent_active = is_active(&cond_stack);
            let condition = !macros.contains_key(id);
            cond_stack.push(CondFrame {
                parent_active,
                condition,
                active: parent_active && condition,
                else_seen: false,
            });
            continue;
        }
        if trimmed.starts_with("#else") {
            flush!();
            emitted_lines += 1;
            let frame = cond_stack
                .last_mut()
                .ok_or_else(|| ParseError::new("#else without #ifdef", line_no, 1))?;
            if frame.else_seen {
                return Err(ParseError::new("duplicate #else", line_no, 1));
            }
            frame.active = frame.parent_active && !frame.condition;
            frame.else_seen = true;
            continue;
        }
        if trimmed.starts_with("#endif") {
            flush!();
            emitted_lines += 1;
            if cond_stack.pop().is_none() {
                return Err(ParseError::new("#endif without #ifdef", line_no, 1));
            }
            continue;
        }
        if !is_active(&cond_stack) {
            emitted_lines += 1;
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#define") {
            flush!();
            emitted_lines += 1;
            if let Some((name, mac)) = parse_define(rest.trim()) {
                macros.insert(name, mac);
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#undef") {
            flush!();
            emitted_lines += 1;
            macros.remove(first_word(rest));
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#property") {
            emitted_lines += 1;
            let rest = rest.trim();
            let mut parts = rest.split_whitespace();
            if let Some(name) = parts.next() {
                let value = parts.collect::<Vec<_>>().join(" ");
                out.properties.entry(name.to_string()).or_default().push(value);
            }
            continue;
        }
        if let Some(rest) = strip_include(trimmed) {
            flush!();
            emitted_lines += 1;
            let path = rest.trim().trim_matches(['"', '<', '>']);
            if path.is_empty() {
                continue;
            }
            let content = provider
                .and_then(|p| p(path))
                .ok_or_else(|| {
                    ParseError::new(format!("included file not provided: {path}"), line_no, 1)
                })?;
            let mut included = run(&content, provider, macros)?;
            for (name, mut values) in included.properties {
                out.properties.entry(name).or_default().append(&mut values);
            }
            out.tokens.append(&mut included.tokens);
            out.errors.append(&mut included.errors);
            out.pragmas.append(&mut included.pragmas);
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#pragma") {
            flush!();
            emitted_lines += 1;
            let rest = rest.trim();
            if let Some(warning) = rest.strip_prefix("warning") {
                let mut parts = warning.trim().split_whitespace();
                let enable = match parts.next() {
                    Some("disable") => Some(false),
                    Some("enable") => Some(true),
                    _ => None,
                };
                if let Some(enable) = enable {
                    out.pragmas.push(PragmaDirective {
                        line: line_no,
                        enable,
                        codes: parts.map(str::to_string).collect(),
                    });
                }
            }
            continue;
        }
        code_lines.push(line.to_string());
    }
    flush!();

    if !cond_stack.is_empty() {
        return Err(ParseError::new(
            "#ifdef without matching #endif",
            source.lines().count(),
            1,
        ));
    }
    Ok(out)
}

fn first_word(rest: &str) -> &str {
    rest.trim().split_whitespace().next().unwrap_or("")
}

fn strip_include(line: &str) -> Option<&str> {
    line.strip_prefix("#include")
        .or_else(|| line.strip_prefix("#import"))
}

fn parse_define(rest: &str) -> Option<(String, Macro)> {
    let bytes = rest.as_bytes();
    let mut end = 0;
    while end < bytes.len()
        && ((bytes[end] as char).is_ascii_alphanumeric() || bytes[end] == b'_')
    {
        end += 1;
    }
    if end == 0 || (bytes[0] as char).is_ascii_digit() {
        return None;
    }
    let name = rest[..end].to_string();
    let after = &rest[end..];
    if let Some(body_start) = after.strip_prefix('(') {
        let close = body_start.find(')')?;
        let params: Vec<String> = body_start[..close]
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let body = body_start[close + 1..].trim().to_string();
        Some((
            name,
            Macro {
                params: Some(params),
                body,
            },
        ))
    } else {
        Some((
            name,
            Macro {
                params: None,
                body: after.trim().to_string(),
            },
        ))
    }
}

/// Token-level macro expansion. Function-like macros substitute argument
/// token sequences at parameter positions and re-expand the result.
fn expand(
    tokens: &[Token],
    macros: &HashMap<String, Macro>,
    out: &mut Vec<Token>,
    errors: &mut Vec<LexError>,
    depth: usize,
) {
    if depth > MAX_EXPANSION_DEPTH {
        if let Some(t) = tokens.first() {
            errors.push(LexError::new(
                "macro expansion too deep",
                t.line,
                t.column,
            ));
        }
        out.extend_from_slice(tokens);
        return;
    }
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        let mac = if tok.kind == TokenKind::Identifier {
            macros.get(&tok.text)
        } else {
            None
        };
        let Some(mac) = mac else {
            out.push(tok.clone());
            i += 1;
            continue;
        };
        match &mac.params {
            None => {
                let res = lex(&mac.body);
                reposition(&res.tokens, tok, macros, out, errors, depth);
                errors.extend(res.errors);
                i += 1;
            }
            Some(params) => {
                if tokens.get(i + 1).map(|t| t.text.as_str()) != Some("(") {
                    out.push(tok.clone());
                    i += 1;
                    continue;
                }
                let (args, consumed) = collect_args(&tokens[i + 2..]);
                let res = lex(&mac.body);
                let mut substituted = Vec::new();
                for t in &res.tokens {
                    let param_idx = (t.kind == TokenKind::Identifier)
                        .then(|| params.iter().position(|p| *p == t.text))
                        .flatten();
                    match param_idx {
                        Some(p) => {
                            substituted.extend(args.get(p).cloned().unwrap_or_default())
                        }
                        None => substituted.push(t.clone()),
                    }
                }
                reposition(&substituted, tok, macros, out, errors, depth);
                errors.extend(res.errors);
                i += 2 + consumed + 1; // name, '(', args, ')'
            }
        }
    }
}

/// Re-expand `tokens` and stamp them with the call site's position so
/// diagnostics inside expansions point at the use, not the definition.
fn reposition(
    tokens: &[Token],
    site: &Token,
    macros: &HashMap<String, Macro>,
    out: &mut Vec<Token>,
    errors: &mut Vec<LexError>,
    depth: usize,
) {
    let mut expanded = Vec::new();
    expand(tokens, macros, &mut expanded, errors, depth + 1);
    for mut t in expanded {
        t.line = site.line;
        t.column = site.column;
        out.push(t);
    }
}

/// Split the argument tokens of a macro call, stopping at the matching
/// close parenthesis. Returns the argument lists and the token count
/// consumed (excluding the close paren).
fn collect_args(tokens: &[Token]) -> (Vec<Vec<Token>>, usize) {
    let mut args: Vec<Vec<Token>> = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < tokens.len() {
        let t = &tokens[i];
        match t.text.as_str() {
            "(" => {
                depth += 1;
                current.push(t.clone());
            }
            ")" if depth == 0 => {
                if !current.is_empty() || !args.is_empty() {
                    args.push(current);
                }
                return (args, i);
            }
            ")" => {
                depth -= 1;
                current.push(t.clone());
            }
            "," if depth == 0 => {
                args.push(std::mem::take(&mut current));
            }
            _ => current.push(t.clone()),
        }
        i += 1;
    }
    args.push(current);
    (args, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<String> {
        preprocess(source)
            .unwrap()
            .tokens
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn object_macro_expands() {
        assert_eq!(texts("#define N 5\nint a = N;"), vec!["int", "a", "=", "5", ";"]);
    }

    #[test]
    fn function_macro_substitutes_args() {
        let toks = texts("#define SQR(x) ((x)*(x))\nint a = SQR(b+1);");
        assert_eq!(
            toks,
            vec![
                "int", "a", "=", "(", "(", "b", "+", "1", ")", "*", "(", "b", "+", "1", ")", ")",
                ";"
            ]
        );
    }

    #[test]
    fn undef_stops_expansion() {
        assert_eq!(
            texts("#define N 5\n#undef N\nint a = N;"),
            vec!["int", "a", "=", "N", ";"]
        );
    }

    #[test]
    fn conditional_inclusion() {
        let src = "#define FEATURE 1\n#ifdef FEATURE\nint a;\n#else\nint b;\n#endif";
        assert_eq!(texts(src), vec!["int", "a", ";"]);
        let src = "#ifdef MISSING\nint a;\n#else\nint b;\n#endif";
        assert_eq!(texts(src), vec!["int", "b", ";"]);
    }

    #[test]
    fn nested_conditionals_respect_parent() {
        let src = "#ifdef MISSING\n#ifdef ALSO\nint a;\n#endif\nint b;\n#endif\nint c;";
        assert_eq!(texts(src), vec!["int", "c", ";"]);
    }

    #[test]
    fn unbalanced_conditionals_are_fatal() {
        assert!(preprocess("#endif").is_err());
        assert!(preprocess("#ifdef X\nint a;").is_err());
        assert!(preprocess("#ifdef X\n#else\n#else\n#endif").is_err());
    }

    #[test]
    fn properties_are_collected() {
        let out = preprocess("#property copyright \"me\"\n#property strict\nint a;").unwrap();
        assert_eq!(out.properties["copyright"], vec!["\"me\""]);
        assert_eq!(out.properties["strict"], vec![""]);
    }

    #[test]
    fn line_numbers_survive_directives() {
        let out = preprocess("#property strict\nint a;\nint b;").unwrap();
        let b = out.tokens.iter().find(|t| t.text == "b").unwrap();
        assert_eq!(b.line, 3);
    }

    #[test]
    fn pragma_warning_directives_recorded() {
        let out =
            preprocess("#pragma warning disable override-missing\nint a;\n#pragma warning enable override-missing")
                .unwrap();
        assert_eq!(out.pragmas.len(), 2);
        assert!(!out.pragmas[0].enable);
        assert_eq!(out.pragmas[0].codes, vec!["override-missing"]);
        assert_eq!(out.pragmas[0].line, 1);
        assert!(out.pragmas[1].enable);
    }

    #[test]
    fn include_resolves_through_provider() {
        let provider = |path: &str| {
            (path == "lib.mqh").then(|| "#define FROM_LIB 7\nint lib_var = FROM_LIB;".to_string())
        };
        let out = preprocess_with(
            "#include \"lib.mqh\"\nint a = FROM_LIB;",
            Some(&provider),
        )
        .unwrap();
        let texts: Vec<&str> = out.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["int", "lib_var", "=", "7", ";", "int", "a", "=", "7", ";"]
        );
    }

    #[test]
    fn missing_include_is_fatal() {
        let err = preprocess("#include \"gone.mqh\"").unwrap_err();
        assert!(err.message.contains("gone.mqh"));
    }

    #[test]
    fn self_referential_macro_reports_depth() {
        let out = preprocess("#define A A\nint x = A;").unwrap();
        assert!(out.errors.iter().any(|e| e.message.contains("too deep")));
    }
}
