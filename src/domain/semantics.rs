//! Semantic checking: the compile step between parsing and execution.
//!
//! Runs three phases over the declaration list. Type references are
//! validated against the primitive set plus declared class and enum names,
//! builtin calls are checked against the signature registry, and class
//! method tables are resolved once with override diagnostics collected as
//! warnings. The resolved tables travel in the [`CompileResult`] so the
//! runtime never re-derives dispatch per call.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::ast::{ClassDecl, Declaration, Field, MethodKind};
use super::error::Warning;
use super::lexer::{Token, TokenKind, is_type_keyword};
use super::parser::parse;
use super::preprocess::{FileProvider, PragmaDirective, preprocess_with};
use super::signatures::{BuiltinSignature, registry};

/// What kind of program the source declares, detected from its entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ProgramType {
    Expert,
    Indicator,
    Script,
}

/// Where a method is declared, and whether calls through it dispatch
/// dynamically.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    pub class: String,
    pub index: usize,
    pub is_virtual: bool,
}

/// A class with its inheritance resolved: full field layout (base fields
/// first) and one method table covering the whole chain.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub decl: ClassDecl,
    pub methods: HashMap<String, MethodRef>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub warnings_as_errors: bool,
}

#[derive(Debug)]
pub struct CompileResult {
    pub declarations: Vec<Declaration>,
    pub properties: BTreeMap<String, Vec<String>>,
    pub classes: HashMap<String, ClassInfo>,
    pub program_type: ProgramType,
    pub errors: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl CompileResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn failed(details: String) -> Self {
        CompileResult {
            declarations: Vec::new(),
            properties: BTreeMap::new(),
            classes: HashMap::new(),
            program_type: ProgramType::Expert,
            errors: vec![details],
            warnings: Vec::new(),
        }
    }
}

/// Stable warning codes with descriptions, for host tooling.
pub fn warning_codes() -> &'static [(&'static str, &'static str)] {
    &[
        (
            "override-missing",
            "method declared override but no base class declares a method of that name",
        ),
        (
            "override-non-virtual",
            "method overrides a base class method that is not declared virtual",
        ),
    ]
}

pub fn compile(source: &str) -> CompileResult {
    compile_with(source, None, CompileOptions::default())
}

pub fn compile_with(
    source: &str,
    provider: Option<FileProvider<'_>>,
    options: CompileOptions,
) -> CompileResult {
    let pre = match preprocess_with(source, provider) {
        Ok(pre) => pre,
        Err(e) => return CompileResult::failed(e.display_with_context(source)),
    };
    let mut errors: Vec<String> = pre.errors.iter().map(|e| e.to_string()).collect();
    let declarations = match parse(&pre.tokens) {
        Ok(decls) => decls,
        Err(e) => {
            errors.insert(0, e.display_with_context(source));
            let mut out = CompileResult::failed(String::new());
            out.errors = errors;
            return out;
        }
    };

    let mut warnings = Vec::new();
    let known = known_types(&declarations);
    check_types(&declarations, &known, &mut errors);
    check_builtin_calls(&declarations, &mut errors);
    let classes = resolve_classes(&declarations, &mut errors, &mut warnings);
    let program_type = detect_program_type(&declarations);

    warnings.retain(|w| !suppressed(w.code, w.line, &pre.pragmas));
    if options.warnings_as_errors {
        errors.extend(warnings.drain(..).map(|w| w.to_string()));
    }

    CompileResult {
        declarations,
        properties: pre.properties,
        classes,
        program_type,
        errors,
        warnings,
    }
}

fn known_types(declarations: &[Declaration]) -> HashSet<String> {
    let mut known = HashSet::new();
    for decl in declarations {
        match decl {
            Declaration::Class(c) => {
                known.insert(c.name.clone());
            }
            Declaration::Enum(e) => {
                known.insert(e.name.clone());
            }
            _ => {}
        }
    }
    known
}

fn type_ok(ty: &str, known: &HashSet<String>) -> bool {
    is_type_keyword(ty) && ty != "void" || known.contains(ty)
}

fn check_types(declarations: &[Declaration], known: &HashSet<String>, errors: &mut Vec<String>) {
    let check_fn = |f: &super::ast::FunctionDecl, owner: Option<&str>, errors: &mut Vec<String>| {
        let fn_name = match owner {
            Some(class) => format!("{class}::{}", f.name),
            None => f.name.clone(),
        };
        if !(is_type_keyword(&f.return_type) || known.contains(&f.return_type)) {
            errors.push(format!(
                "line {}: Unknown type {} for return of {}",
                f.line, f.return_type, fn_name
            ));
        }
        for p in &f.params {
            if !type_ok(&p.ty, known) {
                errors.push(format!(
                    "line {}: Unknown type {} for parameter {} of {}",
                    f.line, p.ty, p.name, fn_name
                ));
            }
        }
    };
    for decl in declarations {
        match decl {
            Declaration::Function(f) => check_fn(f, None, errors),
            Declaration::Class(c) => {
                for m in &c.methods {
                    // constructors reuse the class name as their type
                    if m.kind == MethodKind::Normal || m.kind == MethodKind::Operator {
                        check_fn(&m.decl, Some(&c.name), errors);
                    }
                }
                for field in &c.fields {
                    if !type_ok(&field.ty, known) {
                        errors.push(format!(
                            "line {}: Unknown type {} for field {} of {}",
                            c.line, field.ty, field.name, c.name
                        ));
                    }
                }
            }
            Declaration::Variable(v) => {
                if !type_ok(&v.ty, known) {
                    for d in &v.declarators {
                        errors.push(format!(
                            "line {}: Unknown type {} for variable {}",
                            v.line, v.ty, d.name
                        ));
                    }
                }
            }
            _ => {}
        }
    }
}

/// Names the script defines itself. Calls to these are never checked
/// against the builtin registry, matching runtime lookup order.
fn user_defined_names(declarations: &[Declaration]) -> HashSet<String> {
    let mut names = HashSet::new();
    for decl in declarations {
        match decl {
            Declaration::Function(f) => {
                names.insert(f.name.clone());
            }
            Declaration::Class(c) => {
                names.insert(c.name.clone());
                for m in &c.methods {
                    names.insert(m.decl.name.clone());
                }
            }
            _ => {}
        }
    }
    names
}

fn check_builtin_calls(declarations: &[Declaration], errors: &mut Vec<String>) {
    let user = user_defined_names(declarations);
    let scan = |tokens: &[Token], errors: &mut Vec<String>| {
        scan_calls(tokens, &user, errors);
    };
    for decl in declarations {
        match decl {
            Declaration::Function(f) => scan(&f.body, errors),
            Declaration::Class(c) => {
                for m in &c.methods {
                    scan(&m.decl.body, errors);
                }
            }
            Declaration::Variable(v) => {
                for d in &v.declarators {
                    if let Some(init) = &d.init {
                        scan(init, errors);
                    }
                }
            }
            Declaration::Statement(tokens) => scan(tokens, errors),
            Declaration::Enum(_) => {}
        }
    }
}

fn scan_calls(tokens: &[Token], user: &HashSet<String>, errors: &mut Vec<String>) {
    for i in 0..tokens.len() {
        let t = &tokens[i];
        if t.kind != TokenKind::Identifier {
            continue;
        }
        if !tokens.get(i + 1).is_some_and(|n| n.is(TokenKind::Punct, "(")) {
            continue;
        }
        // member and base-qualified calls resolve on the object, not the
        // registry
        if i > 0
            && (tokens[i - 1].is(TokenKind::Operator, ".")
                || tokens[i - 1].is(TokenKind::Punct, ":"))
        {
            continue;
        }
        if user.contains(&t.text) {
            continue;
        }
        let Some(sig) = registry().get(t.text.as_str()) else {
            continue;
        };
        let count = call_arg_count(&tokens[i + 2..]);
        if !sig.accepts(count) {
            errors.push(format!(
                "line {}: {} expects {}, got {}",
                t.line,
                t.text,
                arity_expectation(sig),
                count
            ));
        }
    }
}

/// Count top-level arguments of a call, given the tokens after its `(`.
fn call_arg_count(tokens: &[Token]) -> usize {
    let mut depth = 1usize;
    let mut commas = 0usize;
    let mut any = false;
    for t in tokens {
        match t.text.as_str() {
            "(" | "[" => {
                depth += 1;
                any = true;
            }
            ")" | "]" => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                any = true;
            }
            "," if depth == 1 => commas += 1,
            _ => any = true,
        }
    }
    if !any && commas == 0 { 0 } else { commas + 1 }
}

fn arity_expectation(sig: &BuiltinSignature) -> String {
    let required = sig.required();
    let total = sig.args.len();
    if sig.variadic {
        let noun = if required == 1 { "argument" } else { "arguments" };
        format!("at least {required} {noun}")
    } else if required == total {
        let noun = if required == 1 { "argument" } else { "arguments" };
        format!("{required} {noun}")
    } else {
        format!("{required} to {total} arguments")
    }
}

fn resolve_classes(
    declarations: &[Declaration],
    errors: &mut Vec<String>,
    warnings: &mut Vec<Warning>,
) -> HashMap<String, ClassInfo> {
    let decls: HashMap<&str, &ClassDecl> = declarations
        .iter()
        .filter_map(|d| match d {
            Declaration::Class(c) => Some((c.name.as_str(), c)),
            _ => None,
        })
        .collect();
    let mut resolved: HashMap<String, ClassInfo> = HashMap::new();
    let mut visiting: HashSet<String> = HashSet::new();
    // source order keeps warning order stable
    for decl in declarations {
        if let Declaration::Class(c) = decl {
            resolve_one(&c.name, &decls, &mut resolved, &mut visiting, errors, warnings);
        }
    }
    resolved
}

fn resolve_one(
    name: &str,
    decls: &HashMap<&str, &ClassDecl>,
    resolved: &mut HashMap<String, ClassInfo>,
    visiting: &mut HashSet<String>,
    errors: &mut Vec<String>,
    warnings: &mut Vec<Warning>,
) -> bool {
    if resolved.contains_key(name) {
        return true;
    }
    let Some(decl) = decls.get(name).copied() else {
        return false;
    };
    if !visiting.insert(name.to_string()) {
        errors.push(format!(
            "line {}: Inheritance cycle involving class {name}",
            decl.line
        ));
        return false;
    }
    let mut methods: HashMap<String, MethodRef> = HashMap::new();
    let mut fields: Vec<Field> = Vec::new();
    if let Some(base) = &decl.base {
        if resolve_one(base, decls, resolved, visiting, errors, warnings) {
            let info = &resolved[base.as_str()];
            methods = info.methods.clone();
            fields = info.fields.clone();
        } else if !decls.contains_key(base.as_str()) {
            errors.push(format!(
                "line {}: Unknown base class {base} for class {name}",
                decl.line
            ));
        }
    }
    for (index, m) in decl.methods.iter().enumerate() {
        if matches!(m.kind, MethodKind::Constructor | MethodKind::Destructor) {
            continue;
        }
        let method_name = &m.decl.name;
        match methods.get(method_name) {
            None if m.is_override => warnings.push(Warning {
                code: "override-missing",
                message: format!(
                    "method {name}::{method_name} is declared override but no base class declares {method_name}"
                ),
                line: m.decl.line,
            }),
            Some(base_ref) if !base_ref.is_virtual => warnings.push(Warning {
                code: "override-non-virtual",
                message: format!(
                    "method {name}::{method_name} overrides {}::{method_name} which is not virtual",
                    base_ref.class
                ),
                line: m.decl.line,
            }),
            _ => {}
        }
        methods.insert(
            method_name.clone(),
            MethodRef {
                class: name.to_string(),
                index,
                is_virtual: m.is_virtual,
            },
        );
    }
    fields.extend(decl.fields.iter().cloned());
    visiting.remove(name);
    resolved.insert(
        name.to_string(),
        ClassInfo {
            decl: decl.clone(),
            methods,
            fields,
        },
    );
    true
}

fn detect_program_type(declarations: &[Declaration]) -> ProgramType {
    let has = |name: &str| {
        declarations.iter().any(|d| match d {
            Declaration::Function(f) => f.name == name,
            _ => false,
        })
    };
    if has("OnCalculate") {
        ProgramType::Indicator
    } else if has("OnTick") || has("start") {
        ProgramType::Expert
    } else if has("OnStart") {
        ProgramType::Script
    } else {
        ProgramType::Expert
    }
}

/// Whether a `#pragma warning` range turns the code off at this line.
fn suppressed(code: &str, line: usize, pragmas: &[PragmaDirective]) -> bool {
    let mut off = false;
    for p in pragmas {
        if p.line > line {
            break;
        }
        if p.codes.is_empty() || p.codes.iter().any(|c| c == code) {
            off = !p.enable;
        }
    }
    off
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_source_compiles() {
        let out = compile("int Add(int a, int b) { return a + b; }");
        assert!(out.is_ok(), "errors: {:?}", out.errors);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn unknown_parameter_type_is_error() {
        let out = compile("void F(Widget w) {}");
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].contains("Unknown type Widget for parameter w of F"));
    }

    #[test]
    fn declared_class_is_a_valid_type() {
        let out = compile("class Widget {};\nvoid F(Widget w) {}");
        assert!(out.is_ok(), "errors: {:?}", out.errors);
    }

    #[test]
    fn unknown_field_type_is_error() {
        let out = compile("class C { Gadget g; };");
        assert!(out.errors[0].contains("Unknown type Gadget for field g of C"));
    }

    #[test]
    fn void_is_not_a_variable_type() {
        let out = compile("void x;");
        assert!(out.errors[0].contains("Unknown type void for variable x"));
    }

    #[test]
    fn builtin_arity_is_checked() {
        let out = compile("void OnTick() { MathMax(1, 2, 3); }");
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].contains("MathMax expects 2 arguments, got 3"));
    }

    #[test]
    fn optional_and_variadic_arities_pass() {
        let out = compile(
            "void OnTick() { StringSubstr(\"abc\", 1); StringSubstr(\"abc\", 1, 2); Print(1, 2, 3); }",
        );
        assert!(out.is_ok(), "errors: {:?}", out.errors);
    }

    #[test]
    fn variadic_minimum_is_enforced() {
        let out = compile("void OnTick() { Print(); }");
        assert!(out.errors[0].contains("Print expects at least 1 argument, got 0"));
    }

    #[test]
    fn user_function_shadows_builtin_signature() {
        let out = compile("double MathMax(double a, double b, double c) { return a; }\nvoid OnTick() { MathMax(1, 2, 3); }");
        assert!(out.is_ok(), "errors: {:?}", out.errors);
    }

    #[test]
    fn member_call_is_not_checked_against_registry() {
        let src = r#"
            class Logger { public: void Print(int a, int b, int c) {} };
            void OnTick() { Logger l; l.Print(1, 2, 3); }
        "#;
        let out = compile(src);
        assert!(out.is_ok(), "errors: {:?}", out.errors);
    }

    #[test]
    fn nested_call_arguments_counted_once() {
        let out = compile("void OnTick() { MathMax(MathMin(1, 2), 3); }");
        assert!(out.is_ok(), "errors: {:?}", out.errors);
    }

    #[test]
    fn override_without_base_method_warns() {
        let src = r#"
            class Base {};
            class Derived : Base { public: void Tick() override {} };
        "#;
        let out = compile(src);
        assert!(out.is_ok());
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].code, "override-missing");
        assert!(out.warnings[0].message.contains("Derived::Tick"));
    }

    #[test]
    fn override_of_non_virtual_warns() {
        let src = r#"
            class Base { public: void Tick() {} };
            class Derived : Base { public: void Tick() override {} };
        "#;
        let out = compile(src);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].code, "override-non-virtual");
    }

    #[test]
    fn virtual_override_is_clean() {
        let src = r#"
            class Base { public: virtual void Tick() {} };
            class Derived : Base { public: void Tick() override {} };
        "#;
        let out = compile(src);
        assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);
    }

    #[test]
    fn method_table_prefers_most_derived() {
        let src = r#"
            class Base { public: virtual int F() { return 1; } int G() { return 2; } };
            class Derived : Base { public: int F() override { return 3; } };
        "#;
        let out = compile(src);
        let derived = &out.classes["Derived"];
        assert_eq!(derived.methods["F"].class, "Derived");
        assert_eq!(derived.methods["G"].class, "Base");
        let base = &out.classes["Base"];
        assert_eq!(base.methods["F"].class, "Base");
        assert!(base.methods["F"].is_virtual);
    }

    #[test]
    fn fields_resolve_base_first() {
        let src = r#"
            class Base { public: int a; };
            class Derived : Base { public: int b; };
        "#;
        let out = compile(src);
        let names: Vec<&str> = out.classes["Derived"]
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn unknown_base_class_is_error() {
        let out = compile("class D : Missing {};");
        assert!(out.errors[0].contains("Unknown base class Missing for class D"));
    }

    #[test]
    fn pragma_suppresses_range() {
        let src = r#"class Base { public: void Tick() {} };
#pragma warning disable override-non-virtual
class Derived : Base { public: void Tick() override {} };
#pragma warning enable override-non-virtual
class Other : Base { public: void Tick() override {} };
"#;
        let out = compile(src);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].message.contains("Other::Tick"));
    }

    #[test]
    fn warnings_as_errors_promotes() {
        let src = r#"
            class Base { public: void Tick() {} };
            class Derived : Base { public: void Tick() override {} };
        "#;
        let out = compile_with(
            src,
            None,
            CompileOptions {
                warnings_as_errors: true,
            },
        );
        assert!(!out.is_ok());
        assert!(out.warnings.is_empty());
        assert!(out.errors[0].starts_with("warning[override-non-virtual]"));
    }

    #[test]
    fn program_type_detection() {
        assert_eq!(
            compile("void OnTick() {}").program_type,
            ProgramType::Expert
        );
        assert_eq!(
            compile("int OnCalculate() { return 0; }").program_type,
            ProgramType::Indicator
        );
        assert_eq!(
            compile("void OnStart() {}").program_type,
            ProgramType::Script
        );
        assert_eq!(compile("int start() { return 0; }").program_type, ProgramType::Expert);
    }

    #[test]
    fn parse_failure_reports_context() {
        let out = compile("int x = ;");
        assert!(!out.is_ok());
        assert!(out.errors[0].contains('^'));
        assert!(out.declarations.is_empty());
    }

    #[test]
    fn warning_codes_enumerable() {
        let codes: Vec<&str> = warning_codes().iter().map(|(c, _)| *c).collect();
        assert!(codes.contains(&"override-missing"));
        assert!(codes.contains(&"override-non-virtual"));
    }
}
