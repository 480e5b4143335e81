//! Syntax tree for the dialect's top-level declarations.
//!
//! Function and method bodies are kept as token sequences rather than fully
//! parsed trees; the statement interpreter walks them at call time. That
//! mirrors how the dialect defers body analysis until execution while still
//! letting declaration structure (classes, signatures, storage classes) be
//! validated up front.

use super::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

/// One function or method parameter. `dims` holds one entry per declared
/// array dimension, `None` for an unsized `[]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: String,
    pub by_ref: bool,
    pub dims: Vec<Option<usize>>,
    pub default: Option<Vec<Token>>,
}

/// A local variable declared in a function body, recorded at parse time so
/// `static` locals can be persisted across calls.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDecl {
    pub name: String,
    pub ty: String,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: String,
    pub params: Vec<Param>,
    pub body: Vec<Token>,
    pub locals: Vec<LocalDecl>,
    pub line: usize,
}

impl FunctionDecl {
    /// Parameters without defaults; calls must supply at least this many
    /// arguments to select this overload.
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Normal,
    Constructor,
    Destructor,
    Operator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub decl: FunctionDecl,
    pub visibility: Visibility,
    pub kind: MethodKind,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_pure: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: String,
    pub dims: Vec<Option<usize>>,
    pub visibility: Visibility,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub base: Option<String>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub line: usize,
}

impl ClassDecl {
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.decl.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<(String, i64)>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Plain,
    Static,
    Input,
    Extern,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub dims: Vec<Option<usize>>,
    pub init: Option<Vec<Token>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub storage: Storage,
    pub ty: String,
    pub declarators: Vec<Declarator>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Enum(EnumDecl),
    Class(ClassDecl),
    Function(FunctionDecl),
    Variable(VariableDecl),
    /// A free-standing top-level statement, kept as tokens.
    Statement(Vec<Token>),
}
