//! Declaration parser.
//!
//! Consumes the preprocessed token stream and produces top-level
//! declarations. Structural problems are fatal [`ParseError`]s, unlike the
//! advisory diagnostics the semantic checker attaches afterwards.

use super::ast::{
    ClassDecl, Declaration, Declarator, EnumDecl, Field, FunctionDecl, LocalDecl, Method,
    MethodKind, Param, Storage, VariableDecl, Visibility,
};
use super::error::ParseError;
use super::lexer::{Token, TokenKind, is_type_keyword};

pub fn parse(tokens: &[Token]) -> Result<Vec<Declaration>, ParseError> {
    Parser { tokens, pos: 0 }.run()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Result<Vec<Declaration>, ParseError> {
        let mut decls = Vec::new();
        while let Some(tok) = self.peek() {
            if tok.is(TokenKind::Punct, ";") {
                self.pos += 1;
                continue;
            }
            decls.push(self.declaration()?);
        }
        Ok(decls)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at_text(&self, text: &str) -> bool {
        self.peek().is_some_and(|t| t.text == text)
    }

    fn eat_text(&mut self, text: &str) -> bool {
        if self.at_text(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn here(&self) -> (usize, usize) {
        match self.peek().or_else(|| self.tokens.last()) {
            Some(t) => (t.line, t.column),
            None => (1, 1),
        }
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        let (line, column) = self.here();
        ParseError::new(message, line, column)
    }

    fn expect_text(&mut self, text: &str) -> Result<&'a Token, ParseError> {
        match self.peek() {
            Some(t) if t.text == text => {
                self.pos += 1;
                Ok(t)
            }
            Some(t) => Err(self.err(format!("expected '{text}' but found '{}'", t.text))),
            None => Err(self.err(format!("expected '{text}' but found end of input"))),
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<&'a Token, ParseError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => {
                self.pos += 1;
                Ok(t)
            }
            Some(t) => Err(self.err(format!("expected {what} but found '{}'", t.text))),
            None => Err(self.err(format!("expected {what} but found end of input"))),
        }
    }

    /// A type-position token: a primitive keyword or a user type name.
    fn is_type_token(tok: &Token) -> bool {
        (tok.kind == TokenKind::Keyword && is_type_keyword(&tok.text))
            || tok.kind == TokenKind::Identifier
    }

    fn declaration(&mut self) -> Result<Declaration, ParseError> {
        let tok = match self.peek() {
            Some(t) => t,
            None => return Err(self.err("expected declaration")),
        };
        if tok.is(TokenKind::Keyword, "enum") {
            return Ok(Declaration::Enum(self.enum_decl()?));
        }
        if tok.is(TokenKind::Keyword, "class") || tok.is(TokenKind::Keyword, "struct") {
            return Ok(Declaration::Class(self.class_decl()?));
        }
        let storage = match tok.text.as_str() {
            "static" => Some(Storage::Static),
            "input" => Some(Storage::Input),
            "extern" => Some(Storage::Extern),
            _ => None,
        };
        if let Some(storage) = storage {
            self.pos += 1;
            self.eat_text("const");
            return Ok(Declaration::Variable(self.variable_decl(storage)?));
        }
        if tok.is(TokenKind::Keyword, "const") {
            self.pos += 1;
            return Ok(Declaration::Variable(self.variable_decl(Storage::Plain)?));
        }
        // `type name (` opens a function, `type name` anything else a
        // variable; everything else is a free-standing statement
        if Self::is_type_token(tok)
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Identifier)
        {
            if self.peek_at(2).is_some_and(|t| t.is(TokenKind::Punct, "(")) {
                return Ok(Declaration::Function(self.function_decl()?));
            }
            return Ok(Declaration::Variable(self.variable_decl(Storage::Plain)?));
        }
        Ok(Declaration::Statement(self.capture_statement()?))
    }

    fn enum_decl(&mut self) -> Result<EnumDecl, ParseError> {
        let line = self.here().0;
        self.expect_text("enum")?;
        let name = self.expect_identifier("enum name")?.text.clone();
        self.expect_text("{")?;
        let mut members = Vec::new();
        let mut next_value = 0i64;
        while !self.at_text("}") {
            let member = self.expect_identifier("enum member")?.text.clone();
            if self.eat_text("=") {
                let negative = self.eat_text("-");
                let value_tok = match self.peek() {
                    Some(t) if t.kind == TokenKind::Number => self.advance().cloned(),
                    _ => None,
                };
                let value: i64 = value_tok
                    .as_ref()
                    .and_then(|t| t.text.parse::<i64>().ok())
                    .ok_or_else(|| self.err(format!("expected integer value for enum member {member}")))?;
                next_value = if negative { -value } else { value };
            }
            members.push((member, next_value));
            next_value += 1;
            if !self.eat_text(",") {
                break;
            }
        }
        self.expect_text("}")?;
        self.eat_text(";");
        Ok(EnumDecl {
            name,
            members,
            line,
        })
    }

    fn class_decl(&mut self) -> Result<ClassDecl, ParseError> {
        let line = self.here().0;
        self.pos += 1; // class or struct
        let name = self.expect_identifier("class name")?.text.clone();
        let mut base = None;
        if self.eat_text(":") {
            // an optional access specifier precedes the base name
            if self.at_text("public") || self.at_text("private") || self.at_text("protected") {
                self.pos += 1;
            }
            base = Some(self.expect_identifier("base class name")?.text.clone());
        }
        self.expect_text("{")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut visibility = Visibility::Private;
        while !self.at_text("}") {
            if self.peek().is_none() {
                return Err(self.err(format!("unterminated class {name}")));
            }
            let vis_label = match self.peek().map(|t| t.text.as_str()) {
                Some("public") => Some(Visibility::Public),
                Some("private") => Some(Visibility::Private),
                Some("protected") => Some(Visibility::Protected),
                _ => None,
            };
            if let Some(vis) = vis_label {
                if self.peek_at(1).is_some_and(|t| t.is(TokenKind::Punct, ":")) {
                    self.pos += 2;
                    visibility = vis;
                    continue;
                }
            }
            if self.eat_text(";") {
                continue;
            }
            self.class_member(&name, visibility, &mut fields, &mut methods)?;
        }
        self.expect_text("}")?;
        self.eat_text(";");
        Ok(ClassDecl {
            name,
            base,
            fields,
            methods,
            line,
        })
    }

    fn class_member(
        &mut self,
        class_name: &str,
        visibility: Visibility,
        fields: &mut Vec<Field>,
        methods: &mut Vec<Method>,
    ) -> Result<(), ParseError> {
        let mut is_static = false;
        let mut is_virtual = false;
        loop {
            if self.eat_text("static") {
                is_static = true;
            } else if self.eat_text("virtual") {
                is_virtual = true;
            } else if self.eat_text("const") {
            } else {
                break;
            }
        }
        // destructor
        if self.at_text("~") {
            self.pos += 1;
            let name = self.expect_identifier("destructor name")?.text.clone();
            if name != class_name {
                return Err(self.err(format!("destructor ~{name} does not match class {class_name}")));
            }
            let decl = self.method_signature_and_body(format!("~{name}"), "void".into())?;
            methods.push(Method {
                decl,
                visibility,
                kind: MethodKind::Destructor,
                is_static,
                is_virtual,
                is_override: false,
                is_pure: false,
            });
            return Ok(());
        }
        // constructor: class name followed directly by a parameter list
        if self.at_text(class_name)
            && self.peek_at(1).is_some_and(|t| t.is(TokenKind::Punct, "("))
        {
            let name = self.advance().map(|t| t.text.clone()).unwrap_or_default();
            let decl = self.method_signature_and_body(name, class_name.to_string())?;
            methods.push(Method {
                decl,
                visibility,
                kind: MethodKind::Constructor,
                is_static,
                is_virtual,
                is_override: false,
                is_pure: false,
            });
            return Ok(());
        }
        let ty = match self.peek() {
            Some(t) if Self::is_type_token(t) => {
                self.pos += 1;
                t.text.clone()
            }
            _ => return Err(self.err("expected member type")),
        };
        // operator method, stored under its symbolic name
        if self.eat_text("operator") {
            let mut op = String::new();
            while let Some(t) = self.peek() {
                if t.is(TokenKind::Punct, "(") {
                    break;
                }
                op.push_str(&t.text);
                self.pos += 1;
            }
            if op.is_empty() {
                return Err(self.err("expected operator symbol"));
            }
            let decl = self.method_signature_and_body(format!("operator{op}"), ty)?;
            methods.push(Method {
                decl,
                visibility,
                kind: MethodKind::Operator,
                is_static,
                is_virtual,
                is_override: false,
                is_pure: false,
            });
            return Ok(());
        }
        let name = self.expect_identifier("member name")?.text.clone();
        if self.at_text("(") {
            let mut decl = self.method_signature_raw(name, ty)?;
            self.eat_text("const");
            let is_override = self.eat_text("override");
            let mut is_pure = false;
            if self.eat_text("=") {
                // pure virtual marker
                self.expect_text("0")?;
                self.expect_text(";")?;
                is_pure = true;
            } else if self.at_text("{") {
                decl.body = self.capture_block()?;
                decl.locals = scan_locals(&decl.body);
            } else {
                self.expect_text(";")?;
            }
            methods.push(Method {
                decl,
                visibility,
                kind: MethodKind::Normal,
                is_static,
                is_virtual,
                is_override,
                is_pure,
            });
            return Ok(());
        }
        // field declarators
        let mut field_name = name;
        loop {
            let dims = self.dimensions()?;
            fields.push(Field {
                name: field_name,
                ty: ty.clone(),
                dims,
                visibility,
                is_static,
            });
            if self.eat_text(",") {
                field_name = self.expect_identifier("field name")?.text.clone();
                continue;
            }
            break;
        }
        self.expect_text(";")?;
        Ok(())
    }

    fn method_signature_raw(
        &mut self,
        name: String,
        return_type: String,
    ) -> Result<FunctionDecl, ParseError> {
        let line = self.here().0;
        let params = self.params()?;
        Ok(FunctionDecl {
            name,
            return_type,
            params,
            body: Vec::new(),
            locals: Vec::new(),
            line,
        })
    }

    fn method_signature_and_body(
        &mut self,
        name: String,
        return_type: String,
    ) -> Result<FunctionDecl, ParseError> {
        let mut decl = self.method_signature_raw(name, return_type)?;
        self.eat_text("const");
        if self.at_text("{") {
            decl.body = self.capture_block()?;
            decl.locals = scan_locals(&decl.body);
        } else {
            self.expect_text(";")?;
        }
        Ok(decl)
    }

    fn function_decl(&mut self) -> Result<FunctionDecl, ParseError> {
        let line = self.here().0;
        let return_type = self.advance().map(|t| t.text.clone()).unwrap_or_default();
        let name = self.expect_identifier("function name")?.text.clone();
        let params = self.params()?;
        let mut body = Vec::new();
        let mut locals = Vec::new();
        if self.at_text("{") {
            body = self.capture_block()?;
            locals = scan_locals(&body);
        } else {
            self.expect_text(";")?;
        }
        Ok(FunctionDecl {
            name,
            return_type,
            params,
            body,
            locals,
            line,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect_text("(")?;
        let mut params = Vec::new();
        if self.eat_text(")") {
            return Ok(params);
        }
        loop {
            self.eat_text("const");
            let ty = match self.peek() {
                Some(t) if Self::is_type_token(t) => {
                    self.pos += 1;
                    t.text.clone()
                }
                _ => return Err(self.err("expected parameter type")),
            };
            let by_ref = self.eat_text("&");
            let name = match self.peek() {
                Some(t) if t.kind == TokenKind::Identifier => {
                    self.pos += 1;
                    t.text.clone()
                }
                // prototypes may omit parameter names
                _ => String::new(),
            };
            let dims = self.dimensions()?;
            let mut default = None;
            if self.eat_text("=") {
                let mut depth = 0usize;
                let mut toks = Vec::new();
                while let Some(t) = self.peek() {
                    match t.text.as_str() {
                        "(" | "[" => depth += 1,
                        ")" | "]" if depth == 0 => break,
                        ")" | "]" => depth -= 1,
                        "," if depth == 0 => break,
                        _ => {}
                    }
                    toks.push(t.clone());
                    self.pos += 1;
                }
                if toks.is_empty() {
                    return Err(self.err(format!("expected default value for parameter {name}")));
                }
                default = Some(toks);
            }
            params.push(Param {
                name,
                ty,
                by_ref,
                dims,
                default,
            });
            if self.eat_text(",") {
                continue;
            }
            self.expect_text(")")?;
            break;
        }
        Ok(params)
    }

    fn dimensions(&mut self) -> Result<Vec<Option<usize>>, ParseError> {
        let mut dims = Vec::new();
        while self.eat_text("[") {
            if self.eat_text("]") {
                dims.push(None);
                continue;
            }
            let size_tok = match self.peek() {
                Some(t) if t.kind == TokenKind::Number => self.advance().cloned(),
                _ => None,
            };
            let size = size_tok
                .as_ref()
                .and_then(|t| t.text.parse::<usize>().ok())
                .ok_or_else(|| self.err("expected array dimension"))?;
            self.expect_text("]")?;
            dims.push(Some(size));
        }
        Ok(dims)
    }

    fn variable_decl(&mut self, storage: Storage) -> Result<VariableDecl, ParseError> {
        let line = self.here().0;
        let ty = match self.peek() {
            Some(t) if Self::is_type_token(t) => {
                self.pos += 1;
                t.text.clone()
            }
            _ => return Err(self.err("expected variable type")),
        };
        let mut declarators = Vec::new();
        loop {
            let name = self.expect_identifier("variable name")?.text.clone();
            let dims = self.dimensions()?;
            let mut init = None;
            if self.eat_text("=") {
                let mut depth = 0usize;
                let mut toks = Vec::new();
                while let Some(t) = self.peek() {
                    match t.text.as_str() {
                        "(" | "[" | "{" => depth += 1,
                        ")" | "]" | "}" => {
                            if depth == 0 {
                                break;
                            }
                            depth -= 1;
                        }
                        "," | ";" if depth == 0 => break,
                        _ => {}
                    }
                    toks.push(t.clone());
                    self.pos += 1;
                }
                if toks.is_empty() {
                    return Err(self.err(format!("expected initializer for {name}")));
                }
                init = Some(toks);
            }
            declarators.push(Declarator { name, dims, init });
            if self.eat_text(",") {
                continue;
            }
            self.expect_text(";")?;
            break;
        }
        Ok(VariableDecl {
            storage,
            ty,
            declarators,
            line,
        })
    }

    /// Capture a `{ ... }` block, returning the tokens between the braces.
    fn capture_block(&mut self) -> Result<Vec<Token>, ParseError> {
        self.expect_text("{")?;
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(t) = self.advance() {
            match t.text.as_str() {
                "{" => depth += 1,
                "}" => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.tokens[start..self.pos - 1].to_vec());
                    }
                }
                _ => {}
            }
        }
        self.pos = start;
        Err(self.err("unterminated block"))
    }

    /// Capture one free-standing statement: a balanced block, or tokens
    /// through the terminating ';'.
    fn capture_statement(&mut self) -> Result<Vec<Token>, ParseError> {
        let start = self.pos;
        if self.at_text("{") {
            self.capture_block()?;
            return Ok(self.tokens[start..self.pos].to_vec());
        }
        // control statements carry their own blocks; capture keyword-aware
        let control = self
            .peek()
            .is_some_and(|t| matches!(t.text.as_str(), "if" | "for" | "while" | "do" | "switch"));
        let mut expect_do_while = self.at_text("do");
        let mut depth = 0usize;
        while let Some(t) = self.peek() {
            match t.text.as_str() {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    if depth == 0 {
                        return Err(self.err(format!("unexpected '{}'", t.text)));
                    }
                    depth -= 1;
                    if depth == 0 && control && t.text == "}" {
                        // an if/for/while body block ends the statement,
                        // unless an else or do-while tail follows
                        self.pos += 1;
                        if self.at_text("else") {
                            continue;
                        }
                        if expect_do_while && self.at_text("while") {
                            expect_do_while = false;
                            continue;
                        }
                        return Ok(self.tokens[start..self.pos].to_vec());
                    }
                }
                ";" if depth == 0 => {
                    self.pos += 1;
                    if control && self.at_text("else") {
                        continue;
                    }
                    if expect_do_while && self.at_text("while") {
                        expect_do_while = false;
                        continue;
                    }
                    return Ok(self.tokens[start..self.pos].to_vec());
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.err("unterminated statement"))
    }
}

/// Scan a captured body for top-level local declarations, so `static`
/// locals can be persisted across calls without re-parsing.
fn scan_locals(body: &[Token]) -> Vec<LocalDecl> {
    let mut locals = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let is_static = body[i].is(TokenKind::Keyword, "static");
        let j = if is_static { i + 1 } else { i };
        let type_ok = body
            .get(j)
            .is_some_and(|t| t.kind == TokenKind::Keyword && is_type_keyword(&t.text));
        if type_ok {
            if let Some(name_tok) = body.get(j + 1) {
                if name_tok.kind == TokenKind::Identifier {
                    let follows = body.get(j + 2).map(|t| t.text.as_str());
                    if matches!(follows, Some("=" | ";" | "," | "[")) {
                        locals.push(LocalDecl {
                            name: name_tok.text.clone(),
                            ty: body[j].text.clone(),
                            is_static,
                        });
                        i = j + 2;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }
    locals
}
