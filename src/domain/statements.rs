//! Statement execution over the token stream.
//!
//! Statements run in place with the same cursor the expression evaluator
//! uses. Control flow unwinds through the `Flow` result: loops re-seek the
//! cursor to their condition, untaken branches are skipped structurally by
//! brace and parenthesis balance.

use super::error::RuntimeError;
use super::expression::{compare, Exec};
use super::lexer::{is_type_keyword, TokenKind};
use super::runtime::Slot;
use super::value::{new_array, SeriesBuffer, Value};

/// Hard ceiling per loop statement, so a runaway `while(true)` aborts the
/// run instead of hanging the host.
const LOOP_LIMIT: u64 = 10_000_000;

/// How a statement finished.
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Exec<'_> {
    /// Run statements until the tokens run out or control flow unwinds.
    pub(crate) fn run_block(&mut self) -> Result<Flow, RuntimeError> {
        while self.pos < self.tokens.len() {
            let flow = self.statement()?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn statement(&mut self) -> Result<Flow, RuntimeError> {
        if self.eat_punct(";") {
            return Ok(Flow::Normal);
        }
        if self.at_punct("{") {
            return self.block();
        }
        if self.at_keyword("if") {
            return self.if_statement();
        }
        if self.at_keyword("while") {
            return self.while_statement();
        }
        if self.at_keyword("do") {
            return self.do_while_statement();
        }
        if self.at_keyword("for") {
            return self.for_statement();
        }
        if self.at_keyword("switch") {
            return self.switch_statement();
        }
        if self.eat_keyword("break") {
            self.eat_punct(";");
            return Ok(Flow::Break);
        }
        if self.eat_keyword("continue") {
            self.eat_punct(";");
            return Ok(Flow::Continue);
        }
        if self.at_keyword("return") {
            return self.return_statement();
        }
        if self.at_keyword("delete") {
            return self.delete_statement();
        }
        if self.starts_declaration() {
            return self.declaration_statement();
        }
        self.expression_statement()
    }

    fn block(&mut self) -> Result<Flow, RuntimeError> {
        self.expect_punct("{")?;
        self.frame.push_scope();
        let mut flow = Flow::Normal;
        while !self.at_punct("}") {
            if self.pos >= self.tokens.len() {
                self.frame.pop_scope();
                return Err(self.err_here("unterminated block"));
            }
            flow = self.statement()?;
            if !matches!(flow, Flow::Normal) {
                break;
            }
        }
        if matches!(flow, Flow::Normal) {
            self.pos += 1; // closing brace
        } else {
            self.skip_to_block_end()?;
        }
        self.frame.pop_scope();
        Ok(flow)
    }

    fn if_statement(&mut self) -> Result<Flow, RuntimeError> {
        self.pos += 1;
        self.expect_punct("(")?;
        let cond = self.eval_value()?.is_truthy();
        self.expect_punct(")")?;
        if cond {
            let flow = self.statement()?;
            if self.at_keyword("else") {
                self.pos += 1;
                self.skip_statement()?;
            }
            Ok(flow)
        } else {
            self.skip_statement()?;
            if self.at_keyword("else") {
                self.pos += 1;
                self.statement()
            } else {
                Ok(Flow::Normal)
            }
        }
    }

    fn while_statement(&mut self) -> Result<Flow, RuntimeError> {
        self.pos += 1;
        let cond_start = self.pos;
        let mut iterations = 0u64;
        loop {
            self.pos = cond_start;
            self.expect_punct("(")?;
            let cond = self.eval_value()?.is_truthy();
            self.expect_punct(")")?;
            if !cond {
                self.skip_statement()?;
                return Ok(Flow::Normal);
            }
            iterations += 1;
            if iterations > LOOP_LIMIT {
                return Err(self.err_here("loop iteration limit exceeded"));
            }
            match self.statement()? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Continue | Flow::Normal => {}
            }
        }
    }

    fn do_while_statement(&mut self) -> Result<Flow, RuntimeError> {
        self.pos += 1;
        let body_start = self.pos;
        let mut iterations = 0u64;
        loop {
            self.pos = body_start;
            let flow = self.statement()?;
            if let Flow::Return(v) = flow {
                return Ok(Flow::Return(v));
            }
            let broke = matches!(flow, Flow::Break);
            if !self.eat_keyword("while") {
                return Err(self.err_here("expected while"));
            }
            self.expect_punct("(")?;
            // after break the condition is walked but not acted on
            let saved = self.live;
            self.live = saved && !broke;
            let cond = self.eval_value();
            self.live = saved;
            let cond = cond?.is_truthy();
            self.expect_punct(")")?;
            self.eat_punct(";");
            if broke || !cond {
                return Ok(Flow::Normal);
            }
            iterations += 1;
            if iterations > LOOP_LIMIT {
                return Err(self.err_here("loop iteration limit exceeded"));
            }
        }
    }

    fn for_statement(&mut self) -> Result<Flow, RuntimeError> {
        self.pos += 1;
        self.expect_punct("(")?;
        self.frame.push_scope();
        let result = self.for_header_and_loop();
        self.frame.pop_scope();
        result
    }

    fn for_header_and_loop(&mut self) -> Result<Flow, RuntimeError> {
        if !self.eat_punct(";") {
            if self.starts_declaration() {
                self.declaration_statement()?;
            } else {
                loop {
                    self.eval_value()?;
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct(";")?;
            }
        }
        let cond_start = self.pos;
        let mut iterations = 0u64;
        loop {
            self.pos = cond_start;
            let cond = if self.at_punct(";") {
                true
            } else {
                self.eval_value()?.is_truthy()
            };
            self.expect_punct(";")?;
            let step_start = self.pos;
            self.skip_to_close_paren()?;
            if !cond {
                self.skip_statement()?;
                return Ok(Flow::Normal);
            }
            iterations += 1;
            if iterations > LOOP_LIMIT {
                return Err(self.err_here("loop iteration limit exceeded"));
            }
            match self.statement()? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Continue | Flow::Normal => {}
            }
            self.pos = step_start;
            if !self.at_punct(")") {
                loop {
                    self.eval_value()?;
                    if !self.eat_punct(",") {
                        break;
                    }
                }
            }
        }
    }

    fn switch_statement(&mut self) -> Result<Flow, RuntimeError> {
        self.pos += 1;
        self.expect_punct("(")?;
        let scrutinee = self.eval_value()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let (arms, default_body, close) = self.scan_switch(self.pos)?;
        let mut target = None;
        for (const_start, body_start) in &arms {
            self.pos = *const_start;
            let label = self.eval_value()?;
            if compare("==", &scrutinee, &label).is_truthy() {
                target = Some(*body_start);
                break;
            }
        }
        match target.or(default_body) {
            Some(start) => self.run_switch_body(start, close),
            None => {
                self.pos = close + 1;
                Ok(Flow::Normal)
            }
        }
    }

    /// Positions of `case` constants and arm bodies inside a switch block,
    /// plus the `default` body and the closing brace.
    #[allow(clippy::type_complexity)]
    fn scan_switch(
        &self,
        block_start: usize,
    ) -> Result<(Vec<(usize, usize)>, Option<usize>, usize), RuntimeError> {
        let mut arms = Vec::new();
        let mut default_body = None;
        let mut depth = 0usize;
        let mut i = block_start;
        while i < self.tokens.len() {
            let t = &self.tokens[i];
            if t.is(TokenKind::Punct, "{") {
                depth += 1;
            } else if t.is(TokenKind::Punct, "}") {
                if depth == 0 {
                    return Ok((arms, default_body, i));
                }
                depth -= 1;
            } else if depth == 0 && t.is(TokenKind::Keyword, "case") {
                let const_start = i + 1;
                let mut j = const_start;
                while j < self.tokens.len() && !self.tokens[j].is(TokenKind::Punct, ":") {
                    j += 1;
                }
                arms.push((const_start, j + 1));
                i = j + 1;
                continue;
            } else if depth == 0 && t.is(TokenKind::Keyword, "default") {
                let mut j = i + 1;
                if self.tokens.get(j).is_some_and(|t| t.is(TokenKind::Punct, ":")) {
                    j += 1;
                }
                default_body = Some(j);
                i = j;
                continue;
            }
            i += 1;
        }
        Err(RuntimeError::new("unterminated switch"))
    }

    /// Execute from a matched arm to the end of the switch block, falling
    /// through labels until `break` or the closing brace.
    fn run_switch_body(&mut self, start: usize, close: usize) -> Result<Flow, RuntimeError> {
        self.pos = start;
        self.frame.push_scope();
        let mut flow = Flow::Normal;
        while self.pos < close {
            if self.at_keyword("case") {
                self.pos += 1;
                while self.pos < close && !self.at_punct(":") {
                    self.pos += 1;
                }
                self.eat_punct(":");
                continue;
            }
            if self.at_keyword("default") {
                self.pos += 1;
                self.eat_punct(":");
                continue;
            }
            flow = self.statement()?;
            if !matches!(flow, Flow::Normal) {
                break;
            }
        }
        self.frame.pop_scope();
        self.pos = close + 1;
        match flow {
            Flow::Break | Flow::Normal => Ok(Flow::Normal),
            other => Ok(other),
        }
    }

    fn return_statement(&mut self) -> Result<Flow, RuntimeError> {
        self.pos += 1;
        if self.eat_punct(";") {
            return Ok(Flow::Return(Value::Empty));
        }
        let value = self.eval_value()?;
        self.eat_punct(";");
        Ok(Flow::Return(value))
    }

    fn delete_statement(&mut self) -> Result<Flow, RuntimeError> {
        self.pos += 1;
        let target = self.assignment()?;
        self.eat_punct(";");
        if let Value::Object(obj) = &target.value {
            self.rt.destroy(self.env, obj)?;
            if let Some(place) = target.place {
                // the reference is stale after delete
                self.store(place, Value::Empty)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn starts_declaration(&self) -> bool {
        let mut i = self.pos;
        while self.tokens.get(i).is_some_and(|t| {
            t.kind == TokenKind::Keyword
                && matches!(t.text.as_str(), "static" | "const" | "input" | "extern")
        }) {
            i += 1;
        }
        let Some(ty) = self.tokens.get(i) else {
            return false;
        };
        let is_type = (ty.kind == TokenKind::Keyword
            && is_type_keyword(&ty.text)
            && ty.text != "void")
            || (ty.kind == TokenKind::Identifier
                && (self.rt.is_class(&ty.text) || self.rt.is_enum(&ty.text)));
        is_type
            && self
                .tokens
                .get(i + 1)
                .is_some_and(|t| t.kind == TokenKind::Identifier)
    }

    fn declaration_statement(&mut self) -> Result<Flow, RuntimeError> {
        let mut is_static = false;
        loop {
            if self.eat_keyword("static") {
                is_static = true;
                continue;
            }
            if self.eat_keyword("const") || self.eat_keyword("input") || self.eat_keyword("extern")
            {
                continue;
            }
            break;
        }
        let ty = match self.peek() {
            Some(t) => t.text.clone(),
            None => return Err(self.err_here("expected type")),
        };
        self.pos += 1;
        loop {
            let name = self.expect_identifier("variable name")?;
            let mut dims: Vec<Option<usize>> = Vec::new();
            while self.eat_punct("[") {
                if self.eat_punct("]") {
                    dims.push(None);
                } else {
                    let size = self.eval_value()?.as_i64();
                    self.expect_punct("]")?;
                    dims.push(usize::try_from(size).ok());
                }
            }
            if dims.len() > 1 {
                return Err(self.err_here(&format!(
                    "multidimensional array {name} is not supported"
                )));
            }
            if is_static && self.frame.has_static(&name) {
                // initialized in an earlier call; walk the initializer dead
                if self.eat_op("=") {
                    let saved = self.live;
                    self.live = false;
                    let walk = self.assignment();
                    self.live = saved;
                    walk?;
                }
            } else {
                let value = self.declared_value(&ty, &dims)?;
                let slot = Slot::new(value, ty.clone());
                if is_static {
                    self.frame.declare_static(&name, slot);
                } else {
                    self.frame.declare(&name, slot);
                }
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(";")?;
        Ok(Flow::Normal)
    }

    fn declared_value(&mut self, ty: &str, dims: &[Option<usize>]) -> Result<Value, RuntimeError> {
        if self.eat_op("=") {
            if dims.is_empty() {
                let v = self.eval_value()?;
                return self.rt.cast_to(v, ty);
            }
            let items = self.eval_init_list()?;
            let mut buffer = SeriesBuffer::new();
            for item in items {
                buffer.push(self.rt.cast_to(item, ty)?);
            }
            if let Some(Some(size)) = dims.first() {
                while buffer.len() < *size {
                    buffer.push(self.rt.default_value(ty));
                }
            }
            return Ok(Value::Array(new_array(buffer)));
        }
        if !dims.is_empty() {
            let len = dims[0].unwrap_or(0);
            return Ok(Value::Array(new_array(SeriesBuffer::with_len(
                len,
                self.rt.default_value(ty),
            ))));
        }
        if self.rt.is_class(ty) {
            let obj = self.rt.instantiate(self.env, ty, &[])?;
            return Ok(Value::Object(obj));
        }
        Ok(self.rt.default_value(ty))
    }

    fn expression_statement(&mut self) -> Result<Flow, RuntimeError> {
        loop {
            self.eval_value()?;
            if !self.eat_punct(",") {
                break;
            }
        }
        self.eat_punct(";");
        Ok(Flow::Normal)
    }

    /// Skip one statement without evaluating anything.
    fn skip_statement(&mut self) -> Result<(), RuntimeError> {
        if self.eat_punct(";") {
            return Ok(());
        }
        if self.eat_punct("{") {
            return self.skip_to_block_end();
        }
        if self.eat_keyword("if") {
            self.skip_parens()?;
            self.skip_statement()?;
            if self.at_keyword("else") {
                self.pos += 1;
                self.skip_statement()?;
            }
            return Ok(());
        }
        if self.eat_keyword("while") || self.eat_keyword("switch") || self.eat_keyword("for") {
            self.skip_parens()?;
            return self.skip_statement();
        }
        if self.eat_keyword("do") {
            self.skip_statement()?;
            if self.eat_keyword("while") {
                self.skip_parens()?;
            }
            self.eat_punct(";");
            return Ok(());
        }
        let mut depth = 0usize;
        while let Some(t) = self.peek() {
            if t.kind == TokenKind::Punct {
                match t.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        if depth == 0 {
                            // end of the enclosing block
                            return Ok(());
                        }
                        depth -= 1;
                    }
                    ";" if depth == 0 => {
                        self.pos += 1;
                        return Ok(());
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Consume through the '}' matching an already-entered '{'.
    fn skip_to_block_end(&mut self) -> Result<(), RuntimeError> {
        let mut depth = 1usize;
        while let Some(t) = self.peek() {
            if t.is(TokenKind::Punct, "{") {
                depth += 1;
            } else if t.is(TokenKind::Punct, "}") {
                depth -= 1;
                if depth == 0 {
                    self.pos += 1;
                    return Ok(());
                }
            }
            self.pos += 1;
        }
        Err(RuntimeError::new("unterminated block"))
    }

    fn skip_parens(&mut self) -> Result<(), RuntimeError> {
        self.expect_punct("(")?;
        let mut depth = 1usize;
        while let Some(t) = self.peek() {
            if t.is(TokenKind::Punct, "(") {
                depth += 1;
            } else if t.is(TokenKind::Punct, ")") {
                depth -= 1;
                if depth == 0 {
                    self.pos += 1;
                    return Ok(());
                }
            }
            self.pos += 1;
        }
        Err(RuntimeError::new("unterminated parenthesis"))
    }

    /// Skip expressions up to the ')' closing a `for` header.
    fn skip_to_close_paren(&mut self) -> Result<(), RuntimeError> {
        let mut depth = 0usize;
        while let Some(t) = self.peek() {
            if t.is(TokenKind::Punct, "(") {
                depth += 1;
            } else if t.is(TokenKind::Punct, ")") {
                if depth == 0 {
                    self.pos += 1;
                    return Ok(());
                }
                depth -= 1;
            }
            self.pos += 1;
        }
        Err(RuntimeError::new("unterminated for header"))
    }
}
