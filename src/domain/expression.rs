//! Token-walking expression evaluator.
//!
//! Expressions execute straight off the token stream with a cursor, no
//! intermediate tree. Untaken branches of `?:`, `&&` and `||` are still
//! walked so the cursor always lands just past the full expression; in
//! that dead mode every side effect point is suppressed: no stores, no
//! calls, no undefined-name errors.

use std::cmp::Ordering;
use std::rc::Rc;

use super::builtins::ExecutionEnv;
use super::error::RuntimeError;
use super::int_math;
use super::lexer::{Token, TokenKind};
use super::runtime::{Frame, Runtime};
use super::value::{ArrayRef, ObjectRef, Value};

const ASSIGN_OPS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>="];

/// Where an evaluated value can be stored back.
#[derive(Clone)]
pub(crate) enum Place {
    Var(String),
    Elem(ArrayRef, usize),
    Field(ObjectRef, String),
}

/// An evaluated expression: the value, the storage behind it when there is
/// any, and the declared class that drives static method binding.
pub(crate) struct Evaluated {
    pub value: Value,
    pub place: Option<Place>,
    pub static_class: Option<String>,
}

impl Evaluated {
    fn rvalue(value: Value) -> Evaluated {
        Evaluated {
            value,
            place: None,
            static_class: None,
        }
    }
}

pub(crate) struct Exec<'a> {
    pub rt: &'a mut Runtime,
    pub env: &'a mut ExecutionEnv,
    pub frame: &'a mut Frame,
    pub tokens: &'a [Token],
    pub pos: usize,
    pub live: bool,
}

impl<'a> Exec<'a> {
    pub(crate) fn new(
        rt: &'a mut Runtime,
        env: &'a mut ExecutionEnv,
        frame: &'a mut Frame,
        tokens: &'a [Token],
    ) -> Exec<'a> {
        Exec {
            rt,
            env,
            frame,
            tokens,
            pos: 0,
            live: true,
        }
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub(crate) fn at(&self, kind: TokenKind, text: &str) -> bool {
        self.peek().is_some_and(|t| t.is(kind, text))
    }

    pub(crate) fn at_op(&self, text: &str) -> bool {
        self.at(TokenKind::Operator, text)
    }

    pub(crate) fn at_punct(&self, text: &str) -> bool {
        self.at(TokenKind::Punct, text)
    }

    pub(crate) fn at_keyword(&self, text: &str) -> bool {
        self.at(TokenKind::Keyword, text)
    }

    pub(crate) fn eat_op(&mut self, text: &str) -> bool {
        if self.at_op(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_punct(&mut self, text: &str) -> bool {
        if self.at_punct(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, text: &str) -> bool {
        if self.at_keyword(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_punct(&mut self, text: &str) -> Result<(), RuntimeError> {
        if self.eat_punct(text) {
            Ok(())
        } else {
            Err(self.err_here(&format!("expected {text}")))
        }
    }

    pub(crate) fn expect_identifier(&mut self, what: &str) -> Result<String, RuntimeError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => {
                let name = t.text.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.err_here(&format!("expected {what}"))),
        }
    }

    pub(crate) fn err_here(&self, message: &str) -> RuntimeError {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(t) => RuntimeError::new(format!("line {}: {message}", t.line)),
            None => RuntimeError::new(message.to_string()),
        }
    }

    /// Evaluate one full expression and return its value.
    pub(crate) fn eval_value(&mut self) -> Result<Value, RuntimeError> {
        Ok(self.assignment()?.value)
    }

    /// `{ a, b, c }` initializer list, or a single expression.
    pub(crate) fn eval_init_list(&mut self) -> Result<Vec<Value>, RuntimeError> {
        if !self.at_punct("{") {
            return Ok(vec![self.assignment()?.value]);
        }
        self.pos += 1;
        let mut items = Vec::new();
        if !self.at_punct("}") {
            loop {
                items.push(self.assignment()?.value);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct("}")?;
        Ok(items)
    }

    pub(crate) fn assignment(&mut self) -> Result<Evaluated, RuntimeError> {
        let target = self.ternary()?;
        let Some(op) = ASSIGN_OPS.iter().find(|op| self.at_op(op)).copied() else {
            return Ok(target);
        };
        self.pos += 1;
        let rhs = self.assignment()?.value;
        let value = if op == "=" {
            rhs
        } else {
            self.numeric_binary(&op[..op.len() - 1], target.value.clone(), rhs)?
        };
        if !self.live {
            return Ok(Evaluated::rvalue(value));
        }
        let Some(place) = target.place.clone() else {
            return Err(self.err_here("assignment target is not a variable"));
        };
        let stored = self.store(place, value)?;
        Ok(Evaluated {
            value: stored,
            place: target.place,
            static_class: target.static_class,
        })
    }

    fn ternary(&mut self) -> Result<Evaluated, RuntimeError> {
        let cond = self.logical_or()?;
        if !self.eat_op("?") {
            return Ok(cond);
        }
        let take = self.live && cond.value.is_truthy();
        let saved = self.live;
        self.live = take;
        let first = self.assignment();
        self.live = saved;
        let first = first?.value;
        self.expect_punct(":")?;
        self.live = saved && !take;
        let second = self.assignment();
        self.live = saved;
        let second = second?.value;
        Ok(Evaluated::rvalue(if take { first } else { second }))
    }

    fn logical_or(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.logical_and()?;
        while self.eat_op("||") {
            let truth = left.value.is_truthy();
            let saved = self.live;
            self.live = saved && !truth;
            let right = self.logical_and();
            self.live = saved;
            let right = right?;
            left = Evaluated::rvalue(Value::bool_val(truth || right.value.is_truthy()));
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.bit_or()?;
        while self.eat_op("&&") {
            let truth = left.value.is_truthy();
            let saved = self.live;
            self.live = saved && truth;
            let right = self.bit_or();
            self.live = saved;
            let right = right?;
            left = Evaluated::rvalue(Value::bool_val(truth && right.value.is_truthy()));
        }
        Ok(left)
    }

    fn bit_or(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.bit_xor()?;
        while self.at_op("|") {
            self.pos += 1;
            let right = self.bit_xor()?;
            left = self.apply_binary("|", left, right)?;
        }
        Ok(left)
    }

    fn bit_xor(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.bit_and()?;
        while self.at_op("^") {
            self.pos += 1;
            let right = self.bit_and()?;
            left = self.apply_binary("^", left, right)?;
        }
        Ok(left)
    }

    fn bit_and(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.equality()?;
        while self.at_op("&") {
            self.pos += 1;
            let right = self.equality()?;
            left = self.apply_binary("&", left, right)?;
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.relational()?;
        loop {
            let op = if self.at_op("==") {
                "=="
            } else if self.at_op("!=") {
                "!="
            } else {
                break;
            };
            self.pos += 1;
            let right = self.relational()?;
            left = self.apply_binary(op, left, right)?;
        }
        Ok(left)
    }

    fn relational(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.shift()?;
        loop {
            let op = if self.at_op("<=") {
                "<="
            } else if self.at_op(">=") {
                ">="
            } else if self.at_op("<") {
                "<"
            } else if self.at_op(">") {
                ">"
            } else {
                break;
            };
            self.pos += 1;
            let right = self.shift()?;
            left = self.apply_binary(op, left, right)?;
        }
        Ok(left)
    }

    fn shift(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.additive()?;
        loop {
            let op = if self.at_op("<<") {
                "<<"
            } else if self.at_op(">>") {
                ">>"
            } else {
                break;
            };
            self.pos += 1;
            let right = self.additive()?;
            left = self.apply_binary(op, left, right)?;
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.at_op("+") {
                "+"
            } else if self.at_op("-") {
                "-"
            } else {
                break;
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = self.apply_binary(op, left, right)?;
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.at_op("*") {
                "*"
            } else if self.at_op("/") {
                "/"
            } else if self.at_op("%") {
                "%"
            } else {
                break;
            };
            self.pos += 1;
            let right = self.unary()?;
            left = self.apply_binary(op, left, right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Evaluated, RuntimeError> {
        if self.eat_op("-") {
            let value = self.unary()?.value;
            let negated = match value {
                Value::Int(v, class) => {
                    Value::Int(int_math::wrap(class, -i128::from(v)), class)
                }
                Value::Float(f) => Value::Float(-f),
                Value::Double(d) => Value::Double(-d),
                other => Value::Double(-other.as_f64()),
            };
            return Ok(Evaluated::rvalue(negated));
        }
        if self.eat_op("+") {
            return self.unary();
        }
        if self.eat_op("!") {
            let value = self.unary()?.value;
            return Ok(Evaluated::rvalue(Value::bool_val(!value.is_truthy())));
        }
        if self.eat_op("~") {
            let value = self.unary()?.value;
            let flipped = match value {
                Value::Int(v, class) => Value::Int(int_math::wrap(class, i128::from(!v)), class),
                other => Value::long(!other.as_i64()),
            };
            return Ok(Evaluated::rvalue(flipped));
        }
        if self.at_op("++") || self.at_op("--") {
            let op = if self.at_op("++") { "++" } else { "--" };
            self.pos += 1;
            let target = self.unary()?;
            return self.apply_incdec(target, op, true);
        }
        // C-style cast to a builtin type
        if self.at_punct("(")
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Keyword)
            && self.peek_at(2).is_some_and(|t| t.is(TokenKind::Punct, ")"))
        {
            let target = self.tokens[self.pos + 1].text.clone();
            self.pos += 3;
            let value = self.unary()?.value;
            let cast = self.rt.cast_to(value, &target).map_err(|e| self.err_here(&e.to_string()))?;
            return Ok(Evaluated::rvalue(cast));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Evaluated, RuntimeError> {
        let mut current = self.primary()?;
        loop {
            if self.at_op(".") {
                self.pos += 1;
                let name = self.expect_identifier("member name")?;
                if self.eat_punct("(") {
                    current = self.member_call(current, &name)?;
                } else {
                    current = self.member_field(current, &name)?;
                }
                continue;
            }
            if self.at_punct("[") {
                self.pos += 1;
                let index = self.assignment()?.value;
                self.expect_punct("]")?;
                current = self.index(current, index)?;
                continue;
            }
            if self.at_op("++") || self.at_op("--") {
                let op = if self.at_op("++") { "++" } else { "--" };
                self.pos += 1;
                current = self.apply_incdec(current, op, false)?;
                continue;
            }
            break;
        }
        Ok(current)
    }

    fn primary(&mut self) -> Result<Evaluated, RuntimeError> {
        let Some(token) = self.peek().cloned() else {
            return Err(RuntimeError::new("unexpected end of expression"));
        };
        match token.kind {
            TokenKind::Number => {
                self.pos += 1;
                Ok(Evaluated::rvalue(parse_number(&token.text)))
            }
            TokenKind::Str => {
                self.pos += 1;
                Ok(Evaluated::rvalue(Value::Str(token.text)))
            }
            TokenKind::Keyword => self.keyword_primary(&token),
            TokenKind::Identifier => self.identifier_primary(&token),
            TokenKind::Punct if token.text == "(" => {
                self.pos += 1;
                let inner = self.assignment()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            _ => Err(self.err_here(&format!("unexpected token {}", token.text))),
        }
    }

    fn keyword_primary(&mut self, token: &Token) -> Result<Evaluated, RuntimeError> {
        match token.text.as_str() {
            "true" => {
                self.pos += 1;
                Ok(Evaluated::rvalue(Value::bool_val(true)))
            }
            "false" => {
                self.pos += 1;
                Ok(Evaluated::rvalue(Value::bool_val(false)))
            }
            "this" => {
                self.pos += 1;
                match self.frame.this.clone() {
                    Some(obj) => Ok(Evaluated {
                        value: Value::Object(obj),
                        place: None,
                        static_class: self.frame.this_class.clone(),
                    }),
                    None if !self.live => Ok(Evaluated::rvalue(Value::Empty)),
                    None => Err(self.err_here("this outside a method")),
                }
            }
            "new" => self.new_expression(),
            other => Err(self.err_here(&format!("unexpected keyword {other}"))),
        }
    }

    fn new_expression(&mut self) -> Result<Evaluated, RuntimeError> {
        self.pos += 1;
        let class = self.expect_identifier("class name")?;
        let (args, _places) = if self.eat_punct("(") {
            self.call_args()?
        } else {
            (Vec::new(), Vec::new())
        };
        if !self.live {
            return Ok(Evaluated::rvalue(Value::Empty));
        }
        let obj = self.rt.instantiate(self.env, &class, &args)?;
        Ok(Evaluated {
            value: Value::Object(obj),
            place: None,
            static_class: Some(class),
        })
    }

    fn identifier_primary(&mut self, token: &Token) -> Result<Evaluated, RuntimeError> {
        // Base::Method(...) lexes as identifier ':' ':' identifier '('
        if self.peek_at(1).is_some_and(|t| t.is(TokenKind::Punct, ":"))
            && self.peek_at(2).is_some_and(|t| t.is(TokenKind::Punct, ":"))
            && self.peek_at(3).is_some_and(|t| t.kind == TokenKind::Identifier)
            && self.peek_at(4).is_some_and(|t| t.is(TokenKind::Punct, "("))
        {
            let class = token.text.clone();
            let method = self.tokens[self.pos + 3].text.clone();
            self.pos += 5;
            let (args, places) = self.call_args()?;
            if !self.live {
                return Ok(Evaluated::rvalue(Value::Empty));
            }
            let Some(this) = self.frame.this.clone() else {
                return Err(self.err_here("base-qualified call outside a method"));
            };
            let outcome = self.rt.call_method_in(self.env, &class, &this, &method, &args)?;
            self.write_ref_outs(&places, outcome.ref_out)?;
            return Ok(Evaluated::rvalue(outcome.value));
        }
        if self.peek_at(1).is_some_and(|t| t.is(TokenKind::Punct, "(")) {
            let name = token.text.clone();
            self.pos += 2;
            return self.call_named(&name);
        }
        self.pos += 1;
        self.lookup(&token.text)
    }

    /// Resolution order: locals, then fields of `this`, then globals.
    fn lookup(&mut self, name: &str) -> Result<Evaluated, RuntimeError> {
        if let Some(slot) = self.frame.get(name) {
            let static_class = Some(slot.ty.clone()).filter(|t| self.rt.is_class(t));
            return Ok(Evaluated {
                value: slot.value.clone(),
                place: Some(Place::Var(name.to_string())),
                static_class,
            });
        }
        if let Some(this) = self.frame.this.clone() {
            let field = this.borrow().fields.get(name).cloned();
            if let Some(value) = field {
                let class = this.borrow().class.clone();
                let static_class = self
                    .rt
                    .field_type(&class, name)
                    .filter(|t| self.rt.is_class(t));
                return Ok(Evaluated {
                    value,
                    place: Some(Place::Field(this, name.to_string())),
                    static_class,
                });
            }
        }
        if let Some(slot) = self.rt.global_slot(name) {
            let static_class = Some(slot.ty.clone()).filter(|t| self.rt.is_class(t));
            return Ok(Evaluated {
                value: slot.value.clone(),
                place: Some(Place::Var(name.to_string())),
                static_class,
            });
        }
        if !self.live {
            return Ok(Evaluated::rvalue(Value::Empty));
        }
        Err(self.err_here(&format!("Variable {name} not defined")))
    }

    /// A named call with the cursor just past '('. User functions shadow
    /// builtins of the same name.
    fn call_named(&mut self, name: &str) -> Result<Evaluated, RuntimeError> {
        let (args, places) = self.call_args()?;
        if !self.live {
            return Ok(Evaluated::rvalue(Value::Empty));
        }
        if self.rt.has_function(name) {
            let outcome = self.rt.invoke_function(self.env, name, &args)?;
            self.write_ref_outs(&places, outcome.ref_out)?;
            return Ok(Evaluated::rvalue(outcome.value));
        }
        if let Some(builtin) = self.rt.registry.lookup(name) {
            let value = builtin(self.env, &args)?;
            return Ok(Evaluated::rvalue(value));
        }
        Err(self.err_here(&format!("Function {name} not found")))
    }

    fn call_args(&mut self) -> Result<(Vec<Value>, Vec<Option<Place>>), RuntimeError> {
        let mut args = Vec::new();
        let mut places = Vec::new();
        if !self.at_punct(")") {
            loop {
                let e = self.assignment()?;
                places.push(e.place);
                args.push(e.value);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        Ok((args, places))
    }

    fn write_ref_outs(
        &mut self,
        places: &[Option<Place>],
        outs: Vec<(usize, Value)>,
    ) -> Result<(), RuntimeError> {
        for (index, value) in outs {
            if let Some(Some(place)) = places.get(index) {
                self.store(place.clone(), value)?;
            }
        }
        Ok(())
    }

    fn member_call(&mut self, current: Evaluated, name: &str) -> Result<Evaluated, RuntimeError> {
        let (args, places) = self.call_args()?;
        if !self.live {
            return Ok(Evaluated::rvalue(Value::Empty));
        }
        let Value::Object(obj) = &current.value else {
            return Err(self.err_here(&format!("method {name} on a non-object value")));
        };
        let static_class = current
            .static_class
            .clone()
            .filter(|c| self.rt.is_class(c))
            .unwrap_or_else(|| obj.borrow().class.clone());
        let outcome = self.rt.call_method(self.env, &static_class, obj, name, &args)?;
        self.write_ref_outs(&places, outcome.ref_out)?;
        Ok(Evaluated::rvalue(outcome.value))
    }

    fn member_field(&mut self, current: Evaluated, name: &str) -> Result<Evaluated, RuntimeError> {
        let Value::Object(obj) = &current.value else {
            if !self.live {
                return Ok(Evaluated::rvalue(Value::Empty));
            }
            return Err(self.err_here(&format!("member {name} on a non-object value")));
        };
        let value = obj.borrow().fields.get(name).cloned();
        let Some(value) = value else {
            if !self.live {
                return Ok(Evaluated::rvalue(Value::Empty));
            }
            let class = obj.borrow().class.clone();
            return Err(self.err_here(&format!("Unknown field {name} on {class}")));
        };
        let class = obj.borrow().class.clone();
        let static_class = self
            .rt
            .field_type(&class, name)
            .filter(|t| self.rt.is_class(t));
        Ok(Evaluated {
            value,
            place: Some(Place::Field(Rc::clone(obj), name.to_string())),
            static_class,
        })
    }

    /// Element reads are lenient: out-of-range and negative indexes read as
    /// empty, which numeric contexts see as 0. Writes through the returned
    /// place stay strict.
    fn index(&mut self, current: Evaluated, index: Value) -> Result<Evaluated, RuntimeError> {
        match &current.value {
            Value::Array(arr) => match usize::try_from(index.as_i64()) {
                Ok(logical) => Ok(Evaluated {
                    value: arr.borrow().get(logical),
                    place: Some(Place::Elem(Rc::clone(arr), logical)),
                    static_class: None,
                }),
                Err(_) => Ok(Evaluated::rvalue(Value::Empty)),
            },
            _ if !self.live => Ok(Evaluated::rvalue(Value::Empty)),
            _ => Err(self.err_here("indexing a non-array value")),
        }
    }

    fn apply_incdec(
        &mut self,
        target: Evaluated,
        op: &str,
        prefix: bool,
    ) -> Result<Evaluated, RuntimeError> {
        let delta: i128 = if op == "++" { 1 } else { -1 };
        let old = target.value.clone();
        let new = match &old {
            Value::Int(v, class) => Value::Int(int_math::wrap(*class, i128::from(*v) + delta), *class),
            Value::Float(f) => Value::Float(f + delta as f32),
            Value::Double(d) => Value::Double(d + delta as f64),
            other => Value::Double(other.as_f64() + delta as f64),
        };
        if self.live {
            let Some(place) = target.place.clone() else {
                return Err(self.err_here(&format!("{op} needs a variable")));
            };
            self.store(place, new.clone())?;
        }
        Ok(if prefix {
            Evaluated {
                value: new,
                place: target.place,
                static_class: None,
            }
        } else {
            Evaluated::rvalue(old)
        })
    }

    /// Store through a place, casting to the declared type of the target.
    pub(crate) fn store(&mut self, place: Place, value: Value) -> Result<Value, RuntimeError> {
        match place {
            Place::Var(name) => {
                if let Some(ty) = self.frame.get(&name).map(|s| s.ty.clone()) {
                    let value = self.rt.cast_to(value, &ty)?;
                    self.frame.set(&name, value.clone());
                    return Ok(value);
                }
                if let Some(ty) = self.rt.global_slot(&name).map(|s| s.ty.clone()) {
                    let value = self.rt.cast_to(value, &ty)?;
                    self.rt.assign_global(&name, value.clone());
                    return Ok(value);
                }
                Err(self.err_here(&format!("Variable {name} not defined")))
            }
            Place::Elem(arr, logical) => {
                if !arr.borrow_mut().set(logical, value.clone()) {
                    return Err(self.err_here("array index out of range"));
                }
                Ok(value)
            }
            Place::Field(obj, name) => {
                let class = obj.borrow().class.clone();
                let value = match self.rt.field_type(&class, &name) {
                    Some(ty) => self.rt.cast_to(value, &ty)?,
                    None => value,
                };
                obj.borrow_mut().fields.insert(name, value.clone());
                Ok(value)
            }
        }
    }

    fn apply_binary(
        &mut self,
        op: &str,
        left: Evaluated,
        right: Evaluated,
    ) -> Result<Evaluated, RuntimeError> {
        if !self.live {
            return Ok(Evaluated::rvalue(Value::Empty));
        }
        if let Value::Object(obj) = &left.value {
            let class = left
                .static_class
                .clone()
                .filter(|c| self.rt.is_class(c))
                .unwrap_or_else(|| obj.borrow().class.clone());
            let method = format!("operator{op}");
            if self.rt.has_method(&class, &method) {
                let outcome = self.rt.call_method(self.env, &class, obj, &method, &[right.value])?;
                return Ok(Evaluated::rvalue(outcome.value));
            }
        }
        if matches!(op, "==" | "!=") {
            if let (Value::Object(a), Value::Object(b)) = (&left.value, &right.value) {
                let same = Rc::ptr_eq(a, b);
                return Ok(Evaluated::rvalue(Value::bool_val(if op == "==" {
                    same
                } else {
                    !same
                })));
            }
            // a live object reference never equals a scalar such as NULL
            if matches!(left.value, Value::Object(_)) != matches!(right.value, Value::Object(_)) {
                return Ok(Evaluated::rvalue(Value::bool_val(op == "!=")));
            }
        }
        Ok(Evaluated::rvalue(self.numeric_binary(op, left.value, right.value)?))
    }

    fn numeric_binary(&mut self, op: &str, left: Value, right: Value) -> Result<Value, RuntimeError> {
        if op == "+" && (matches!(left, Value::Str(_)) || matches!(right, Value::Str(_))) {
            return Ok(Value::Str(format!("{left}{right}")));
        }
        if matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=") {
            return Ok(compare(op, &left, &right));
        }
        if let (Value::Int(l, lc), Value::Int(r, rc)) = (&left, &right) {
            let class = int_math::promote(op, *lc, *rc);
            let (l, r) = (*l, *r);
            let wide = match op {
                "+" => i128::from(l) + i128::from(r),
                "-" => i128::from(l) - i128::from(r),
                "*" => i128::from(l) * i128::from(r),
                "/" => i128::from(int_math::div(l, r)),
                "%" => i128::from(int_math::rem(l, r)),
                "&" => i128::from(l & r),
                "|" => i128::from(l | r),
                "^" => i128::from(l ^ r),
                "<<" => i128::from(l) << ((r & 63) as u32),
                ">>" => i128::from(l >> ((r & 63) as u32)),
                other => return Err(self.err_here(&format!("unsupported operator {other}"))),
            };
            return Ok(Value::Int(int_math::wrap(class, wide), class));
        }
        if matches!(op, "&" | "|" | "^" | "<<" | ">>") {
            let (l, r) = (left.as_i64(), right.as_i64());
            let v = match op {
                "&" => l & r,
                "|" => l | r,
                "^" => l ^ r,
                "<<" => l << ((r & 63) as u32),
                _ => l >> ((r & 63) as u32),
            };
            return Ok(Value::long(v));
        }
        let (l, r) = (left.as_f64(), right.as_f64());
        let out = match op {
            "+" => l + r,
            "-" => l - r,
            "*" => l * r,
            "/" => l / r,
            "%" => {
                if r == 0.0 {
                    0.0
                } else {
                    l % r
                }
            }
            other => return Err(self.err_here(&format!("unsupported operator {other}"))),
        };
        Ok(Value::Double(out))
    }
}

fn parse_number(text: &str) -> Value {
    if text.contains('.') || text.contains('e') || text.contains('E') {
        return Value::Double(text.parse().unwrap_or(0.0));
    }
    match text.parse::<i64>() {
        Ok(v) if i64::from(i32::MIN) <= v && v <= i64::from(i32::MAX) => Value::int(v),
        Ok(v) => Value::long(v),
        Err(_) => Value::Double(text.parse().unwrap_or(0.0)),
    }
}

pub(crate) fn compare(op: &str, left: &Value, right: &Value) -> Value {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Int(a, _), Value::Int(b, _)) => a.cmp(b),
        _ => {
            let (a, b) = (left.as_f64(), right.as_f64());
            match a.partial_cmp(&b) {
                Some(o) => o,
                // NaN compares unequal to everything
                None => return Value::bool_val(op == "!="),
            }
        }
    };
    Value::bool_val(match op {
        "==" => ordering == Ordering::Equal,
        "!=" => ordering != Ordering::Equal,
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

#[cfg(test)]
mod tests {
    use crate::domain::builtins::tests::test_env;
    use crate::domain::builtins::BuiltinRegistry;
    use crate::domain::runtime::Runtime;
    use crate::domain::semantics::compile;
    use crate::domain::value::Value;

    fn eval_program(source: &str) -> Value {
        let result = compile(source);
        assert!(result.is_ok(), "compile errors: {:?}", result.errors);
        let mut rt = match Runtime::load(result, BuiltinRegistry::new()) {
            Ok(rt) => rt,
            Err(e) => panic!("{e}"),
        };
        let mut env = test_env();
        if let Err(e) = rt.init_globals(&mut env) {
            panic!("{e}");
        }
        match rt.call_function(&mut env, "Run", &[]) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    fn eval_err(source: &str) -> String {
        let result = compile(source);
        assert!(result.is_ok(), "compile errors: {:?}", result.errors);
        let mut rt = match Runtime::load(result, BuiltinRegistry::new()) {
            Ok(rt) => rt,
            Err(e) => panic!("{e}"),
        };
        let mut env = test_env();
        if let Err(e) = rt.init_globals(&mut env) {
            return e.to_string();
        }
        match rt.call_function(&mut env, "Run", &[]) {
            Ok(v) => panic!("expected an error, got {v:?}"),
            Err(e) => e.to_string(),
        }
    }

    fn eval_i64(expr: &str) -> i64 {
        eval_program(&format!("long Run() {{ return {expr}; }} void OnTick() {{}}")).as_i64()
    }

    fn eval_f64(expr: &str) -> f64 {
        eval_program(&format!("double Run() {{ return {expr}; }} void OnTick() {{}}")).as_f64()
    }

    fn eval_str(expr: &str) -> String {
        let v = eval_program(&format!("string Run() {{ return {expr}; }} void OnTick() {{}}"));
        match v {
            Value::Str(s) => s,
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn integer_division_stays_integer() {
        assert_eq!(eval_i64("7 / 2"), 3);
        assert_eq!(eval_i64("7 % 2"), 1);
        assert_eq!(eval_i64("7 / 0"), 0);
    }

    #[test]
    fn float_division_is_exact() {
        assert!((eval_f64("7.0 / 2") - 3.5).abs() < 1e-12);
        assert!((eval_f64("1 / 2.0") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn precedence_follows_c() {
        assert_eq!(eval_i64("2 + 3 * 4"), 14);
        assert_eq!(eval_i64("(2 + 3) * 4"), 20);
        assert_eq!(eval_i64("(1 << 4) | 3"), 19);
        assert_eq!(eval_i64("255 ^ 15"), 240);
        assert_eq!(eval_i64("~0"), -1);
    }

    #[test]
    fn string_concatenation_with_numbers() {
        assert_eq!(eval_str("\"a\" + 1"), "a1");
        assert_eq!(eval_str("\"pi=\" + 3.5"), "pi=3.5");
    }

    #[test]
    fn string_comparison_is_lexicographic() {
        assert_eq!(eval_i64("\"abc\" == \"abc\""), 1);
        assert_eq!(eval_i64("\"abc\" < \"abd\""), 1);
        assert_eq!(eval_i64("\"b\" > \"a\""), 1);
    }

    #[test]
    fn short_circuit_suppresses_side_effects() {
        let v = eval_program(
            "int g = 0;\n\
             int Bump() { g = g + 1; return 1; }\n\
             long Run() { bool r = false && Bump() > 0; r = true || Bump() > 0; return g; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 0);
    }

    #[test]
    fn ternary_runs_only_the_taken_branch() {
        let v = eval_program(
            "int g = 0;\n\
             int Set(int v) { g = v; return v; }\n\
             long Run() { int x = 1 > 0 ? Set(5) : Set(9); return g * 10 + x; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 55);
    }

    #[test]
    fn assignment_chains_right_to_left() {
        let v = eval_program(
            "long Run() { int a; int b; a = b = 3; return a + b; } void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 6);
    }

    #[test]
    fn compound_assignment_casts_to_declared_type() {
        let v = eval_program(
            "long Run() { int x = 10; x += 5; x /= 3; x += 0.9; return x; } void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 5);
    }

    #[test]
    fn increment_and_decrement() {
        let v = eval_program(
            "long Run() { int i = 5; int a = i++; int b = ++i; return a * 100 + b * 10 + i; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 577);
    }

    #[test]
    fn narrowing_assignment_truncates_toward_zero() {
        let v = eval_program("long Run() { int x = -7.9; return x; } void OnTick() {}");
        assert_eq!(v.as_i64(), -7);
        let v = eval_program("long Run() { bool b = 2.5; return b; } void OnTick() {}");
        assert_eq!(v.as_i64(), 1);
    }

    #[test]
    fn explicit_cast_operator() {
        assert_eq!(eval_i64("(int)9.99"), 9);
        assert_eq!(eval_i64("(char)300"), 44);
    }

    #[test]
    fn literal_forms_lex_to_numbers() {
        assert_eq!(eval_i64("'A'"), 65);
        assert_eq!(eval_i64("C'1,2,3'"), 1 + 2 * 256 + 3 * 65536);
        assert_eq!(eval_i64("D'1970.01.02 00:00:00'"), 86400);
        assert_eq!(eval_i64("0x1F"), 31);
    }

    #[test]
    fn array_reads_are_lenient_and_writes_strict() {
        let v = eval_program(
            "long Run() { int a[3]; a[0] = 4; a[2] = 6; return a[0] + a[2] + a[9] + 1; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 11);
        let err = eval_err("long Run() { int a[2]; a[5] = 1; return 0; } void OnTick() {}");
        assert!(err.contains("array index out of range"), "{err}");
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let err = eval_err("long Run() { return q; } void OnTick() {}");
        assert!(err.contains("Variable q not defined"), "{err}");
    }

    #[test]
    fn methods_and_fields() {
        let v = eval_program(
            "class Counter { public: int total; void Add(int v) { total += v; } int Total() { return total; } };\n\
             long Run() { Counter c; c.Add(3); c.Add(4); return c.Total(); }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 7);
    }

    #[test]
    fn virtual_dispatch_uses_the_instance_class() {
        let v = eval_program(
            "class Base { public: virtual int Kind() { return 1; } int Tag() { return 10; } };\n\
             class Derived : Base { public: int Kind() override { return 2; } };\n\
             long Run() { Base b = new Derived(); Derived d = new Derived(); return b.Kind() * 100 + d.Tag(); }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 210);
    }

    #[test]
    fn base_qualified_calls_skip_the_virtual_walk() {
        let v = eval_program(
            "class Base { public: virtual string Name() { return \"base\"; } };\n\
             class Derived : Base { public: virtual string Name() override { return \"derived+\" + Base::Name(); } };\n\
             string Run() { Base x = new Derived(); return x.Name(); }\n\
             void OnTick() {}",
        );
        match v {
            Value::Str(s) => assert_eq!(s, "derived+base"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn constructors_run_base_first() {
        let v = eval_program(
            "class Base { public: string log; Base() { log = \"B\"; } };\n\
             class Child : Base { public: Child() { log = log + \"C\"; } };\n\
             string Run() { Child c; return c.log; }\n\
             void OnTick() {}",
        );
        match v {
            Value::Str(s) => assert_eq!(s, "BC"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn constructor_arguments_reach_the_body() {
        let v = eval_program(
            "class P { public: int v; P(int x) { v = x * 2; } };\n\
             long Run() { P p = new P(21); return p.v; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 42);
    }

    #[test]
    fn object_equality_is_identity() {
        let v = eval_program(
            "class B { public: int x; };\n\
             long Run() { B a = new B(); B b = a; B c = new B(); int r = 0;\n\
                 if (a == b) r += 1; if (a == c) r += 10; if (a == NULL) r += 100; return r; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 1);
    }

    #[test]
    fn operator_methods_apply() {
        let v = eval_program(
            "class V { public: int x; V(int v) { x = v; } int operator+(V &o) { return x + o.x; } };\n\
             long Run() { V a = new V(1); V b = new V(2); return a + b; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 3);
    }

    #[test]
    fn static_locals_persist_between_calls() {
        let v = eval_program(
            "int Next() { static int n = 0; n++; return n; }\n\
             long Run() { Next(); Next(); return Next(); }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 3);
    }

    #[test]
    fn by_ref_parameters_write_back() {
        let v = eval_program(
            "void Twice(int &x) { x = x * 2; }\n\
             long Run() { int v = 7; Twice(v); return v; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 14);
    }

    #[test]
    fn default_arguments_fill_missing_slots() {
        let v = eval_program(
            "int Add(int a, int b = 10) { return a + b; }\n\
             long Run() { return Add(5) + Add(1, 2); }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 18);
    }

    #[test]
    fn recursion_works() {
        let v = eval_program(
            "int Fact(int n) { return n <= 1 ? 1 : n * Fact(n - 1); }\n\
             long Run() { return Fact(5); }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 120);
    }

    #[test]
    fn locals_shadow_globals() {
        let v = eval_program(
            "int g = 5;\n\
             long Run() { int g = 7; return g; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 7);
    }

    #[test]
    fn datetime_arithmetic_keeps_the_class() {
        let v = eval_program(
            "long Run() { datetime t = D'2024.01.01 00:00:00'; t = t + 60; return t; }\n\
             void OnTick() {}",
        );
        assert_eq!(v.as_i64(), 1704067260);
    }
}
