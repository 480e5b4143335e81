//! Loaded-program state and call machinery.
//!
//! `Runtime` owns everything a compiled program needs to execute: function
//! and class tables, global storage, persisted `static` locals and the
//! builtin registry. The token-walking evaluator lives in `expression` and
//! `statements`; this module provides the frames it runs in and the entry
//! points the backtest loop calls.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use super::ast::{Declaration, Declarator, FunctionDecl, Method, MethodKind, Storage, VariableDecl};
use super::builtins::{BuiltinRegistry, ExecutionEnv};
use super::casting::cast;
use super::error::RuntimeError;
use super::expression::Exec;
use super::lexer::Token;
use super::semantics::{ClassInfo, CompileResult, MethodRef, ProgramType};
use super::statements::Flow;
use super::value::{new_array, Instance, IntClass, ObjectRef, SeriesBuffer, Value};

pub const MAX_CALL_DEPTH: usize = 256;

/// Identifier constants visible to every program.
const PREDEFINED: &[(&str, i64)] = &[
    ("NULL", 0),
    ("EMPTY", -1),
    ("EMPTY_VALUE", 2147483647),
    ("CLR_NONE", -1),
    ("WHOLE_ARRAY", 0),
    ("INIT_SUCCEEDED", 0),
    ("INIT_FAILED", 1),
    ("OP_BUY", 0),
    ("OP_SELL", 1),
    ("OP_BUYLIMIT", 2),
    ("OP_SELLLIMIT", 3),
    ("OP_BUYSTOP", 4),
    ("OP_SELLSTOP", 5),
    ("MODE_TRADES", 0),
    ("MODE_HISTORY", 1),
    ("SELECT_BY_POS", 0),
    ("SELECT_BY_TICKET", 1),
    ("PRICE_CLOSE", 0),
    ("PRICE_OPEN", 1),
    ("PRICE_HIGH", 2),
    ("PRICE_LOW", 3),
    ("PRICE_MEDIAN", 4),
    ("PRICE_TYPICAL", 5),
    ("PRICE_WEIGHTED", 6),
    ("MODE_SMA", 0),
    ("MODE_EMA", 1),
    ("MODE_MAIN", 0),
    ("MODE_SIGNAL", 1),
    ("MODE_OPEN", 0),
    ("MODE_LOW", 1),
    ("MODE_HIGH", 2),
    ("MODE_CLOSE", 3),
    ("MODE_VOLUME", 4),
    ("MODE_TIME", 5),
    ("MODE_BID", 9),
    ("MODE_ASK", 10),
    ("MODE_POINT", 11),
    ("MODE_DIGITS", 12),
    ("MODE_SPREAD", 13),
    ("PERIOD_M1", 1),
    ("PERIOD_M5", 5),
    ("PERIOD_M15", 15),
    ("PERIOD_M30", 30),
    ("PERIOD_H1", 60),
    ("PERIOD_H4", 240),
    ("PERIOD_D1", 1440),
    ("PERIOD_W1", 10080),
    ("PERIOD_MN1", 43200),
    ("FILE_READ", 1),
    ("FILE_WRITE", 2),
    ("FILE_CSV", 8),
    ("FILE_TXT", 16),
    ("TIME_DATE", 1),
    ("TIME_MINUTES", 2),
    ("TIME_SECONDS", 4),
    ("CHARTEVENT_CUSTOM", 1000),
    ("ERR_NO_ERROR", 0),
    ("ERR_INVALID_TRADE_VOLUME", 131),
    ("ERR_NOT_ENOUGH_MONEY", 134),
    ("ERR_CANNOT_OPEN_FILE", 4103),
];

/// One named storage cell. The declared type drives implicit casts on
/// assignment and static method binding on member calls.
#[derive(Debug, Clone)]
pub struct Slot {
    pub value: Value,
    pub ty: String,
}

impl Slot {
    pub fn new(value: Value, ty: impl Into<String>) -> Slot {
        Slot { value, ty: ty.into() }
    }
}

/// One activation record: a stack of block scopes plus the receiver for
/// method bodies. `static` locals are kept at function scope so leaving an
/// inner block never drops them.
#[derive(Debug)]
pub struct Frame {
    scopes: Vec<HashMap<String, Slot>>,
    pub this: Option<ObjectRef>,
    pub this_class: Option<String>,
    statics: Vec<String>,
    fn_key: String,
}

impl Frame {
    pub fn new(fn_key: String, this: Option<ObjectRef>, this_class: Option<String>) -> Frame {
        Frame {
            scopes: vec![HashMap::new()],
            this,
            this_class,
            statics: Vec::new(),
            fn_key,
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn declare(&mut self, name: &str, slot: Slot) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), slot);
        }
    }

    pub fn declare_static(&mut self, name: &str, slot: Slot) {
        self.scopes[0].insert(name.to_string(), slot);
        if !self.statics.iter().any(|n| n == name) {
            self.statics.push(name.to_string());
        }
    }

    pub fn has_static(&self, name: &str) -> bool {
        self.statics.iter().any(|n| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Store into the innermost scope that declares `name`.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                slot.value = value;
                return true;
            }
        }
        false
    }

    fn static_key(&self, name: &str) -> String {
        format!("{}::{name}", self.fn_key)
    }

    fn persist_statics(&self, store: &mut HashMap<String, Slot>) {
        for name in &self.statics {
            if let Some(slot) = self.scopes[0].get(name) {
                store.insert(self.static_key(name), slot.clone());
            }
        }
    }
}

/// A loaded class: the resolved table plus shared method declarations so
/// calls never clone bodies.
#[derive(Debug)]
pub struct ClassRt {
    pub info: ClassInfo,
    pub methods: Vec<Rc<Method>>,
}

/// What a call produced: the return value and the final values of by-ref
/// parameters, which the call site copies back into caller storage.
pub struct CallOutcome {
    pub value: Value,
    pub ref_out: Vec<(usize, Value)>,
}

pub struct Runtime {
    functions: HashMap<String, Vec<Rc<FunctionDecl>>>,
    classes: HashMap<String, Rc<ClassRt>>,
    enum_types: HashSet<String>,
    globals: HashMap<String, Slot>,
    static_locals: HashMap<String, Slot>,
    pub properties: BTreeMap<String, Vec<String>>,
    pub program_type: ProgramType,
    pub registry: BuiltinRegistry,
    declarations: Vec<Declaration>,
    call_depth: usize,
}

impl Runtime {
    pub fn load(result: CompileResult, registry: BuiltinRegistry) -> Result<Runtime, RuntimeError> {
        if !result.is_ok() {
            return Err(RuntimeError::new("cannot run a program with compile errors"));
        }
        let mut functions: HashMap<String, Vec<Rc<FunctionDecl>>> = HashMap::new();
        let mut enum_types = HashSet::new();
        let mut globals = HashMap::new();
        for (name, value) in PREDEFINED {
            globals.insert((*name).to_string(), Slot::new(Value::int(*value), "int"));
        }
        for decl in &result.declarations {
            match decl {
                Declaration::Function(f) => {
                    functions.entry(f.name.clone()).or_default().push(Rc::new(f.clone()));
                }
                Declaration::Enum(e) => {
                    enum_types.insert(e.name.clone());
                    for (member, value) in &e.members {
                        globals.insert(member.clone(), Slot::new(Value::int(*value), "int"));
                    }
                }
                _ => {}
            }
        }
        let classes = result
            .classes
            .into_iter()
            .map(|(name, info)| {
                let methods = info.decl.methods.iter().cloned().map(Rc::new).collect();
                (name, Rc::new(ClassRt { info, methods }))
            })
            .collect();
        Ok(Runtime {
            functions,
            classes,
            enum_types,
            globals,
            static_locals: HashMap::new(),
            properties: result.properties,
            program_type: result.program_type,
            registry,
            declarations: result.declarations,
            call_depth: 0,
        })
    }

    /// Run global declarations and free-standing top-level statements in
    /// source order. Called once before any handler.
    pub fn init_globals(&mut self, env: &mut ExecutionEnv) -> Result<(), RuntimeError> {
        let declarations = std::mem::take(&mut self.declarations);
        let mut outcome = Ok(());
        for decl in &declarations {
            let step = match decl {
                Declaration::Variable(v) => self.init_global_variable(env, v),
                Declaration::Statement(tokens) => self.run_top_level(env, tokens),
                _ => Ok(()),
            };
            if let Err(e) = step {
                outcome = Err(e);
                break;
            }
        }
        self.declarations = declarations;
        outcome
    }

    fn init_global_variable(
        &mut self,
        env: &mut ExecutionEnv,
        v: &VariableDecl,
    ) -> Result<(), RuntimeError> {
        let mut frame = Frame::new("<globals>".into(), None, None);
        for d in &v.declarators {
            let value = self.declarator_value(env, &mut frame, &v.ty, d)?;
            self.globals.insert(d.name.clone(), Slot::new(value, v.ty.clone()));
        }
        Ok(())
    }

    fn run_top_level(&mut self, env: &mut ExecutionEnv, tokens: &[Token]) -> Result<(), RuntimeError> {
        let mut frame = Frame::new("<globals>".into(), None, None);
        let mut exec = Exec::new(self, env, &mut frame, tokens);
        exec.run_block()?;
        Ok(())
    }

    /// Initial value for one declarator: explicit initializer, array
    /// literal, auto-constructed object, or the type default.
    pub(crate) fn declarator_value(
        &mut self,
        env: &mut ExecutionEnv,
        frame: &mut Frame,
        ty: &str,
        d: &Declarator,
    ) -> Result<Value, RuntimeError> {
        if !d.dims.is_empty() {
            return self.array_value(env, frame, ty, d);
        }
        match &d.init {
            Some(tokens) => {
                let value = Exec::new(self, env, frame, tokens).eval_value()?;
                self.cast_to(value, ty)
            }
            None if self.classes.contains_key(ty) => {
                Ok(Value::Object(self.instantiate(env, ty, &[])?))
            }
            None => Ok(self.default_value(ty)),
        }
    }

    fn array_value(
        &mut self,
        env: &mut ExecutionEnv,
        frame: &mut Frame,
        ty: &str,
        d: &Declarator,
    ) -> Result<Value, RuntimeError> {
        if d.dims.len() > 1 {
            return Err(RuntimeError::new(format!(
                "multidimensional array {} is not supported",
                d.name
            )));
        }
        let mut buffer = SeriesBuffer::new();
        if let Some(tokens) = &d.init {
            for item in Exec::new(self, env, frame, tokens).eval_init_list()? {
                buffer.push(self.cast_to(item, ty)?);
            }
        }
        if let Some(size) = d.dims[0] {
            while buffer.len() < size {
                buffer.push(self.default_value(ty));
            }
        }
        Ok(Value::Array(new_array(buffer)))
    }

    /// Implicit conversion to a declared type. Class types pass values
    /// through untouched; enum types store as plain ints.
    pub(crate) fn cast_to(&self, value: Value, ty: &str) -> Result<Value, RuntimeError> {
        if self.classes.contains_key(ty) {
            return Ok(value);
        }
        if self.enum_types.contains(ty) {
            return cast(&value, "int");
        }
        cast(&value, ty)
    }

    pub(crate) fn default_value(&self, ty: &str) -> Value {
        if let Some(class) = IntClass::from_type_name(ty) {
            return Value::Int(0, class);
        }
        match ty {
            "double" => Value::Double(0.0),
            "float" => Value::Float(0.0),
            "string" => Value::Str(String::new()),
            _ if self.enum_types.contains(ty) => Value::int(0),
            _ => Value::Empty,
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Widest declared parameter list among overloads, used to shape the
    /// standard `OnCalculate` argument vector.
    pub fn max_params(&self, name: &str) -> usize {
        self.functions
            .get(name)
            .map(|overloads| overloads.iter().map(|f| f.params.len()).max().unwrap_or(0))
            .unwrap_or(0)
    }

    /// The per-bar handler for this program type, falling back to the
    /// legacy `start` when no modern handler is declared.
    pub fn entry_point(&self) -> &'static str {
        let modern = match self.program_type {
            ProgramType::Indicator => "OnCalculate",
            ProgramType::Expert => "OnTick",
            ProgramType::Script => "OnStart",
        };
        if self.has_function(modern) {
            modern
        } else {
            "start"
        }
    }

    pub fn init_handler(&self) -> Option<&'static str> {
        ["OnInit", "init"].into_iter().find(|n| self.has_function(n))
    }

    pub fn deinit_handler(&self) -> Option<&'static str> {
        ["OnDeinit", "deinit"].into_iter().find(|n| self.has_function(n))
    }

    /// Names and types of `input`/`extern` globals in declaration order.
    pub fn input_params(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for decl in &self.declarations {
            if let Declaration::Variable(v) = decl {
                if matches!(v.storage, Storage::Input | Storage::Extern) {
                    for d in &v.declarators {
                        out.push((d.name.clone(), v.ty.clone()));
                    }
                }
            }
        }
        out
    }

    /// Override the n-th input with a host-supplied value. Indexes past the
    /// declared inputs are ignored so hosts may pass extra parameters.
    pub fn set_input(&mut self, index: usize, value: &Value) -> Result<(), RuntimeError> {
        let Some((name, ty)) = self.input_params().into_iter().nth(index) else {
            return Ok(());
        };
        let value = self.cast_to(value.clone(), &ty)?;
        self.globals.insert(name, Slot::new(value, ty));
        Ok(())
    }

    pub fn global_value(&self, name: &str) -> Option<Value> {
        self.globals.get(name).map(|slot| slot.value.clone())
    }

    pub(crate) fn global_slot(&self, name: &str) -> Option<&Slot> {
        self.globals.get(name)
    }

    /// Create or replace a host-maintained global such as `Bid` or `Bars`.
    pub fn set_global(&mut self, name: &str, value: Value, ty: &str) {
        self.globals.insert(name.to_string(), Slot::new(value, ty));
    }

    pub(crate) fn assign_global(&mut self, name: &str, value: Value) -> bool {
        match self.globals.get_mut(name) {
            Some(slot) => {
                slot.value = value;
                true
            }
            None => false,
        }
    }

    fn resolve_overload(&self, name: &str, argc: usize) -> Option<Rc<FunctionDecl>> {
        let candidates = self.functions.get(name)?;
        if let Some(exact) = candidates.iter().find(|f| f.params.len() == argc) {
            return Some(Rc::clone(exact));
        }
        candidates
            .iter()
            .find(|f| f.required_params() <= argc && argc <= f.params.len())
            .map(Rc::clone)
    }

    pub(crate) fn invoke_function(
        &mut self,
        env: &mut ExecutionEnv,
        name: &str,
        args: &[Value],
    ) -> Result<CallOutcome, RuntimeError> {
        let Some(decl) = self.resolve_overload(name, args.len()) else {
            return Err(if self.functions.contains_key(name) {
                RuntimeError::new(format!(
                    "Function {name} does not take {} arguments",
                    args.len()
                ))
            } else {
                RuntimeError::new(format!("Function {name} not found"))
            });
        };
        self.invoke(env, &decl, None, None, args)
    }

    /// Call a function and keep only its return value.
    pub fn call_function(
        &mut self,
        env: &mut ExecutionEnv,
        name: &str,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        Ok(self.invoke_function(env, name, args)?.value)
    }

    /// Method dispatch. The static class decides the binding: a `virtual`
    /// table entry re-resolves through the instance's own table, anything
    /// else binds where it was declared.
    pub(crate) fn call_method(
        &mut self,
        env: &mut ExecutionEnv,
        static_class: &str,
        obj: &ObjectRef,
        name: &str,
        args: &[Value],
    ) -> Result<CallOutcome, RuntimeError> {
        let static_rt = self.class(static_class)?;
        let Some(entry) = static_rt.info.methods.get(name) else {
            return Err(RuntimeError::new(format!(
                "Method {name} not found on {static_class}"
            )));
        };
        let target = if entry.is_virtual {
            let dynamic = obj.borrow().class.clone();
            let dyn_rt = self.class(&dynamic)?;
            dyn_rt.info.methods.get(name).cloned().unwrap_or_else(|| entry.clone())
        } else {
            entry.clone()
        };
        self.invoke_method_ref(env, &target, obj, args)
    }

    /// `Base::Name(...)` inside a method body binds to that class's table
    /// entry directly, skipping the virtual walk.
    pub(crate) fn call_method_in(
        &mut self,
        env: &mut ExecutionEnv,
        class: &str,
        obj: &ObjectRef,
        name: &str,
        args: &[Value],
    ) -> Result<CallOutcome, RuntimeError> {
        let rt_class = self.class(class)?;
        let Some(entry) = rt_class.info.methods.get(name).cloned() else {
            return Err(RuntimeError::new(format!("Method {name} not found on {class}")));
        };
        self.invoke_method_ref(env, &entry, obj, args)
    }

    fn invoke_method_ref(
        &mut self,
        env: &mut ExecutionEnv,
        target: &MethodRef,
        obj: &ObjectRef,
        args: &[Value],
    ) -> Result<CallOutcome, RuntimeError> {
        let rt_class = self.class(&target.class)?;
        let method = Rc::clone(&rt_class.methods[target.index]);
        if method.is_pure {
            return Err(RuntimeError::new(format!(
                "cannot call pure virtual method {}::{}",
                target.class, method.decl.name
            )));
        }
        let required = method.decl.required_params();
        if args.len() < required || args.len() > method.decl.params.len() {
            return Err(RuntimeError::new(format!(
                "Method {}::{} does not take {} arguments",
                target.class,
                method.decl.name,
                args.len()
            )));
        }
        self.invoke(
            env,
            &method.decl,
            Some(Rc::clone(obj)),
            Some(target.class.clone()),
            args,
        )
    }

    /// Build an instance of `class`: default field layout first, then the
    /// constructor chain, base classes before derived.
    pub fn instantiate(
        &mut self,
        env: &mut ExecutionEnv,
        class: &str,
        args: &[Value],
    ) -> Result<ObjectRef, RuntimeError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::new("call stack depth exceeded"));
        }
        self.call_depth += 1;
        let result = self.instantiate_inner(env, class, args);
        self.call_depth -= 1;
        result
    }

    fn instantiate_inner(
        &mut self,
        env: &mut ExecutionEnv,
        class: &str,
        args: &[Value],
    ) -> Result<ObjectRef, RuntimeError> {
        let rt_class = self.class(class)?;
        let mut fields = HashMap::new();
        for field in &rt_class.info.fields {
            let value = if !field.dims.is_empty() {
                if field.dims.len() > 1 {
                    return Err(RuntimeError::new(format!(
                        "multidimensional array {} is not supported",
                        field.name
                    )));
                }
                let len = field.dims[0].unwrap_or(0);
                Value::Array(new_array(SeriesBuffer::with_len(len, self.default_value(&field.ty))))
            } else if self.classes.contains_key(&field.ty) {
                Value::Object(self.instantiate(env, &field.ty, &[])?)
            } else {
                self.default_value(&field.ty)
            };
            fields.insert(field.name.clone(), value);
        }
        let obj: ObjectRef = Rc::new(RefCell::new(Instance {
            class: class.to_string(),
            fields,
        }));
        self.construct(env, class, &obj, args)?;
        Ok(obj)
    }

    fn construct(
        &mut self,
        env: &mut ExecutionEnv,
        class: &str,
        obj: &ObjectRef,
        args: &[Value],
    ) -> Result<(), RuntimeError> {
        let rt_class = self.class(class)?;
        if let Some(base) = rt_class.info.decl.base.clone() {
            self.construct(env, &base, obj, &[])?;
        }
        let ctor = rt_class
            .info
            .decl
            .methods
            .iter()
            .enumerate()
            .filter(|(_, m)| m.kind == MethodKind::Constructor)
            .find(|(_, m)| {
                m.decl.required_params() <= args.len() && args.len() <= m.decl.params.len()
            });
        match ctor {
            Some((index, _)) => {
                let method = Rc::clone(&rt_class.methods[index]);
                self.invoke(
                    env,
                    &method.decl,
                    Some(Rc::clone(obj)),
                    Some(class.to_string()),
                    args,
                )?;
                Ok(())
            }
            None if args.is_empty() => Ok(()),
            None => Err(RuntimeError::new(format!("no matching constructor for {class}"))),
        }
    }

    /// Run the destructor chain, most derived first. `delete` calls this
    /// before dropping its reference.
    pub fn destroy(&mut self, env: &mut ExecutionEnv, obj: &ObjectRef) -> Result<(), RuntimeError> {
        let mut current = Some(obj.borrow().class.clone());
        while let Some(class) = current {
            let rt_class = self.class(&class)?;
            let dtor = rt_class
                .info
                .decl
                .methods
                .iter()
                .position(|m| m.kind == MethodKind::Destructor);
            if let Some(index) = dtor {
                let method = Rc::clone(&rt_class.methods[index]);
                self.invoke(env, &method.decl, Some(Rc::clone(obj)), Some(class.clone()), &[])?;
            }
            current = rt_class.info.decl.base.clone();
        }
        Ok(())
    }

    pub(crate) fn class(&self, name: &str) -> Result<Rc<ClassRt>, RuntimeError> {
        self.classes
            .get(name)
            .map(Rc::clone)
            .ok_or_else(|| RuntimeError::new(format!("Unknown class {name}")))
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enum_types.contains(name)
    }

    pub(crate) fn has_method(&self, class: &str, name: &str) -> bool {
        self.classes
            .get(class)
            .is_some_and(|c| c.info.methods.contains_key(name))
    }

    pub(crate) fn field_type(&self, class: &str, field: &str) -> Option<String> {
        let rt_class = self.classes.get(class)?;
        rt_class
            .info
            .fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.ty.clone())
    }

    fn invoke(
        &mut self,
        env: &mut ExecutionEnv,
        decl: &FunctionDecl,
        this: Option<ObjectRef>,
        this_class: Option<String>,
        args: &[Value],
    ) -> Result<CallOutcome, RuntimeError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::new("call stack depth exceeded"));
        }
        self.call_depth += 1;
        let result = self.invoke_inner(env, decl, this, this_class, args);
        self.call_depth -= 1;
        result
    }

    fn invoke_inner(
        &mut self,
        env: &mut ExecutionEnv,
        decl: &FunctionDecl,
        this: Option<ObjectRef>,
        this_class: Option<String>,
        args: &[Value],
    ) -> Result<CallOutcome, RuntimeError> {
        let fn_key = match &this_class {
            Some(class) => format!("{class}::{}/{}", decl.name, decl.params.len()),
            None => format!("{}/{}", decl.name, decl.params.len()),
        };
        let mut frame = Frame::new(fn_key, this, this_class);
        for (i, p) in decl.params.iter().enumerate() {
            let value = match args.get(i) {
                Some(v) => v.clone(),
                None => match &p.default {
                    Some(tokens) => Exec::new(self, env, &mut frame, tokens).eval_value()?,
                    None => Value::Empty,
                },
            };
            // reference and array parameters keep the caller's value intact
            let value = if p.by_ref || !p.dims.is_empty() {
                value
            } else {
                self.cast_to(value, &p.ty)?
            };
            frame.declare(&p.name, Slot::new(value, p.ty.clone()));
        }
        for local in decl.locals.iter().filter(|l| l.is_static) {
            let key = frame.static_key(&local.name);
            if let Some(slot) = self.static_locals.get(&key).cloned() {
                frame.declare_static(&local.name, slot);
            }
        }
        let flow = {
            let mut exec = Exec::new(self, env, &mut frame, &decl.body);
            exec.run_block()?
        };
        let value = match flow {
            Flow::Return(v) => self.cast_to(v, &decl.return_type)?,
            _ => Value::Empty,
        };
        frame.persist_statics(&mut self.static_locals);
        let ref_out = decl
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.by_ref)
            .filter_map(|(i, p)| frame.get(&p.name).map(|slot| (i, slot.value.clone())))
            .collect();
        Ok(CallOutcome { value, ref_out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::tests::test_env;
    use crate::domain::semantics::compile;

    fn load(source: &str) -> Runtime {
        let result = compile(source);
        assert!(result.is_ok(), "compile errors: {:?}", result.errors);
        match Runtime::load(result, BuiltinRegistry::new()) {
            Ok(rt) => rt,
            Err(e) => panic!("load failed: {e}"),
        }
    }

    #[test]
    fn predefined_constants_are_globals() {
        let rt = load("int OnTick() { return 0; }");
        assert_eq!(rt.global_value("OP_SELL").map(|v| v.as_i64()), Some(1));
        assert_eq!(rt.global_value("EMPTY_VALUE").map(|v| v.as_i64()), Some(2147483647));
        assert_eq!(rt.global_value("PERIOD_H1").map(|v| v.as_i64()), Some(60));
    }

    #[test]
    fn enum_members_become_constants() {
        let rt = load("enum Mode { FAST, SLOW = 10 }; void OnTick() {}");
        assert_eq!(rt.global_value("FAST").map(|v| v.as_i64()), Some(0));
        assert_eq!(rt.global_value("SLOW").map(|v| v.as_i64()), Some(10));
        assert!(rt.is_enum("Mode"));
    }

    #[test]
    fn enum_typed_values_store_as_int() {
        let rt = load("enum Mode { FAST }; void OnTick() {}");
        let v = match rt.cast_to(Value::Double(2.9), "Mode") {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(v.as_i64(), 2);
    }

    #[test]
    fn entry_point_follows_program_type() {
        assert_eq!(load("int OnCalculate() { return 0; }").entry_point(), "OnCalculate");
        assert_eq!(load("void OnTick() {}").entry_point(), "OnTick");
        assert_eq!(load("void OnStart() {}").entry_point(), "OnStart");
        assert_eq!(load("int start() { return 0; }").entry_point(), "start");
    }

    #[test]
    fn legacy_handlers_found_after_modern_ones() {
        let rt = load("int init() { return 0; } int deinit() { return 0; } int start() { return 0; }");
        assert_eq!(rt.init_handler(), Some("init"));
        assert_eq!(rt.deinit_handler(), Some("deinit"));
        let rt = load("int OnInit() { return 0; } void OnTick() {}");
        assert_eq!(rt.init_handler(), Some("OnInit"));
        assert_eq!(rt.deinit_handler(), None);
    }

    #[test]
    fn input_params_keep_declaration_order() {
        let rt = load("input int Fast = 5; extern double Lots = 0.1; input int Slow = 20; void OnTick() {}");
        let names: Vec<String> = rt.input_params().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Fast", "Lots", "Slow"]);
    }

    #[test]
    fn set_input_overrides_and_casts() {
        let mut rt = load("input int Fast = 5; void OnTick() {}");
        let mut env = test_env();
        if let Err(e) = rt.init_globals(&mut env) {
            panic!("{e}");
        }
        assert_eq!(rt.global_value("Fast").map(|v| v.as_i64()), Some(5));
        if let Err(e) = rt.set_input(0, &Value::Double(12.7)) {
            panic!("{e}");
        }
        assert_eq!(rt.global_value("Fast").map(|v| v.as_i64()), Some(12));
        // indexes past the declared inputs are ignored
        assert!(rt.set_input(5, &Value::int(1)).is_ok());
    }

    #[test]
    fn globals_initialize_in_source_order() {
        let mut rt = load("int a = 2; int b = a * 3; void OnTick() {}");
        let mut env = test_env();
        if let Err(e) = rt.init_globals(&mut env) {
            panic!("{e}");
        }
        assert_eq!(rt.global_value("b").map(|v| v.as_i64()), Some(6));
    }

    #[test]
    fn global_array_fills_to_declared_size() {
        let mut rt = load("double buf[4]; int vals[] = {1, 2, 3}; void OnTick() {}");
        let mut env = test_env();
        if let Err(e) = rt.init_globals(&mut env) {
            panic!("{e}");
        }
        match rt.global_value("buf") {
            Some(Value::Array(arr)) => assert_eq!(arr.borrow().len(), 4),
            other => panic!("expected array, got {other:?}"),
        }
        match rt.global_value("vals") {
            Some(Value::Array(arr)) => {
                assert_eq!(arr.borrow().len(), 3);
                assert_eq!(arr.borrow().get(2).as_i64(), 3);
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn instantiate_lays_out_inherited_fields() {
        let mut rt = load(
            "class Base { public: int a; };\n\
             class Derived : Base { public: double b; string tag; };\n\
             void OnTick() {}",
        );
        let mut env = test_env();
        let obj = match rt.instantiate(&mut env, "Derived", &[]) {
            Ok(obj) => obj,
            Err(e) => panic!("{e}"),
        };
        let inst = obj.borrow();
        assert_eq!(inst.class, "Derived");
        assert_eq!(inst.fields["a"].as_i64(), 0);
        assert!(matches!(inst.fields["b"], Value::Double(_)));
        assert!(matches!(inst.fields["tag"], Value::Str(_)));
    }

    #[test]
    fn missing_function_is_a_runtime_error() {
        let mut rt = load("void OnTick() {}");
        let mut env = test_env();
        let err = match rt.call_function(&mut env, "Nope", &[]) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(err.to_string().contains("Function Nope not found"));
    }

    #[test]
    fn overloads_resolve_by_argument_count() {
        let mut rt = load(
            "int F() { return 1; }\n\
             int F(int x) { return 2; }\n\
             void OnTick() {}",
        );
        let mut env = test_env();
        let one = match rt.call_function(&mut env, "F", &[]) {
            Ok(v) => v.as_i64(),
            Err(e) => panic!("{e}"),
        };
        let two = match rt.call_function(&mut env, "F", &[Value::int(9)]) {
            Ok(v) => v.as_i64(),
            Err(e) => panic!("{e}"),
        };
        assert_eq!((one, two), (1, 2));
    }

    #[test]
    fn recursion_depth_is_bounded() {
        let mut rt = load("int Loop() { return Loop(); } void OnTick() {}");
        let mut env = test_env();
        let err = match rt.call_function(&mut env, "Loop", &[]) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(err.to_string().contains("call stack depth exceeded"));
    }
}
