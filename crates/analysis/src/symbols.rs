//! Symbol database: scopes, variables, functions, enumerators.
//!
//! A compact index of the token list, built in one forward walk. Scopes are
//! tracked with an explicit stack, variable declarations get fresh
//! declaration ids written back onto every use token, function definitions
//! record their argument variables, and enum bodies produce enumerator
//! records with declaration-order values.

use cranelift_entity::entity_impl;
use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;

use crate::error::AnalysisResult;
use crate::settings::Settings;
use crate::tokens::{Token, TokenKind, TokenList};
use crate::types::{self, BaseType, TypeInfo};
use crate::{mathlib, tokens::matcher};

/// Reference to a scope record.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);
entity_impl!(ScopeId, "scope");

/// Reference to a variable record.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);
entity_impl!(VarId, "var");

/// Reference to a function record.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);
entity_impl!(FuncId, "fn");

/// Reference to an enumerator record.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumeratorId(u32);
entity_impl!(EnumeratorId, "enumval");

/// Kind of a scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// File scope.
    Global,
    /// A function body.
    Function,
    /// A class body.
    Class,
    /// A struct body.
    Struct,
    /// A union body.
    Union,
    /// A namespace body.
    Namespace,
    /// An `if` body.
    If,
    /// An `else` body.
    Else,
    /// A `for` body.
    For,
    /// A `while` body.
    While,
    /// A `do` body.
    Do,
    /// A `switch` body.
    Switch,
    /// A lambda body.
    Lambda,
    /// An enum body.
    Enum,
    /// A bare `{ }` block.
    Unconditional,
}

/// One scope record.
#[derive(Clone, Debug)]
pub struct ScopeData {
    /// Scope kind.
    pub kind: ScopeKind,
    /// The token introducing the scope (`if`, `for`, the function name...).
    pub class_def: Option<Token>,
    /// The `{`.
    pub body_start: Option<Token>,
    /// The `}`.
    pub body_end: Option<Token>,
    /// Enclosing scope.
    pub nested_in: Option<ScopeId>,
    /// Owning function for function scopes.
    pub function: Option<FuncId>,
}

impl ScopeData {
    /// Can statements execute in this scope?
    pub fn is_executable(&self) -> bool {
        matches!(
            self.kind,
            ScopeKind::Function
                | ScopeKind::If
                | ScopeKind::Else
                | ScopeKind::For
                | ScopeKind::While
                | ScopeKind::Do
                | ScopeKind::Switch
                | ScopeKind::Lambda
                | ScopeKind::Unconditional
        )
    }
}

/// One array dimension.
#[derive(Clone, Debug)]
pub struct Dimension {
    /// The size expression token, if written.
    pub tok: Option<Token>,
    /// Is the size a compile-time constant we computed?
    pub known: bool,
    /// The size when known.
    pub size: i64,
}

/// One variable record.
#[derive(Clone, Debug)]
pub struct VariableData {
    /// Name.
    pub name: String,
    /// The declaration name token.
    pub name_token: Token,
    /// First token of the declared type.
    pub type_start: Token,
    /// Last token of the declared type.
    pub type_end: Token,
    /// Declaration id as written on tokens (`index + 1`).
    pub decl_id: u32,
    /// Scope of the declaration.
    pub scope: ScopeId,
    /// Function argument?
    pub is_argument: bool,
    /// Declared at file scope?
    pub is_global: bool,
    /// Local to a function?
    pub is_local: bool,
    /// `static`?
    pub is_static: bool,
    /// `extern`?
    pub is_extern: bool,
    /// `const`?
    pub is_const: bool,
    /// Reference?
    pub is_reference: bool,
    /// Pointer?
    pub is_pointer: bool,
    /// Array?
    pub is_array: bool,
    /// `volatile`?
    pub is_volatile: bool,
    /// `std::unique_ptr` / `std::shared_ptr`?
    pub is_smart_pointer: bool,
    /// Array dimensions, outermost first.
    pub dimensions: Vec<Dimension>,
    /// Element/base type info.
    pub type_info: TypeInfo,
}

impl VariableData {
    /// Is dimension `i` a known constant?
    pub fn dimension_known(&self, i: usize) -> bool {
        self.dimensions.get(i).is_some_and(|d| d.known)
    }

    /// Size of dimension `i` (0 when unknown).
    pub fn dimension(&self, i: usize) -> i64 {
        self.dimensions.get(i).map_or(0, |d| d.size)
    }
}

/// One function record.
#[derive(Clone, Debug)]
pub struct FunctionData {
    /// Name.
    pub name: String,
    /// Name token of the definition.
    pub name_token: Token,
    /// First token of the return type, if present.
    pub ret_def: Option<Token>,
    /// Body scope.
    pub scope: Option<ScopeId>,
    /// Argument variables, in order.
    pub args: Vec<VarId>,
    /// Number of arguments without defaults.
    pub min_args: usize,
}

impl FunctionData {
    /// Argument variable by zero-based position.
    pub fn argument_var(&self, n: usize) -> Option<VarId> {
        self.args.get(n).copied()
    }

    /// Argument count.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }
}

/// One enumerator record.
#[derive(Clone, Debug)]
pub struct EnumeratorData {
    /// Name.
    pub name: String,
    /// Name token.
    pub name_token: Token,
    /// Enum scope.
    pub scope: ScopeId,
    /// Value in declaration order.
    pub value: i64,
    /// Is the value known?
    pub value_known: bool,
}

/// The symbol database of one translation unit.
pub struct SymbolDatabase {
    /// All scopes; index 0 is the global scope.
    pub scopes: PrimaryMap<ScopeId, ScopeData>,
    /// All variables.
    pub variables: PrimaryMap<VarId, VariableData>,
    /// All functions.
    pub functions: PrimaryMap<FuncId, FunctionData>,
    /// All enumerators.
    pub enumerators: PrimaryMap<EnumeratorId, EnumeratorData>,
    /// Scopes of function bodies, in source order.
    pub function_scopes: Vec<ScopeId>,
}

impl SymbolDatabase {
    /// The variable with declaration id `decl_id` (0 = none).
    pub fn variable_by_id(&self, decl_id: u32) -> Option<&VariableData> {
        if decl_id == 0 {
            return None;
        }
        self.variables.get(VarId::from_u32(decl_id - 1))
    }

    /// `VarId` for a declaration id.
    pub fn var_id_of(&self, decl_id: u32) -> Option<VarId> {
        if decl_id == 0 || decl_id as usize > self.variables.len() {
            None
        } else {
            Some(VarId::from_u32(decl_id - 1))
        }
    }

    /// Is the token's scope executable?
    pub fn is_executable_scope(&self, list: &TokenList, tok: Token) -> bool {
        list[tok]
            .scope
            .expand()
            .is_some_and(|s| self.scopes[s].is_executable())
    }

    /// Innermost function scope containing `scope`, if any.
    pub fn enclosing_function_scope(&self, mut scope: ScopeId) -> Option<ScopeId> {
        loop {
            if self.scopes[scope].kind == ScopeKind::Function {
                return Some(scope);
            }
            scope = self.scopes[scope].nested_in?;
        }
    }

    /// Walk outward to the outermost executable scope (the function body)
    /// and return its end token.
    pub fn end_of_function(&self, list: &TokenList, tok: Token) -> Option<Token> {
        let mut scope = list[tok].scope.expand()?;
        let mut best = None;
        loop {
            let data = &self.scopes[scope];
            if data.is_executable() {
                best = data.body_end;
            } else {
                break;
            }
            match data.nested_in {
                Some(s) => scope = s,
                None => break,
            }
        }
        best
    }
}

struct ScopeFrame {
    scope: Option<ScopeId>,
    names: FxHashMap<String, u32>,
}

struct Builder<'a> {
    db: SymbolDatabase,
    stack: Vec<ScopeFrame>,
    enum_names: FxHashMap<String, EnumeratorId>,
    function_names: FxHashMap<String, FuncId>,
    settings: &'a Settings,
}

/// Build the symbol database and write classifications back onto the
/// tokens (scopes, variable ids, enumerators, call targets).
pub fn build(list: &mut TokenList, settings: &Settings) -> AnalysisResult<SymbolDatabase> {
    let mut scopes = PrimaryMap::new();
    let global = scopes.push(ScopeData {
        kind: ScopeKind::Global,
        class_def: None,
        body_start: None,
        body_end: None,
        nested_in: None,
        function: None,
    });
    let mut b = Builder {
        db: SymbolDatabase {
            scopes,
            variables: PrimaryMap::new(),
            functions: PrimaryMap::new(),
            enumerators: PrimaryMap::new(),
            function_scopes: Vec::new(),
        },
        stack: vec![ScopeFrame {
            scope: Some(global),
            names: FxHashMap::default(),
        }],
        enum_names: FxHashMap::default(),
        function_names: FxHashMap::default(),
        settings,
    };

    let mut cur = list.front();
    while let Some(tok) = cur {
        let scope = b.current_scope();
        list[tok].scope = scope.into();

        match list.text(tok) {
            "{" => {
                b.open_brace(list, tok)?;
            }
            "}" => {
                if b.stack.len() > 1 {
                    b.stack.pop();
                }
            }
            _ => {
                if b.try_declaration(list, tok)? {
                    // Declaration handled; ids were assigned in place.
                } else if list[tok].kind == TokenKind::Name && list[tok].var_id == 0 {
                    b.resolve_name(list, tok);
                }
            }
        }
        cur = list.next(tok);
    }

    // Second walk: attach known functions to call sites.
    let mut cur = list.front();
    while let Some(tok) = cur {
        if list[tok].kind == TokenKind::Name
            && list[tok].var_id == 0
            && list.text_at(tok, 1) == "("
        {
            if let Some(&func) = b.function_names.get(list.text(tok)) {
                if b.db.functions[func].name_token != tok {
                    list[tok].function = func.into();
                    list[tok].kind = TokenKind::Function;
                }
            }
        }
        cur = list.next(tok);
    }

    Ok(b.db)
}

impl<'a> Builder<'a> {
    fn current_scope(&self) -> Option<ScopeId> {
        self.stack.iter().rev().find_map(|f| f.scope)
    }

    fn current_scope_kind(&self) -> ScopeKind {
        self.current_scope()
            .map_or(ScopeKind::Global, |s| self.db.scopes[s].kind)
    }

    fn in_executable(&self) -> bool {
        self.current_scope()
            .is_some_and(|s| self.db.scopes[s].is_executable())
    }

    fn push_scope(
        &mut self,
        list: &TokenList,
        kind: ScopeKind,
        class_def: Option<Token>,
        open: Token,
    ) -> ScopeId {
        let nested_in = self.current_scope();
        let id = self.db.scopes.push(ScopeData {
            kind,
            class_def,
            body_start: Some(open),
            body_end: list.link(open),
            nested_in,
            function: None,
        });
        self.stack.push(ScopeFrame {
            scope: Some(id),
            names: FxHashMap::default(),
        });
        id
    }

    fn open_brace(&mut self, list: &mut TokenList, open: Token) -> AnalysisResult<()> {
        let prev = list.prev(open);
        let prev_text = prev.map_or("", |p| list.text(p));

        // Initializer braces are not scopes.
        if matches!(prev_text, "=" | "," | "(" | "{" | "return") {
            self.stack.push(ScopeFrame {
                scope: self.current_scope(),
                names: FxHashMap::default(),
            });
            return Ok(());
        }

        if prev_text == ")" {
            let close = prev.expect("prev checked above");
            if let Some(par_open) = list.link(close) {
                let before = list.prev(par_open);
                let before_text = before.map_or("", |t| list.text(t));
                let kind = match before_text {
                    "if" => Some(ScopeKind::If),
                    "while" => Some(ScopeKind::While),
                    "for" => Some(ScopeKind::For),
                    "switch" => Some(ScopeKind::Switch),
                    _ => None,
                };
                if let Some(kind) = kind {
                    self.push_scope(list, kind, before, open);
                    return Ok(());
                }
                // Lambda body: `] ( ... ) {`.
                if list.text_at(par_open, -1) == "]" {
                    let id = self.push_scope(list, ScopeKind::Lambda, before, open);
                    self.declare_arguments(list, par_open, close, id, None)?;
                    return Ok(());
                }
                // Function definition: `name ( ... ) {` in a non-executable
                // enclosing scope.
                if let Some(name_tok) = before.filter(|t| list[*t].is_name()) {
                    if !self.in_executable() {
                        let name = list.text(name_tok).to_string();
                        let func = self.db.functions.push(FunctionData {
                            name: name.clone(),
                            name_token: name_tok,
                            ret_def: None,
                            scope: None,
                            args: Vec::new(),
                            min_args: 0,
                        });
                        self.function_names.insert(name, func);
                        let id = self.push_scope(list, ScopeKind::Function, Some(name_tok), open);
                        self.db.scopes[id].function = Some(func);
                        self.db.functions[func].scope = Some(id);
                        self.db.function_scopes.push(id);
                        self.declare_arguments(list, par_open, close, id, Some(func))?;
                        return Ok(());
                    }
                }
            }
            // `) {` that is not a recognized construct.
            self.push_scope(list, ScopeKind::Unconditional, None, open);
            return Ok(());
        }

        match prev_text {
            "else" => {
                self.push_scope(list, ScopeKind::Else, prev, open);
            }
            "do" => {
                self.push_scope(list, ScopeKind::Do, prev, open);
            }
            _ => {
                // enum/struct/union/class bodies, anonymous (`union {`) or
                // named (`struct S {`).
                let (keyword, class_def) = if matches!(
                    prev_text,
                    "enum" | "struct" | "union" | "class" | "namespace"
                ) {
                    (Some(prev_text.to_string()), prev)
                } else if prev.is_some_and(|p| list[p].kind == TokenKind::Name) {
                    let back = list.prev(prev.expect("prev checked above"));
                    (back.map(|t| list.text(t).to_string()), back)
                } else {
                    (None, None)
                };
                match keyword.as_deref() {
                    Some("enum") => {
                        let id = self.push_scope(list, ScopeKind::Enum, class_def, open);
                        self.collect_enumerators(list, open, id)?;
                    }
                    Some("struct") => {
                        self.push_scope(list, ScopeKind::Struct, class_def, open);
                    }
                    Some("union") => {
                        self.push_scope(list, ScopeKind::Union, class_def, open);
                    }
                    Some("class") => {
                        self.push_scope(list, ScopeKind::Class, class_def, open);
                    }
                    Some("namespace") => {
                        self.push_scope(list, ScopeKind::Namespace, class_def, open);
                    }
                    _ => {
                        if self.in_executable() {
                            self.push_scope(list, ScopeKind::Unconditional, None, open);
                        } else {
                            // An aggregate initializer or unknown construct
                            // at file scope; no new scope.
                            self.stack.push(ScopeFrame {
                                scope: self.current_scope(),
                                names: FxHashMap::default(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Enumerators of `enum ... { A, B = expr, C }` in declaration order.
    fn collect_enumerators(
        &mut self,
        list: &mut TokenList,
        open: Token,
        scope: ScopeId,
    ) -> AnalysisResult<()> {
        let end = list.link(open);
        let mut value: i64 = 0;
        let mut known = true;
        let mut cur = list.next(open);
        while let Some(tok) = cur {
            if Some(tok) == end {
                break;
            }
            if list[tok].kind == TokenKind::Name {
                let name = list.text(tok).to_string();
                if list.text_at(tok, 1) == "=" {
                    // The initializer must itself be already resolvable.
                    let init = list.tok_at(tok, 2);
                    match init {
                        Some(t) if list[t].is_number() => {
                            if let Some(v) = mathlib::parse_int(list.text(t)) {
                                value = v;
                                known = true;
                            } else {
                                known = false;
                            }
                        }
                        Some(t) if list[t].is_char() => {
                            match mathlib::char_literal_value(list.text(t)) {
                                Some(v) => {
                                    value = v;
                                    known = true;
                                }
                                None => known = false,
                            }
                        }
                        Some(t) => match self.enum_names.get(list.text(t)) {
                            Some(&e) if self.db.enumerators[e].value_known
                                && list.text_at(t, 1) != "+" =>
                            {
                                value = self.db.enumerators[e].value;
                                known = true;
                            }
                            _ => known = false,
                        },
                        None => known = false,
                    }
                }
                let id = self.db.enumerators.push(EnumeratorData {
                    name: name.clone(),
                    name_token: tok,
                    scope,
                    value,
                    value_known: known,
                });
                list[tok].enumerator = id.into();
                self.enum_names.insert(name, id);
                value = value.wrapping_add(1);
                // Skip to the next comma at depth zero.
                let mut t = list.next(tok);
                while let Some(s) = t {
                    if Some(s) == end || list.text(s) == "," {
                        break;
                    }
                    if matches!(list.text(s), "(" | "[" | "{") {
                        t = list.link(s).and_then(|l| list.next(l));
                        continue;
                    }
                    t = list.next(s);
                }
                cur = t;
                continue;
            }
            cur = list.next(tok);
        }
        Ok(())
    }

    /// Declare the arguments between `open` and `close` of a function or
    /// lambda, attaching them to `scope`.
    fn declare_arguments(
        &mut self,
        list: &mut TokenList,
        open: Token,
        close: Token,
        scope: ScopeId,
        func: Option<FuncId>,
    ) -> AnalysisResult<()> {
        let mut min_args = 0usize;
        let mut any_default = false;
        let mut cur = list.next(open);
        while let Some(tok) = cur {
            if tok == close {
                break;
            }
            if is_type_start(list, self.settings, tok) {
                if let Some((name_tok, after, ti, flags)) =
                    parse_decl_name(list, self.settings, tok)
                {
                    // Argument names are optional; require one.
                    if matches!(list.text_at(name_tok, 1), "," | ")" | "=" | "[") {
                        let var = self.declare_variable(
                            list, name_tok, tok, ti, flags, scope, true,
                        );
                        if let Some(func) = func {
                            self.db.functions[func].args.push(var);
                        }
                        if list.text_at(name_tok, 1) == "=" {
                            any_default = true;
                        } else if !any_default {
                            min_args += 1;
                        }
                        cur = Some(after);
                        continue;
                    }
                }
            }
            // Skip to the next comma at depth zero.
            if matches!(list.text(tok), "(" | "[" | "{") {
                cur = list.link(tok).and_then(|l| list.next(l));
                continue;
            }
            cur = list.next(tok);
        }
        if let Some(func) = func {
            self.db.functions[func].min_args = min_args;
        }
        Ok(())
    }

    /// Try to parse a variable declaration starting at `tok`. Returns true
    /// when a declaration was consumed.
    fn try_declaration(&mut self, list: &mut TokenList, tok: Token) -> AnalysisResult<bool> {
        let kind = self.current_scope_kind();
        let declarable = self.in_executable()
            || matches!(
                kind,
                ScopeKind::Global | ScopeKind::Namespace | ScopeKind::Struct | ScopeKind::Union | ScopeKind::Class
            );
        if !declarable {
            return Ok(false);
        }
        // Must be at a statement start. After `(` or `,` only executable
        // scopes declare (for-init); at file scope those positions are
        // function signature arguments, handled when the body opens.
        let prev_text = list.prev(tok).map_or("", |p| list.text(p));
        if !matches!(prev_text, "" | ";" | "{" | "}" | "(" | ",") {
            return Ok(false);
        }
        if matches!(prev_text, "(" | ",") && !self.in_executable() {
            return Ok(false);
        }
        if !is_type_start(list, self.settings, tok) {
            return Ok(false);
        }
        let Some((name_tok, _after, ti, flags)) = parse_decl_name(list, self.settings, tok) else {
            return Ok(false);
        };
        // A declaration name is followed by one of these.
        if !matches!(list.text_at(name_tok, 1), ";" | "=" | "," | "[" | ")" | "{" | "(") {
            return Ok(false);
        }
        // `name (` is a function declaration/definition, except for
        // constructor-style init `T x ( value ) ;` in executable scope.
        if list.text_at(name_tok, 1) == "(" && !self.in_executable() {
            return Ok(false);
        }
        if list.text_at(name_tok, 1) == "(" {
            // Only treat as a variable when the parens are followed by `;`.
            let close = list.link_at(name_tok, 1);
            if close.map_or(true, |c| list.text_at(c, 1) != ";") {
                return Ok(false);
            }
        }

        let scope = self.current_scope().expect("scope stack is never empty");
        let mut name_tok = name_tok;
        let mut flags = flags;
        loop {
            self.declare_variable(list, name_tok, tok, ti.clone(), flags, scope, false);
            // Multi-declarations: `int a = 1, b = 2;`.
            let mut t = list.next(name_tok);
            let mut next_name = None;
            while let Some(s) = t {
                match list.text(s) {
                    "(" | "[" | "{" => {
                        t = list.link(s).and_then(|l| list.next(l));
                        continue;
                    }
                    ";" | ")" => break,
                    "," => {
                        let mut n = list.next(s);
                        let mut extra = DeclFlags::default();
                        while let Some(x) = n {
                            match list.text(x) {
                                "*" => {
                                    extra.pointer += 1;
                                    n = list.next(x);
                                }
                                "&" => {
                                    extra.reference = true;
                                    n = list.next(x);
                                }
                                _ => break,
                            }
                        }
                        if let Some(x) = n {
                            if list[x].kind == TokenKind::Name
                                && matches!(list.text_at(x, 1), ";" | "=" | "," | "[")
                            {
                                next_name = Some((x, extra));
                            }
                        }
                        break;
                    }
                    _ => {}
                }
                t = list.next(s);
            }
            match next_name {
                Some((n, extra)) => {
                    name_tok = n;
                    flags = DeclFlags {
                        pointer: flags.base_pointer + extra.pointer,
                        base_pointer: flags.base_pointer,
                        reference: extra.reference,
                        ..flags
                    };
                }
                None => break,
            }
        }
        Ok(true)
    }

    fn declare_variable(
        &mut self,
        list: &mut TokenList,
        name_tok: Token,
        type_start: Token,
        mut ti: TypeInfo,
        flags: DeclFlags,
        scope: ScopeId,
        is_argument: bool,
    ) -> VarId {
        ti.pointer = flags.pointer;
        ti.reference = flags.reference;
        if flags.constness {
            ti.constness |= 1;
        }

        // Array dimensions.
        let mut dimensions = Vec::new();
        let mut is_array = false;
        let mut t = list.next(name_tok);
        while let Some(open) = t {
            if list.text(open) != "[" {
                break;
            }
            is_array = true;
            let size_tok = list.next(open).filter(|s| list.text(*s) != "]");
            let (known, size) = match size_tok {
                Some(s) if list[s].is_number() => match mathlib::parse_int(list.text(s)) {
                    Some(v) => (true, v),
                    None => (false, 0),
                },
                _ => (false, 0),
            };
            dimensions.push(Dimension {
                tok: size_tok,
                known,
                size,
            });
            t = list.link(open).and_then(|l| list.next(l));
        }

        let scope_kind = self.db.scopes[scope].kind;
        let is_global = scope_kind == ScopeKind::Global || scope_kind == ScopeKind::Namespace;
        let type_end = list.prev(name_tok).unwrap_or(type_start);
        let var = self.db.variables.push(VariableData {
            name: list.text(name_tok).to_string(),
            name_token: name_tok,
            type_start,
            type_end,
            decl_id: 0,
            scope,
            is_argument,
            is_global,
            is_local: !is_global && !is_argument,
            is_static: flags.is_static,
            is_extern: flags.is_extern,
            is_const: flags.constness,
            is_reference: flags.reference,
            is_pointer: flags.pointer > 0,
            is_array,
            is_volatile: flags.is_volatile,
            is_smart_pointer: flags.smart_pointer,
            dimensions,
            type_info: ti.clone(),
        });
        let decl_id = var.as_u32() + 1;
        self.db.variables[var].decl_id = decl_id;

        list[name_tok].var_id = decl_id;
        list[name_tok].kind = TokenKind::Variable;
        list[name_tok].type_info = Some(decayed(&ti, is_array));

        let frame_idx = self
            .stack
            .iter()
            .rposition(|f| f.scope == Some(scope))
            .unwrap_or_else(|| self.stack.len() - 1);
        let frame = self
            .stack
            .get_mut(frame_idx)
            .expect("scope stack is never empty");
        frame.names.insert(list.text(name_tok).to_string(), decl_id);
        var
    }

    fn resolve_name(&mut self, list: &mut TokenList, tok: Token) {
        let name = list.text(tok).to_string();
        // Never rebind the declaration name of a member access.
        if list.text_at(tok, -1) == "." || list.text_at(tok, -1) == "->" {
            return;
        }
        for frame in self.stack.iter().rev() {
            if let Some(&decl_id) = frame.names.get(&name) {
                list[tok].var_id = decl_id;
                list[tok].kind = TokenKind::Variable;
                if let Some(var) = self.db.variable_by_id(decl_id) {
                    list[tok].type_info = Some(decayed(&var.type_info, var.is_array));
                }
                return;
            }
        }
        if let Some(&e) = self.enum_names.get(&name) {
            list[tok].enumerator = e.into();
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct DeclFlags {
    pointer: u32,
    base_pointer: u32,
    reference: bool,
    constness: bool,
    is_static: bool,
    is_extern: bool,
    is_volatile: bool,
    smart_pointer: bool,
}

/// Can `tok` start a declaration type?
fn is_type_start(list: &TokenList, settings: &Settings, tok: Token) -> bool {
    let data = &list[tok];
    if data.is_standard_type() {
        return true;
    }
    match list.text(tok) {
        "const" | "static" | "extern" | "volatile" | "unsigned" | "signed" | "struct"
        | "union" => return true,
        "std" => return list.text_at(tok, 1) == "::",
        _ => {}
    }
    if data.kind == TokenKind::Name && data.var_id == 0 {
        if settings.library.container_full_name(list, tok).is_some() {
            return true;
        }
        // `T x` where T is an unknown name followed by another name.
        if list
            .tok_at(tok, 1)
            .is_some_and(|n| list[n].kind == TokenKind::Name)
        {
            return true;
        }
        // `T * x ;` pointer declarations of record types.
        if list.text_at(tok, 1) == "*"
            && list
                .tok_at(tok, 2)
                .is_some_and(|n| list[n].kind == TokenKind::Name)
            && matches!(list.text_at(tok, 3), ";" | "=" | ",")
        {
            return true;
        }
    }
    false
}

/// Parse qualifiers and a type from `tok`; return the declared name token,
/// the token after it, the base type info and the parsed flags.
fn parse_decl_name(
    list: &TokenList,
    settings: &Settings,
    tok: Token,
) -> Option<(Token, Token, TypeInfo, DeclFlags)> {
    let mut flags = DeclFlags::default();
    let mut cur = Some(tok);
    let mut seen_base = false;
    while let Some(t) = cur {
        match list.text(t) {
            "const" => flags.constness = true,
            "static" => flags.is_static = true,
            "extern" => flags.is_extern = true,
            "volatile" => flags.is_volatile = true,
            "struct" | "union" | "enum" => {}
            "unsigned" | "signed" => seen_base = true,
            "*" => {
                if !seen_base {
                    return None;
                }
                flags.pointer += 1;
            }
            "&" => {
                if !seen_base {
                    return None;
                }
                flags.reference = true;
            }
            "::" => {}
            text => {
                let data = &list[t];
                if data.is_standard_type() {
                    seen_base = true;
                } else if data.kind == TokenKind::Name && data.var_id == 0 {
                    if text == "std" && list.text_at(t, 1) == "::" {
                        // qualifier, keep going
                    } else if !seen_base {
                        // This is the base type name... unless it is already
                        // the declared name.
                        if matches!(text, "unique_ptr" | "shared_ptr") {
                            flags.smart_pointer = true;
                        }
                        // Skip a template argument list.
                        if list.text_at(t, 1) == "<" {
                            if let Some(close) = list.find_closing_bracket(
                                list.tok_at(t, 1)?,
                            ) {
                                seen_base = true;
                                cur = list.next(close);
                                continue;
                            }
                            return None;
                        }
                        seen_base = true;
                    } else {
                        // The declared name.
                        flags.base_pointer = flags.pointer;
                        let ti = types::parse_decl(list, tok, settings);
                        let after = list.next(t)?;
                        return Some((t, after, strip_indirection(ti), flags));
                    }
                } else {
                    return None;
                }
            }
        }
        cur = list.next(t);
    }
    None
}

fn strip_indirection(mut ti: TypeInfo) -> TypeInfo {
    ti.pointer = 0;
    ti.reference = false;
    ti
}

/// Expression type of a name token: arrays decay to element pointers.
fn decayed(ti: &TypeInfo, is_array: bool) -> TypeInfo {
    let mut ti = ti.clone();
    if is_array {
        ti.pointer += 1;
    }
    ti
}

/// Is the variable's scope a `switch`?
pub fn scope_is_switch(db: &SymbolDatabase, scope: Option<ScopeId>) -> bool {
    scope.is_some_and(|s| db.scopes[s].kind == ScopeKind::Switch)
}

/// Find a token's enclosing scope of one of the given kinds.
pub fn enclosing_scope_of_kind(
    db: &SymbolDatabase,
    list: &TokenList,
    tok: Token,
    kinds: &[ScopeKind],
) -> Option<ScopeId> {
    let mut scope = list[tok].scope.expand();
    while let Some(s) = scope {
        if kinds.contains(&db.scopes[s].kind) {
            return Some(s);
        }
        scope = db.scopes[s].nested_in;
    }
    None
}

/// Find a variable use inside `[start, end)` matching the declaration id.
pub fn find_var_use(
    list: &TokenList,
    start: Option<Token>,
    end: Option<Token>,
    decl_id: u32,
) -> AnalysisResult<Option<Token>> {
    matcher::find_match_varid(list, start, end, "%varid%", decl_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use crate::tokens::Language;

    fn build_from(code: &str) -> (TokenList, SymbolDatabase) {
        let mut list = tokenize(code, "test.cpp", Language::Cpp).unwrap();
        let settings = Settings::default();
        let db = build(&mut list, &settings).unwrap();
        (list, db)
    }

    fn find_text(list: &TokenList, text: &str) -> Token {
        list.tokens().find(|t| list.text(*t) == text).unwrap()
    }

    #[test]
    fn function_scope_and_local_variable() {
        let (list, db) = build_from("void f() { int x = 10; return; }");
        assert_eq!(db.function_scopes.len(), 1);
        let x = find_text(&list, "x");
        assert!(list[x].var_id > 0);
        let var = db.variable_by_id(list[x].var_id).unwrap();
        assert!(var.is_local);
        assert!(!var.is_global);
        assert_eq!(var.type_info.base, BaseType::Int);
    }

    #[test]
    fn variable_uses_share_the_declaration_id() {
        let (list, _db) = build_from("void f() { int x = 1; x = x + 2; }");
        let ids: Vec<u32> = list
            .tokens()
            .filter(|t| list.text(*t) == "x")
            .map(|t| list[t].var_id)
            .collect();
        assert_eq!(ids.len(), 3);
        assert!(ids[0] > 0);
        assert!(ids.iter().all(|&id| id == ids[0]));
    }

    #[test]
    fn arguments_are_recorded() {
        let (list, db) = build_from("int add(int a, int b) { return a + b; }");
        let func = db.functions.values().next().unwrap();
        assert_eq!(func.arg_count(), 2);
        assert_eq!(func.min_args, 2);
        let a = find_text(&list, "a");
        let var = db.variable_by_id(list[a].var_id).unwrap();
        assert!(var.is_argument);
    }

    #[test]
    fn shadowing_gets_a_fresh_id() {
        let (list, _db) = build_from("void f() { int x = 1; { int x = 2; x = 3; } }");
        let ids: Vec<u32> = list
            .tokens()
            .filter(|t| list.text(*t) == "x")
            .map(|t| list[t].var_id)
            .collect();
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(ids[1], ids[2]);
    }

    #[test]
    fn if_scope_kinds() {
        let (list, db) = build_from("void f(int a) { if (a) { } else { } }");
        let kinds: Vec<ScopeKind> = db.scopes.values().map(|s| s.kind).collect();
        assert!(kinds.contains(&ScopeKind::If));
        assert!(kinds.contains(&ScopeKind::Else));
        assert!(kinds.contains(&ScopeKind::Function));
        let _ = list;
    }

    #[test]
    fn enumerators_in_declaration_order() {
        let (list, db) = build_from("enum E { A, B = 10, C };");
        let values: Vec<(String, i64, bool)> = db
            .enumerators
            .values()
            .map(|e| (e.name.clone(), e.value, e.value_known))
            .collect();
        assert_eq!(
            values,
            [
                ("A".to_string(), 0, true),
                ("B".to_string(), 10, true),
                ("C".to_string(), 11, true)
            ]
        );
        let a = find_text(&list, "A");
        assert!(list[a].enumerator.is_some());
    }

    #[test]
    fn array_dimensions() {
        let (list, db) = build_from("void f() { int arr[10]; }");
        let arr = find_text(&list, "arr");
        let var = db.variable_by_id(list[arr].var_id).unwrap();
        assert!(var.is_array);
        assert!(var.dimension_known(0));
        assert_eq!(var.dimension(0), 10);
    }

    #[test]
    fn pointer_and_const_flags() {
        let (list, db) = build_from("void f() { const char *p = 0; }");
        let p = find_text(&list, "p");
        let var = db.variable_by_id(list[p].var_id).unwrap();
        assert!(var.is_pointer);
        assert!(var.is_const);
        assert_eq!(var.type_info.base, BaseType::Char);
    }

    #[test]
    fn container_variable() {
        let (list, db) = build_from("void f() { std::vector<int> v; v.size(); }");
        let v = find_text(&list, "v");
        assert!(list[v].var_id > 0);
        let var = db.variable_by_id(list[v].var_id).unwrap();
        assert_eq!(var.type_info.base, BaseType::Container);
        assert_eq!(var.type_info.container.as_deref(), Some("std::vector"));
    }

    #[test]
    fn global_variables() {
        let (list, db) = build_from("const int limit = 100; void f() { int x = limit; }");
        let uses: Vec<Token> = list
            .tokens()
            .filter(|t| list.text(*t) == "limit")
            .collect();
        assert_eq!(uses.len(), 2);
        let var = db.variable_by_id(list[uses[0]].var_id).unwrap();
        assert!(var.is_global);
        assert!(var.is_const);
        assert_eq!(list[uses[1]].var_id, list[uses[0]].var_id);
    }

    #[test]
    fn call_sites_resolve_functions() {
        let (list, db) = build_from("int g(int a) { return a; } void f() { g(1); }");
        let calls: Vec<Token> = list
            .tokens()
            .filter(|t| list.text(*t) == "g" && list[*t].function.is_some())
            .collect();
        assert_eq!(calls.len(), 1);
        let func = list[calls[0]].function.expand().unwrap();
        assert_eq!(db.functions[func].name, "g");
    }

    #[test]
    fn multi_declaration() {
        let (list, db) = build_from("void f() { int a = 1, b = 2; }");
        let a = find_text(&list, "a");
        let b = find_text(&list, "b");
        assert!(list[a].var_id > 0);
        assert!(list[b].var_id > 0);
        assert_ne!(list[a].var_id, list[b].var_id);
        let _ = db;
    }
}
