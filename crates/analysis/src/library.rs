//! Library configuration.
//!
//! Describes the behaviour of known library functions and container types:
//! which functions never return, what a function's return value looks like
//! in terms of its arguments, which member calls change a container's size
//! and which merely read it. The default configuration covers the common C
//! standard library allocation functions and the STL containers the
//! analysis understands.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::tokens::{Token, TokenList};

/// Effect of a container member call on the container's size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContainerAction {
    /// Unknown member; treated pessimistically by callers.
    #[default]
    NoAction,
    /// `resize`-like.
    Resize,
    /// `clear`-like.
    Clear,
    /// `push_back`-like: size grows by one.
    Push,
    /// `pop_back`-like: size shrinks by one.
    Pop,
    /// Changes size in an unknown way.
    Change,
    /// `insert`-like.
    Insert,
    /// `erase`-like.
    Erase,
    /// Mutates the elements but not the size.
    ChangeContent,
    /// Internal mutation without size change.
    ChangeInternal,
    /// `find`-like, non-mutating.
    Find,
    /// `find`-like on const containers.
    FindConst,
}

impl ContainerAction {
    /// Does this action change the container size?
    pub fn changes_size(&self) -> bool {
        matches!(
            self,
            ContainerAction::Resize
                | ContainerAction::Clear
                | ContainerAction::Push
                | ContainerAction::Pop
                | ContainerAction::Change
                | ContainerAction::Insert
                | ContainerAction::Erase
                | ContainerAction::ChangeInternal
                // An unknown member might do anything.
                | ContainerAction::NoAction
        )
    }
}

/// What a container member call yields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContainerYield {
    /// Nothing the analysis understands.
    #[default]
    NoYield,
    /// The element count.
    Size,
    /// Emptiness as a boolean.
    Empty,
    /// The element at an index argument.
    AtIndex,
    /// An iterator to the first element.
    StartIterator,
    /// An iterator past the last element.
    EndIterator,
    /// A reference to an element (`front`/`back`).
    Item,
    /// The raw buffer (`data`/`c_str`).
    Buffer,
}

/// Description of one container type.
#[derive(Clone, Debug, Default)]
pub struct ContainerInfo {
    /// Member name → size effect.
    pub actions: FxHashMap<String, ContainerAction>,
    /// Member name → yield.
    pub yields: FxHashMap<String, ContainerYield>,
    /// Behaves like `std::string` (has `+=`, compares against literals).
    pub std_string_like: bool,
    /// Behaves like `std::map`/`std::set` (subscript inserts).
    pub std_associative_like: bool,
    /// Template argument that fixes the size (e.g. `std::array<T, N>`),
    /// if any.
    pub size_template_arg: Option<usize>,
}

impl ContainerInfo {
    /// Size effect of calling member `name`.
    pub fn action(&self, name: &str) -> ContainerAction {
        self.actions.get(name).copied().unwrap_or_default()
    }

    /// Yield of calling member `name`.
    pub fn yields(&self, name: &str) -> ContainerYield {
        self.yields.get(name).copied().unwrap_or_default()
    }
}

/// How an allocation function derives its buffer size from its arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferSizeKind {
    /// `malloc(size)`.
    Malloc,
    /// `calloc(count, size)`.
    Calloc,
    /// `strdup(str)`.
    Strdup,
}

/// Allocation-function description.
#[derive(Clone, Debug)]
pub struct AllocFuncInfo {
    /// How the buffer size is computed.
    pub buffer_size: BufferSizeKind,
    /// 1-based index of the first size argument.
    pub size_arg1: usize,
    /// 1-based index of the second size argument (calloc).
    pub size_arg2: usize,
    /// Is this a realloc-style function?
    pub realloc: bool,
}

/// Description of one library function.
#[derive(Clone, Debug, Default)]
pub struct FunctionInfo {
    /// The call never returns (`exit`, `abort`, ...).
    pub noreturn: bool,
    /// Return value expression over `arg1`..`argN`, e.g. `"arg1*2"` or
    /// `"strlen(arg1)"`.
    pub return_value: Option<String>,
    /// Declared return type of the function, as C source.
    pub return_value_type: Option<String>,
    /// The function yields container information (`std::size`,
    /// `std::empty`).
    pub container_yield: ContainerYield,
    /// Allocation behaviour, if any.
    pub alloc: Option<AllocFuncInfo>,
    /// Possible return values when the real value is unknowable
    /// (for `--check-unknown-function-return`).
    pub unknown_return_values: Vec<i64>,
    /// Arguments (1-based) that the function is guaranteed not to write
    /// through.
    pub const_args: FxHashSet<usize>,
}

/// The library configuration database.
#[derive(Clone, Debug, Default)]
pub struct Library {
    functions: FxHashMap<String, FunctionInfo>,
    containers: FxHashMap<String, ContainerInfo>,
}

impl Library {
    /// Empty library, knowing nothing.
    pub fn empty() -> Self {
        Library::default()
    }

    /// Register a function description.
    pub fn add_function(&mut self, name: impl Into<String>, info: FunctionInfo) {
        self.functions.insert(name.into(), info);
    }

    /// Register a container description.
    pub fn add_container(&mut self, name: impl Into<String>, info: ContainerInfo) {
        self.containers.insert(name.into(), info);
    }

    /// Look up a function by name.
    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions
            .get(name)
            .or_else(|| self.functions.get(name.strip_prefix("std::")?))
    }

    /// Is the name *not* a known library function? Used to tell casts and
    /// unknown calls apart.
    pub fn is_not_library_function(&self, name: &str) -> bool {
        self.function(name).is_none()
    }

    /// Look up a container by name; a bare `vector` resolves to
    /// `std::vector` so that `using namespace std` code still matches.
    pub fn container(&self, name: &str) -> Option<&ContainerInfo> {
        if let Some(info) = self.containers.get(name) {
            return Some(info);
        }
        if let Some(stripped) = name.strip_prefix("std::") {
            return self.containers.get(stripped);
        }
        self.containers.get(format!("std::{name}").as_str())
    }

    /// If the name token at `tok` (optionally `std :: name`) names a known
    /// container, return its canonical (registry) name.
    pub fn container_full_name(&self, list: &TokenList, tok: Token) -> Option<String> {
        let mut name = list.text(tok).to_string();
        let mut t = tok;
        while list.text_at(t, 1) == "::" {
            let part = list.tok_at(t, 2)?;
            name.push_str("::");
            name.push_str(list.text(part));
            t = part;
        }
        if self.containers.contains_key(&name) {
            return Some(name);
        }
        let qualified = format!("std::{name}");
        if self.containers.contains_key(&qualified) {
            return Some(qualified);
        }
        if let Some(stripped) = name.strip_prefix("std::") {
            if self.containers.contains_key(stripped) {
                return Some(stripped.to_string());
            }
        }
        None
    }

    /// Return-value expression of a known function, if configured.
    pub fn return_value(&self, name: &str) -> Option<&str> {
        self.function(name)?.return_value.as_deref()
    }

    /// Return type of a known function, if configured.
    pub fn return_value_type(&self, name: &str) -> Option<&str> {
        self.function(name)?.return_value_type.as_deref()
    }

    /// Allocation info of a known function, if it allocates.
    pub fn alloc_func_info(&self, name: &str) -> Option<&AllocFuncInfo> {
        self.function(name)?.alloc.as_ref()
    }

    /// Does the scope ending at the token before `end_brace` end in a call
    /// that never returns? `unknown` receives the called name when the
    /// function is not in the library at all.
    pub fn is_scope_noreturn(
        &self,
        list: &TokenList,
        end_brace: Token,
        unknown: Option<&mut String>,
    ) -> bool {
        // Look for `name ( ... ) ; }` at the end of the scope.
        let semicolon = match list.prev(end_brace) {
            Some(t) if list.text(t) == ";" => t,
            _ => return false,
        };
        let close = match list.prev(semicolon) {
            Some(t) if list.text(t) == ")" => t,
            _ => return false,
        };
        let open = match list.link(close) {
            Some(t) => t,
            None => return false,
        };
        let name_tok = match list.prev(open) {
            Some(t) if list[t].is_name() => t,
            _ => return false,
        };
        let name = list.text(name_tok);
        match self.function(name) {
            Some(info) => info.noreturn,
            None => {
                if let Some(out) = unknown {
                    *out = name.to_string();
                }
                false
            }
        }
    }

    /// Library with the default C/C++ knowledge built in.
    pub fn with_defaults() -> Self {
        let mut lib = Library::empty();

        for name in ["abort", "exit", "_exit", "_Exit", "quick_exit", "longjmp"] {
            lib.add_function(
                name,
                FunctionInfo {
                    noreturn: true,
                    ..FunctionInfo::default()
                },
            );
        }

        lib.add_function(
            "malloc",
            FunctionInfo {
                alloc: Some(AllocFuncInfo {
                    buffer_size: BufferSizeKind::Malloc,
                    size_arg1: 1,
                    size_arg2: 0,
                    realloc: false,
                }),
                ..FunctionInfo::default()
            },
        );
        lib.add_function(
            "calloc",
            FunctionInfo {
                alloc: Some(AllocFuncInfo {
                    buffer_size: BufferSizeKind::Calloc,
                    size_arg1: 1,
                    size_arg2: 2,
                    realloc: false,
                }),
                ..FunctionInfo::default()
            },
        );
        lib.add_function(
            "realloc",
            FunctionInfo {
                alloc: Some(AllocFuncInfo {
                    buffer_size: BufferSizeKind::Malloc,
                    size_arg1: 2,
                    size_arg2: 0,
                    realloc: true,
                }),
                ..FunctionInfo::default()
            },
        );
        lib.add_function(
            "strdup",
            FunctionInfo {
                alloc: Some(AllocFuncInfo {
                    buffer_size: BufferSizeKind::Strdup,
                    size_arg1: 1,
                    size_arg2: 0,
                    realloc: false,
                }),
                ..FunctionInfo::default()
            },
        );
        lib.add_function(
            "strlen",
            FunctionInfo {
                return_value: Some("strlen(arg1)".to_string()),
                return_value_type: Some("unsigned long".to_string()),
                const_args: [1].into_iter().collect(),
                ..FunctionInfo::default()
            },
        );
        lib.add_function(
            "abs",
            FunctionInfo {
                return_value: Some("arg1<0?-arg1:arg1".to_string()),
                return_value_type: Some("int".to_string()),
                ..FunctionInfo::default()
            },
        );
        lib.add_function(
            "size",
            FunctionInfo {
                container_yield: ContainerYield::Size,
                ..FunctionInfo::default()
            },
        );
        lib.add_function(
            "empty",
            FunctionInfo {
                container_yield: ContainerYield::Empty,
                ..FunctionInfo::default()
            },
        );

        let sequence = || {
            let mut c = ContainerInfo::default();
            for (name, action) in [
                ("resize", ContainerAction::Resize),
                ("clear", ContainerAction::Clear),
                ("push_back", ContainerAction::Push),
                ("emplace_back", ContainerAction::Push),
                ("pop_back", ContainerAction::Pop),
                ("insert", ContainerAction::Insert),
                ("erase", ContainerAction::Erase),
                ("assign", ContainerAction::Change),
                ("swap", ContainerAction::Change),
                ("fill", ContainerAction::ChangeContent),
            ] {
                c.actions.insert(name.to_string(), action);
            }
            for (name, yield_) in [
                ("size", ContainerYield::Size),
                ("length", ContainerYield::Size),
                ("empty", ContainerYield::Empty),
                ("at", ContainerYield::AtIndex),
                ("begin", ContainerYield::StartIterator),
                ("cbegin", ContainerYield::StartIterator),
                ("end", ContainerYield::EndIterator),
                ("cend", ContainerYield::EndIterator),
                ("front", ContainerYield::Item),
                ("back", ContainerYield::Item),
                ("data", ContainerYield::Buffer),
            ] {
                c.yields.insert(name.to_string(), yield_);
            }
            c
        };

        lib.add_container("std::vector", sequence());
        lib.add_container("std::deque", sequence());
        lib.add_container("std::list", sequence());

        let mut string = sequence();
        string.std_string_like = true;
        string.yields.insert("c_str".to_string(), ContainerYield::Buffer);
        string.actions.insert("append".to_string(), ContainerAction::Change);
        lib.add_container("std::string", string);

        let mut map = sequence();
        map.std_associative_like = true;
        lib.add_container("std::map", map.clone());
        lib.add_container("std::set", map.clone());
        lib.add_container("std::unordered_map", map.clone());
        lib.add_container("std::unordered_set", map);

        let mut array = ContainerInfo::default();
        array.size_template_arg = Some(2);
        for (name, yield_) in [
            ("size", ContainerYield::Size),
            ("empty", ContainerYield::Empty),
            ("at", ContainerYield::AtIndex),
            ("front", ContainerYield::Item),
            ("back", ContainerYield::Item),
            ("data", ContainerYield::Buffer),
        ] {
            array.yields.insert(name.to_string(), yield_);
        }
        array.actions.insert("fill".to_string(), ContainerAction::ChangeContent);
        lib.add_container("std::array", array);

        lib
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_library_knows_std_containers() {
        let lib = Library::with_defaults();
        let vec = lib.container("std::vector").unwrap();
        assert_eq!(vec.action("push_back"), ContainerAction::Push);
        assert!(vec.action("push_back").changes_size());
        assert_eq!(vec.yields("size"), ContainerYield::Size);
        assert_eq!(vec.yields("empty"), ContainerYield::Empty);
        assert!(!vec.action("fill").changes_size());
    }

    #[test]
    fn string_is_string_like() {
        let lib = Library::with_defaults();
        assert!(lib.container("std::string").unwrap().std_string_like);
        assert!(!lib.container("std::vector").unwrap().std_string_like);
    }

    #[test]
    fn noreturn_functions() {
        let lib = Library::with_defaults();
        assert!(lib.function("abort").unwrap().noreturn);
        assert!(lib.is_not_library_function("frobnicate"));
    }

    #[test]
    fn alloc_info() {
        let lib = Library::with_defaults();
        let calloc = lib.alloc_func_info("calloc").unwrap();
        assert_eq!(calloc.buffer_size, BufferSizeKind::Calloc);
        assert_eq!(calloc.size_arg2, 2);
    }
}
