//! Program memory: evaluating conditions under assumed variable values.
//!
//! A [`ProgramMemory`] is a small, copy-cheap map from variable id to one
//! assumed [`Value`]. The [`execute`] evaluator folds an expression AST
//! under that memory; [`condition_is_true`] / [`condition_is_false`] answer
//! whether a condition definitely holds or definitely fails under the
//! assumption.

use rustc_hash::FxHashMap;

use crate::mathlib;
use crate::symbols::SymbolDatabase;
use crate::tokens::{Token, TokenList};
use crate::values::Value;

/// Variable-id → assumed value.
#[derive(Clone, Debug, Default)]
pub struct ProgramMemory {
    values: FxHashMap<u32, Value>,
}

impl ProgramMemory {
    /// Empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assume `value` for the variable.
    pub fn set_value(&mut self, var_id: u32, value: Value) {
        self.values.insert(var_id, value);
    }

    /// Assume a plain int value for the variable.
    pub fn set_int_value(&mut self, var_id: u32, value: i64) {
        self.values.insert(var_id, Value::new_int(value));
    }

    /// The assumed int value, if the variable has one.
    pub fn get_int_value(&self, var_id: u32) -> Option<i64> {
        self.values
            .get(&var_id)
            .filter(|v| v.is_int_value())
            .map(|v| v.int_value)
    }

    /// The assumed token referent, if the variable holds one.
    pub fn get_tok_value(&self, var_id: u32) -> Option<Token> {
        self.values
            .get(&var_id)
            .filter(|v| v.is_tok_value())
            .and_then(|v| v.tok_value)
    }

    /// Is anything assumed about the variable?
    pub fn has_value(&self, var_id: u32) -> bool {
        self.values.contains_key(&var_id)
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// No assumptions at all?
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy assumptions from `other` without overwriting existing ones.
    pub fn insert(&mut self, other: &ProgramMemory) {
        for (k, v) in &other.values {
            self.values.entry(*k).or_insert_with(|| v.clone());
        }
    }

    /// Copy assumptions from `other`, overwriting existing ones.
    pub fn replace(&mut self, other: &ProgramMemory) {
        for (k, v) in &other.values {
            self.values.insert(*k, v.clone());
        }
    }
}

/// Evaluate `expr` under `pm`. `Err(())` means the value is unknown.
pub fn execute(list: &TokenList, expr: Option<Token>, pm: &ProgramMemory) -> Result<i64, ()> {
    let tok = expr.ok_or(())?;
    let data = &list[tok];

    if data.var_id > 0 {
        return pm.get_int_value(data.var_id).ok_or(());
    }
    if data.is_number() {
        return mathlib::parse_int(&data.text).ok_or(());
    }
    if data.is_char() {
        return mathlib::char_literal_value(&data.text).ok_or(());
    }
    if data.is_boolean() {
        return Ok(i64::from(data.text == "true"));
    }
    if data.text == "NULL" || data.text == "nullptr" {
        return Ok(0);
    }

    let op1 = list.ast_op1(tok);
    let op2 = list.ast_op2(tok);
    match data.text.as_str() {
        "&&" => {
            match execute(list, op1, pm) {
                Ok(0) => return Ok(0),
                Ok(_) => {}
                Err(()) => {
                    // Unknown lhs: a false rhs still decides.
                    return match execute(list, op2, pm) {
                        Ok(0) => Ok(0),
                        _ => Err(()),
                    };
                }
            }
            execute(list, op2, pm).map(|v| i64::from(v != 0))
        }
        "||" => match execute(list, op1, pm) {
            Ok(v) if v != 0 => Ok(1),
            Ok(_) => execute(list, op2, pm).map(|v| i64::from(v != 0)),
            Err(()) => match execute(list, op2, pm) {
                Ok(v) if v != 0 => Ok(1),
                _ => Err(()),
            },
        },
        "!" => execute(list, op1, pm).map(|v| i64::from(v == 0)),
        "~" if op2.is_none() => execute(list, op1, pm).map(|v| !v),
        "-" if op2.is_none() => execute(list, op1, pm).map(|v| v.wrapping_neg()),
        "+" if op2.is_none() => execute(list, op1, pm),
        "?" => {
            let cond = execute(list, op1, pm)?;
            let colon = op2.ok_or(())?;
            if cond != 0 {
                execute(list, list.ast_op1(colon), pm)
            } else {
                execute(list, list.ast_op2(colon), pm)
            }
        }
        "(" if data.is_cast() => execute(list, op1, pm),
        _ if data.is_comparison_op()
            || data.is_arithmetical_op()
            || matches!(data.text.as_str(), "&" | "|" | "^" | "<<" | ">>") =>
        {
            let lhs = execute(list, op1, pm)?;
            let rhs = execute(list, op2, pm)?;
            mathlib::calculate_int(&data.text, lhs, rhs).map_err(|_| ())
        }
        _ => Err(()),
    }
}

/// Is the condition certainly true under the assumptions?
pub fn condition_is_true(
    list: &TokenList,
    condition: Option<Token>,
    pm: &ProgramMemory,
) -> bool {
    let Some(cond) = condition else { return false };
    if list.text(cond) == "&&" {
        return condition_is_true(list, list.ast_op1(cond), pm)
            && condition_is_true(list, list.ast_op2(cond), pm);
    }
    matches!(execute(list, Some(cond), pm), Ok(v) if v != 0)
}

/// Is the condition certainly false under the assumptions?
pub fn condition_is_false(
    list: &TokenList,
    condition: Option<Token>,
    pm: &ProgramMemory,
) -> bool {
    let Some(cond) = condition else { return false };
    if list.text(cond) == "||" {
        return condition_is_false(list, list.ast_op1(cond), pm)
            && condition_is_false(list, list.ast_op2(cond), pm);
    }
    matches!(execute(list, Some(cond), pm), Ok(0))
}

/// Build the program memory holding at `tok`, assuming `value` for
/// `var_id`: walk backwards collecting plain constant assignments of other
/// variables.
pub fn get_program_memory(
    list: &TokenList,
    symbols: &SymbolDatabase,
    tok: Token,
    var_id: u32,
    value: &Value,
) -> ProgramMemory {
    let mut pm = ProgramMemory::new();
    pm.set_value(var_id, value.clone());

    let mut cur = list.prev(tok);
    let mut steps = 0;
    while let Some(t) = cur {
        steps += 1;
        if steps > 2000 {
            break;
        }
        // Stop when leaving the enclosing function.
        if list.text(t) == "{"
            && list[t]
                .scope
                .expand()
                .is_some_and(|s| !symbols.scopes[s].is_executable())
        {
            break;
        }
        // `x = <number> ;` with the nearest assignment winning.
        if list[t].var_id > 0
            && list[t].var_id != var_id
            && !pm.has_value(list[t].var_id)
            && list.text_at(t, 1) == "="
        {
            if let Some(rhs) = list.tok_at(t, 2) {
                if list[rhs].is_number() && list.text_at(rhs, 1) == ";" {
                    if let Some(v) = mathlib::parse_int(list.text(rhs)) {
                        pm.set_int_value(list[t].var_id, v);
                    }
                }
            }
        }
        cur = list.prev(t);
    }
    pm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astbuild;
    use crate::settings::Settings;
    use crate::symbols;
    use crate::tokenizer::tokenize;
    use crate::tokens::Language;

    fn prepare(code: &str) -> (TokenList, SymbolDatabase) {
        let settings = Settings::default();
        let mut list = tokenize(code, "test.cpp", Language::Cpp).unwrap();
        let db = symbols::build(&mut list, &settings).unwrap();
        astbuild::build_ast(&mut list, &db, &settings).unwrap();
        astbuild::set_value_types(&mut list, &db, &settings);
        (list, db)
    }

    fn condition_root(list: &TokenList) -> Token {
        // The condition of the first `if (...)`.
        let if_tok = list.tokens().find(|t| list.text(*t) == "if").unwrap();
        let open = list.tok_at(if_tok, 1).unwrap();
        list.ast_op2(open).unwrap()
    }

    fn var_id_of(list: &TokenList, name: &str) -> u32 {
        list.tokens()
            .find(|t| list.text(*t) == name && list[*t].var_id > 0)
            .map(|t| list[t].var_id)
            .unwrap()
    }

    #[test]
    fn comparison_under_memory() {
        let (list, _) = prepare("void f(int x) { if (x > 5) { } }");
        let cond = condition_root(&list);
        let x = var_id_of(&list, "x");
        let mut pm = ProgramMemory::new();
        pm.set_int_value(x, 7);
        assert!(condition_is_true(&list, Some(cond), &pm));
        assert!(!condition_is_false(&list, Some(cond), &pm));
        pm.set_int_value(x, 3);
        assert!(condition_is_false(&list, Some(cond), &pm));
    }

    #[test]
    fn bare_variable_condition() {
        let (list, _) = prepare("void f(int x) { if (x) { } }");
        let cond = condition_root(&list);
        let x = var_id_of(&list, "x");
        let mut pm = ProgramMemory::new();
        pm.set_int_value(x, 0);
        assert!(condition_is_false(&list, Some(cond), &pm));
        pm.set_int_value(x, 10);
        assert!(condition_is_true(&list, Some(cond), &pm));
    }

    #[test]
    fn logical_and_partial_knowledge() {
        let (list, _) = prepare("void f(int x, int y) { if (x == 1 && y == 2) { } }");
        let cond = condition_root(&list);
        let x = var_id_of(&list, "x");
        let mut pm = ProgramMemory::new();
        // Only x known and inconsistent: whole condition is false.
        pm.set_int_value(x, 5);
        assert!(condition_is_false(&list, Some(cond), &pm));
        // Only x known and consistent: cannot decide.
        pm.set_int_value(x, 1);
        assert!(!condition_is_true(&list, Some(cond), &pm));
        assert!(!condition_is_false(&list, Some(cond), &pm));
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let (list, _) = prepare("void f(int x) { if (x + 1) { } }");
        let cond = condition_root(&list);
        let pm = ProgramMemory::new();
        assert!(execute(&list, Some(cond), &pm).is_err());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let (list, _) = prepare("void f(int x) { if (10 / x) { } }");
        let cond = condition_root(&list);
        let x = var_id_of(&list, "x");
        let mut pm = ProgramMemory::new();
        pm.set_int_value(x, 0);
        assert!(execute(&list, Some(cond), &pm).is_err());
    }

    #[test]
    fn program_memory_harvests_prior_assignments() {
        let (list, db) = prepare("void f(int a, int b) { a = 3 ; if (a + b) { } }");
        let if_tok = list.tokens().find(|t| list.text(*t) == "if").unwrap();
        let a = var_id_of(&list, "a");
        let b = var_id_of(&list, "b");
        let pm = get_program_memory(&list, &db, if_tok, b, &Value::new_int(4));
        assert_eq!(pm.get_int_value(b), Some(4));
        assert_eq!(pm.get_int_value(a), Some(3));
    }
}
