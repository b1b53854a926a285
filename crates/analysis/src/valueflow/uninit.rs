//! Uninitialized-value tracking: a local declared without an initializer
//! carries a known UNINIT value forward until something writes it.

use crate::error::AnalysisResult;
use crate::errorlogger::ErrorLogger;
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::matcher::pat_match_varid;
use crate::tokens::TokenList;
use crate::types::BaseType;
use crate::values::{Value, ValueType};

use super::forward::forward_variable;

/// Seed UNINIT values for bare local declarations.
pub(crate) fn value_flow_uninit(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    for var_idx in 0..symbols.variables.len() {
        let var = symbols.variables[crate::symbols::VarId::from_u32(var_idx as u32)].clone();
        if !var.is_local || var.is_static || var.is_extern || var.is_reference || var.is_argument {
            continue;
        }
        if var.is_array {
            continue;
        }
        // Only standard types and pointers are known to need
        // initialization.
        let needs_init = var.is_pointer
            || matches!(
                var.type_info.base,
                BaseType::Bool
                    | BaseType::Char
                    | BaseType::Short
                    | BaseType::WcharT
                    | BaseType::Int
                    | BaseType::Long
                    | BaseType::LongLong
                    | BaseType::Float
                    | BaseType::Double
                    | BaseType::LongDouble
            );
        if !needs_init {
            continue;
        }
        let vardecl = var.name_token;
        if !symbols.is_executable_scope(list, vardecl) {
            continue;
        }
        // Declaration without initializer.
        if list.text_at(vardecl, 1) != ";" {
            continue;
        }
        // `int x ; x = ...` directly afterwards is not interesting.
        if pat_match_varid(list, Some(vardecl), "%varid% ; %varid% =", var.decl_id)? {
            continue;
        }

        let mut uninit_value = Value {
            value_type: ValueType::Uninit,
            tok_value: Some(vardecl),
            ..Value::default()
        };
        uninit_value.set_known();
        let mut values = vec![uninit_value];

        let scope_end = list[vardecl]
            .scope
            .expand()
            .and_then(|s| symbols.scopes[s].body_end);
        forward_variable(
            list,
            symbols,
            logger,
            settings,
            list.next(vardecl),
            scope_end,
            var.decl_id,
            &mut values,
            true,
            false,
        )?;
    }
    Ok(())
}
