//! Name resolution against the flat symbol list.

use super::{error, PResult, Parser};
use crate::ast::{Block, ExtFunc, Function, Struct, Symbol, Variable};
use crate::error::CompileErrorKind;
use crate::token::Location;

impl<'t, 'a> Parser<'t, 'a> {
    /// Name of the function whose body is being parsed, if any
    pub(super) fn current_function(&self) -> Option<&'a str> {
        self.blocks.iter().rev().find_map(|block| match block {
            Block::Func(name) => Some(*name),
            _ => None,
        })
    }

    /// Inside a function: its arguments, then variables declared in it.
    /// Outside: global variables only.
    pub(super) fn get_var(&self, name: &str, loc: Location<'a>) -> PResult<Variable<'a>> {
        let function = self.current_function();

        if let Some(function) = function {
            let args = self
                .program
                .functions
                .iter()
                .rev()
                .find(|f| f.name == function)
                .map(|f| f.args.as_slice())
                .unwrap_or_default();
            if let Some(arg) = args.iter().find(|arg| arg.name == name) {
                return Ok(*arg);
            }
        }

        self.program
            .variables()
            .find(|var| var.name == name && var.function == function)
            .copied()
            .map_or_else(
                || error(loc, CompileErrorKind::UnknownVariable(name.to_string())),
                Ok,
            )
    }

    pub(super) fn get_function(&self, name: &str, loc: Location<'a>) -> PResult<Function<'a>> {
        match self.program.functions.iter().find(|f| f.name == name) {
            Some(function) => Ok(function.clone()),
            None => error(loc, CompileErrorKind::UnknownFunction(name.to_string())),
        }
    }

    pub(super) fn get_ext_func(&self, name: &str) -> Option<&ExtFunc<'a>> {
        self.program.symbols.iter().find_map(|symbol| match symbol {
            Symbol::Ext(func) if func.name == name => Some(func),
            _ => None,
        })
    }

    pub(super) fn is_structure(&self, name: &str) -> bool {
        self.program
            .symbols
            .iter()
            .any(|symbol| matches!(symbol, Symbol::Struct(s) if s.name == name))
    }

    pub(super) fn get_structure(&self, name: &str, loc: Location<'a>) -> PResult<Struct<'a>> {
        let found = self.program.symbols.iter().find_map(|symbol| match symbol {
            Symbol::Struct(s) if s.name == name => Some(s),
            _ => None,
        });
        match found {
            Some(structure) => Ok(structure.clone()),
            None => error(loc, CompileErrorKind::UnknownStruct(name.to_string())),
        }
    }

    /// The declared field `field` of the struct typed variable `var`
    pub(super) fn get_field(
        &self,
        var: &Variable<'a>,
        field: &str,
        loc: Location<'a>,
    ) -> PResult<Variable<'a>> {
        let structure = self.get_structure(var.struct_name.unwrap_or(var.name), loc)?;
        match structure.field(field) {
            Some(found) => Ok(*found),
            None => error(
                loc,
                CompileErrorKind::UnknownField {
                    structure: structure.name.to_string(),
                    field: field.to_string(),
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{parse_error, parse_source};
    use crate::ast::{NodeKind, Symbol};
    use crate::error::CompileErrorKind;
    use crate::types::DataType;

    #[test]
    fn globals_are_not_visible_in_functions() {
        assert_eq!(
            parse_error("g: int = 1\nf(): int\nreturn g\nend"),
            CompileErrorKind::UnknownVariable("g".to_string())
        );
    }

    #[test]
    fn locals_are_tagged_with_their_function() {
        let program = parse_source(
            "f(a: int): int
                if a > 0 then
                    b: int = a
                end
                return b
            end
            b: u8 = 1",
        )
        .unwrap();

        let vars: Vec<_> = program
            .variables()
            .map(|var| (var.name, var.data_type, var.function))
            .collect();
        assert_eq!(
            vars,
            vec![("b", DataType::Int, Some("f")), ("b", DataType::U8, None)]
        );
        assert_eq!(program.globals.len(), 1);
        assert!(program
            .nodes
            .iter()
            .any(|node| matches!(node.kind, NodeKind::VarDecl { .. })));
    }

    #[test]
    fn locals_are_not_visible_outside() {
        assert_eq!(
            parse_error("f(): int\nx: int = 1\nreturn x\nend\ny: int = x"),
            CompileErrorKind::UnknownVariable("x".to_string())
        );
    }

    #[test]
    fn arguments_shadow_locals() {
        let program = parse_source("f(a: char): char\nreturn a\nend").unwrap();
        let Symbol::Func(function) = &program.symbols[0] else {
            panic!("expected a function symbol");
        };
        assert_eq!(function.args[0].data_type, DataType::Char);
        assert_eq!(function.args[0].function, Some("f"));
    }

    #[test]
    fn unknown_names() {
        assert_eq!(
            parse_error("x: int = f()"),
            CompileErrorKind::UnknownFunction("f".to_string())
        );
        assert_eq!(
            parse_error("x: int = y"),
            CompileErrorKind::UnknownVariable("y".to_string())
        );
    }
}
