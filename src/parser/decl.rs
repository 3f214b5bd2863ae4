//! Declarations and assignments.

use super::{error, PResult, Parser};
use crate::ast::{Block, ExprId, ExprKind, Function, Node, NodeKind, Struct, Symbol, Variable};
use crate::error::CompileErrorKind;
use crate::token::{Location, TokenKind};
use crate::types::{is_valid_types, DataType};
use log::debug;

impl<'t, 'a> Parser<'t, 'a> {
    /// `name: [const] (type | Struct) [ '[' size ']' ]`
    ///
    /// Shared by variable declarations, struct fields and function arguments.
    fn parse_var_signature(&mut self) -> PResult<(Variable<'a>, Option<ExprId<'a>>, Location<'a>)> {
        let (name, loc) = self.expect_ident()?;
        self.expect(&TokenKind::Colon)?;

        let mut var = Variable::new(name, DataType::Void);
        if self.peek_is(0, &TokenKind::Const) {
            self.cursor += 1;
            var.is_const = true;
        }

        let token = self.consume()?;
        match token.kind {
            TokenKind::Type(data_type) => var.data_type = data_type,
            TokenKind::Ident(struct_name) if self.is_structure(struct_name) => {
                var.is_struct = true;
                var.struct_name = Some(struct_name);
                var.data_type = DataType::Ptr;
            }
            TokenKind::Ident(unknown) => {
                return error(token.loc, CompileErrorKind::UnknownType(unknown.to_string()))
            }
            ref kind => return error(token.loc, CompileErrorKind::ExpectedType(kind.name())),
        }

        let mut array_size = None;
        if self.peek_is(0, &TokenKind::OBracket) {
            self.cursor += 1;
            array_size = Some(self.parse_expr()?);
            self.expect(&TokenKind::CBracket)?;
        }
        var.is_array = array_size.is_some() || var.data_type == DataType::Str;

        Ok((var, array_size, loc))
    }

    /// `name: T = init`. Globals go to `globals`, locals inline into `nodes`.
    pub(super) fn parse_var_decl(&mut self) -> PResult<()> {
        let (mut var, array_size, loc) = self.parse_var_signature()?;
        self.expect(&TokenKind::Eq)?;

        let values = if var.is_array && var.data_type != DataType::Str {
            self.parse_array_init(&var)?
        } else if var.is_struct {
            vec![self.parse_struct_init(&var, loc)?]
        } else {
            let value = self.parse_expr()?;
            let expr = &self.program[value];
            if !is_valid_types(expr.data_type, var.data_type) {
                return error(
                    loc,
                    CompileErrorKind::VarTypeMismatch {
                        name: var.name.to_string(),
                        expected: var.data_type.name(),
                        found: expr.type_name(),
                    },
                );
            }
            self.program.exprs[value].data_type = var.data_type;
            vec![value]
        };

        var.function = self.current_function();
        let node = Node::new(
            NodeKind::VarDecl {
                var,
                array_size,
                values,
            },
            loc,
        );
        if var.is_global() {
            self.program.globals.push(node);
        } else {
            self.program.nodes.push(node);
        }
        self.program.symbols.push(Symbol::Var(var));
        Ok(())
    }

    /// `[e, e, ...]`, every element checked against the element type
    fn parse_array_init(&mut self, var: &Variable<'a>) -> PResult<Vec<ExprId<'a>>> {
        self.expect(&TokenKind::OBracket)?;
        let mut values = Vec::new();
        loop {
            let value = self.parse_expr()?;
            let expr = &self.program[value];
            if !is_valid_types(expr.data_type, var.data_type) {
                return error(
                    expr.loc,
                    CompileErrorKind::VarTypeMismatch {
                        name: var.name.to_string(),
                        expected: var.data_type.name(),
                        found: expr.type_name(),
                    },
                );
            }
            values.push(value);

            let token = self.consume()?;
            match token.kind {
                TokenKind::CBracket => return Ok(values),
                TokenKind::Comma => continue,
                _ => {
                    return error(
                        token.loc,
                        CompileErrorKind::ExpectedToken {
                            expected: TokenKind::Comma.name(),
                            found: token.kind.name(),
                        },
                    )
                }
            }
        }
    }

    /// A struct literal checked field by field, or any other pointer valued expression
    fn parse_struct_init(
        &mut self,
        var: &Variable<'a>,
        loc: Location<'a>,
    ) -> PResult<ExprId<'a>> {
        let value = self.parse_expr()?;
        let expr = &self.program[value];
        if expr.data_type != DataType::Ptr {
            return error(loc, CompileErrorKind::ExpectedStruct(expr.type_name()));
        }

        let ExprKind::Struct { values } = &expr.kind else {
            return Ok(value);
        };
        let values = values.clone();

        let structure = self.get_structure(var.struct_name.unwrap_or_default(), loc)?;
        if structure.fields.len() != values.len() {
            return error(
                loc,
                CompileErrorKind::FieldCount {
                    name: structure.name.to_string(),
                    expected: structure.fields.len(),
                    found: values.len(),
                },
            );
        }
        for (field, id) in structure.fields.iter().zip(values) {
            if !is_valid_types(self.program[id].data_type, field.data_type) {
                return error(
                    loc,
                    CompileErrorKind::FieldTypeMismatch(field.name.to_string()),
                );
            }
            self.program.exprs[id].data_type = field.data_type;
        }
        Ok(value)
    }

    /// `struct Name { field: T, ... }`, every field followed by a comma
    pub(super) fn parse_struct_decl(&mut self) -> PResult<()> {
        let loc = self.consume()?.loc;
        let (name, _) = self.expect_ident()?;

        // Stub first so fields can refer to the struct being declared
        self.program.symbols.push(Symbol::Struct(Struct {
            name,
            fields: Vec::new(),
        }));
        let slot = self.program.symbols.len() - 1;

        self.expect(&TokenKind::OCurly)?;
        let mut fields = Vec::new();
        while !self.peek_is(0, &TokenKind::CCurly) {
            let (field, _, _) = self.parse_var_signature()?;
            self.expect(&TokenKind::Comma)?;
            fields.push(field);
        }
        self.expect(&TokenKind::CCurly)?;

        debug!("{loc}: struct `{name}` with {} fields", fields.len());
        let structure = Struct { name, fields };
        self.program.symbols[slot] = Symbol::Struct(structure.clone());
        self.program
            .structs
            .push(Node::new(NodeKind::StructDecl(structure), loc));
        Ok(())
    }

    /// Index of the `)` closing the `(` at `offset`, if any
    fn matching_paren(&self, offset: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut index = offset;
        while let Some(token) = self.peek(index) {
            match token.kind {
                TokenKind::OParen => depth += 1,
                TokenKind::CParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(index);
                    }
                }
                _ => {}
            }
            index += 1;
        }
        None
    }

    /// Statement starting with an identifier that is not a declaration: decided by the next
    /// token.
    pub(super) fn parse_reassign(&mut self) -> PResult<()> {
        let (name, loc) = self.expect_ident()?;
        let next = self.peek(0).map(|token| &token.kind);

        match next {
            Some(TokenKind::Eq) => {
                self.cursor += 1;
                let var = self.get_var(name, loc)?;
                if var.is_const {
                    return error(loc, CompileErrorKind::ConstVariable(name.to_string()));
                }
                let value = self.parse_expr()?;
                let expr = &self.program[value];
                if !is_valid_types(expr.data_type, var.data_type) {
                    return error(
                        expr.loc,
                        CompileErrorKind::TypeMismatch {
                            expected: var.data_type.name(),
                            found: expr.type_name(),
                        },
                    );
                }
                self.push_node(NodeKind::VarReassign { name, value }, loc);
            }
            Some(TokenKind::Dot) => {
                self.cursor += 1;
                let (field, field_loc) = self.expect_ident()?;
                self.expect(&TokenKind::Eq)?;
                let value = self.parse_expr()?;

                let var = self.get_var(name, loc)?;
                let declared = self.get_field(&var, field, field_loc)?;
                if declared.is_const {
                    return error(loc, CompileErrorKind::ConstField(field.to_string()));
                }
                if !is_valid_types(self.program[value].data_type, declared.data_type) {
                    return error(loc, CompileErrorKind::FieldTypeMismatch(field.to_string()));
                }
                self.push_node(
                    NodeKind::FieldReassign {
                        structure: name,
                        field,
                        value,
                    },
                    loc,
                );
            }
            Some(TokenKind::OBracket) => {
                self.cursor += 1;
                let index = self.parse_expr()?;
                self.expect(&TokenKind::CBracket)?;

                let token = self.consume()?;
                match token.kind {
                    TokenKind::Eq => {}
                    TokenKind::Dot => return error(token.loc, CompileErrorKind::ArrayFieldAssign),
                    ref kind => return error(token.loc, CompileErrorKind::UnexpectedToken(kind.name())),
                }

                let var = self.get_var(name, loc)?;
                let value = self.parse_expr()?;
                let expr = &self.program[value];
                if !is_valid_types(expr.data_type, var.data_type) {
                    return error(
                        expr.loc,
                        CompileErrorKind::TypeMismatch {
                            expected: var.data_type.name(),
                            found: expr.type_name(),
                        },
                    );
                }
                self.push_node(
                    NodeKind::IndexAssign {
                        array: name,
                        index,
                        value,
                    },
                    loc,
                );
            }
            Some(TokenKind::OParen) => {
                let Some(close) = self.matching_paren(0) else {
                    return error(
                        self.end_loc(),
                        CompileErrorKind::ExpectedToken {
                            expected: TokenKind::CParen.name(),
                            found: "end of input",
                        },
                    );
                };

                if self.peek_is(close + 1, &TokenKind::Colon) {
                    self.parse_func_decl(name, loc)?;
                } else if self.get_ext_func(name).is_some() {
                    // external calls are expressions, rewind to the name
                    self.cursor -= 1;
                    let expr = self.parse_expr()?;
                    self.push_node(NodeKind::ExprStmt(expr), loc);
                } else {
                    let function = self.get_function(name, loc)?;
                    let args = self.parse_args()?;
                    self.check_args(name, &function.args, &args, loc)?;
                    self.push_node(NodeKind::FuncCall { name, args }, loc);
                }
            }
            _ => {
                self.cursor -= 1;
                let expr = self.parse_expr()?;
                self.push_node(NodeKind::ExprStmt(expr), loc);
            }
        }
        Ok(())
    }

    /// `name(arg: T, ...): (type | Struct)`. The body follows as ordinary statements up to
    /// the matching `end`.
    fn parse_func_decl(&mut self, name: &'a str, loc: Location<'a>) -> PResult<()> {
        self.blocks.push(Block::Func(name));
        self.expect(&TokenKind::OParen)?;

        let mut args = Vec::new();
        if self.peek_is(0, &TokenKind::CParen) {
            self.cursor += 1;
        } else {
            loop {
                let (mut arg, _, _) = self.parse_var_signature()?;
                arg.function = Some(name);
                args.push(arg);

                let token = self.consume()?;
                match token.kind {
                    TokenKind::CParen => break,
                    TokenKind::Comma => continue,
                    _ => {
                        return error(
                            token.loc,
                            CompileErrorKind::ExpectedToken {
                                expected: TokenKind::CParen.name(),
                                found: token.kind.name(),
                            },
                        )
                    }
                }
            }
        }

        self.expect(&TokenKind::Colon)?;
        let token = self.consume()?;
        let return_type = match token.kind {
            TokenKind::Type(data_type) => data_type,
            TokenKind::Ident(struct_name) if self.is_structure(struct_name) => DataType::Ptr,
            TokenKind::Ident(unknown) => {
                return error(token.loc, CompileErrorKind::UnknownType(unknown.to_string()))
            }
            ref kind => return error(token.loc, CompileErrorKind::UnexpectedToken(kind.name())),
        };

        let label = self.open_label();
        let function = Function {
            name,
            args,
            return_type,
            label,
        };
        debug!("{loc}: function `{name}` at label {label}");

        self.program.functions.push(function.clone());
        self.program.symbols.push(Symbol::Func(function.clone()));
        self.push_node(NodeKind::FuncDecl(function), loc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{parse_error, parse_source};
    use crate::ast::{ExprKind, NodeKind, Symbol};
    use crate::error::CompileErrorKind;
    use crate::types::DataType;

    #[test]
    fn string_into_int_inside_function() {
        let err = parse_error("f(): int\ny: int = 5\ny = \"hi\"\nreturn y\nend");
        assert_eq!(
            err,
            CompileErrorKind::TypeMismatch {
                expected: "int",
                found: "str"
            }
        );
        let message = err.to_string();
        assert!(message.contains("int") && message.contains("str"));
    }

    #[test]
    fn const_reassign() {
        assert_eq!(
            parse_error("x: const int = 1\nx = 2"),
            CompileErrorKind::ConstVariable("x".to_string())
        );
        assert_eq!(
            parse_error("struct S { a: const int, }\ns: S = {1}\ns.a = 2"),
            CompileErrorKind::ConstField("a".to_string())
        );
    }

    #[test]
    fn declaration_mismatch() {
        assert_eq!(
            parse_error("x: float = 1"),
            CompileErrorKind::VarTypeMismatch {
                name: "x".to_string(),
                expected: "float",
                found: "int"
            }
        );
        assert_eq!(
            parse_error("x: int[2] = [1, 'a']"),
            CompileErrorKind::VarTypeMismatch {
                name: "x".to_string(),
                expected: "int",
                found: "char"
            }
        );
        assert_eq!(
            parse_error("x: Point = 1"),
            CompileErrorKind::UnknownType("Point".to_string())
        );
    }

    #[test]
    fn initializer_is_coerced() {
        let program = parse_source("x: u32 = 7").unwrap();
        let NodeKind::VarDecl { values, .. } = &program.globals[0].kind else {
            panic!("expected a declaration");
        };
        assert_eq!(program[values[0]].data_type, DataType::U32);
    }

    #[test]
    fn structs() {
        let program = parse_source(
            "struct Point { x: int, y: float, }
            p: Point = {1, 2.5}
            p.x = 3",
        )
        .unwrap();

        assert_eq!(program.structs.len(), 1);
        let Symbol::Struct(point) = &program.symbols[0] else {
            panic!("expected a struct symbol");
        };
        assert_eq!(point.fields.len(), 2);
        assert_eq!(point.fields[1].data_type, DataType::Float);

        let NodeKind::VarDecl { var, values, .. } = &program.globals[0].kind else {
            panic!("expected a declaration");
        };
        assert!(var.is_struct);
        assert_eq!(var.struct_name, Some("Point"));
        let ExprKind::Struct { values } = &program[values[0]].kind else {
            panic!("expected a struct literal");
        };
        assert_eq!(program[values[1]].data_type, DataType::Float);

        assert!(matches!(
            program.nodes[0].kind,
            NodeKind::FieldReassign {
                structure: "p",
                field: "x",
                ..
            }
        ));
    }

    #[test]
    fn struct_errors() {
        let point = "struct Point { x: int, y: float, }\n";
        assert_eq!(
            parse_error(&format!("{point}p: Point = {{1}}")),
            CompileErrorKind::FieldCount {
                name: "Point".to_string(),
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            parse_error(&format!("{point}p: Point = {{1, 2}}")),
            CompileErrorKind::FieldTypeMismatch("y".to_string())
        );
        assert_eq!(
            parse_error(&format!("{point}p: Point = 5")),
            CompileErrorKind::ExpectedStruct("int")
        );
        // the comma after the last field is required
        assert_eq!(
            parse_error("struct P { x: int }"),
            CompileErrorKind::ExpectedToken {
                expected: ",",
                found: "}"
            }
        );
    }

    #[test]
    fn self_referencing_struct() {
        let program = parse_source("struct Node { value: int, next: Node, }").unwrap();
        let Symbol::Struct(node) = &program.symbols[0] else {
            panic!("expected a struct symbol");
        };
        assert_eq!(node.fields[1].struct_name, Some("Node"));
    }

    #[test]
    fn function_declaration_and_call() {
        let program = parse_source(
            "fact(n: int): int
                if n <= 1 then
                    return 1
                end
                return n * fact(n - 1)
            end
            fact(5)",
        )
        .unwrap();

        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].label, 1);
        assert_eq!(program.functions[0].args[0].name, "n");
        assert!(matches!(program.nodes[0].kind, NodeKind::FuncDecl(_)));
        assert!(matches!(
            program.nodes.last().unwrap().kind,
            NodeKind::FuncCall { name: "fact", .. }
        ));
    }

    #[test]
    fn nested_parens_in_call() {
        let program =
            parse_source("f(a: int): int\nreturn a\nend\nf((1 + 2) * 3)").unwrap();
        let NodeKind::FuncCall { args, .. } = &program.nodes.last().unwrap().kind else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn index_assign() {
        let program = parse_source("a: int[2] = [1, 2]\na[0] = 5").unwrap();
        assert!(matches!(
            program.nodes[0].kind,
            NodeKind::IndexAssign { array: "a", .. }
        ));

        assert_eq!(
            parse_error("struct S { v: int, }\ns: S = {1}\na: S[1] = [s]\na[0].v = 2"),
            CompileErrorKind::ArrayFieldAssign
        );
    }

    #[test]
    fn struct_return_type() {
        let program = parse_source(
            "struct P { x: int, }
            make(): P
                p: P = {1}
                return p
            end
            q: P = make()",
        )
        .unwrap();
        assert_eq!(program.functions[0].return_type, DataType::Ptr);
        assert_eq!(program.globals.len(), 1);

        assert_eq!(
            parse_error("make(): Q\nend"),
            CompileErrorKind::UnknownType("Q".to_string())
        );
    }
}
