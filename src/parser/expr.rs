use super::{error, PResult, Parser};
use crate::ast::{BinOp, ExprId, ExprKind, ExtArg, ExtFunc, ExtFuncs, Symbol, Variable};
use crate::error::CompileErrorKind;
use crate::token::{Builtin, Location, TokenKind};
use crate::types::{is_valid_types, DataType};
use log::debug;

impl<'t, 'a> Parser<'t, 'a> {
    pub(super) fn parse_expr(&mut self) -> PResult<ExprId<'a>> {
        let lhs = self.parse_primary()?;
        self.parse_expr_1(lhs, 1)
    }

    fn peek_op(&self) -> Option<BinOp> {
        self.peek(0).and_then(|token| BinOp::from_token(&token.kind))
    }

    /// Precedence climbing over the binary operators
    fn parse_expr_1(&mut self, mut lhs: ExprId<'a>, min_precedence: u8) -> PResult<ExprId<'a>> {
        while let Some(op) = self.peek_op() {
            if op.precedence() < min_precedence {
                break;
            }
            self.cursor += 1;

            let mut rhs = self.parse_primary()?;
            let (left, right) = (&self.program[lhs], &self.program[rhs]);
            if !is_valid_types(left.data_type, right.data_type) {
                return error(
                    right.loc,
                    CompileErrorKind::MixedTypes(left.type_name(), right.type_name()),
                );
            }

            while let Some(next) = self.peek_op() {
                if next.precedence() <= op.precedence() {
                    break;
                }
                rhs = self.parse_expr_1(rhs, op.precedence() + 1)?;
            }

            let left = &self.program[lhs];
            let (data_type, loc) = (left.data_type, left.loc);
            lhs = self.alloc_expr(ExprKind::Binary { op, lhs, rhs }, data_type, loc);
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> PResult<ExprId<'a>> {
        let token = self.consume()?;
        let loc = token.loc;

        let (kind, data_type) = match &token.kind {
            TokenKind::Integer(value) => (ExprKind::Int(*value), DataType::Int),
            TokenKind::Float(value) => (ExprKind::Float(*value), DataType::Float),
            // A string is a pointer to its characters
            TokenKind::String(value) => (ExprKind::Str(value.clone()), DataType::Char),
            TokenKind::Char(value) => (ExprKind::Char(*value), DataType::Char),
            TokenKind::Builtin(builtin) => return self.parse_builtin(*builtin, loc),
            TokenKind::OCurly => {
                let mut values = Vec::new();
                loop {
                    values.push(self.parse_expr()?);
                    let token = self.consume()?;
                    match token.kind {
                        TokenKind::CCurly => break,
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
                (ExprKind::Struct { values }, DataType::Ptr)
            }
            TokenKind::OParen => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::CParen)?;
                return Ok(expr);
            }
            TokenKind::Ident(name) => return self.parse_ident_expr(*name, loc),
            kind => return error(loc, CompileErrorKind::ExpectedPrimary(kind.name())),
        };

        Ok(self.alloc_expr(kind, data_type, loc))
    }

    /// Call, external call, indexing, field access or plain variable
    fn parse_ident_expr(&mut self, name: &'a str, loc: Location<'a>) -> PResult<ExprId<'a>> {
        if let Some(func) = self.get_ext_func(name).cloned() {
            let args = self.parse_args()?;
            self.check_ext_args(&func, &args, loc)?;
            return Ok(self.alloc_expr(ExprKind::ExtCall { name, args }, func.return_type, loc));
        }

        match self.peek(0).map(|token| &token.kind) {
            Some(TokenKind::OParen) => {
                let function = self.get_function(name, loc)?;
                let args = self.parse_args()?;
                self.check_args(name, &function.args, &args, loc)?;
                Ok(self.alloc_expr(ExprKind::Call { name, args }, function.return_type, loc))
            }
            Some(TokenKind::OBracket) => {
                let var = self.get_var(name, loc)?;
                self.cursor += 1;
                let index = self.parse_expr()?;
                self.expect(&TokenKind::CBracket)?;

                if self.peek_is(0, &TokenKind::Dot) {
                    self.cursor += 1;
                    let (field, field_loc) = self.expect_ident()?;
                    let data_type = if var.is_struct {
                        self.get_field(&var, field, field_loc)?.data_type
                    } else {
                        var.data_type
                    };
                    let kind = ExprKind::IndexField {
                        array: name,
                        index,
                        field,
                    };
                    return Ok(self.alloc_expr(kind, data_type, loc));
                }

                Ok(self.alloc_expr(ExprKind::Index { array: name, index }, var.data_type, loc))
            }
            Some(TokenKind::Dot) => {
                let var = self.get_var(name, loc)?;
                self.cursor += 1;
                let (field, field_loc) = self.expect_ident()?;
                let data_type = self.get_field(&var, field, field_loc)?.data_type;
                let kind = ExprKind::Field {
                    structure: name,
                    field,
                };
                Ok(self.alloc_expr(kind, data_type, loc))
            }
            _ => {
                let var = self.get_var(name, loc)?;
                Ok(self.alloc_expr(ExprKind::Var(name), var.data_type, loc))
            }
        }
    }

    /// Parenthesized, comma separated argument list
    pub(super) fn parse_args(&mut self) -> PResult<Vec<ExprId<'a>>> {
        self.expect(&TokenKind::OParen)?;
        let mut args = Vec::new();
        if self.peek_is(0, &TokenKind::CParen) {
            self.cursor += 1;
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr()?);
            let token = self.consume()?;
            match token.kind {
                TokenKind::CParen => return Ok(args),
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

    /// Arity and positional types of a call to a user function
    pub(super) fn check_args(
        &self,
        name: &str,
        params: &[Variable<'a>],
        args: &[ExprId<'a>],
        loc: Location<'a>,
    ) -> PResult<()> {
        if params.len() != args.len() {
            return error(
                loc,
                CompileErrorKind::ArgumentCount {
                    name: name.to_string(),
                    expected: params.len(),
                    found: args.len(),
                },
            );
        }

        for (param, &arg) in params.iter().zip(args) {
            let arg = &self.program[arg];
            if !is_valid_types(arg.data_type, param.data_type) {
                return error(
                    arg.loc,
                    CompileErrorKind::ArgumentType {
                        name: param.name.to_string(),
                        expected: param.data_type.name(),
                        found: arg.type_name(),
                    },
                );
            }
        }
        Ok(())
    }

    pub(super) fn check_ext_args(
        &self,
        func: &ExtFunc<'a>,
        args: &[ExprId<'a>],
        loc: Location<'a>,
    ) -> PResult<()> {
        if func.args.len() != args.len() {
            return error(
                loc,
                CompileErrorKind::ArgumentCount {
                    name: func.name.to_string(),
                    expected: func.args.len(),
                    found: args.len(),
                },
            );
        }

        for (param, &arg) in func.args.iter().zip(args) {
            let arg = &self.program[arg];
            if !is_valid_types(arg.data_type, param.data_type) {
                return error(
                    arg.loc,
                    CompileErrorKind::TypeMismatch {
                        expected: param.data_type.name(),
                        found: arg.type_name(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Builtins take a comma separated list without parentheses, `dll` has its own grammar
    fn parse_builtin(&mut self, kind: Builtin, loc: Location<'a>) -> PResult<ExprId<'a>> {
        if kind == Builtin::Dll {
            let ext_funcs = self.parse_dll()?;
            return Ok(self.alloc_expr(ExprKind::Dll(ext_funcs), kind.return_type(), loc));
        }

        let mut args = vec![self.parse_expr()?];
        while self.peek_is(0, &TokenKind::Comma) {
            self.cursor += 1;
            args.push(self.parse_expr()?);
        }
        Ok(self.alloc_expr(ExprKind::Builtin { kind, args }, kind.return_type(), loc))
    }

    /// `dll "lib", name(T, ...): T, ..., end`
    fn parse_dll(&mut self) -> PResult<ExtFuncs<'a>> {
        let token = self.expect(&TokenKind::String(String::new()))?;
        let file_name = match &token.kind {
            TokenKind::String(name) => name.clone(),
            _ => String::new(),
        };
        self.expect(&TokenKind::Comma)?;

        let mut funcs = Vec::new();
        loop {
            let func = self.parse_ext_func_decl()?;
            self.expect(&TokenKind::Comma)?;
            debug!("{}: external function `{}` from {file_name}", token.loc, func.name);
            self.program.symbols.push(Symbol::Ext(func.clone()));
            funcs.push(func);
            if self.peek_is(0, &TokenKind::End) {
                self.cursor += 1;
                break;
            }
        }
        Ok(ExtFuncs { file_name, funcs })
    }

    /// `name(T, Struct&, ...): T`
    fn parse_ext_func_decl(&mut self) -> PResult<ExtFunc<'a>> {
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::OParen)?;

        let mut args = Vec::new();
        if self.peek_is(0, &TokenKind::CParen) {
            self.cursor += 1;
        } else {
            loop {
                let token = self.consume()?;
                let arg = match token.kind {
                    TokenKind::Type(data_type) => ExtArg {
                        data_type,
                        is_struct: false,
                        struct_name: None,
                        is_ptr: false,
                    },
                    TokenKind::Ident(struct_name) if self.is_structure(struct_name) => {
                        let is_ptr = self.peek_is(0, &TokenKind::Ampersand);
                        if is_ptr {
                            self.cursor += 1;
                        }
                        ExtArg {
                            data_type: DataType::Ptr,
                            is_struct: true,
                            struct_name: Some(struct_name),
                            is_ptr,
                        }
                    }
                    ref kind => return error(token.loc, CompileErrorKind::ExpectedType(kind.name())),
                };
                args.push(arg);

                let token = self.consume()?;
                match token.kind {
                    TokenKind::CParen => break,
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

        self.expect(&TokenKind::Colon)?;
        let token = self.consume()?;
        let TokenKind::Type(return_type) = token.kind else {
            return error(token.loc, CompileErrorKind::ExpectedType(token.kind.name()));
        };

        Ok(ExtFunc {
            name,
            args,
            return_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{parse_error, parse_source};
    use crate::ast::{BinOp, ExprKind, NodeKind, Symbol};
    use crate::error::CompileErrorKind;
    use crate::token::Builtin;
    use crate::types::DataType;

    fn global_init(source: &str) -> (ExprKind<'_>, DataType) {
        let program = parse_source(source).unwrap();
        let NodeKind::VarDecl { values, .. } = &program.globals.last().unwrap().kind else {
            panic!("expected a declaration");
        };
        let expr = &program[values[0]];
        (expr.kind.clone(), expr.data_type)
    }

    #[test]
    fn precedence() {
        let program = parse_source("x: int = 1 + 2 * 3 - 4").unwrap();
        let NodeKind::VarDecl { values, .. } = &program.globals[0].kind else {
            panic!("expected a declaration");
        };

        // (1 + (2 * 3)) - 4
        let ExprKind::Binary { op, lhs, rhs } = program[values[0]].kind else {
            panic!("expected a binary expression");
        };
        assert_eq!(op, BinOp::Minus);
        assert_eq!(program[rhs].kind, ExprKind::Int(4));
        let ExprKind::Binary { op, rhs, .. } = program[lhs].kind else {
            panic!("expected a binary expression");
        };
        assert_eq!(op, BinOp::Plus);
        assert!(matches!(
            program[rhs].kind,
            ExprKind::Binary {
                op: BinOp::Mult,
                ..
            }
        ));
    }

    #[test]
    fn parentheses() {
        let (kind, data_type) = global_init("x: int = (1 + 2) * 3");
        assert!(matches!(
            kind,
            ExprKind::Binary {
                op: BinOp::Mult,
                ..
            }
        ));
        assert_eq!(data_type, DataType::Int);
    }

    #[test]
    fn mixed_types() {
        assert_eq!(
            parse_error("x: int = 1 + 2.5"),
            CompileErrorKind::MixedTypes("int", "float")
        );
        assert_eq!(
            parse_error("x: int = 1 + 'c'"),
            CompileErrorKind::MixedTypes("int", "char")
        );
        // unsigned widths mix with int
        assert_eq!(global_init("a: u8 = 1\nx: int = a + 2").1, DataType::Int);
    }

    #[test]
    fn literals() {
        assert_eq!(global_init("x: float = 2.5").0, ExprKind::Float(2.5));
        assert_eq!(global_init("x: char = 'z'").0, ExprKind::Char(b'z'));
        assert_eq!(
            global_init("x: str = \"hi\"").0,
            ExprKind::Str("hi".to_string())
        );
        assert_eq!(
            parse_error("x: int = )"),
            CompileErrorKind::ExpectedPrimary(")")
        );
    }

    #[test]
    fn builtins() {
        let (kind, data_type) = global_init("p: ptr = alloc 8");
        assert_eq!(data_type, DataType::Ptr);
        let ExprKind::Builtin { kind, args } = kind else {
            panic!("expected a builtin");
        };
        assert_eq!(kind, Builtin::Alloc);
        assert_eq!(args.len(), 1);

        let program = parse_source("p: ptr = alloc 8\nstore p, 1, 8\ndealloc p").unwrap();
        let stores: Vec<_> = program
            .nodes
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::ExprStmt(expr) => Some(&program[expr]),
                _ => None,
            })
            .collect();
        assert_eq!(stores.len(), 2);
        assert!(matches!(&stores[0].kind, ExprKind::Builtin { kind: Builtin::Store, args } if args.len() == 3));
        assert_eq!(stores[1].data_type, DataType::Void);
    }

    #[test]
    fn function_calls() {
        let source = "add(a: int, b: int): int\nreturn a + b\nend\n";
        let text = format!("{source}x: int = add(1, 2)");
        let program = parse_source(&text).unwrap();
        let NodeKind::VarDecl { values, .. } = &program.globals[0].kind else {
            panic!("expected a declaration");
        };
        assert!(matches!(&program[values[0]].kind, ExprKind::Call { name: "add", args } if args.len() == 2));

        assert_eq!(
            parse_error(&format!("{source}x: int = add(1)")),
            CompileErrorKind::ArgumentCount {
                name: "add".to_string(),
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            parse_error(&format!("{source}x: int = add(1, 'c')")),
            CompileErrorKind::ArgumentType {
                name: "b".to_string(),
                expected: "int",
                found: "char"
            }
        );
    }

    #[test]
    fn fields_and_indexing() {
        let source = "struct Point { x: int, y: char, }\np: Point = {1, 'a'}\n";
        let text = format!("{source}c: char = p.y");
        let (kind, data_type) = global_init(&text);
        assert_eq!(
            kind,
            ExprKind::Field {
                structure: "p",
                field: "y"
            }
        );
        assert_eq!(data_type, DataType::Char);

        assert_eq!(
            parse_error(&format!("{source}c: char = p.z")),
            CompileErrorKind::UnknownField {
                structure: "Point".to_string(),
                field: "z".to_string()
            }
        );

        let (kind, data_type) = global_init("a: u16[2] = [1, 2]\nx: int = a[1]");
        assert!(matches!(kind, ExprKind::Index { array: "a", .. }));
        assert_eq!(data_type, DataType::Int);

        let text = format!("{source}ps: Point[1] = [p]\nc: char = ps[0].y");
        let (kind, data_type) = global_init(&text);
        assert!(matches!(kind, ExprKind::IndexField { array: "ps", field: "y", .. }));
        assert_eq!(data_type, DataType::Char);
    }

    #[test]
    fn dll_declarations() {
        let program = parse_source(
            "struct Vec { x: int, }
            dll \"libm.so\", cos(double): double, move(Vec&, int): void, end
            x: double = cos(1)",
        );
        // `1` is an int, `cos` wants a double
        assert_eq!(
            program.unwrap_err().kind,
            CompileErrorKind::TypeMismatch {
                expected: "double",
                found: "int"
            }
        );

        let program = parse_source(
            "struct Vec { x: int, }
            dll \"libm.so\", cos(float): float, move(Vec&, int): void, end
            x: float = cos(1.5)",
        )
        .unwrap();
        assert_eq!(program.ext_nodes.len(), 1);
        let NodeKind::ExprStmt(expr) = program.ext_nodes[0].kind else {
            panic!("expected an expression statement");
        };
        let ExprKind::Dll(ext) = &program[expr].kind else {
            panic!("expected a dll declaration");
        };
        assert_eq!(ext.file_name, "libm.so");
        assert_eq!(ext.funcs.len(), 2);
        assert!(ext.funcs[1].args[0].is_ptr);
        assert_eq!(ext.funcs[1].args[0].struct_name, Some("Vec"));

        let exts = program
            .symbols
            .iter()
            .filter(|symbol| matches!(symbol, Symbol::Ext(_)))
            .count();
        assert_eq!(exts, 2);

        let (kind, data_type) = global_init(
            "dll \"libm.so\", cos(float): float, end\nx: float = cos(1.5)",
        );
        assert!(matches!(kind, ExprKind::ExtCall { name: "cos", .. }));
        assert_eq!(data_type, DataType::Float);
    }
}
