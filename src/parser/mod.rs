//! Recursive descent parser.
//!
//! Parsing, symbol resolution and type checking happen in a single forward pass. Every check
//! runs as soon as the construct it guards is built and the first failure aborts with a located
//! [`CompileError`].

mod decl;
mod expr;
mod symbols;

use crate::ast::{Block, Expr, ExprId, ExprKind, NativeKind, Node, NodeKind, Program};
use crate::error::{CompileError, CompileErrorKind};
use crate::token::{Location, Token, TokenKind};
use crate::types::DataType;
use log::trace;
use std::mem;

type PResult<T> = Result<T, CompileError>;

/// Parse a token stream into a [`Program`].
pub fn parse<'a>(tokens: &[Token<'a>]) -> PResult<Program<'a>> {
    Parser::new(tokens).parse()
}

/// All state of one parse: the token cursor, the program under construction and the block and
/// label stacks matching `then`/`else`/`end`.
pub struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    cursor: usize,
    program: Program<'a>,
    blocks: Vec<Block<'a>>,
    labels: Vec<usize>,
    next_label: usize,
}

fn error<T>(loc: Location<'_>, kind: CompileErrorKind) -> PResult<T> {
    Err(CompileError::new(loc, kind))
}

impl<'t, 'a> Parser<'t, 'a> {
    pub fn new(tokens: &'t [Token<'a>]) -> Self {
        Parser {
            tokens,
            cursor: 0,
            program: Program::default(),
            blocks: Vec::new(),
            labels: Vec::new(),
            // 0 is never a valid jump target
            next_label: 1,
        }
    }

    pub fn parse(mut self) -> PResult<Program<'a>> {
        while self.cursor < self.tokens.len() {
            self.parse_statement()?;
        }
        Ok(self.program)
    }

    fn parse_statement(&mut self) -> PResult<()> {
        let Some(token) = self.peek(0) else {
            return Ok(());
        };
        let loc = token.loc;

        match &token.kind {
            TokenKind::Write => self.parse_native(NativeKind::Write),
            TokenKind::Exit => self.parse_native(NativeKind::Exit),
            TokenKind::Ident(_) if self.peek_is(1, &TokenKind::Colon) => self.parse_var_decl(),
            TokenKind::Ident(_) => self.parse_reassign(),
            TokenKind::Struct => self.parse_struct_decl(),
            TokenKind::Return => {
                self.cursor += 1;
                let value = self.parse_expr()?;
                self.push_node(NodeKind::Return(value), loc);
                Ok(())
            }
            TokenKind::If => {
                self.cursor += 1;
                self.blocks.push(Block::If);
                let cond = self.parse_expr()?;
                self.push_node(NodeKind::If { cond }, loc);
                Ok(())
            }
            TokenKind::While => {
                self.cursor += 1;
                self.blocks.push(Block::While);
                let cond = self.parse_expr()?;
                self.push_node(NodeKind::While { cond }, loc);
                Ok(())
            }
            TokenKind::Then => {
                self.cursor += 1;
                let label = self.open_label();
                self.push_node(NodeKind::Then { label }, loc);
                Ok(())
            }
            TokenKind::Else => {
                self.cursor += 1;
                if self.labels.is_empty() || self.blocks.last() != Some(&Block::If) {
                    return error(loc, CompileErrorKind::ElseWithoutIf);
                }
                self.blocks.pop();
                self.blocks.push(Block::Else);
                let label1 = self.labels.pop().unwrap_or_default();
                let label2 = self.open_label();
                self.push_node(NodeKind::Else { label1, label2 }, loc);
                Ok(())
            }
            TokenKind::End => {
                self.cursor += 1;
                let (Some(_), Some(label)) = (self.blocks.pop(), self.labels.pop()) else {
                    return error(loc, CompileErrorKind::EndWithoutBlock);
                };
                self.push_node(NodeKind::End { label }, loc);
                Ok(())
            }
            TokenKind::String(_)
            | TokenKind::Char(_)
            | TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::Builtin(_) => self.parse_expr_stmt(),
            kind => error(loc, CompileErrorKind::UnexpectedToken(kind.name())),
        }
    }

    /// `write e` / `exit e`
    fn parse_native(&mut self, kind: NativeKind) -> PResult<()> {
        let loc = self.consume()?.loc;
        let arg = self.parse_expr()?;
        self.push_node(
            NodeKind::Native {
                kind,
                args: vec![arg],
            },
            loc,
        );
        Ok(())
    }

    /// An expression used as a statement. `dll` declarations go to the external list.
    fn parse_expr_stmt(&mut self) -> PResult<()> {
        let loc = self.peek(0).map(|token| token.loc).unwrap_or(self.end_loc());
        let expr = self.parse_expr()?;
        let node = Node::new(NodeKind::ExprStmt(expr), loc);
        if matches!(self.program[expr].kind, ExprKind::Dll(_)) {
            self.program.ext_nodes.push(node);
        } else {
            self.program.nodes.push(node);
        }
        Ok(())
    }

    fn push_node(&mut self, kind: NodeKind<'a>, loc: Location<'a>) {
        self.program.nodes.push(Node::new(kind, loc));
    }

    /// Allocate the next label and leave it pending for a later `else`/`end`
    fn open_label(&mut self) -> usize {
        let label = self.next_label;
        self.next_label += 1;
        self.labels.push(label);
        trace!("opened label {label}");
        label
    }

    fn alloc_expr(&mut self, kind: ExprKind<'a>, data_type: DataType, loc: Location<'a>) -> ExprId<'a> {
        self.program.exprs.alloc(Expr {
            kind,
            data_type,
            loc,
        })
    }

    /// Location reported when the tokens run out
    fn end_loc(&self) -> Location<'a> {
        self.tokens
            .last()
            .map(|token| token.loc)
            .unwrap_or(Location::new("", 0, 0))
    }

    fn peek(&self, offset: usize) -> Option<&'t Token<'a>> {
        self.tokens.get(self.cursor + offset)
    }

    /// Whether the token at `offset` is of the same kind as `kind`, ignoring values
    fn peek_is(&self, offset: usize, kind: &TokenKind<'a>) -> bool {
        self.peek(offset)
            .is_some_and(|token| mem::discriminant(&token.kind) == mem::discriminant(kind))
    }

    fn consume(&mut self) -> PResult<&'t Token<'a>> {
        match self.tokens.get(self.cursor) {
            Some(token) => {
                self.cursor += 1;
                Ok(token)
            }
            None => error(self.end_loc(), CompileErrorKind::OutOfTokens),
        }
    }

    fn expect(&mut self, kind: &TokenKind<'a>) -> PResult<&'t Token<'a>> {
        let token = self.consume()?;
        if mem::discriminant(&token.kind) != mem::discriminant(kind) {
            return error(
                token.loc,
                CompileErrorKind::ExpectedToken {
                    expected: kind.name(),
                    found: token.kind.name(),
                },
            );
        }
        Ok(token)
    }

    fn expect_ident(&mut self) -> PResult<(&'a str, Location<'a>)> {
        let token = self.expect(&TokenKind::Ident(""))?;
        match token.kind {
            TokenKind::Ident(name) => Ok((name, token.loc)),
            _ => error(token.loc, CompileErrorKind::UnexpectedToken(token.kind.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Symbol;
    use crate::lexer::lex;

    pub(super) fn parse_source(source: &str) -> PResult<Program<'_>> {
        parse(&lex("test.tim", source)?)
    }

    pub(super) fn parse_error(source: &str) -> CompileErrorKind {
        parse_source(source).unwrap_err().kind
    }

    #[test]
    fn global_variable() {
        let program = parse_source("x: int = 5").unwrap();
        assert_eq!(program.symbols.len(), 1);
        let Symbol::Var(var) = program.symbols[0] else {
            panic!("expected a variable symbol");
        };
        assert_eq!(var.name, "x");
        assert_eq!(var.data_type, DataType::Int);
        assert!(!var.is_const);
        assert!(var.is_global());

        assert!(program.nodes.is_empty());
        assert_eq!(program.globals.len(), 1);
        let NodeKind::VarDecl { values, .. } = &program.globals[0].kind else {
            panic!("expected a declaration");
        };
        assert_eq!(program[values[0]].kind, ExprKind::Int(5));
    }

    #[test]
    fn stray_end_and_else() {
        assert_eq!(parse_error("end"), CompileErrorKind::EndWithoutBlock);
        assert_eq!(parse_error("else"), CompileErrorKind::ElseWithoutIf);
        assert_eq!(
            parse_error("a: int = 1\nif a == 1 then\nend\nend"),
            CompileErrorKind::EndWithoutBlock
        );
        assert_eq!(
            parse_error("a: int = 1\nwhile a == 1 then\nelse\nend"),
            CompileErrorKind::ElseWithoutIf
        );
    }

    #[test]
    fn labels() {
        let program = parse_source(
            "a: int = 1
            if a == 1 then
                a = 2
            else
                a = 3
            end
            while a < 10 then
                a = a + 1
            end",
        )
        .unwrap();

        let labels: Vec<_> = program
            .nodes
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::Then { label } => Some(("then", label, 0)),
                NodeKind::Else { label1, label2 } => Some(("else", label1, label2)),
                NodeKind::End { label } => Some(("end", label, 0)),
                _ => None,
            })
            .collect();
        assert_eq!(
            labels,
            vec![
                ("then", 1, 0),
                ("else", 1, 2),
                ("end", 2, 0),
                ("then", 3, 0),
                ("end", 3, 0),
            ]
        );
    }

    #[test]
    fn unexpected_statement() {
        assert_eq!(parse_error("int"), CompileErrorKind::UnexpectedToken("type"));
        assert_eq!(parse_error("+ 1"), CompileErrorKind::UnexpectedToken("+"));
    }

    #[test]
    fn natives_and_return() {
        let program = parse_source("write \"hi\"\nexit 1 + 2").unwrap();
        assert_eq!(program.nodes.len(), 2);
        assert!(matches!(
            program.nodes[0].kind,
            NodeKind::Native {
                kind: NativeKind::Write,
                ..
            }
        ));
        let NodeKind::Native { kind, args } = &program.nodes[1].kind else {
            panic!("expected a native call");
        };
        assert_eq!(*kind, NativeKind::Exit);
        assert!(matches!(program[args[0]].kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn error_location() {
        let err = parse_source("x: int = 1\n  y = 2").unwrap_err();
        assert_eq!((err.row, err.col), (2, 2));
        assert_eq!(err.to_string(), "test.tim:2:2: Unknown variable: y");
    }
}
