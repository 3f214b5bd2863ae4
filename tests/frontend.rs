use tim::ast::{ExprKind, NodeKind, Symbol};
use tim::error::CompileErrorKind;
use tim::types::DataType;
use tim::{lexer, parser};

const GEOMETRY: &str = concat!(
    "@\"geometry.tim\" 1\n",
    "struct Vec2 { x: float, y: float, }\n",
    "dll \"libm.so\", sqrtf(float): float, end\n",
    "\n",
    "length(v: Vec2): float\n",
    "    return sqrtf(v.x * v.x + v.y * v.y)\n",
    "end\n",
    "\n",
    "origin: Vec2 = {3.0, 4.0}\n",
    "steps: int = 0\n",
    "while steps < 3 then\n",
    "    steps = steps + 1\n",
    "end\n",
    "write \"done\\n\"\n",
);

#[test]
fn whole_program() {
    let tokens = lexer::lex("main.tim", GEOMETRY).unwrap();
    assert!(tokens.iter().all(|token| token.loc.file == "geometry.tim"));

    let program = parser::parse(&tokens).unwrap();
    assert_eq!(program.structs.len(), 1);
    assert_eq!(program.ext_nodes.len(), 1);
    assert_eq!(program.globals.len(), 2);

    let function = &program.functions[0];
    assert_eq!(function.name, "length");
    assert_eq!(function.return_type, DataType::Float);
    assert_eq!(function.label, 1);
    assert_eq!(function.args[0].struct_name, Some("Vec2"));
    assert_eq!(program.nodes[0].loc.row, 4);

    let NodeKind::Return(value) = program.nodes[1].kind else {
        panic!("expected the return statement");
    };
    let ExprKind::ExtCall { name, ref args } = program[value].kind else {
        panic!("expected a call to sqrtf");
    };
    assert_eq!(name, "sqrtf");
    assert_eq!(program[args[0]].data_type, DataType::Float);

    let globals: Vec<_> = program
        .variables()
        .filter(|var| var.is_global())
        .map(|var| var.name)
        .collect();
    assert_eq!(globals, ["origin", "steps"]);

    assert!(program
        .symbols
        .iter()
        .any(|symbol| matches!(symbol, Symbol::Ext(func) if func.name == "sqrtf")));
    assert!(matches!(
        program.nodes.last().map(|node| &node.kind),
        Some(NodeKind::Native { .. })
    ));
}

#[test]
fn globals_are_not_visible_in_functions() {
    let source = concat!(
        "@\"shapes.tim\" 40\n",
        "scale: int = 2\n",
        "area(w: int, h: int): int\n",
        "    return w * h * scale\n",
        "end\n",
    );
    let tokens = lexer::lex("main.tim", source).unwrap();
    let err = parser::parse(&tokens).unwrap_err();

    assert_eq!(err.kind, CompileErrorKind::UnknownVariable("scale".to_string()));
    assert_eq!(err.to_string(), "shapes.tim:42:19: Unknown variable: scale");
}

#[test]
fn lexer_errors_carry_the_location() {
    let err = lexer::lex("main.tim", "x: char = 'ab'").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::MultiCharLiteral);
    assert_eq!((err.file.as_str(), err.row), ("main.tim", 1));
}
