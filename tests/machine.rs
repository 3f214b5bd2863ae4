use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use tim::asm::assemble;
use tim::bytecode::{disassemble, Bytecode, Data};
use tim::error::RuntimeError;
use tim::vm::Machine;

const FACTORIAL: &str = "
entrypoint main

fact:
    dup
    push 1
    cmple
    nzjmp base      ; n <= 1
    dup
    push 1
    sub
    call fact
    mul
    ret
base:
    pop
    push 1
    ret

main:
    push 5
    call fact
    print
    halt
";

#[derive(Clone, Default)]
struct Output(Rc<RefCell<Vec<u8>>>);

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Output {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

fn run(program: &str) -> (Result<i64, RuntimeError>, Machine, Output) {
    let output = Output::default();
    let mut machine = Machine::new(assemble(program).unwrap()).with_output(output.clone());
    let result = machine.run();
    (result, machine, output)
}

#[test]
fn factorial() {
    let (result, machine, output) = run(FACTORIAL);
    assert_eq!(result.unwrap(), 0);
    assert!(machine.stack().is_empty());
    assert!(output.text().contains("as int: 120,"));
    assert!(output.text().ends_with("type: int\n"));
}

#[test]
fn bytecode_file_round_trip() {
    let bytecode = assemble(FACTORIAL).unwrap();
    assert_eq!(bytecode.entrypoint, 14);

    let mut bytes = Vec::new();
    bytecode.write_to(&mut bytes).unwrap();
    assert_eq!(Bytecode::read_from(bytes.as_slice()).unwrap(), bytecode);

    let path = std::env::temp_dir().join(format!("tim-round-trip-{}.tim", std::process::id()));
    bytecode.save(&path).unwrap();
    let loaded = Bytecode::load(&path);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded.unwrap(), bytecode);
}

#[test]
fn disassembly_starts_at_the_entry_point() {
    let bytecode = assemble(FACTORIAL).unwrap();
    let mut out = Vec::new();
    disassemble(&bytecode, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "14: push 5\n15: call 1\n16: print\n17: halt\n"
    );
}

#[test]
fn exit_code_from_native() {
    let (result, machine, _) = run("push 7\nnative 1\npush 1");
    assert_eq!(result.unwrap(), 7);
    assert!(machine.is_finished());
    assert!(machine.stack().is_empty());
}

#[test]
fn write_native_prints_strings() {
    let (result, _, output) = run("push_str \"hello\\n\"\npush 1\nnative 0\nhalt");
    assert_eq!(result.unwrap(), 0);
    assert_eq!(output.text(), "hello\n");
}

#[test]
fn memory_round_trip() {
    let (result, machine, _) = run("
        push 8
        alloc
        dup
        push 42
        push 8
        write
        dup
        push 8
        push 0
        read
        swap
        dealloc
    ");
    result.unwrap();
    assert_eq!(machine.stack(), &[Data::int(42)]);
    assert!(machine.memory().is_empty());
}

#[test]
fn runtime_errors() {
    let (result, _, _) = run("push 1\npush 0\ndiv");
    let err = result.unwrap_err();
    assert!(matches!(err, RuntimeError::DivideByZero));
    assert_eq!(err.to_string(), "error: cannot divide by 0");
}
