//! Parser and interpreter robustness tests
//!
//! Property tests: the parser must reject garbage with an error rather
//! than panicking, and pure straight-line programs must terminate in
//! exactly one step per statement.

use marionette::script::{Interpreter, StepEvent, Value, parse_script};
use proptest::prelude::*;

proptest! {
    #[test]
    fn parser_never_panics(source in ".{0,256}") {
        let _ = parse_script(&source);
    }

    #[test]
    fn let_chains_take_one_step_per_statement(values in prop::collection::vec(-1000i64..1000, 1..20)) {
        let source: String = values
            .iter()
            .enumerate()
            .map(|(index, value)| format!("let v{index} = {value};\n"))
            .collect();

        let program = parse_script(&source).expect("generated source parses");
        let mut interp = Interpreter::new(program);

        let mut steps = 0usize;
        loop {
            match interp.step().expect("pure program never errors") {
                StepEvent::Progress => steps += 1,
                StepEvent::Finished => break,
                StepEvent::HostCall(call) => panic!("unexpected host call: {:?}", call),
            }
        }
        prop_assert_eq!(steps, values.len());

        for (index, value) in values.iter().enumerate() {
            prop_assert_eq!(interp.var(&format!("v{index}")), Some(&Value::Int(*value)));
        }
    }

    #[test]
    fn integer_arithmetic_matches_rust(a in -1000i64..1000, b in 1i64..1000) {
        let source = format!("let sum = {a} + {b};\nlet quot = {a} / {b};\nlet rem = {a} % {b};\n");
        let program = parse_script(&source).expect("generated source parses");
        let mut interp = Interpreter::new(program);
        while !interp.is_finished() {
            interp.step().expect("pure program never errors");
        }
        prop_assert_eq!(interp.var("sum"), Some(&Value::Int(a + b)));
        prop_assert_eq!(interp.var("quot"), Some(&Value::Int(a / b)));
        prop_assert_eq!(interp.var("rem"), Some(&Value::Int(a % b)));
    }
}
