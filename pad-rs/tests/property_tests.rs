use proptest::prelude::*;
use pad::lang::tokenizer::{tokenize, TokenizerOptions};
use pad::lang::compiler::compile;
use pad::lang::tokens::Source;
use pad::lang::Kit;

proptest! {
    /// Tokenizing and compiling arbitrary text returns Ok or Err, never
    /// panics.
    #[test]
    fn front_end_does_not_panic(s in "\\PC*") {
        let src = Source::new("<prop>", s.as_str());
        if let Ok(tokens) = tokenize(&src, &TokenizerOptions::default()) {
            let _ = compile(&tokens, &src);
        }
    }
}

proptest! {
    /// Text without block markers renders unchanged.
    #[test]
    fn plain_text_is_verbatim(s in "[a-zA-Z0-9 .,!?\n-]*") {
        let mut kit = Kit::new();
        prop_assert_eq!(kit.compile_from_str(&s).unwrap(), s);
    }
}

proptest! {
    /// Integer arithmetic agrees with Rust's truncating semantics.
    #[test]
    fn arithmetic_matches_rust(a in -1000i64..1000, b in -1000i64..1000) {
        prop_assume!(b != 0);
        let src = format!("{{{{ ({a}) + ({b}) }}}} {{{{ ({a}) - ({b}) }}}} {{{{ ({a}) * ({b}) }}}} {{{{ ({a}) / ({b}) }}}} {{{{ ({a}) % ({b}) }}}}");
        let mut kit = Kit::new();
        let out = kit.compile_from_str(&src).unwrap();
        prop_assert_eq!(out, format!("{} {} {} {} {}", a + b, a - b, a * b, a / b, a % b));
    }
}

proptest! {
    /// Comparisons agree with Rust's ordering on integers.
    #[test]
    fn comparisons_match_rust(a in -50i64..50, b in -50i64..50) {
        let src = format!("{{{{ ({a}) < ({b}) }}}} {{{{ ({a}) >= ({b}) }}}} {{{{ ({a}) == ({b}) }}}}");
        let mut kit = Kit::new();
        let out = kit.compile_from_str(&src).unwrap();
        prop_assert_eq!(out, format!("{} {} {}", a < b, a >= b, a == b));
    }
}

proptest! {
    /// Rendering the same program on a cleared kit gives the same output.
    #[test]
    fn rerun_after_clear_is_identical(n in 0i64..20, word in "[a-z]{1,8}") {
        let src = format!("{{@ s = \"\" for i = 0; i < {n}; i += 1: s += \"{word}\" end @}}{{{{ len(s) }}}}:{{{{ s }}}}");
        let mut kit = Kit::new();
        let first = kit.compile_from_str(&src).unwrap();
        kit.clear();
        let second = kit.compile_from_str(&src).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, format!("{}:{}", n * word.len() as i64, word.repeat(n as usize)));
    }
}
