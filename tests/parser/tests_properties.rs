//! Termination and losslessness over arbitrary input.

use proptest::prelude::*;
use strand::grammar::Grammar;
use strand::parser::parse;
use strand::syntax::leaves;

use crate::helpers::source_fixtures::{MODULES_GRAMMAR, PEOPLE_GRAMMAR};

fn fragments() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("person ".to_string()),
            Just("hello ".to_string()),
            Just("!".to_string()),
            Just("Alice".to_string()),
            Just(" ".to_string()),
            Just("\n".to_string()),
            Just("// note\n".to_string()),
            "[@#$%^&*~]{1,3}",
            "[a-zA-Z_]{1,6}",
        ],
        0..40,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn parsing_terminates_with_a_root(text in fragments()) {
        let grammar = Grammar::parse(PEOPLE_GRAMMAR).unwrap();
        let result = parse(&grammar, &text);
        prop_assert!(!result.ast.is_empty());
        prop_assert_eq!(result.ast.node(result.ast.root()).node_type.as_str(), "Model");
    }

    #[test]
    fn leaves_reconstruct_the_source(text in fragments()) {
        let grammar = Grammar::parse(PEOPLE_GRAMMAR).unwrap();
        let result = parse(&grammar, &text);
        let rebuilt: String = leaves(&result.syntax()).map(|t| t.text().to_string()).collect();
        prop_assert_eq!(rebuilt, text);
    }

    #[test]
    fn arbitrary_unicode_is_lossless(text in "\\PC{0,64}") {
        let grammar = Grammar::parse(MODULES_GRAMMAR).unwrap();
        let result = parse(&grammar, &text);
        prop_assert!(!result.ast.is_empty());
        let rebuilt: String = leaves(&result.syntax()).map(|t| t.text().to_string()).collect();
        prop_assert_eq!(rebuilt, text);
    }
}
