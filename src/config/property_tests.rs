//! Property tests for the configuration value syntax.
//!
//! The central invariant: rendering any value in configuration syntax and
//! parsing it back yields the same value.

#[cfg(test)]
mod tests {
    use crate::config::parser::{parse, parse_value_str};
    use crate::config::value::Value;
    use proptest::prelude::*;

    fn arb_ident() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z_][a-zA-Z0-9_]{0,8}").unwrap()
    }

    fn arb_class_path() -> impl Strategy<Value = String> {
        proptest::collection::vec(arb_ident(), 1..4).prop_map(|parts| parts.join("."))
    }

    fn arb_float() -> impl Strategy<Value = f64> {
        prop_oneof![prop::num::f64::NORMAL, Just(0.0)]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<String>().prop_map(Value::Str),
            any::<i64>().prop_map(Value::Int),
            arb_float().prop_map(Value::Float),
            any::<bool>().prop_map(Value::Bool),
            Just(Value::None),
            arb_ident().prop_map(Value::Reference),
            arb_class_path().prop_map(Value::ClassPath),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                proptest::collection::vec(inner, 0..4).prop_map(Value::Tuple),
            ]
        })
    }

    proptest! {
        #[test]
        fn value_render_parse_round_trips(value in arb_value()) {
            let rendered = value.to_string();
            let reparsed = parse_value_str(&rendered)
                .unwrap_or_else(|e| panic!("cannot reparse {rendered:?}: {e}"));
            prop_assert_eq!(reparsed, value);
        }

        #[test]
        fn integers_stay_integers(i in any::<i64>()) {
            prop_assert_eq!(parse_value_str(&i.to_string()).unwrap(), Value::Int(i));
        }

        #[test]
        fn parser_never_panics(text in ".*") {
            let _ = parse(&text);
            let _ = parse_value_str(&text);
        }

        #[test]
        fn section_round_trips(name in arb_ident(), key in arb_ident(), value in arb_value()) {
            // `class` is lifted into the declaration, so skip that key here.
            prop_assume!(key != "class");
            let text = format!("[{name}]\n{key}={value}\n");
            let decls = parse(&text).unwrap();
            prop_assert_eq!(decls.len(), 1);
            prop_assert_eq!(&decls[0].name, &name);
            prop_assert_eq!(decls[0].field(&key), Some(&value));
        }
    }
}
