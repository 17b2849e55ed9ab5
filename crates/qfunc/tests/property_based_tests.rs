//! Property-based tests for function representations on the wire.
use qfunc::{
    Backtrace, Builtin, Datum, FuncRepr, Ident, ScriptRepr, Shared, Term, TermRepr, VarScope, WIRE_CONFIG, WireFunc,
    backtrace::Frame,
};
use proptest::prelude::*;

mod strategies {
    use super::*;

    /// Identifiers that are not keywords of the script language.
    pub fn ident() -> impl Strategy<Value = Ident> {
        "[a-z_][a-z0-9_]{0,8}"
            .prop_filter("Avoid reserved keywords", |s| {
                !matches!(
                    s.as_str(),
                    "fn" | "if"
                        | "then"
                        | "else"
                        | "while"
                        | "do"
                        | "end"
                        | "let"
                        | "in"
                        | "and"
                        | "or"
                        | "not"
                        | "true"
                        | "false"
                        | "null"
                )
            })
            .prop_map(|name| Ident::new(&name))
    }

    pub fn datum() -> impl Strategy<Value = Datum> {
        let leaf = prop_oneof![
            Just(Datum::Null),
            any::<bool>().prop_map(Datum::from),
            (-1_000_000i64..1_000_000).prop_map(Datum::from),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Datum::from),
        ];

        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Datum::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Datum::Object),
            ]
        })
    }

    pub fn backtrace() -> impl Strategy<Value = Backtrace> {
        prop::collection::vec(
            prop_oneof![
                (0u32..16).prop_map(Frame::Pos),
                "[a-z]{1,8}".prop_map(Frame::Opt),
            ],
            0..4,
        )
        .prop_map(Backtrace::new)
    }

    /// Integer arithmetic over the single parameter `x`.
    pub fn arithmetic_term() -> impl Strategy<Value = Term> {
        let leaf = prop_oneof![(-9i64..10).prop_map(Term::datum), Just(Term::var("x"))];

        leaf.prop_recursive(3, 16, 2, |inner| {
            (
                prop::sample::select(vec![Builtin::Add, Builtin::Sub, Builtin::Mul]),
                inner.clone(),
                inner,
            )
                .prop_map(|(op, lhs, rhs)| Term::call(op, vec![lhs, rhs]))
        })
    }

    pub fn term_repr() -> impl Strategy<Value = TermRepr> {
        (
            prop::collection::vec((ident(), datum()), 0..4),
            prop::collection::btree_set(ident(), 0..4),
            datum(),
            backtrace(),
        )
            .prop_map(|(captured, args, body, backtrace)| {
                TermRepr::new(
                    Shared::new(Term::datum(body)),
                    args.into_iter().collect(),
                    Shared::new(backtrace),
                )
                .with_scope(captured.into_iter().collect::<VarScope>())
            })
    }

    pub fn script_repr() -> impl Strategy<Value = ScriptRepr> {
        ("[ -~]{0,40}", any::<u64>(), backtrace()).prop_map(|(source, timeout_ms, backtrace)| {
            ScriptRepr::new(source, Shared::new(backtrace)).with_timeout_ms(timeout_ms)
        })
    }

    pub fn func_repr() -> impl Strategy<Value = FuncRepr> {
        prop_oneof![term_repr().prop_map(FuncRepr::from), script_repr().prop_map(FuncRepr::from)]
    }
}

fn evaluate_directly(term: &Term, x: i64) -> i64 {
    match term {
        Term::Datum(Datum::Number(n)) => *n as i64,
        Term::Var(_) => x,
        Term::Call(op, args) => {
            let lhs = evaluate_directly(&args[0], x);
            let rhs = evaluate_directly(&args[1], x);
            match op {
                Builtin::Add => lhs.wrapping_add(rhs),
                Builtin::Sub => lhs.wrapping_sub(rhs),
                _ => lhs.wrapping_mul(rhs),
            }
        }
        _ => unreachable!(),
    }
}

proptest! {
    #[test]
    fn test_repr_survives_the_wire(repr in strategies::func_repr()) {
        let bytes = bincode::encode_to_vec(&repr, WIRE_CONFIG).unwrap();
        let (decoded, read): (FuncRepr, usize) = bincode::decode_from_slice(&bytes, WIRE_CONFIG).unwrap();

        prop_assert_eq!(read, bytes.len());
        prop_assert_eq!(&decoded, &repr);
        prop_assert_eq!(bincode::encode_to_vec(&decoded, WIRE_CONFIG).unwrap(), bytes);
    }

    #[test]
    fn test_any_prefix_fails_to_decode(repr in strategies::func_repr(), cut in any::<prop::sample::Index>()) {
        let bytes = bincode::encode_to_vec(&repr, WIRE_CONFIG).unwrap();
        let cut = cut.index(bytes.len());

        let result: Result<(FuncRepr, usize), _> = bincode::decode_from_slice(&bytes[..cut], WIRE_CONFIG);
        prop_assert!(result.is_err());
    }

    #[test]
    fn test_received_function_computes_the_same(term in strategies::arithmetic_term(), x in -50i64..50) {
        let func = WireFunc::from_body(
            Shared::new(term.clone()),
            vec![Ident::new("x")],
            Shared::new(Backtrace::empty()),
        )
        .unwrap();
        let received = WireFunc::from_bytes(&func.to_bytes().unwrap()).unwrap();

        // at most eight leaves below 50 keep every intermediate exact in f64
        let expected = Datum::from(evaluate_directly(&term, x));
        prop_assert_eq!(func.call(&[Datum::from(x)]).unwrap(), expected.clone());
        prop_assert_eq!(received.call(&[Datum::from(x)]).unwrap(), expected);
    }

    #[test]
    fn test_parameter_always_shadows_capture(captured in strategies::datum(), arg in strategies::datum()) {
        let repr = TermRepr::new(Shared::new(Term::var("x")), vec![Ident::new("x")], Shared::new(Backtrace::empty()))
            .with_scope(VarScope::new().with_var(Ident::new("x"), captured));
        let func = WireFunc::from_repr(repr.into()).unwrap();

        prop_assert_eq!(func.call(std::slice::from_ref(&arg)).unwrap(), arg);
    }
}
