use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, none_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify},
    error::{Error, ErrorKind},
    multi::{many_m_n, many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};
use nom_locate::LocatedSpan;

use crate::{Datum, Ident, Term, error::EvalError, term::Builtin};

/// Source position plus the current expression nesting depth.
type Span<'a> = LocatedSpan<&'a str, u32>;

/// Deepest expression nesting, and longest operator or accessor chain, a
/// script may contain.
pub const MAX_NESTING: u32 = 64;

const RESERVED: [&str; 15] = [
    "fn", "if", "then", "else", "while", "do", "end", "let", "in", "and", "or", "not", "true", "false", "null",
];

/// A parsed script: its parameter list and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub params: Vec<Ident>,
    pub body: Term,
}

pub fn parse(source: &str) -> Result<Script, EvalError> {
    match all_consuming(terminated(script, multispace0)).parse(Span::new_extra(source, 0)) {
        Ok((_, script)) => Ok(script),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(EvalError::ScriptParse {
            line: e.input.location_line(),
            column: e.input.get_utf8_column(),
            near: e.input.fragment().chars().take(16).collect(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(EvalError::ScriptParse {
            line: 0,
            column: 0,
            near: String::new(),
        }),
    }
}

fn script(input: Span) -> IResult<Span, Script> {
    map(pair(opt(params), expr), |(params, body)| Script {
        params: params.unwrap_or_default(),
        body,
    })
    .parse(input)
}

fn params(input: Span) -> IResult<Span, Vec<Ident>> {
    delimited(
        pair(keyword("fn"), symbol("(")),
        separated_list0(symbol(","), map(identifier, |span: Span| Ident::new(span.fragment()))),
        pair(symbol(")"), symbol(":")),
    )
    .parse(input)
}

fn symbol<'a>(s: &'static str) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, Span<'a>> {
    move |input| preceded(multispace0, tag(s)).parse(input)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, Span<'a>> {
    move |input| {
        terminated(
            preceded(multispace0, tag(kw)),
            not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
        )
        .parse(input)
    }
}

fn identifier(input: Span) -> IResult<Span, Span> {
    preceded(
        multispace0,
        verify(
            recognize(pair(alt((alpha1, tag("_"))), many0(alt((alphanumeric1, tag("_")))))),
            |span: &Span| !RESERVED.contains(span.fragment()),
        ),
    )
    .parse(input)
}

/// Runs `parser` one nesting level deeper, failing outright past
/// [`MAX_NESTING`].
fn nested<'a, O, P>(mut parser: P) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, O>
where
    P: Parser<Span<'a>, Output = O, Error = Error<Span<'a>>>,
{
    move |mut input: Span<'a>| {
        let depth = input.extra;
        if depth >= MAX_NESTING {
            return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
        }

        input.extra = depth + 1;
        let (mut rest, output) = parser.parse(input)?;
        rest.extra = depth;
        Ok((rest, output))
    }
}

/// Zero or more repetitions of `parser`, at most [`MAX_NESTING`] of them.
fn chain<'a, O, P>(parser: P) -> impl Parser<Span<'a>, Output = Vec<O>, Error = Error<Span<'a>>>
where
    P: Parser<Span<'a>, Output = O, Error = Error<Span<'a>>>,
{
    many_m_n(0, MAX_NESTING as usize, parser)
}

fn expr(input: Span) -> IResult<Span, Term> {
    nested(alt((if_expr, while_expr, let_expr, or_expr))).parse(input)
}

fn if_expr(input: Span) -> IResult<Span, Term> {
    map(
        (
            keyword("if"),
            expr,
            keyword("then"),
            expr,
            keyword("else"),
            expr,
        ),
        |(_, cond, _, then, _, otherwise)| Term::branch(cond, then, otherwise),
    )
    .parse(input)
}

fn while_expr(input: Span) -> IResult<Span, Term> {
    map(
        (keyword("while"), expr, keyword("do"), expr, keyword("end")),
        |(_, cond, _, body, _)| Term::while_(cond, body),
    )
    .parse(input)
}

fn let_expr(input: Span) -> IResult<Span, Term> {
    map(
        (
            keyword("let"),
            identifier,
            symbol("="),
            expr,
            keyword("in"),
            expr,
        ),
        |(_, name, _, value, _, body)| Term::Let(Ident::new(name.fragment()), Box::new(value), Box::new(body)),
    )
    .parse(input)
}

fn fold_left(first: Term, rest: Vec<(Builtin, Term)>) -> Term {
    rest.into_iter()
        .fold(first, |acc, (op, rhs)| Term::call(op, vec![acc, rhs]))
}

fn or_expr(input: Span) -> IResult<Span, Term> {
    map(
        pair(and_expr, chain(pair(value(Builtin::Or, keyword("or")), and_expr))),
        |(first, rest)| fold_left(first, rest),
    )
    .parse(input)
}

fn and_expr(input: Span) -> IResult<Span, Term> {
    map(
        pair(comparison, chain(pair(value(Builtin::And, keyword("and")), comparison))),
        |(first, rest)| fold_left(first, rest),
    )
    .parse(input)
}

fn comparison(input: Span) -> IResult<Span, Term> {
    let op = alt((
        value(Builtin::Eq, symbol("==")),
        value(Builtin::Ne, symbol("!=")),
        value(Builtin::Le, symbol("<=")),
        value(Builtin::Ge, symbol(">=")),
        value(Builtin::Lt, symbol("<")),
        value(Builtin::Gt, symbol(">")),
    ));

    map(pair(sum, opt(pair(op, sum))), |(lhs, rhs)| match rhs {
        Some((op, rhs)) => Term::call(op, vec![lhs, rhs]),
        None => lhs,
    })
    .parse(input)
}

fn sum(input: Span) -> IResult<Span, Term> {
    let op = alt((value(Builtin::Add, symbol("+")), value(Builtin::Sub, symbol("-"))));
    map(pair(product, chain(pair(op, product))), |(first, rest)| fold_left(first, rest)).parse(input)
}

fn product(input: Span) -> IResult<Span, Term> {
    let op = alt((
        value(Builtin::Mul, symbol("*")),
        value(Builtin::Div, symbol("/")),
        value(Builtin::Mod, symbol("%")),
    ));
    map(pair(unary, chain(pair(op, unary))), |(first, rest)| fold_left(first, rest)).parse(input)
}

fn unary(input: Span) -> IResult<Span, Term> {
    alt((
        map(preceded(keyword("not"), nested(unary)), |t| Term::call(Builtin::Not, vec![t])),
        map(preceded(symbol("-"), nested(unary)), |t| Term::call(Builtin::Neg, vec![t])),
        postfix,
    ))
    .parse(input)
}

enum Access {
    Index(Term),
    Field(String),
}

fn postfix(input: Span) -> IResult<Span, Term> {
    let access = alt((
        map(delimited(symbol("["), expr, symbol("]")), Access::Index),
        map(preceded(symbol("."), identifier), |span: Span| {
            Access::Field(span.fragment().to_string())
        }),
    ));

    map(pair(primary, chain(access)), |(target, accesses)| {
        accesses.into_iter().fold(target, |acc, access| match access {
            Access::Index(index) => Term::call(Builtin::Nth, vec![acc, index]),
            Access::Field(name) => Term::call(Builtin::Field, vec![acc, Term::datum(name)]),
        })
    })
    .parse(input)
}

fn primary(input: Span) -> IResult<Span, Term> {
    alt((
        number_literal,
        string_literal,
        value(Term::datum(true), keyword("true")),
        value(Term::datum(false), keyword("false")),
        value(Term::Datum(Datum::Null), keyword("null")),
        map(
            delimited(symbol("["), separated_list0(symbol(","), expr), symbol("]")),
            Term::MakeArray,
        ),
        delimited(symbol("("), expr, symbol(")")),
        call_or_var,
    ))
    .parse(input)
}

fn number_literal(input: Span) -> IResult<Span, Term> {
    preceded(
        multispace0,
        map_res(recognize(pair(digit1, opt(pair(char('.'), digit1)))), |span: Span| {
            span.fragment().parse::<f64>().map(Term::datum)
        }),
    )
    .parse(input)
}

fn string_literal(input: Span) -> IResult<Span, Term> {
    preceded(
        multispace0,
        delimited(
            char('"'),
            map(
                opt(escaped_transform(
                    none_of("\"\\"),
                    '\\',
                    alt((
                        value('\\', char('\\')),
                        value('\"', char('\"')),
                        value('\r', char('r')),
                        value('\n', char('n')),
                        value('\t', char('t')),
                    )),
                )),
                |s: Option<String>| Term::datum(s.unwrap_or_default()),
            ),
            char('"'),
        ),
    )
    .parse(input)
}

fn call_or_var(input: Span) -> IResult<Span, Term> {
    let (rest, name) = identifier(input)?;
    let (rest, args) = opt(delimited(symbol("("), separated_list0(symbol(","), expr), symbol(")"))).parse(rest)?;

    let Some(args) = args else {
        return Ok((rest, Term::Var(Ident::new(name.fragment()))));
    };

    match Builtin::from_name(name.fragment()) {
        Some(op) if op.arity().accepts(args.len()) => Ok((rest, Term::call(op, args))),
        _ => Err(nom::Err::Failure(Error::new(name, ErrorKind::Verify))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn var(name: &str) -> Term {
        Term::var(name)
    }

    #[rstest]
    #[case::number("42", Term::datum(42))]
    #[case::decimal("1.25", Term::datum(1.25))]
    #[case::string(r#""a\"b""#, Term::datum("a\"b"))]
    #[case::empty_string(r#""""#, Term::datum(""))]
    #[case::precedence(
        "1 + 2 * x",
        Term::call(Builtin::Add, vec![Term::datum(1), Term::call(Builtin::Mul, vec![Term::datum(2), var("x")])])
    )]
    #[case::left_assoc(
        "a - b - c",
        Term::call(Builtin::Sub, vec![Term::call(Builtin::Sub, vec![var("a"), var("b")]), var("c")])
    )]
    #[case::comparison_and_logic(
        "x > 1 and not y",
        Term::call(
            Builtin::And,
            vec![
                Term::call(Builtin::Gt, vec![var("x"), Term::datum(1)]),
                Term::call(Builtin::Not, vec![var("y")]),
            ]
        )
    )]
    #[case::field_and_index(
        "row.tags[0]",
        Term::call(
            Builtin::Nth,
            vec![Term::call(Builtin::Field, vec![var("row"), Term::datum("tags")]), Term::datum(0)]
        )
    )]
    #[case::builtin_call("len([1, x])", Term::call(Builtin::Len, vec![Term::MakeArray(vec![Term::datum(1), var("x")])]))]
    #[case::if_then_else(
        "if x then 1 else 2",
        Term::branch(var("x"), Term::datum(1), Term::datum(2))
    )]
    #[case::let_in("let y = 2 in y * y", Term::let_("y", Term::datum(2), Term::call(Builtin::Mul, vec![var("y"), var("y")])))]
    #[case::while_loop("while true do null end", Term::while_(Term::datum(true), Term::Datum(Datum::Null)))]
    #[case::keyword_prefix_is_identifier("index", var("index"))]
    fn test_parse_body(#[case] source: &str, #[case] expected: Term) {
        assert_eq!(parse(source).unwrap().body, expected);
    }

    #[test]
    fn test_parse_params() {
        let script = parse("fn(acc, row): acc + row.n").unwrap();
        assert_eq!(script.params, vec![Ident::new("acc"), Ident::new("row")]);
    }

    #[rstest]
    #[case::unknown_function("frobnicate(1)", 1, 1)]
    #[case::wrong_arity("len(1, 2)", 1, 1)]
    #[case::trailing_garbage("1 +", 1, 3)]
    #[case::second_line("fn(x):\n  x ) 1", 2, 5)]
    fn test_parse_error(#[case] source: &str, #[case] line: u32, #[case] column: usize) {
        let err = parse(source).unwrap_err();
        assert!(
            matches!(err, EvalError::ScriptParse { line: l, column: c, .. } if l == line && c == column),
            "{:?}",
            err
        );
    }

    fn deep(open: &str, leaf: &str, close: &str, depth: usize) -> String {
        format!("{}{}{}", open.repeat(depth), leaf, close.repeat(depth))
    }

    #[rstest]
    #[case::parentheses(deep("(", "1", ")", 100_000))]
    #[case::arrays(deep("[", "1", "]", 100_000))]
    #[case::negations(deep("-", "1", "", 100_000))]
    #[case::nots(deep("not ", "true", "", 100_000))]
    #[case::index_chain(format!("x{}", "[0]".repeat(100_000)))]
    #[case::sum_chain(format!("1{}", " + 1".repeat(100_000)))]
    #[case::calls(deep("len(", "x", ")", 100_000))]
    fn test_deep_nesting_is_a_parse_error(#[case] source: String) {
        assert!(matches!(parse(&source), Err(EvalError::ScriptParse { line: 1, .. })));
    }

    #[rstest]
    #[case::parentheses(deep("(", "1", ")", MAX_NESTING as usize - 2))]
    #[case::negations(deep("-", "1", "", MAX_NESTING as usize - 2))]
    #[case::sum_chain(format!("1{}", " + 1".repeat(MAX_NESTING as usize)))]
    fn test_nesting_within_limit_parses(#[case] source: String) {
        assert!(parse(&source).is_ok(), "{}", source);
    }
}
