#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use snailquote::unescape;

use crate::{
    test_files::case::DoctestStep,
    util::{dedent, normalize_newlines},
};

/// Which structural element a directive line introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// `//@ test <name> ...`: file level attributes.
    Test,
    /// `//@ case <name> ...`: starts a new test case.
    Case,
}

/// Value of a directive attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// A number, eg. `points=1.5`.
    Number(f64),
    /// A bare word or quoted string, eg. `raises=assertion`.
    Text(String),
}

/// A `key` or `key=value` attribute of a directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    /// Attribute name.
    pub key:   String,
    /// Attribute value, `None` for a bare flag.
    pub value: Option<AttrValue>,
}

/// A parsed directive comment line.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// What the directive introduces.
    pub kind:  DirectiveKind,
    /// Test or case name.
    pub name:  String,
    /// Attributes in source order.
    pub attrs: Vec<Attr>,
}

peg::parser! {
    /// grammars for doctest transcripts and exception-test directive comments.
    pub grammar parser() for str {
        /// end of a line or of the input
        rule eol() = "\n" / ![_]

        /// everything up to (not including) the next newline
        rule rest_of_line() -> &'input str
            = $([^ '\n']*)

        /// a `>>>` prompt line, returns the code on it
        rule prompt_line() -> &'input str
            = ">>>" [' ']? l:rest_of_line() eol() { l }

        /// a `...` continuation line, returns the code on it
        rule continuation_line() -> &'input str
            = "..." [' ']? l:rest_of_line() eol() { l }

        /// any line that is not a prompt
        rule output_line() -> &'input str
            = !">>>" l:$([^ '\n']+) eol() { l }
            / "\n" { "" }

        /// one prompt with its continuations and the transcript after it
        rule step() -> DoctestStep
            = first:prompt_line() more:continuation_line()* out:output_line()*
            {
                let code = std::iter::once(first).chain(more).collect::<Vec<_>>().join("\n");
                DoctestStep::new(code, Some(out.join("\n")))
            }

        /// parses a whole transcript into its steps
        pub rule transcript() -> Vec<DoctestStep>
            = steps:step()+ ![_] { steps }

        /// optional horizontal whitespace
        rule ws() = quiet!{[' ' | '\t']*}

        /// required horizontal whitespace
        rule ws1() = quiet!{[' ' | '\t']+}

        /// names of tests, cases, attributes and bare attribute values
        rule ident() -> String
            = s:$(['a'..='z' | 'A'..='Z' | '_'] ['a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.']*)
            { s.to_string() }

        /// integer or decimal number
        rule number() -> f64
            = n:$("-"? ['0'..='9']+ ("." ['0'..='9']+)?) {? n.parse().or(Err("number")) }

        /// double quoted string with backslash escapes
        rule quoted() -> String
            = s:$("\"" ([^ '"' | '\\'] / "\\" [_])* "\"") {? unescape(s).or(Err("quoted string")) }

        /// attribute value
        rule value() -> AttrValue
            = q:quoted() { AttrValue::Text(q) }
            / n:number() { AttrValue::Number(n) }
            / w:ident() { AttrValue::Text(w) }

        /// `key` or `key=value`
        rule attr() -> Attr
            = key:ident() value:(ws() "=" ws() v:value() { v })? { Attr { key, value } }

        /// `test` or `case`
        rule kind() -> DirectiveKind
            = "test" { DirectiveKind::Test }
            / "case" { DirectiveKind::Case }

        /// parses a full directive line, eg. `//@ case c1 points=2 hidden`
        pub rule directive() -> Directive
            = "//@" ws() kind:kind() ws1() name:ident() attrs:(ws1() a:attr() { a })* ws() ![_]
            { Directive { kind, name, attrs } }
    }
}

/// Parses a doctest-style case body.
///
/// Bodies with `>>>` prompts become one step per prompt, each expecting the
/// transcript written below it. A body without any prompt is a single step
/// that only has to run without error.
pub fn parse_doctest(body: &str) -> Result<Vec<DoctestStep>, String> {
    let text = dedent(&normalize_newlines(body));
    let text = text.trim_start_matches(|c: char| c.is_whitespace());
    let text = text.trim_end();

    if text.is_empty() {
        return Err("test case body is empty".to_string());
    }

    if !text.lines().any(|line| line.starts_with(">>>")) {
        return Ok(vec![DoctestStep::new(text, None)]);
    }

    parser::transcript(text).map_err(|e| {
        format!("could not parse doctest body at line {}: expected {}", e.location.line, e.expected)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prompts_continuations_and_output() {
        let steps = parse_doctest(
            r#"
            >>> let total = 0;
            >>> for i in 0..3 {
            ...     total += i;
            ... }
            >>> total
            3
            "#,
        )
        .expect("valid transcript");

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0], DoctestStep::new("let total = 0;", Some(String::new())));
        assert_eq!(steps[1].code, "for i in 0..3 {\n    total += i;\n}");
        assert_eq!(steps[2], DoctestStep::new("total", Some("3".to_string())));
    }

    #[test]
    fn body_without_prompts_is_a_single_unchecked_step() {
        let steps = parse_doctest("assert(1 == 1)").expect("plain body");
        assert_eq!(steps, vec![DoctestStep::new("assert(1 == 1)", None)]);
    }

    #[test]
    fn text_before_first_prompt_is_rejected() {
        assert!(parse_doctest("stray text\n>>> 1\n1").is_err());
        assert!(parse_doctest("   \n").is_err());
    }

    #[test]
    fn parses_directives() {
        let directive = parser::directive(
            r#"//@ case c2 points=1.5 hidden raises=assertion failure_message = "nope \"x\"" "#,
        )
        .expect("valid directive");

        assert_eq!(directive.kind, DirectiveKind::Case);
        assert_eq!(directive.name, "c2");
        assert_eq!(
            directive.attrs,
            vec![
                Attr {
                    key:   "points".into(),
                    value: Some(AttrValue::Number(1.5)),
                },
                Attr {
                    key:   "hidden".into(),
                    value: None,
                },
                Attr {
                    key:   "raises".into(),
                    value: Some(AttrValue::Text("assertion".into())),
                },
                Attr {
                    key:   "failure_message".into(),
                    value: Some(AttrValue::Text("nope \"x\"".into())),
                },
            ]
        );
    }

    #[test]
    fn rejects_malformed_directives() {
        assert!(parser::directive("//@ tests q1").is_err());
        assert!(parser::directive("//@ case").is_err());
        assert!(parser::directive("//@ case c1 points=").is_err());
    }
}
