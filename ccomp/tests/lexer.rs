use ccomp::grammer::token::TokenKind;

fn case(code: &str, expects: Vec<TokenKind>) {
    use ccomp::grammer::lexer::Lexer;
    let tokens = Lexer::new(code).parse();

    println!(" {code}");
    for token in &tokens {
        print!("\r\x1b[{}C^", token.pos.col);
    }
    println!();
    for (idx, token) in tokens.iter().enumerate() {
        println!("{:>2}: {:?}", idx, token.kind);
    }

    assert_eq!(tokens.len(), expects.len());
    for (idx, expect) in expects.iter().enumerate() {
        assert_eq!(tokens[idx].kind, *expect);
    }
}

#[test]
fn function() {
    use TokenKind::*;
    case(
        "int main(void) { return \"ABC\"; } // sample comment",
        vec![
            KwInt,
            Ident(format!("main")),
            LParen,
            KwVoid,
            RParen,
            LCurly,
            KwReturn,
            Text(format!("ABC")),
            Semicolon,
            RCurly,
            Eof,
        ],
    );
}

#[test]
fn operators() {
    use TokenKind::*;
    case(
        "a <<= b >> c != d && !e || f->g",
        vec![
            Ident(format!("a")),
            LAngleLAngleEqual,
            Ident(format!("b")),
            RAngleRAngle,
            Ident(format!("c")),
            ExclEqual,
            Ident(format!("d")),
            AmpAmp,
            Excl,
            Ident(format!("e")),
            PipePipe,
            Ident(format!("f")),
            Arrow,
            Ident(format!("g")),
            Eof,
        ],
    );
}

#[test]
fn literals() {
    use TokenKind::*;
    case(
        "'a' '\\n' \"x\\ty\" 0x10 7 3.25 true false",
        vec![
            Char('a'),
            Char('\n'),
            Text(format!("x\ty")),
            Int(16),
            Int(7),
            Float(3.25),
            KwTrue,
            KwFalse,
            Eof,
        ],
    );
}

#[test]
fn comments_and_directives() {
    use TokenKind::*;
    case(
        "#include <stdio.h>\n/* block\ncomment */ x /* y */ ;",
        vec![Ident(format!("x")), Semicolon, Eof],
    );
}

#[test]
fn keywords() {
    use TokenKind::*;
    case(
        "switch case default break continue typedef struct enum bool double",
        vec![
            KwSwitch, KwCase, KwDefault, KwBreak, KwContinue, KwTypedef, KwStruct, KwEnum, KwBool,
            KwDouble, Eof,
        ],
    );
}

#[test]
fn errors_become_tokens() {
    use TokenKind::*;
    case(
        "x @ y",
        vec![
            Ident(format!("x")),
            Error(format!("unexpected character `@`")),
            Ident(format!("y")),
            Eof,
        ],
    );
    case("\"open", vec![Error(format!("unterminated string literal")), Eof]);
    case("/* open", vec![Error(format!("unterminated block comment")), Eof]);
}

#[test]
fn lex_stage_reports_every_error() {
    let Err(ccomp::error::Failure::Lex(errors)) = ccomp::lex("int a = @;\nint b = $;") else {
        panic!("expected a lexical failure");
    };
    let pos: Vec<_> = errors.iter().map(|e| (e.pos.line, e.pos.col)).collect();
    assert_eq!(pos, vec![(1, 9), (2, 9)]);
}
