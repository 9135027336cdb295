use swc_common::comments::Comments;
use swc_common::sync::Lrc;
use swc_common::{BytePos, FileName, SourceFile, SourceMap, Spanned};
use swc_ecma_ast::{EsVersion, Module};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

/// A parsed ES module together with the base offset of its source file.
///
/// Spans inside the AST are absolute within the parse's `SourceMap`;
/// subtracting `base_pos` yields 0-based byte offsets into the source string.
#[derive(Debug)]
pub struct ParsedModule {
    pub module: Module,
    pub base_pos: BytePos,
}

/// A parser diagnostic with the message and a 0-based byte offset into the
/// source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub message: String,
    pub offset: u32,
}

pub fn create_lexer<'a>(fm: &'a SourceFile, comments: Option<&'a dyn Comments>) -> Lexer<'a> {
    Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::latest(),
        StringInput::from(fm),
        comments,
    )
}

/// Parses `code` as an ES module. The first parser error wins, recovered or
/// not, so callers see the same diagnostic the parser reported first.
pub fn parse_es_module<TName, TBody>(name: TName, code: TBody) -> Result<ParsedModule, ParseDiagnostic>
where
    TName: Into<String>,
    TBody: ToString,
{
    let cm = Lrc::<SourceMap>::default();
    let fname: Lrc<FileName> = Lrc::new(FileName::Custom(name.into()));
    let fm = cm.new_source_file(fname, code.to_string());
    let base_pos = fm.start_pos;

    let lexer = create_lexer(&fm, None);
    let mut parser = Parser::new_from(lexer);

    match parser.parse_module() {
        Ok(module) => {
            if let Some(error) = parser.take_errors().into_iter().next() {
                return Err(to_diagnostic(error, base_pos));
            }
            Ok(ParsedModule { module, base_pos })
        }
        Err(error) => Err(to_diagnostic(error, base_pos)),
    }
}

fn to_diagnostic(error: swc_ecma_parser::error::Error, base_pos: BytePos) -> ParseDiagnostic {
    let span = error.span();
    let message = error.kind().msg().to_string();
    ParseDiagnostic {
        message,
        offset: span.lo.0.saturating_sub(base_pos.0),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::parse_es_module;

    #[test]
    fn parses_a_module_with_imports_and_exports() {
        let parsed = parse_es_module(
            "ok.js",
            r#"
            import { a } from './a';
            export const b = a + 1;
            "#,
        )
        .unwrap();
        assert_eq!(parsed.module.body.len(), 2);
    }

    #[test]
    fn reports_the_offset_of_a_syntax_error() {
        let err = parse_es_module("broken.js", "export const = 1;").unwrap_err();
        // the parser points somewhere inside the broken declaration
        assert!(err.offset < "export const = 1;".len() as u32);
        assert!(!err.message.is_empty());
    }
}
