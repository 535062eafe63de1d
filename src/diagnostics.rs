use crate::language::errors::SemanticError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct SemanticDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SemanticDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &SemanticError) -> Self {
        let message = err.message();
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            label: message.clone(),
            message,
        }
    }
}

pub fn emit_semantic_errors(name: &str, source: &str, errors: &[SemanticError]) {
    let src = NamedSource::new(name, source.to_string());
    for err in errors {
        let diagnostic = SemanticDiagnostic::from_error(src.clone(), err);
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{errors::SemanticErrorKind, span::Span};

    #[test]
    fn diagnostics_carry_message_span_and_help() {
        let err = SemanticError::new(SemanticErrorKind::ReachedNever, Span::new(4, 9))
            .with_help("remove the unreachable expression");
        let src = NamedSource::new("main", "abc defgh ij".to_string());
        let diagnostic = SemanticDiagnostic::from_error(src.clone(), &err);
        assert_eq!(diagnostic.message, err.message());
        assert_eq!(diagnostic.label, err.message());
        assert_eq!(diagnostic.help.as_deref(), Some("remove the unreachable expression"));
        assert_eq!(diagnostic.span, err.to_source_span());
        // rendering must not panic
        let rendered = format!("{:?}", Report::new(diagnostic));
        assert!(rendered.contains("Never"));
    }
}
