use std::fmt;

/// A 1-based line / 0-based column position inside a module's source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.file, self.line, self.column)
    }
}

/// Line / column of a byte offset. Lines are 1-based, columns 0-based.
pub fn locate(code: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(code.len());
    let before = &code[..offset];
    let line = before.bytes().filter(|b| *b == b'\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => offset - newline - 1,
        None => offset,
    };
    (line, column)
}

/// A small numbered excerpt around `line` with a caret under `column`.
pub fn code_frame(code: &str, line: usize, column: usize) -> String {
    let lines: Vec<&str> = code.split('\n').collect();
    let first = line.saturating_sub(2).max(1);
    let last = (line + 1).min(lines.len());
    let gutter_width = last.to_string().len();

    let mut frame = String::new();
    for printed in first..=last {
        let Some(text) = lines.get(printed - 1) else {
            break;
        };
        frame.push_str(&format!("{:>gutter_width$}: {}\n", printed, text));
        if printed == line {
            frame.push_str(&" ".repeat(gutter_width + 2 + column));
            frame.push_str("^\n");
        }
    }
    frame.pop();
    frame
}

/// Fatal analysis errors. Each carries the string code the caller-facing
/// surface reports, and fatal sites with a source position carry the enriched
/// location and code frame.
#[derive(Debug, thiserror::Error)]
pub enum ShakeError {
    #[error("could not parse {id}: {message}")]
    Parse {
        id: String,
        message: String,
        pos: usize,
        loc: Location,
        frame: String,
    },
    #[error("'{name}' is not exported by {exporter}, imported by {importer}")]
    MissingExport {
        name: String,
        exporter: String,
        importer: String,
        pos: usize,
        loc: Location,
        frame: String,
    },
    #[error("\"{name}\" cannot be exported from {module} as it is a reexport that references itself")]
    CircularReexport { name: String, module: String },
    #[error("module \"{module}\" that is marked with 'syntheticNamedExports' needs an export named \"{fallback}\" that does not exist")]
    SyntheticNamedExportsNeedNamespaceExport { module: String, fallback: String },
    #[error("the module id \"{id}\" was provided more than once")]
    DuplicateModule { id: String },
}

impl ShakeError {
    pub fn code(&self) -> &'static str {
        match self {
            ShakeError::Parse { .. } => "PARSE_ERROR",
            ShakeError::MissingExport { .. } => "MISSING_EXPORT",
            ShakeError::CircularReexport { .. } => "CIRCULAR_REEXPORT",
            ShakeError::SyntheticNamedExportsNeedNamespaceExport { .. } => {
                "SYNTHETIC_NAMED_EXPORTS_NEED_NAMESPACE_EXPORT"
            }
            ShakeError::DuplicateModule { .. } => "DUPLICATE_MODULE",
        }
    }
}

/// Advisory findings. Analysis continues; the graph accumulates these and the
/// caller drains them into its injected logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    NamespaceConflict {
        name: String,
        reexporting_module: String,
        sources: Vec<String>,
    },
    AmbiguousExternalNamespaces {
        name: String,
        reexporting_module: String,
        used_module: String,
        sources: Vec<String>,
    },
    ShimmedExport {
        module: String,
        name: String,
    },
    SourcemapError {
        module: String,
        message: String,
    },
}

impl Warning {
    pub fn code(&self) -> &'static str {
        match self {
            Warning::NamespaceConflict { .. } => "NAMESPACE_CONFLICT",
            Warning::AmbiguousExternalNamespaces { .. } => "AMBIGUOUS_EXTERNAL_NAMESPACES",
            Warning::ShimmedExport { .. } => "SHIMMED_EXPORT",
            Warning::SourcemapError { .. } => "SOURCEMAP_ERROR",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NamespaceConflict {
                name,
                reexporting_module,
                sources,
            } => write!(
                f,
                "conflicting namespaces: \"{}\" re-exports \"{}\" from one of the modules {} (will be ignored)",
                reexporting_module,
                name,
                sources.join(", "),
            ),
            Warning::AmbiguousExternalNamespaces {
                name,
                reexporting_module,
                used_module,
                sources,
            } => write!(
                f,
                "ambiguous external namespace resolution: \"{}\" re-exports \"{}\" from one of the external modules {}, guessing \"{}\"",
                reexporting_module,
                name,
                sources.join(", "),
                used_module,
            ),
            Warning::ShimmedExport { module, name } => {
                write!(f, "missing export \"{}\" has been shimmed in module \"{}\"", name, module)
            }
            Warning::SourcemapError { module, message } => {
                write!(f, "error when using sourcemap for reporting an error in \"{}\": {}", module, message)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{code_frame, locate};

    #[test]
    fn locates_offsets_across_lines() {
        let code = "const a = 1;\nconst b = 2;\n";
        assert_eq!(locate(code, 0), (1, 0));
        assert_eq!(locate(code, 6), (1, 6));
        // the `b` on the second line
        assert_eq!(locate(code, 19), (2, 6));
        // offsets beyond the end clamp to the last position
        assert_eq!(locate(code, 1000), (3, 0));
    }

    #[test]
    fn code_frame_points_at_the_column() {
        let code = "line one\nline two\nline three\nline four";
        let frame = code_frame(code, 3, 5);
        assert_eq!(
            frame,
            "1: line one\n2: line two\n3: line three\n        ^\n4: line four"
        );
    }
}
