// src/errors/render.rs
//! Console rendering for diagnostics with ANSI color support.

use std::io::Write;

use super::{ColorMode, Diagnostic, Severity};

struct Colors {
    use_color: bool,
}

impl Colors {
    fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn bold_red(&self) -> &'static str {
        if self.use_color { "\x1b[1;31m" } else { "" }
    }

    fn bold_yellow(&self) -> &'static str {
        if self.use_color { "\x1b[1;33m" } else { "" }
    }

    fn cyan(&self) -> &'static str {
        if self.use_color { "\x1b[36m" } else { "" }
    }

    fn green(&self) -> &'static str {
        if self.use_color { "\x1b[32m" } else { "" }
    }

    fn reset(&self) -> &'static str {
        if self.use_color { "\x1b[0m" } else { "" }
    }
}

/// Console renderer for diagnostics.
pub struct ConsoleRenderer<W: Write> {
    writer: W,
    colors: Colors,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(writer: W, mode: ColorMode) -> Self {
        let use_color = match mode {
            ColorMode::On => true,
            ColorMode::Off => false,
            ColorMode::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        };
        Self {
            writer,
            colors: Colors::new(use_color),
        }
    }

    /// Render a diagnostic, its source snippet and its notes.
    pub fn render(&mut self, diag: &Diagnostic) -> std::io::Result<()> {
        self.render_one(diag, 0)
    }

    fn render_one(&mut self, diag: &Diagnostic, depth: usize) -> std::io::Result<()> {
        let indent = "    ".repeat(depth);
        let style = match diag.severity {
            Severity::Error => self.colors.bold_red(),
            Severity::Warning => self.colors.bold_yellow(),
            Severity::Note => self.colors.cyan(),
        };
        let severity = match diag.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        };
        writeln!(
            self.writer,
            "{}{}:{}:{}: {}{}{}: {}",
            indent,
            diag.path,
            diag.line + 1,
            diag.column + 1,
            style,
            severity,
            self.colors.reset(),
            diag.message,
        )?;
        if let Some(ref line) = diag.source_line {
            writeln!(self.writer, "{}{}", indent, line)?;
            let caret_pad = " ".repeat(diag.column as usize);
            writeln!(
                self.writer,
                "{}{}{}^{}",
                indent,
                caret_pad,
                self.colors.green(),
                self.colors.reset(),
            )?;
        }
        for note in &diag.notes {
            self.render_one(note, depth + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(message: &str) -> Diagnostic {
        Diagnostic {
            path: "box.mar".into(),
            line: 0,
            column: 6,
            offset: 6,
            severity: Severity::Error,
            message: message.into(),
            source_line: Some("const x: u8 = 300;".into()),
            notes: vec![],
        }
    }

    #[test]
    fn renders_path_position_and_caret() {
        let mut out = Vec::new();
        let mut renderer = ConsoleRenderer::new(&mut out, ColorMode::Off);
        renderer.render(&diag("some problem")).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "box.mar:1:7: error: some problem\nconst x: u8 = 300;\n      ^\n"
        );
    }

    #[test]
    fn notes_render_indented() {
        let mut parent = diag("C import failed");
        parent.source_line = None;
        parent.notes.push(Diagnostic {
            path: "header.h".into(),
            line: 4,
            column: 0,
            offset: 0,
            severity: Severity::Note,
            message: "unknown type name 'sizet'".into(),
            source_line: None,
            notes: vec![],
        });
        let mut out = Vec::new();
        let mut renderer = ConsoleRenderer::new(&mut out, ColorMode::Off);
        renderer.render(&parent).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("box.mar:1:7: error: C import failed"));
        assert!(text.contains("    header.h:5:1: note: unknown type name 'sizet'"));
    }

    #[test]
    fn color_codes_present_when_on() {
        let mut out = Vec::new();
        let mut renderer = ConsoleRenderer::new(&mut out, ColorMode::On);
        renderer.render(&diag("x")).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\x1b[1;31m"));
    }
}
