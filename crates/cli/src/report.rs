//! Grouped console output for new violations
//!
//! Layout, one indent level per group:
//!
//! ```text
//! New axe issues
//!   serious: Elements must have sufficient color contrast https://...
//!     Element: <a id="cta">
//!       HTML: <a id="cta">Buy</a>
//!       Fix any of the following:
//!         Element has insufficient color contrast of 2.1
//!       Related nodes
//!         Selector: #banner
//!         HTML: <div id="banner">
//! ```

use crate::theme::ConsoleTheme;
use dom::{CheckKind, NodeResult, RelatedNode, RuleResult, SharedDocument};
use owo_colors::{OwoColorize, Style};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;
use watcher::{RenderError, ReportSink, UnitInfo};

/// Report sink printing grouped, colored text
pub struct ConsoleReporter<W: Write + Send> {
    out: Mutex<W>,
    theme: ConsoleTheme,
    color: bool,
    document: Option<SharedDocument>,
    violations: AtomicUsize,
    nodes: AtomicUsize,
    errors: AtomicUsize,
}

/// Totals printed so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportTotals {
    pub violations: usize,
    pub nodes: usize,
    pub errors: usize,
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, theme: ConsoleTheme, color: bool) -> Self {
        Self {
            out: Mutex::new(out),
            theme,
            color,
            document: None,
            violations: AtomicUsize::new(0),
            nodes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    /// Resolve selectors against `document` to show elements instead
    pub fn with_document(mut self, document: SharedDocument) -> Self {
        self.document = Some(document);
        self
    }

    pub fn totals(&self) -> ReportTotals {
        ReportTotals {
            violations: self.violations.load(Ordering::Relaxed),
            nodes: self.nodes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    /// Render the violation groups
    pub fn render(&self, violations: &[RuleResult]) -> String {
        let mut out = Group::default();
        out.line(self.paint("New axe issues", self.theme.heading()));
        out.indent += 1;

        for rule in violations {
            let impact = rule.impact.map(|i| i.as_str()).unwrap_or("unknown");
            out.line(format!(
                "{}: {}",
                self.paint(impact, self.theme.impact(rule.impact)),
                self.paint(&format!("{} {}", rule.help, rule.help_url), self.theme.reset())
            ));
            out.indent += 1;
            for node in &rule.nodes {
                self.failure_summary(&mut out, node, CheckKind::Any);
                self.failure_summary(&mut out, node, CheckKind::None);
            }
            out.indent -= 1;
        }
        out.text
    }

    /// Render an instrumentation failure
    pub fn render_error(&self, unit: &UnitInfo, error: &RenderError) -> String {
        let mut out = Group::default();
        out.line(self.paint("axe error: could not check node", self.theme.error()));
        out.indent += 1;

        out.line(self.paint("Component", self.theme.heading()));
        out.indent += 1;
        match unit.id {
            Some(id) => out.line(format!("{} (id {})", unit.name, id)),
            None => out.line(unit.name.clone()),
        }
        out.indent -= 1;

        out.line(self.paint("Error", self.theme.heading()));
        out.indent += 1;
        out.line(error.to_string());
        out.text
    }

    fn failure_summary(&self, out: &mut Group, node: &NodeResult, kind: CheckKind) {
        let checks = node.checks(kind);
        if checks.is_empty() {
            return;
        }

        out.line(self.locate(&node.selector()));
        out.indent += 1;
        out.line(format!("HTML: {}", self.paint(&node.html, self.theme.code())));

        out.line(match kind {
            CheckKind::Any => "Fix any of the following:",
            CheckKind::All | CheckKind::None => "Fix all of the following:",
        });
        out.indent += 1;
        for check in checks {
            out.line(check.message.clone());
        }
        out.indent -= 1;

        let related: Vec<&RelatedNode> = node.related_nodes(kind).collect();
        if !related.is_empty() {
            out.line("Related nodes");
            out.indent += 1;
            for related in related {
                out.line(self.locate(&related.selector()));
                out.line(format!("HTML: {}", self.paint(&related.html, self.theme.code())));
            }
            out.indent -= 1;
        }
        out.indent -= 1;
    }

    /// `Element: <tag ...>` when the selector matches, else `Selector: ...`
    fn locate(&self, selector: &str) -> String {
        let element = self.document.as_ref().and_then(|doc| {
            let doc = doc.read();
            let node = doc.query_selector(selector)?;
            let html = doc.outer_html(node);
            html.split_inclusive('>').next().map(str::to_string)
        });
        match element {
            Some(tag) => format!("Element: {}", self.paint(&tag, self.theme.code())),
            None => format!("Selector: {}", self.paint(selector, self.theme.code())),
        }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn emit(&self, text: &str) {
        let mut out = self.out.lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!(error = %e, "failed to write report");
        }
    }
}

impl<W: Write + Send> ReportSink for ConsoleReporter<W> {
    fn report(&self, violations: &[RuleResult]) {
        self.violations.fetch_add(violations.len(), Ordering::Relaxed);
        self.nodes
            .fetch_add(violations.iter().map(|r| r.nodes.len()).sum(), Ordering::Relaxed);
        self.emit(&self.render(violations));
    }

    fn instrumentation_error(&self, unit: &UnitInfo, error: &RenderError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.emit(&self.render_error(unit, error));
    }
}

/// Indented line buffer
#[derive(Default)]
struct Group {
    text: String,
    indent: usize,
}

impl Group {
    fn line(&mut self, line: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.text.push_str("  ");
        }
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::{CheckResult, Document, ElementSpec, Impact};

    fn reporter() -> ConsoleReporter<Vec<u8>> {
        ConsoleReporter::new(Vec::new(), ConsoleTheme::LIGHT, false)
    }

    fn contrast_rule() -> RuleResult {
        RuleResult {
            id: "color-contrast".into(),
            impact: Some(Impact::Serious),
            help: "Elements must have sufficient color contrast".into(),
            help_url: "https://example.test/color-contrast".into(),
            nodes: vec![NodeResult {
                html: "<a id=\"cta\">Buy</a>".into(),
                any: vec![CheckResult {
                    id: "color-contrast".into(),
                    message: "Element has insufficient color contrast".into(),
                    related_nodes: vec![RelatedNode {
                        target: vec!["#banner".into()],
                        html: "<div id=\"banner\">".into(),
                    }],
                }],
                ..NodeResult::at("#cta")
            }],
            ..RuleResult::default()
        }
    }

    #[test]
    fn test_render_violation_group() {
        let text = reporter().render(&[contrast_rule()]);
        let expected = "\
New axe issues
  serious: Elements must have sufficient color contrast https://example.test/color-contrast
    Selector: #cta
      HTML: <a id=\"cta\">Buy</a>
      Fix any of the following:
        Element has insufficient color contrast
      Related nodes
        Selector: #banner
        HTML: <div id=\"banner\">
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_none_checks_use_fix_all() {
        let mut rule = contrast_rule();
        let node = &mut rule.nodes[0];
        node.none = std::mem::take(&mut node.any);
        node.none[0].related_nodes.clear();

        let text = reporter().render(&[rule]);
        assert!(text.contains("Fix all of the following:"));
        assert!(!text.contains("Related nodes"));
    }

    #[test]
    fn test_nodes_without_any_or_none_are_silent() {
        let mut rule = contrast_rule();
        rule.nodes[0].any.clear();
        let text = reporter().render(&[rule]);
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_selector_resolves_against_document() {
        let doc = Document::from_spec(&[ElementSpec::new("a").with_id("cta").with_text("Buy")])
            .unwrap()
            .into_shared();
        let text = reporter().with_document(doc).render(&[contrast_rule()]);
        assert!(text.contains("Element: <a id=\"cta\">"));
    }

    #[test]
    fn test_instrumentation_error_group() {
        let sink = reporter();
        sink.instrumentation_error(
            &UnitInfo {
                id: Some(7),
                name: "Broken".into(),
            },
            &RenderError::Host("no renderable output".into()),
        );
        assert_eq!(sink.totals().errors, 1);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "axe error: could not check node\n  Component\n    Broken (id 7)\n  Error\n    no renderable output\n"
        );
    }

    #[test]
    fn test_color_output_uses_theme() {
        let sink = ConsoleReporter::new(Vec::new(), ConsoleTheme::DARK, true);
        let text = sink.render(&[contrast_rule()]);
        // serious #ffb3b3
        assert!(text.contains("255;179;179"));
    }
}
