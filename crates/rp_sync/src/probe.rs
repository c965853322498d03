//! Best-effort discovery of the structured editor's document view.
//!
//! Each probe is a JS expression evaluating to the view (or nothing). The
//! first probe the page answers wins; none answering is a normal outcome.

use tracing::debug;

use crate::page::{ComposerPage, ElementHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorViewProbe {
    pub name: &'static str,
    /// Expression over `editor` (the editor element) yielding the view.
    pub expression: String,
}

impl EditorViewProbe {
    fn new(name: &'static str, expression: impl Into<String>) -> Self {
        Self {
            name,
            expression: expression.into(),
        }
    }
}

/// The probe chain in priority order, bound to one editor element.
pub fn probe_chain(editor: &ElementHandle) -> Vec<EditorViewProbe> {
    let element = format!(
        "document.querySelector('[data-rp-handle=\"{}\"]')",
        editor.as_str()
    );
    vec![
        EditorViewProbe::new("editor-element", format!("({})?.editorView", element)),
        EditorViewProbe::new("tiptap-editor", "window.tiptap?.editor?.view"),
        EditorViewProbe::new("tiptap-view", "window.tiptap?.view"),
        EditorViewProbe::new(
            "global-scan",
            "(() => { for (const key in window) { try { const v = window[key]; \
             if (v && typeof v === 'object' && v.view && v.view.state && v.view.state.schema) return v.view; \
             } catch (e) {} } return undefined; })()",
        ),
    ]
}

/// First probe whose expression yields a view with a schema.
pub async fn discover_view<P>(page: &P, editor: &ElementHandle) -> Option<EditorViewProbe>
where
    P: ComposerPage + ?Sized,
{
    for probe in probe_chain(editor) {
        match page.probe_view(&probe.expression).await {
            Ok(true) => {
                debug!("Editor view found through {}", probe.name);
                return Some(probe);
            }
            Ok(false) => {}
            Err(e) => debug!("Probe {} failed: {}", probe.name, e),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEditor;

    #[test]
    fn test_chain_order() {
        let names: Vec<_> = probe_chain(&ElementHandle("e1".to_string()))
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["editor-element", "tiptap-editor", "tiptap-view", "global-scan"]);
    }

    #[tokio::test]
    async fn test_first_answering_probe_wins() {
        let editor = FakeEditor::new();
        let handle = editor.editor_handle();
        assert!(discover_view(&editor, &handle).await.is_none());

        editor.expose_view("window.tiptap?.view");
        editor.expose_view("window.tiptap?.editor?.view");
        let probe = discover_view(&editor, &handle).await.unwrap();
        assert_eq!(probe.name, "tiptap-editor");
    }
}
