//! [`ComposerPage`] over a live browser tab.
//!
//! Elements found by the finders are tagged with a `data-rp-handle` attribute
//! and addressed through it afterwards. All page scripts share `js/prelude.js`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use rp_browser::PageSession;
use rp_core::Result;

use crate::convergence::ImageSnapshot;
use crate::dedup_guard::{InterceptionSession, UploadDedupGuard};
use crate::download::LocalImage;
use crate::ladder::{InsertOutcome, InsertStrategy};
use crate::page::{BodyChannel, ComposerPage, ElementHandle};

const PRELUDE_JS: &str = include_str!("js/prelude.js");
const FIND_ELEMENT_JS: &str = include_str!("js/find_element.js");
const DOM_OPS_JS: &str = include_str!("js/dom_ops.js");
const FILL_EDITOR_JS: &str = include_str!("js/fill_editor.js");
const INSERT_IMAGE_JS: &str = include_str!("js/insert_image.js");

/// Placeholder in the insertion script replaced by a probe expression.
const PROBE_SLOT: &str = "__PROBE__";

/// Wrap `body` so the prelude helpers are in scope.
fn script(body: &str) -> String {
    format!("(args) => {{\n{}\nreturn ({})(args);\n}}", PRELUDE_JS, body.trim())
}

pub struct CdpComposerPage {
    session: PageSession,
    interception: Mutex<Option<InterceptionSession>>,
}

impl CdpComposerPage {
    pub fn new(session: PageSession) -> Self {
        Self {
            session,
            interception: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &PageSession {
        &self.session
    }

    async fn run<T: DeserializeOwned>(&self, body: &str, args: Value) -> Result<T> {
        let value = self.session.call_function(&script(body), &args).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn op<T: DeserializeOwned>(&self, op: &str, handle: Option<&ElementHandle>, mut args: Value) -> Result<T> {
        args["op"] = json!(op);
        args["handle"] = json!(handle.map(ElementHandle::as_str));
        self.run(DOM_OPS_JS, args).await
    }

    async fn find(&self, mode: &str, selectors: &[&str]) -> Result<Option<ElementHandle>> {
        let handle: Option<String> = self
            .run(FIND_ELEMENT_JS, json!({ "mode": mode, "selectors": selectors }))
            .await?;
        Ok(handle.map(ElementHandle))
    }

    async fn fill(&self, editor: &ElementHandle, channel: Value, html: &str, text: &str) -> Result<bool> {
        self.run(
            FILL_EDITOR_JS,
            json!({ "handle": editor.as_str(), "channel": channel, "html": html, "text": text }),
        )
        .await
    }
}

#[async_trait]
impl ComposerPage for CdpComposerPage {
    async fn current_url(&self) -> Result<String> {
        Ok(self.session.url().await?)
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        Ok(self.session.navigate(url).await?)
    }

    async fn bring_to_front(&self) -> Result<()> {
        Ok(self.session.bring_to_front().await?)
    }

    async fn count_matching(&self, selector: &str) -> Result<usize> {
        self.op("count", None, json!({ "selector": selector })).await
    }

    async fn find_title(&self, selectors: &[&str]) -> Result<Option<ElementHandle>> {
        self.find("title", selectors).await
    }

    async fn find_editor(&self, selectors: &[&str]) -> Result<Option<ElementHandle>> {
        self.find("editor", selectors).await
    }

    async fn set_native_value(&self, element: &ElementHandle, value: &str) -> Result<bool> {
        self.op("setValue", Some(element), json!({ "value": value })).await
    }

    async fn prepare_editor(&self, editor: &ElementHandle) -> Result<()> {
        let _: bool = self.op("prepare", Some(editor), json!({})).await?;
        Ok(())
    }

    async fn clear_editor(&self, editor: &ElementHandle) -> Result<()> {
        let _: bool = self.op("clear", Some(editor), json!({})).await?;
        Ok(())
    }

    async fn fill_body(&self, editor: &ElementHandle, channel: BodyChannel, html: &str, text: &str) -> Result<bool> {
        self.fill(editor, serde_json::to_value(channel)?, html, text).await
    }

    async fn paste_text(&self, editor: &ElementHandle, text: &str) -> Result<bool> {
        self.fill(editor, json!("pastePlain"), "", text).await
    }

    async fn type_text(&self, editor: &ElementHandle, text: &str) -> Result<()> {
        let _: bool = self.op("focusEnd", Some(editor), json!({})).await?;
        Ok(self.session.insert_text(text).await?)
    }

    async fn editor_text(&self, editor: &ElementHandle) -> Result<String> {
        self.op("text", Some(editor), json!({})).await
    }

    async fn image_snapshots(&self, editor: &ElementHandle) -> Result<Vec<ImageSnapshot>> {
        self.op("snapshots", Some(editor), json!({})).await
    }

    async fn remove_images(&self, editor: &ElementHandle, positions: &[usize]) -> Result<usize> {
        self.op("removeImages", Some(editor), json!({ "positions": positions })).await
    }

    async fn probe_view(&self, expression: &str) -> Result<bool> {
        let check = format!(
            "(() => {{ try {{ const v = ({}); return !!(v && v.state && v.state.schema); }} catch (e) {{ return false; }} }})()",
            expression
        );
        Ok(self.session.evaluate(&check).await?.as_bool().unwrap_or(false))
    }

    async fn insert_image(
        &self,
        editor: &ElementHandle,
        strategy: InsertStrategy,
        image: &LocalImage,
        view_expression: Option<&str>,
    ) -> Result<InsertOutcome> {
        let body = INSERT_IMAGE_JS.replace(PROBE_SLOT, view_expression.unwrap_or("undefined"));
        let args = json!({
            "handle": editor.as_str(),
            "strategy": strategy,
            "dataUrl": image.data_url()?,
            "mime": image.mime,
            "name": image.file_name(),
            "hash": image.sha256,
        });
        self.run(&body, args).await
    }

    async fn click_with_text(&self, selector: &str, text: &str, exclude: Option<&str>) -> Result<bool> {
        self.op(
            "clickText",
            None,
            json!({ "selector": selector, "text": text, "exclude": exclude }),
        )
        .await
    }

    async fn upload_files(&self, selector: &str, files: &[PathBuf]) -> Result<()> {
        let paths: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
        Ok(self.session.set_input_files(selector, &paths).await?)
    }

    async fn notify(&self, message: &str, is_error: bool) -> Result<()> {
        let _: bool = self
            .op("notify", None, json!({ "message": message, "isError": is_error }))
            .await?;
        Ok(())
    }

    async fn install_upload_guard(&self, guard: Arc<UploadDedupGuard>) -> Result<()> {
        self.remove_upload_guard().await?;
        let interception = InterceptionSession::install(&self.session, guard).await?;
        *self.interception.lock() = Some(interception);
        debug!("Upload guard installed");
        Ok(())
    }

    async fn remove_upload_guard(&self) -> Result<()> {
        let interception = self.interception.lock().take();
        if let Some(interception) = interception {
            interception.uninstall().await;
            debug!("Upload guard removed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_wraps_prelude() {
        let wrapped = script(DOM_OPS_JS);
        assert!(wrapped.starts_with("(args) => {"));
        assert!(wrapped.contains("function deepQueryAll"));
        assert!(wrapped.trim_end().ends_with("(args);\n}"));
    }

    #[test]
    fn test_probe_slot_present_once() {
        assert_eq!(INSERT_IMAGE_JS.matches(PROBE_SLOT).count(), 1);
    }

    #[test]
    fn test_strategy_names_match_script() {
        for strategy in InsertStrategy::LADDER {
            let name = serde_json::to_value(strategy).unwrap();
            let case = format!("case '{}'", name.as_str().unwrap());
            assert!(INSERT_IMAGE_JS.contains(&case), "{}", case);
        }
        for channel in BodyChannel::ORDER {
            let name = serde_json::to_value(channel).unwrap();
            let case = format!("case '{}'", name.as_str().unwrap());
            assert!(FILL_EDITOR_JS.contains(&case), "{}", case);
        }
    }
}
