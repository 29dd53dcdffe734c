//! Pointer input by selector
//!
//! Input events are dispatched at page coordinates; the selector is resolved
//! to its element's center with an in-page query first.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::engine::{BrowserEngine, InputKind};
use crate::error::SessionError;

const ELEMENT_CENTER_SNIPPET: &str = r#"
(function (selector) {
    var el = document.querySelector(selector);
    if (!el) { return null; }
    var rect = el.getBoundingClientRect();
    return { x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 };
})
"#;

/// Resolve a selector to the center coordinates of its element.
pub(crate) async fn element_center(
    engine: &Arc<dyn BrowserEngine>,
    selector: &str,
) -> Result<(f64, f64), SessionError> {
    let result = engine
        .evaluate(ELEMENT_CENTER_SNIPPET, vec![json!(selector)])
        .await?;

    let center = (
        result.get("x").and_then(Value::as_f64),
        result.get("y").and_then(Value::as_f64),
    );
    match center {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(SessionError::ElementNotFound {
            selector: selector.to_string(),
        }),
    }
}

/// Dispatch a pointer event at the center of the element matching `selector`.
pub(crate) async fn pointer_event(
    engine: &Arc<dyn BrowserEngine>,
    kind: InputKind,
    selector: &str,
) -> Result<(), SessionError> {
    let (x, y) = element_center(engine, selector).await?;
    debug!("Dispatching {} at ({:.1}, {:.1}) for '{}'", kind.as_str(), x, y, selector);
    engine.send_input_event(kind, x, y).await
}
