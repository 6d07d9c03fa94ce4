use postbridge_channel::Window;

use crate::error::{BridgeError, Result};

/// Host-side element embedding the frame document.
#[derive(Debug, Clone)]
pub struct FrameElement {
    tag_name: String,
    src: Option<String>,
    content_window: Option<Window>,
    owner: Window,
}

impl FrameElement {
    /// An element with the given tag in `owner`'s document, not yet loaded.
    pub fn new(tag_name: impl Into<String>, owner: &Window) -> Self {
        Self {
            tag_name: tag_name.into(),
            src: None,
            content_window: None,
            owner: owner.clone(),
        }
    }

    /// A loaded `<iframe>` showing `src` in `content_window`.
    pub fn iframe(owner: &Window, src: impl Into<String>, content_window: &Window) -> Self {
        Self::new("iframe", owner)
            .with_src(src)
            .with_content_window(content_window)
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_content_window(mut self, window: &Window) -> Self {
        self.content_window = Some(window.clone());
        self
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn content_window(&self) -> Option<&Window> {
        self.content_window.as_ref()
    }

    /// Window whose document contains this element.
    pub fn owner(&self) -> &Window {
        &self.owner
    }

    /// The frame's content window, if the element can host a bridge.
    pub fn content_target(&self) -> Result<&Window> {
        if !self.tag_name.eq_ignore_ascii_case("iframe") {
            return Err(BridgeError::Configuration(format!(
                "<{}> element is not an iframe",
                self.tag_name
            )));
        }
        if self.src.as_deref().is_none_or(|src| src.trim().is_empty()) {
            return Err(BridgeError::Configuration("iframe has no src".to_string()));
        }
        self.content_window.as_ref().ok_or_else(|| {
            BridgeError::Configuration("iframe has no content window".to_string())
        })
    }
}

/// Resolve an optional element into its content window.
pub(crate) fn require_frame(frame: Option<&FrameElement>) -> Result<(&FrameElement, &Window)> {
    let frame =
        frame.ok_or_else(|| BridgeError::Configuration("no frame element".to_string()))?;
    let content = frame.content_target()?;
    Ok((frame, content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loaded_iframe_is_accepted() {
        let host = Window::spawn("https://host.example").unwrap();
        let frame = Window::spawn("https://editor.example").unwrap();
        let element = FrameElement::iframe(&host, "https://editor.example/app", &frame);

        let content = element.content_target().unwrap();
        assert!(content.same_window(&frame));
        assert!(element.owner().same_window(&host));
        assert_eq!(element.src(), Some("https://editor.example/app"));
    }

    #[tokio::test]
    async fn tag_check_is_case_insensitive() {
        let host = Window::spawn("https://host.example").unwrap();
        let frame = Window::spawn("https://editor.example").unwrap();
        let element = FrameElement::new("IFRAME", &host)
            .with_src("https://editor.example")
            .with_content_window(&frame);
        assert!(element.content_target().is_ok());
    }

    #[tokio::test]
    async fn rejects_unusable_elements() {
        let host = Window::spawn("https://host.example").unwrap();
        let frame = Window::spawn("https://editor.example").unwrap();

        let not_iframe = FrameElement::new("div", &host)
            .with_src("https://editor.example")
            .with_content_window(&frame);
        let no_src = FrameElement::new("iframe", &host).with_content_window(&frame);
        let empty_src = FrameElement::new("iframe", &host)
            .with_src("  ")
            .with_content_window(&frame);
        let not_loaded = FrameElement::new("iframe", &host).with_src("https://editor.example");

        for element in [not_iframe, no_src, empty_src, not_loaded] {
            assert!(matches!(
                element.content_target(),
                Err(BridgeError::Configuration(_))
            ));
        }
        assert!(matches!(
            require_frame(None),
            Err(BridgeError::Configuration(_))
        ));
    }
}
