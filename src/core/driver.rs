use crate::errors::Result;
use crate::locator::Target;
use async_trait::async_trait;

/// Capabilities the booking stages need from a live page.
///
/// Every element operation receives a [`Target`] and resolves it afresh, so
/// a target stays valid while the page mutates underneath it. Operations on a
/// target that matches several elements act on the first match in document
/// order.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the document to load
    async fn goto(&self, url: &str) -> Result<()>;

    /// Number of attached elements matching the target
    async fn count(&self, target: &Target) -> Result<usize>;

    /// Whether the first match is rendered and visible; `false` when nothing matches
    async fn is_visible(&self, target: &Target) -> Result<bool>;

    /// Whether the first match is not disabled; errors when nothing matches
    async fn is_enabled(&self, target: &Target) -> Result<bool>;

    async fn inner_text(&self, target: &Target) -> Result<String>;

    /// Current value of an input element
    async fn input_value(&self, target: &Target) -> Result<String>;

    /// Click the first match. A trial click runs the actionability checks only.
    async fn click(&self, target: &Target, options: ClickOptions) -> Result<()>;

    /// Replace the value of an input by typing into it
    async fn fill(&self, target: &Target, value: &str) -> Result<()>;

    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Release the page and its browser. Calling it again is a no-op.
    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickOptions {
    pub trial: bool,
}

impl ClickOptions {
    pub fn trial() -> Self {
        Self { trial: true }
    }
}
