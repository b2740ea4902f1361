/// Locally rendered stand-in for media that is still uploading.
///
/// The preview URL is released through `revoke` exactly once, when the value
/// is dropped after the send resolves either way.
pub struct LocalPreview {
    url: String,
    revoke: Option<Box<dyn FnOnce(&str) + Send + Sync>>,
}

impl LocalPreview {
    pub fn new(url: impl Into<String>, revoke: impl FnOnce(&str) + Send + Sync + 'static) -> Self {
        Self {
            url: url.into(),
            revoke: Some(Box::new(revoke)),
        }
    }

    /// A preview that needs no cleanup, e.g. a `data:` URL.
    pub fn detached(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revoke: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for LocalPreview {
    fn drop(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke(&self.url);
        }
    }
}

impl std::fmt::Debug for LocalPreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPreview")
            .field("url", &self.url)
            .field("revocable", &self.revoke.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn revoked_once_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let preview = LocalPreview::new("blob:local/1", move |url| {
            assert_eq!(url, "blob:local/1");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(preview.url(), "blob:local/1");
        drop(preview);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
