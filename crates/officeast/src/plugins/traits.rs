//! Base plugin trait definition.

use crate::Result;

/// Base trait that all plugins must implement.
///
/// # Thread Safety
///
/// Plugins must be `Send + Sync`: one backend instance may serve concurrent parses.
///
/// # Example
///
/// ```rust
/// use officeast::plugins::Plugin;
///
/// struct MyPlugin;
///
/// impl Plugin for MyPlugin {
///     fn name(&self) -> &str {
///         "my-plugin"
///     }
///
///     fn version(&self) -> String {
///         "1.0.0".to_string()
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// Unique, lowercase, hyphenated identifier (e.g. `"tesseract-cli"`).
    fn name(&self) -> &str;

    /// Semantic version of the plugin.
    fn version(&self) -> String;

    /// Called once before first use.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the owner is done with the plugin.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named;

    impl Plugin for Named {
        fn name(&self) -> &str {
            "named"
        }

        fn version(&self) -> String {
            "0.1.0".to_string()
        }
    }

    #[test]
    fn test_default_lifecycle_is_noop() {
        let plugin = Named;
        assert!(plugin.initialize().is_ok());
        assert!(plugin.shutdown().is_ok());
        assert_eq!(plugin.name(), "named");
    }
}
