//! Embedded static resources.
//!
//! - `template` - Template types for typed variable injection
//! - `serve` - Dev server resources (livereload.js)

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// URL the live-reload client is served from. Never collides with output
    /// files because nothing in the pipeline writes under `__assetline/`.
    pub const LIVERELOAD_URL: &str = "/__assetline/livereload.js";

    /// Variables for livereload.js.
    pub struct LivereloadVars {
        pub ws_port: u16,
    }

    impl TemplateVars for LivereloadVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__ASSETLINE_WS_PORT__", &self.ws_port.to_string())
        }
    }

    /// Live-reload client with WebSocket port injection.
    pub const LIVERELOAD_JS: Template<LivereloadVars> =
        Template::new(include_str!("serve/livereload.js"));

    /// `<script>` tag loading the client.
    pub fn script_tag() -> String {
        format!(r#"<script src="{LIVERELOAD_URL}"></script>"#)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_livereload_js_with_port() {
        let vars = serve::LivereloadVars { ws_port: 35730 };
        let rendered = serve::LIVERELOAD_JS.render(&vars);
        assert!(rendered.contains("35730"));
        assert!(!rendered.contains("__ASSETLINE_WS_PORT__"));
    }

    #[test]
    fn test_script_tag() {
        assert_eq!(
            serve::script_tag(),
            r#"<script src="/__assetline/livereload.js"></script>"#
        );
    }
}
