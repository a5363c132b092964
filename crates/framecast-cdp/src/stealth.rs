//! Rendering-fidelity countermeasures.
//!
//! Headless Chromium exposes a handful of tells that make some sites render
//! differently (or refuse to render). The script below masks the common ones
//! and is installed on every new document before page scripts run.

pub const STEALTH_SCRIPT: &str = r#"
(() => {
  Object.defineProperty(Navigator.prototype, 'webdriver', { get: () => undefined });

  if (!window.chrome) {
    window.chrome = { runtime: {}, app: { isInstalled: false } };
  }

  Object.defineProperty(Navigator.prototype, 'languages', { get: () => ['en-US', 'en'] });

  Object.defineProperty(Navigator.prototype, 'plugins', {
    get: () => [
      { name: 'PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
      { name: 'Chrome PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
    ],
  });

  const query = window.navigator.permissions && window.navigator.permissions.query;
  if (query) {
    window.navigator.permissions.query = (parameters) =>
      parameters && parameters.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission })
        : query.call(window.navigator.permissions, parameters);
  }

  const getParameter = WebGLRenderingContext.prototype.getParameter;
  WebGLRenderingContext.prototype.getParameter = function (parameter) {
    if (parameter === 37445) return 'Intel Inc.';
    if (parameter === 37446) return 'Intel Iris OpenGL Engine';
    return getParameter.call(this, parameter);
  };
})();
"#;

/// Strip the headless marker from a browser-reported user agent.
pub(crate) fn sanitize_user_agent(user_agent: &str) -> String {
    user_agent.replace("HeadlessChrome", "Chrome")
}
