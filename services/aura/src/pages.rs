//! HTML pages rendered from embedded minijinja templates

use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;
use std::sync::Arc;

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../templates/base.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("chat.html", include_str!("../templates/chat.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
];

#[derive(Clone)]
pub struct Pages {
    env: Arc<Environment<'static>>,
}

impl Pages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env: Arc::new(env) })
    }

    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<Html<String>, minijinja::Error> {
        let html = self.env.get_template(name)?.render(context)?;
        Ok(Html(html))
    }
}
