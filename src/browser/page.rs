//! Fetched documents and the forms and links found in them.
//!
//! A `Page` keeps only the final URL and the raw body. The DOM is parsed
//! on demand inside each accessor, so no parsed tree is ever held across
//! an `.await`.

use anyhow::{anyhow, Result};
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use crate::types::ConnectorError;

/// Compile a CSS selector.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {css:?}: {e}"))
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// A document returned by the portal.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    url: Url,
    body: String,
}

impl Page {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }

    /// Final URL after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Raw substring test against the body.
    pub fn contains(&self, needle: &str) -> bool {
        self.body.contains(needle)
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }

    /// Text of the `<title>` element, trimmed.
    pub fn title(&self) -> Option<String> {
        let sel = selector("title").ok()?;
        let doc = self.document();
        let title = doc.select(&sel).next()?;
        let text = title.text().collect::<String>();
        Some(text.trim().to_string())
    }

    /// Whether any element matches the selector.
    pub fn has_element(&self, css: &str) -> Result<bool> {
        let sel = selector(css)?;
        let doc = self.document();
        let found = doc.select(&sel).next().is_some();
        Ok(found)
    }

    /// The form with the given `name` attribute.
    pub fn form_named(&self, name: &str) -> Option<Form> {
        let sel = selector("form").ok()?;
        let doc = self.document();
        let found = doc
            .select(&sel)
            .find(|f| f.value().attr("name") == Some(name))
            .map(|f| Form::from_element(f, &self.url));
        found
    }

    pub fn first_form(&self) -> Option<Form> {
        let sel = selector("form").ok()?;
        let doc = self.document();
        let found = doc
            .select(&sel)
            .next()
            .map(|f| Form::from_element(f, &self.url));
        found
    }

    /// First anchor with a resolvable `href`.
    pub fn first_link(&self) -> Option<Link> {
        let sel = selector("a[href]").ok()?;
        let doc = self.document();
        let found = doc.select(&sel).find_map(|a| {
            let href = a.value().attr("href")?;
            let url = self.url.join(href).ok()?;
            Some(Link {
                url,
                text: a.text().collect::<String>().trim().to_string(),
            })
        });
        found
    }

    /// Target path of a `meta http-equiv="Refresh"` redirect, if present.
    pub fn meta_refresh_target(&self) -> Option<String> {
        static META_REFRESH: OnceLock<Option<Regex>> = OnceLock::new();
        let re = META_REFRESH
            .get_or_init(|| Regex::new(r#"meta http-equiv="Refresh" content="0; url=([^"]+)"#).ok())
            .as_ref()?;
        re.captures(&self.body).map(|c| c[1].to_string())
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub url: Url,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
struct RadioOption {
    name: String,
    value: String,
    checked: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct SubmitControl {
    name: String,
    value: String,
}

/// An HTML form with its current field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub name: Option<String>,
    pub action: Url,
    pub method: FormMethod,
    fields: Vec<(String, String)>,
    radios: Vec<RadioOption>,
    buttons: Vec<SubmitControl>,
}

impl Form {
    fn from_element(form: ElementRef<'_>, base: &Url) -> Self {
        let attrs = form.value();
        let action = attrs
            .attr("action")
            .filter(|a| !a.trim().is_empty())
            .and_then(|a| base.join(a).ok())
            .unwrap_or_else(|| base.clone());
        let method = match attrs.attr("method") {
            Some(m) if m.eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        };

        let mut fields = Vec::new();
        let mut radios = Vec::new();
        let mut buttons = Vec::new();

        if let Ok(controls) = selector("input, button, select, textarea") {
            for el in form.select(&controls) {
                let v = el.value();
                let Some(name) = v.attr("name") else { continue };
                let name = name.to_string();
                match v.name() {
                    "input" => {
                        let kind = v.attr("type").unwrap_or("text").to_ascii_lowercase();
                        let value = v.attr("value").unwrap_or_default().to_string();
                        match kind.as_str() {
                            "submit" | "image" | "button" => {
                                buttons.push(SubmitControl { name, value })
                            }
                            "radio" => radios.push(RadioOption {
                                name,
                                value,
                                checked: v.attr("checked").is_some(),
                            }),
                            "checkbox" => {
                                if v.attr("checked").is_some() {
                                    let value = if value.is_empty() { "on".into() } else { value };
                                    fields.push((name, value));
                                }
                            }
                            "reset" | "file" => {}
                            _ => fields.push((name, value)),
                        }
                    }
                    "button" => {
                        let kind = v.attr("type").unwrap_or("submit");
                        if kind.eq_ignore_ascii_case("submit") {
                            let value = v.attr("value").unwrap_or_default().to_string();
                            buttons.push(SubmitControl { name, value });
                        }
                    }
                    "select" => {
                        let value = selector("option")
                            .ok()
                            .and_then(|opt| {
                                let options: Vec<_> = el.select(&opt).collect();
                                let chosen = options
                                    .iter()
                                    .find(|o| o.value().attr("selected").is_some())
                                    .or_else(|| options.first())
                                    .map(|o| {
                                        o.value()
                                            .attr("value")
                                            .map(str::to_string)
                                            .unwrap_or_else(|| o.text().collect::<String>())
                                    });
                                chosen
                            })
                            .unwrap_or_default();
                        fields.push((name, value));
                    }
                    "textarea" => fields.push((name, el.text().collect())),
                    _ => {}
                }
            }
        }

        Self {
            name: attrs.attr("name").map(str::to_string),
            action,
            method,
            fields,
            radios,
            buttons,
        }
    }

    /// Current value of a field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, adding it if the form does not declare it.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(field) => field.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Check the radio button with this value, unchecking the rest of its group.
    pub fn check_radio(&mut self, value: &str) -> Result<()> {
        let group = self
            .radios
            .iter()
            .find(|r| r.value == value)
            .map(|r| r.name.clone())
            .ok_or_else(|| {
                ConnectorError::ProtocolDrift(format!("No radio button with value {value:?}"))
            })?;
        for radio in self.radios.iter_mut().filter(|r| r.name == group) {
            radio.checked = radio.value == value;
        }
        Ok(())
    }

    /// Ordered name/value pairs a browser would send, pressing `button`
    /// (by name) if given.
    pub fn submission(&self, button: Option<&str>) -> Result<Vec<(String, String)>> {
        let mut pairs = self.fields.clone();
        pairs.extend(
            self.radios
                .iter()
                .filter(|r| r.checked)
                .map(|r| (r.name.clone(), r.value.clone())),
        );
        if let Some(button) = button {
            let control = self
                .buttons
                .iter()
                .find(|b| b.name == button)
                .ok_or_else(|| {
                    ConnectorError::ProtocolDrift(format!("No submit control named {button:?}"))
                })?;
            pairs.push((control.name.clone(), control.value.clone()));
        }
        Ok(pairs)
    }
}
