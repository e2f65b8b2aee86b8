//! HTTP implementation of [`FormAutomator`].
//!
//! Pages are fetched with a cookie-carrying client and inspected with
//! `scraper`. Clicking and submitting are translated into the request a
//! browser would send: following a link, selecting an option, or posting
//! the enclosing form with its default values plus anything staged with
//! `fill_field`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{AutomationError, FormAutomator};
use crate::config::Settings;

/// A fetched page
#[derive(Debug, Clone)]
struct Page {
    url: Url,
    html: String,
}

/// Request a form submission turns into
#[derive(Debug, Clone, PartialEq)]
pub struct FormRequest {
    pub action: Url,
    pub post: bool,
    pub multipart: bool,
    /// Field values in document order
    pub fields: Vec<(String, String)>,
    /// Names of `<input type="file">` fields
    pub file_fields: Vec<String>,
}

/// What a click on an element amounts to
#[derive(Debug, Clone, PartialEq)]
pub enum ClickAction {
    Select { name: String, value: String },
    Follow(Url),
    Submit(FormRequest),
    Nothing,
}

/// Browser-like form session over HTTP
pub struct HttpFormSession {
    client: Client,
    page: Option<Page>,
    staged: Vec<(String, String)>,
}

impl HttpFormSession {
    pub fn new(settings: &Settings) -> Result<Self, AutomationError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(settings.http.timeout_seconds))
            .user_agent(settings.http.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            page: None,
            staged: Vec::new(),
        })
    }

    fn page(&self) -> Result<&Page, AutomationError> {
        self.page.as_ref().ok_or(AutomationError::NoPage)
    }

    async fn load(&mut self, response: reqwest::Response) -> Result<(), AutomationError> {
        let url = response.url().clone();
        let status = response.status();
        let html = response.text().await?;
        debug!("📄 {} {} ({} bytes)", status, url, html.len());

        self.page = Some(Page { url, html });
        self.staged.clear();
        Ok(())
    }

    fn stage(&mut self, name: &str, value: &str) {
        self.staged.retain(|(n, _)| n != name);
        self.staged.push((name.to_string(), value.to_string()));
    }

    async fn send_form(&mut self, mut request: FormRequest) -> Result<(), AutomationError> {
        for (name, value) in &self.staged {
            match request.fields.iter_mut().find(|(n, _)| n == name) {
                Some(field) => field.1 = value.clone(),
                None => request.fields.push((name.clone(), value.clone())),
            }
        }

        debug!(
            "📨 Submitting form to {} ({} field(s))",
            request.action,
            request.fields.len()
        );

        let response = if !request.post {
            self.client
                .get(request.action.clone())
                .query(&request.fields)
                .send()
                .await?
        } else if request.multipart {
            let mut form = Form::new();
            for (name, value) in request.fields {
                if request.file_fields.contains(&name) {
                    form = form.part(name, file_part(Path::new(&value)).await?);
                } else {
                    form = form.text(name, value);
                }
            }
            self.client
                .post(request.action.clone())
                .multipart(form)
                .send()
                .await?
        } else {
            self.client
                .post(request.action.clone())
                .form(&request.fields)
                .send()
                .await?
        };

        self.load(response).await
    }
}

async fn file_part(path: &Path) -> Result<Part, AutomationError> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    Ok(Part::bytes(bytes).file_name(file_name))
}

#[async_trait]
impl FormAutomator for HttpFormSession {
    async fn navigate(&mut self, url: &str) -> Result<(), AutomationError> {
        let url = Url::parse(url)?;
        let response = self.client.get(url).send().await?;
        self.load(response).await
    }

    async fn fill_field(&mut self, name: &str, value: &str) -> Result<(), AutomationError> {
        if !has_field(&self.page()?.html, name) {
            return Err(AutomationError::ElementNotFound(format!("field {}", name)));
        }
        self.stage(name, value);
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), AutomationError> {
        let action = {
            let page = self.page()?;
            plan_click(&page.html, &page.url, selector)?
        };

        match action {
            ClickAction::Select { name, value } => {
                self.stage(&name, &value);
                Ok(())
            }
            ClickAction::Follow(url) => {
                let response = self.client.get(url).send().await?;
                self.load(response).await
            }
            ClickAction::Submit(request) => self.send_form(request).await,
            // script-driven controls cannot be clicked over plain HTTP
            ClickAction::Nothing => Err(AutomationError::NotActionable(selector.to_string())),
        }
    }

    async fn submit(&mut self, selector: &str) -> Result<(), AutomationError> {
        let request = {
            let page = self.page()?;
            plan_submit(&page.html, &page.url, selector)?
        };
        self.send_form(request).await
    }

    fn current_url(&self) -> String {
        self.page
            .as_ref()
            .map(|p| p.url.to_string())
            .unwrap_or_default()
    }

    async fn refresh(&mut self) -> Result<(), AutomationError> {
        let url = self.page()?.url.clone();
        let response = self.client.get(url).send().await?;
        self.load(response).await
    }
}

fn parse_selector(selector: &str) -> Result<Selector, AutomationError> {
    Selector::parse(selector).map_err(|e| AutomationError::InvalidSelector(format!("{}: {:?}", selector, e)))
}

fn find_first<'a>(document: &'a Html, selector: &str) -> Result<ElementRef<'a>, AutomationError> {
    let parsed = parse_selector(selector)?;
    document
        .select(&parsed)
        .next()
        .ok_or_else(|| AutomationError::ElementNotFound(selector.to_string()))
}

fn enclosing<'a>(element: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

/// Whether the page has a named input, textarea or select
pub fn has_field(html: &str, name: &str) -> bool {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("input[name], textarea[name], select[name]") else {
        return false;
    };
    let found = document
        .select(&selector)
        .any(|el| el.value().attr("name") == Some(name));
    found
}

/// Work out what clicking the first match of `selector` does
pub fn plan_click(html: &str, base: &Url, selector: &str) -> Result<ClickAction, AutomationError> {
    let document = Html::parse_document(html);
    let element = find_first(&document, selector)?;

    match element.value().name() {
        "option" => {
            let select = enclosing(element, "select")
                .ok_or_else(|| AutomationError::ElementNotFound(format!("select around {}", selector)))?;
            let name = select
                .value()
                .attr("name")
                .ok_or_else(|| AutomationError::ElementNotFound(format!("name of select around {}", selector)))?;
            Ok(ClickAction::Select {
                name: name.to_string(),
                value: option_value(element),
            })
        }
        "a" => match element.value().attr("href") {
            Some(href) => Ok(ClickAction::Follow(base.join(href)?)),
            None => Ok(ClickAction::Nothing),
        },
        _ => match enclosing(element, "form") {
            Some(form) => {
                let mut request = form_request(form, base)?;
                let value = element.value();
                if let Some(name) = value.attr("name") {
                    request
                        .fields
                        .push((name.to_string(), value.attr("value").unwrap_or_default().to_string()));
                }
                Ok(ClickAction::Submit(request))
            }
            None => Ok(ClickAction::Nothing),
        },
    }
}

/// Build the request for the form matching `selector`, or the form
/// enclosing the matched element
pub fn plan_submit(html: &str, base: &Url, selector: &str) -> Result<FormRequest, AutomationError> {
    let document = Html::parse_document(html);
    let element = find_first(&document, selector)?;

    let form = if element.value().name() == "form" {
        element
    } else {
        enclosing(element, "form")
            .ok_or_else(|| AutomationError::ElementNotFound(format!("form around {}", selector)))?
    };

    form_request(form, base)
}

fn option_value(option: ElementRef<'_>) -> String {
    match option.value().attr("value") {
        Some(value) => value.to_string(),
        None => option.text().collect::<String>().trim().to_string(),
    }
}

fn form_request(form: ElementRef<'_>, base: &Url) -> Result<FormRequest, AutomationError> {
    let attrs = form.value();
    let action = match attrs.attr("action") {
        Some(action) if !action.trim().is_empty() => base.join(action.trim())?,
        _ => base.clone(),
    };
    let post = attrs
        .attr("method")
        .map(|m| m.eq_ignore_ascii_case("post"))
        .unwrap_or(false);

    let mut fields: Vec<(String, String)> = Vec::new();
    let mut file_fields: Vec<String> = Vec::new();

    let controls = parse_selector("input[name], textarea[name], select[name]")?;
    let selected = parse_selector("option[selected]")?;
    let any_option = parse_selector("option")?;

    for control in form.select(&controls) {
        let value = control.value();
        let Some(name) = value.attr("name") else {
            continue;
        };
        if value.attr("disabled").is_some() {
            continue;
        }

        match value.name() {
            "textarea" => fields.push((name.to_string(), control.text().collect())),
            "select" => {
                let option = control
                    .select(&selected)
                    .next()
                    .or_else(|| control.select(&any_option).next());
                if let Some(option) = option {
                    fields.push((name.to_string(), option_value(option)));
                }
            }
            _ => {
                let kind = value.attr("type").unwrap_or("text").to_ascii_lowercase();
                match kind.as_str() {
                    "submit" | "button" | "image" | "reset" => {}
                    "file" => file_fields.push(name.to_string()),
                    "checkbox" | "radio" => {
                        if value.attr("checked").is_some() {
                            fields.push((name.to_string(), value.attr("value").unwrap_or("on").to_string()));
                        }
                    }
                    _ => fields.push((name.to_string(), value.attr("value").unwrap_or_default().to_string())),
                }
            }
        }
    }

    let multipart = !file_fields.is_empty()
        || attrs
            .attr("enctype")
            .map(|e| e.eq_ignore_ascii_case("multipart/form-data"))
            .unwrap_or(false);

    Ok(FormRequest {
        action,
        post,
        multipart,
        fields,
        file_fields,
    })
}
