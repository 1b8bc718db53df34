use base64::{engine::general_purpose, Engine};

use crate::error::AdvisorError;
use crate::models::InferenceResult;

const PAGE_TEMPLATE: &str = include_str!("../../static/index.html");
const RESULT_SLOT: &str = "<!-- RESULT -->";

/// Inline copy of the submitted image, shown above the answer.
pub struct Preview {
    pub mime_type: String,
    pub data: String,
}

impl Preview {
    pub fn new(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// The empty upload form.
pub fn index_page() -> String {
    PAGE_TEMPLATE.replace(RESULT_SLOT, "")
}

pub fn result_page(preview: Option<&Preview>, result: &InferenceResult) -> String {
    let mut section = preview_html(preview);
    section.push_str(&format!(
        "<p class=\"upload-info\">Uploaded file '{}' as: {}</p>\n\
         <h3>The Response is</h3>\n\
         <pre class=\"response\">{}</pre>\n",
        escape_html(&result.handle.display_name),
        escape_html(&result.handle.uri),
        escape_html(&result.text)
    ));
    PAGE_TEMPLATE.replace(RESULT_SLOT, &section)
}

pub fn error_page(preview: Option<&Preview>, error: &AdvisorError) -> String {
    let mut section = preview_html(preview);
    section.push_str(&format!(
        "<div class=\"error\" role=\"alert\">{}</div>\n",
        escape_html(&error.to_string())
    ));
    PAGE_TEMPLATE.replace(RESULT_SLOT, &section)
}

fn preview_html(preview: Option<&Preview>) -> String {
    match preview {
        Some(p) => format!(
            "<figure class=\"preview\">\n\
             <img src=\"data:{};base64,{}\" alt=\"Uploaded Image.\">\n\
             <figcaption>Uploaded Image.</figcaption>\n\
             </figure>\n",
            escape_html(&p.mime_type),
            p.data
        ),
        None => String::new(),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
